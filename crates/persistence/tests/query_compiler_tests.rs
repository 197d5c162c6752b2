//! Tests for simple (non-pipeline) query compilation.
//!
//! These exercise the predicate builders and the query assembler end to
//! end: a parsed query goes in, the conjunctive filter document comes out.

mod common;

use bson::{doc, Bson, DateTime};
use common::*;

use ambra_persistence::backends::mongodb::QueryCompiler;
use ambra_persistence::types::{
    FhirDateTime, OrParam, Prefix, Query, SearchParam, SearchParamInfo, StringParam,
};

fn window(value: &str) -> (DateTime, DateTime) {
    let date: FhirDateTime = value.parse().unwrap();
    (
        DateTime::from_chrono(date.range_low_incl()),
        DateTime::from_chrono(date.range_high_excl()),
    )
}

// ============================================================================
// Date predicates over Periods
// ============================================================================

/// `Encounter?date=eq2020` requires the whole period inside the year.
#[test]
fn date_eq_over_period_requires_containment() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);
    let (low, high) = window("2020");

    let query = Query::new("Encounter").with_param(encounter_date(Prefix::Eq, "2020"));
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(
        filter,
        doc! {
            "period.start.__from": { "$gte": low },
            "period.end.__to": { "$lte": high },
        }
    );
}

/// `Encounter?date=ge2020` also admits overlap-above and ongoing periods.
#[test]
fn date_ge_over_period_admits_overlap() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);
    let (low, high) = window("2020");

    let query = Query::new("Encounter").with_param(encounter_date(Prefix::Ge, "2020"));
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(
        filter,
        doc! {
            "$or": [
                { "period.end.__to": { "$gte": high } },
                { "period.start.__from": { "$gte": low } },
                { "period.start.__from": { "$exists": true }, "period.end": Bson::Null },
            ],
        }
    );
}

// ============================================================================
// Token predicates over CodeableConcepts
// ============================================================================

/// `Observation?code=http://loinc.org|1234-5` pins both parts to one
/// coding entry.
#[test]
fn token_system_and_code_use_elem_match() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let query = Query::new("Observation").with_param(observation_code(
        Some("http://loinc.org"),
        Some("1234-5"),
        false,
    ));
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(
        filter,
        doc! {
            "code.coding": {
                "$elemMatch": { "system": "http://loinc.org", "code": "1234-5" },
            },
        }
    );
}

/// `Observation?code=|1234-5` requires the coding to have no system.
#[test]
fn token_bare_code_requires_absent_system() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let query =
        Query::new("Observation").with_param(observation_code(None, Some("1234-5"), false));
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(
        filter,
        doc! {
            "code.coding.system": { "$exists": false },
            "code.coding.code": "1234-5",
        }
    );
}

/// `Observation?code=1234-5` matches the code under any system.
#[test]
fn token_code_with_any_system() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let query = Query::new("Observation").with_param(observation_code(None, Some("1234-5"), true));
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(filter, doc! { "code.coding.code": "1234-5" });
}

// ============================================================================
// Multi-parameter merging
// ============================================================================

/// `Patient?gender=male&birthdate=eq1970` merges into one conjunction.
#[test]
fn distinct_parameters_merge_into_one_document() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);
    let (low, high) = window("1970");

    let query = Query::new("Patient")
        .with_param(patient_gender("male"))
        .with_param(patient_birthdate(Prefix::Eq, "1970"));
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(
        filter,
        doc! {
            "gender": "male",
            "birthDate.__from": { "$gte": low },
            "birthDate.__to": { "$lte": high },
        }
    );
}

/// A second `gender` parameter must land in an explicit `$and`, never
/// overwrite the first.
#[test]
fn duplicate_parameter_is_promoted_to_and() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let query = Query::new("Patient")
        .with_param(patient_gender("male"))
        .with_param(patient_gender("female"));
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(
        filter,
        doc! {
            "gender": "male",
            "$and": [ { "gender": "female" } ],
        }
    );
}

// ============================================================================
// OR semantics
// ============================================================================

/// A multi-value parameter compiles each branch independently under one
/// disjunction.
#[test]
fn or_parameter_compiles_branchwise() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let or = SearchParam::Or(OrParam {
        info: SearchParamInfo::new("Patient", "gender").with_path("gender", "code"),
        items: vec![patient_gender("male"), patient_gender("female")],
    });
    let query = Query::new("Patient").with_param(or);
    let filter = compiler.create_query_object(&query).unwrap();

    assert_eq!(
        filter,
        doc! { "$or": [ { "gender": "male" }, { "gender": "female" } ] }
    );
}

/// A multi-path parameter is equivalent to the disjunction of its
/// single-path predicates.
#[test]
fn multi_path_parameter_is_disjunction_of_single_paths() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let multi = SearchParam::String(StringParam {
        info: SearchParamInfo::new("Patient", "phonetic")
            .with_path("[]name.family", "string")
            .with_path("[]name.given", "string"),
        value: "Smith".to_string(),
    });
    let combined = compiler
        .create_query_object(&Query::new("Patient").with_param(multi))
        .unwrap();

    let single = |path: &str| {
        let param = SearchParam::String(StringParam {
            info: SearchParamInfo::new("Patient", "phonetic").with_path(path, "string"),
            value: "Smith".to_string(),
        });
        compiler
            .create_query_object(&Query::new("Patient").with_param(param))
            .unwrap()
    };

    assert_eq!(
        combined,
        doc! {
            "$or": [
                Bson::Document(single("[]name.family")),
                Bson::Document(single("[]name.given")),
            ],
        }
    );
}

// ============================================================================
// Compilation mode and diagnostics
// ============================================================================

#[test]
fn simple_query_never_uses_pipeline() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let query = Query::new("Patient").with_param(patient_gender("male"));
    let compiled = compiler.compile(&query).unwrap();
    assert!(!compiled.uses_pipeline());
    assert_eq!(compiled.resource(), "Patient");

    let rendered = compiled.to_string();
    assert!(rendered.contains("Resource: Patient"));
    assert!(rendered.contains("gender"));
}

/// Compiling never mutates the parameter metadata handed in.
#[test]
fn compilation_leaves_parameter_infos_untouched() {
    let config = case_sensitive_config();
    let compiler = QueryCompiler::new(&config);

    let query = Query::new("Patient")
        .with_param(patient_gender("male"))
        .with_param(patient_name("Smith"));
    let snapshot: Vec<SearchParamInfo> = query.params.iter().map(|p| p.info().clone()).collect();

    compiler.compile(&query).unwrap();

    let after: Vec<SearchParamInfo> = query.params.iter().map(|p| p.info().clone()).collect();
    assert_eq!(snapshot, after);
}
