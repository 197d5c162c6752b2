//! Shared fixtures for the search compiler tests.
//!
//! The search-parameter dictionary itself lives outside this crate; these
//! helpers stand in for it, producing the parameter metadata the compiler
//! would normally receive from the registry.

#![allow(dead_code)]

use ambra_persistence::config::SearchConfig;
use ambra_persistence::types::{
    DateParam, FhirDateTime, Prefix, Query, Reference, ReferenceParam, SearchParam,
    SearchParamInfo, StringParam, TokenParam,
};

/// A configuration with case-insensitive matching off, so predicates
/// compare as plain strings.
pub fn case_sensitive_config() -> SearchConfig {
    SearchConfig {
        enable_ci_searches: false,
        ..Default::default()
    }
}

/// `Encounter.date` over the encounter period.
pub fn encounter_date(prefix: Prefix, value: &str) -> SearchParam {
    SearchParam::Date(DateParam {
        info: SearchParamInfo::new("Encounter", "date")
            .with_path("period", "Period")
            .with_prefix(prefix),
        date: value.parse::<FhirDateTime>().expect("valid date fixture"),
    })
}

/// `Patient.birthdate` over the denormalised date window.
pub fn patient_birthdate(prefix: Prefix, value: &str) -> SearchParam {
    SearchParam::Date(DateParam {
        info: SearchParamInfo::new("Patient", "birthdate")
            .with_path("birthDate", "date")
            .with_prefix(prefix),
        date: value.parse::<FhirDateTime>().expect("valid date fixture"),
    })
}

/// `Patient.gender`, a token over a plain code element.
pub fn patient_gender(value: &str) -> SearchParam {
    SearchParam::Token(TokenParam {
        info: SearchParamInfo::new("Patient", "gender").with_path("gender", "code"),
        system: None,
        code: Some(value.to_string()),
        any_system: true,
    })
}

/// `Patient.name`, a string over HumanName entries.
pub fn patient_name(value: &str) -> SearchParam {
    SearchParam::String(StringParam {
        info: SearchParamInfo::new("Patient", "name").with_path("[]name", "HumanName"),
        value: value.to_string(),
    })
}

/// `Observation.code`, a token over a CodeableConcept.
pub fn observation_code(system: Option<&str>, code: Option<&str>, any_system: bool) -> SearchParam {
    SearchParam::Token(TokenParam {
        info: SearchParamInfo::new("Observation", "code").with_path("code", "CodeableConcept"),
        system: system.map(String::from),
        code: code.map(String::from),
        any_system,
    })
}

/// The `Condition.subject` reference parameter metadata.
pub fn condition_subject_info() -> SearchParamInfo {
    SearchParamInfo::new("Condition", "subject")
        .with_path("subject", "Reference")
        .with_targets(["Patient", "Group"])
}

/// The `Observation.subject` reference parameter metadata.
pub fn observation_subject_info() -> SearchParamInfo {
    SearchParamInfo::new("Observation", "subject")
        .with_path("subject", "Reference")
        .with_targets(["Patient"])
}

/// A reverse-chained `_has:Observation:subject:...` parameter carrying the
/// given sub-query.
pub fn has_observation_subject(sub_query: Query) -> SearchParam {
    SearchParam::Reference(ReferenceParam {
        info: observation_subject_info(),
        reference: Reference::ReverseChained {
            resource_type: "Observation".to_string(),
            query: Box::new(sub_query),
        },
    })
}

/// A chained `subject.<param>` parameter carrying the given sub-query.
pub fn chained_subject(resource_type: &str, sub_query: Query) -> SearchParam {
    SearchParam::Reference(ReferenceParam {
        info: observation_subject_info(),
        reference: Reference::Chained {
            resource_type: resource_type.to_string(),
            query: Box::new(sub_query),
        },
    })
}
