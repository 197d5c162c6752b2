//! Query assembler.
//!
//! Dispatches each parameter to its predicate builder and merges the
//! per-parameter predicates into one conjunctive filter document,
//! promoting contested keys into an explicit `$and`. Queries that need
//! joins are handed to the pipeline assembler instead.

use bson::{doc, Bson, Document};

use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::types::{OrParam, Prefix, Query, SearchParam};

use super::bson_builder::merge;
use super::parameter_handlers::{
    DateHandler, MatchContext, NumberHandler, QuantityHandler, ReferenceHandler, StringHandler,
    TokenHandler, UriHandler,
};
use super::CompiledQuery;

/// Compiles parsed queries into filter documents or pipelines.
///
/// Compilation is pure and per-request; the compiler borrows the search
/// configuration and holds no other state.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    config: &'a SearchConfig,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler for the given configuration.
    pub fn new(config: &'a SearchConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &SearchConfig {
        self.config
    }

    /// Compiles a query to its executable form: a plain filter document,
    /// or an aggregation pipeline when the query uses includes or chains.
    pub fn compile(&self, query: &Query) -> SearchResult<CompiledQuery> {
        if query.uses_pipeline() {
            Ok(CompiledQuery::Pipeline {
                resource: query.resource.clone(),
                stages: self.create_pipeline(query)?,
            })
        } else {
            Ok(CompiledQuery::Filter {
                resource: query.resource.clone(),
                filter: self.create_query_object(query)?,
            })
        }
    }

    /// Builds the conjunctive filter document for a query's parameters.
    pub fn create_query_object(&self, query: &Query) -> SearchResult<Document> {
        self.create_query_from_params(&query.params)
    }

    /// Builds the conjunctive filter document for a parameter list.
    pub(crate) fn create_query_from_params(
        &self,
        params: &[SearchParam],
    ) -> SearchResult<Document> {
        let mut result = Document::new();
        for predicate in self.create_param_objects(params)? {
            merge(&mut result, predicate);
        }
        Ok(result)
    }

    /// Builds one predicate document per parameter.
    pub(crate) fn create_param_objects(
        &self,
        params: &[SearchParam],
    ) -> SearchResult<Vec<Document>> {
        let ctx = MatchContext {
            config: self.config,
        };
        params
            .iter()
            .map(|param| {
                validate_supported_features(param)?;
                match param {
                    SearchParam::Composite(p) => Err(SearchError::unsupported(format!(
                        "parameter \"{}\": composite parameters are not supported",
                        p.info.name
                    ))),
                    SearchParam::Date(p) => DateHandler::build(p),
                    SearchParam::Number(p) => NumberHandler::build(p),
                    SearchParam::Quantity(p) => QuantityHandler::build(p, ctx),
                    SearchParam::Reference(p) => ReferenceHandler::build(p, self, ctx),
                    SearchParam::String(p) => StringHandler::build(p, ctx),
                    SearchParam::Token(p) => TokenHandler::build(p, ctx),
                    SearchParam::Uri(p) => UriHandler::build(p),
                    SearchParam::Or(p) => self.create_or_query_object(p),
                }
            })
            .collect()
    }

    fn create_or_query_object(&self, param: &OrParam) -> SearchResult<Document> {
        let branches: Vec<Bson> = self
            .create_param_objects(&param.items)?
            .into_iter()
            .map(Bson::Document)
            .collect();
        Ok(doc! { "$or": branches })
    }
}

/// Rejects parameter features the compiler does not implement before any
/// predicate is built.
///
/// Prefixes other than `eq` are only meaningful on date, number, and
/// quantity parameters. Modifiers are only accepted on reference
/// parameters where the modifier names a target resource type.
fn validate_supported_features(param: &SearchParam) -> SearchResult<()> {
    let info = param.info();

    let prefix_allowed = matches!(
        param,
        SearchParam::Date(_) | SearchParam::Number(_) | SearchParam::Quantity(_)
    ) || info.effective_prefix() == Prefix::Eq;
    if !prefix_allowed {
        return Err(SearchError::unsupported(format!(
            "parameter \"{}\": prefix {} is not supported for this parameter type",
            info.name,
            info.effective_prefix()
        )));
    }

    if let Some(modifier) = &info.modifier {
        let is_reference = matches!(param, SearchParam::Reference(_));
        let names_resource_type = modifier
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase());
        if !is_reference || !names_resource_type {
            return Err(SearchError::unsupported(format!(
                "parameter \"{}\": modifier \"{modifier}\" is not supported",
                info.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CompositeParam, FhirDateTime, DateParam, SearchParamInfo, StringParam, TokenParam,
    };

    fn cs_config() -> SearchConfig {
        SearchConfig {
            enable_ci_searches: false,
            ..Default::default()
        }
    }

    fn gender_param(value: &str) -> SearchParam {
        SearchParam::Token(TokenParam {
            info: SearchParamInfo::new("Patient", "gender").with_path("gender", "code"),
            system: None,
            code: Some(value.to_string()),
            any_system: true,
        })
    }

    fn birthdate_param(value: &str) -> SearchParam {
        SearchParam::Date(DateParam {
            info: SearchParamInfo::new("Patient", "birthdate").with_path("birthDate", "date"),
            date: value.parse::<FhirDateTime>().unwrap(),
        })
    }

    #[test]
    fn test_params_merge_into_conjunction() {
        let config = cs_config();
        let compiler = QueryCompiler::new(&config);
        let query = Query::new("Patient")
            .with_param(gender_param("male"))
            .with_param(birthdate_param("1970"));

        let result = compiler.create_query_object(&query).unwrap();
        assert_eq!(result.get_str("gender").unwrap(), "male");
        assert!(result.contains_key("birthDate.__from"));
        assert!(result.contains_key("birthDate.__to"));
        assert!(!result.contains_key("$and"));
    }

    #[test]
    fn test_duplicate_parameter_promoted_to_and() {
        let config = cs_config();
        let compiler = QueryCompiler::new(&config);
        let query = Query::new("Patient")
            .with_param(gender_param("male"))
            .with_param(gender_param("female"));

        let result = compiler.create_query_object(&query).unwrap();
        assert_eq!(result.get_str("gender").unwrap(), "male");
        assert_eq!(
            result.get_array("$and").unwrap().as_slice(),
            [Bson::Document(doc! { "gender": "female" })]
        );
    }

    #[test]
    fn test_or_param_compiles_each_branch() {
        let config = cs_config();
        let compiler = QueryCompiler::new(&config);
        let or = SearchParam::Or(OrParam {
            info: SearchParamInfo::new("Patient", "gender").with_path("gender", "code"),
            items: vec![gender_param("male"), gender_param("female")],
        });
        let result = compiler
            .create_query_from_params(std::slice::from_ref(&or))
            .unwrap();
        assert_eq!(
            result,
            doc! { "$or": [ { "gender": "male" }, { "gender": "female" } ] }
        );
    }

    #[test]
    fn test_composite_is_unsupported() {
        let config = cs_config();
        let compiler = QueryCompiler::new(&config);
        let composite = SearchParam::Composite(CompositeParam {
            info: SearchParamInfo::new("Observation", "code-value-quantity"),
            components: vec!["code$loinc".to_string()],
        });
        let result = compiler.create_param_objects(std::slice::from_ref(&composite));
        assert!(matches!(result, Err(SearchError::Unsupported(_))));
    }

    #[test]
    fn test_prefix_rejected_on_string_param() {
        let config = cs_config();
        let compiler = QueryCompiler::new(&config);
        let param = SearchParam::String(StringParam {
            info: SearchParamInfo::new("Patient", "name")
                .with_path("[]name", "HumanName")
                .with_prefix(Prefix::Gt),
            value: "Smith".to_string(),
        });
        let result = compiler.create_param_objects(std::slice::from_ref(&param));
        assert!(matches!(result, Err(SearchError::Unsupported(_))));
    }

    #[test]
    fn test_non_type_modifier_rejected() {
        let config = cs_config();
        let compiler = QueryCompiler::new(&config);
        let param = SearchParam::String(StringParam {
            info: SearchParamInfo::new("Patient", "name")
                .with_path("[]name", "HumanName")
                .with_modifier("contains"),
            value: "Smith".to_string(),
        });
        let result = compiler.create_param_objects(std::slice::from_ref(&param));
        assert!(matches!(result, Err(SearchError::Unsupported(_))));
    }

    #[test]
    fn test_simple_query_compiles_to_filter() {
        let config = cs_config();
        let compiler = QueryCompiler::new(&config);
        let query = Query::new("Patient").with_param(gender_param("male"));
        let compiled = compiler.compile(&query).unwrap();
        assert!(!compiled.uses_pipeline());
        assert_eq!(compiled.resource(), "Patient");
    }
}
