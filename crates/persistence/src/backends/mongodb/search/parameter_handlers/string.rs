//! String parameter predicate builder.

use bson::{doc, Bson, Document};

use crate::error::SearchResult;
use crate::types::StringParam;

use super::super::bson_builder::{build_bson, or_paths};
use super::MatchContext;

/// Builds case-insensitive starts-with predicates for string parameters.
pub struct StringHandler;

impl StringHandler {
    /// Builds the predicate document for a string parameter.
    ///
    /// `HumanName` targets expand into a disjunction over `text`,
    /// `family` and `given`; `Address` over its textual parts. The `_id`
    /// parameter is matched exactly and case-sensitively.
    pub fn build(param: &StringParam, ctx: MatchContext<'_>) -> SearchResult<Document> {
        or_paths(
            |path| match path.fhir_type.as_str() {
                "HumanName" => build_bson(
                    &path.path,
                    Bson::Document(doc! {
                        "$or": [
                            { "text": ctx.ci_starts_with(&param.value) },
                            { "family": ctx.ci_starts_with(&param.value) },
                            { "given": ctx.ci_starts_with(&param.value) },
                        ],
                    }),
                ),
                "Address" => build_bson(
                    &path.path,
                    Bson::Document(doc! {
                        "$or": [
                            { "text": ctx.ci_starts_with(&param.value) },
                            { "line": ctx.ci_starts_with(&param.value) },
                            { "city": ctx.ci_starts_with(&param.value) },
                            { "state": ctx.ci_starts_with(&param.value) },
                            { "postalCode": ctx.ci_starts_with(&param.value) },
                            { "country": ctx.ci_starts_with(&param.value) },
                        ],
                    }),
                ),
                _ => {
                    if param.info.name == "_id" {
                        build_bson(&path.path, Bson::String(param.value.clone()))
                    } else {
                        build_bson(&path.path, ctx.ci_starts_with(&param.value))
                    }
                }
            },
            &param.info.paths,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::types::SearchParamInfo;

    fn string_param(name: &str, value: &str, path: &str, fhir_type: &str) -> StringParam {
        StringParam {
            info: SearchParamInfo::new("Patient", name).with_path(path, fhir_type),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_human_name_expands_to_disjunction() {
        let config = SearchConfig {
            enable_ci_searches: false,
            ..Default::default()
        };
        let param = string_param("name", "Smith", "[]name", "HumanName");
        let result = StringHandler::build(&param, MatchContext { config: &config }).unwrap();
        assert_eq!(
            result,
            doc! {
                "$or": [
                    { "name.text": "Smith" },
                    { "name.family": "Smith" },
                    { "name.given": "Smith" },
                ],
            }
        );
    }

    #[test]
    fn test_address_expands_over_parts() {
        let config = SearchConfig {
            enable_ci_searches: false,
            ..Default::default()
        };
        let param = string_param("address", "Springfield", "[]address", "Address");
        let result = StringHandler::build(&param, MatchContext { config: &config }).unwrap();
        let Some(Bson::Array(branches)) = result.get("$or") else {
            panic!("expected a disjunction");
        };
        assert_eq!(branches.len(), 6);
    }

    #[test]
    fn test_plain_string_is_ci_starts_with() {
        let config = SearchConfig::default();
        let param = string_param("family", "Smi", "[]name.family", "string");
        let result = StringHandler::build(&param, MatchContext { config: &config }).unwrap();
        let Some(Bson::RegularExpression(re)) = result.get("name.family") else {
            panic!("expected a regex");
        };
        assert_eq!(re.pattern, "^Smi");
        assert_eq!(re.options, "i");
    }

    #[test]
    fn test_id_is_exact_and_case_sensitive() {
        let config = SearchConfig::default();
        let param = string_param("_id", "Abc123", "_id", "id");
        let result = StringHandler::build(&param, MatchContext { config: &config }).unwrap();
        assert_eq!(result, doc! { "_id": "Abc123" });
    }
}
