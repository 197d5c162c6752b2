//! Number parameter predicate builder.

use bson::{doc, Bson, Document};

use crate::error::{SearchError, SearchResult};
use crate::types::{NumberParam, Prefix};

use super::super::bson_builder::{build_bson, or_paths};

/// Builds predicates for numeric parameters over integer-valued targets.
pub struct NumberHandler;

impl NumberHandler {
    /// Builds the predicate document for a number parameter.
    ///
    /// Equality uses the value's implicit half-open range `[low, high)`;
    /// `ne` matches the complement; `gt`/`lt` compare the exact value and
    /// `ge`/`le` the range bounds. Decimal-typed targets are not
    /// supported.
    pub fn build(param: &NumberParam) -> SearchResult<Document> {
        let low = param.number.range_low_incl();
        let high = param.number.range_high_excl();
        let exact = param.number.value();

        or_paths(
            |path| {
                if path.fhir_type == "decimal" {
                    return Err(SearchError::unsupported(format!(
                        "parameter \"{}\": decimal targets are not yet supported",
                        param.info.name
                    )));
                }

                let criteria = match param.info.effective_prefix() {
                    Prefix::Eq => doc! { "$gte": low, "$lt": high },
                    Prefix::Ne => doc! {
                        "$or": [
                            { "$lt": low },
                            { "$gte": high },
                        ],
                    },
                    Prefix::Gt => doc! { "$gt": exact },
                    Prefix::Lt => doc! { "$lt": exact },
                    Prefix::Ge => doc! { "$gte": low },
                    Prefix::Le => doc! { "$lte": high },
                    Prefix::Sa | Prefix::Eb => {
                        return Err(SearchError::unsupported(format!(
                            "parameter \"{}\": prefix {} is not supported for numbers",
                            param.info.name,
                            param.info.effective_prefix()
                        )))
                    }
                };
                build_bson(&path.path, Bson::Document(criteria))
            },
            &param.info.paths,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FhirNumber, SearchParamInfo};

    fn number_param(prefix: Prefix, value: i64, fhir_type: &str) -> NumberParam {
        NumberParam {
            info: SearchParamInfo::new("Encounter", "length")
                .with_path("length", fhir_type)
                .with_prefix(prefix),
            number: FhirNumber::integer(value),
        }
    }

    #[test]
    fn test_eq_uses_implicit_range() {
        let result = NumberHandler::build(&number_param(Prefix::Eq, 100, "integer")).unwrap();
        assert_eq!(result, doc! { "length": { "$gte": 99.5, "$lt": 100.5 } });
    }

    #[test]
    fn test_ne_is_complement_disjunction() {
        let result = NumberHandler::build(&number_param(Prefix::Ne, 100, "integer")).unwrap();
        assert_eq!(
            result,
            doc! {
                "$or": [
                    { "length": { "$lt": 99.5 } },
                    { "length": { "$gte": 100.5 } },
                ],
            }
        );
    }

    #[test]
    fn test_gt_uses_exact_value() {
        let result = NumberHandler::build(&number_param(Prefix::Gt, 100, "integer")).unwrap();
        assert_eq!(result, doc! { "length": { "$gt": 100.0 } });
    }

    #[test]
    fn test_le_uses_range_bound() {
        let result = NumberHandler::build(&number_param(Prefix::Le, 100, "integer")).unwrap();
        assert_eq!(result, doc! { "length": { "$lte": 100.5 } });
    }

    #[test]
    fn test_decimal_target_unsupported() {
        let result = NumberHandler::build(&number_param(Prefix::Eq, 100, "decimal"));
        assert!(matches!(result, Err(SearchError::Unsupported(_))));
    }

    #[test]
    fn test_sa_unsupported() {
        let result = NumberHandler::build(&number_param(Prefix::Sa, 100, "integer"));
        assert!(matches!(result, Err(SearchError::Unsupported(_))));
    }
}
