//! Quantity parameter predicate builder.
//!
//! Stored quantities are denormalised with `value.__from`/`value.__to`
//! range bounds alongside `system` and `code`.

use bson::{doc, Bson, Document};

use crate::error::{SearchError, SearchResult};
use crate::types::{Prefix, QuantityParam};

use super::super::bson_builder::{build_bson, or_paths};
use super::MatchContext;

/// Builds predicates for quantity parameters.
pub struct QuantityHandler;

impl QuantityHandler {
    /// Builds the predicate document for a quantity parameter.
    ///
    /// Prefix semantics mirror ranged dates over `value.__from`/
    /// `value.__to`. A search without a code system is not supported:
    /// FHIR asks for a match on either `code` or `unit`, and that
    /// disjunction does not compose with the element-match projection yet.
    pub fn build(param: &QuantityParam, ctx: MatchContext<'_>) -> SearchResult<Document> {
        let low = param.number.range_low_incl();
        let high = param.number.range_high_excl();
        let exact = param.number.value();

        or_paths(
            |path| {
                let mut criteria = match param.info.effective_prefix() {
                    Prefix::Eq => doc! {
                        "value.__from": { "$gte": low },
                        "value.__to": { "$lte": high },
                    },
                    Prefix::Lt => doc! {
                        "value.__from": { "$lt": exact },
                    },
                    Prefix::Gt => doc! {
                        "value.__to": { "$gt": exact },
                    },
                    Prefix::Ge => doc! {
                        "$or": [
                            { "value.__to": { "$gte": high } },
                            { "value.__from": { "$gte": low } },
                        ],
                    },
                    Prefix::Le => doc! {
                        "$or": [
                            { "value.__from": { "$lte": low } },
                            { "value.__to": { "$lte": high } },
                        ],
                    },
                    prefix => {
                        return Err(SearchError::unsupported(format!(
                            "parameter \"{}\": prefix {prefix} is not supported for quantities",
                            param.info.name
                        )))
                    }
                };

                match &param.system {
                    None => {
                        return Err(SearchError::unsupported(format!(
                            "parameter \"{}\": quantity search without a code system is not yet supported",
                            param.info.name
                        )));
                    }
                    Some(system) => {
                        criteria.insert("code", ctx.ci_token(&param.code));
                        criteria.insert("system", ctx.ci_token(system));
                    }
                }
                build_bson(&path.path, Bson::Document(criteria))
            },
            &param.info.paths,
        )
    }
}
