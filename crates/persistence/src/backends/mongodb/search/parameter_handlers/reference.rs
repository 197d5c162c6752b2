//! Reference parameter predicate builder.
//!
//! Stored references carry denormalised `reference__id` and
//! `reference__type` companion fields next to the reference string. Chained
//! and reverse-chained references never reach this builder: the query
//! assembler routes them to the pipeline assembler.

use bson::{doc, Bson, Document};

use crate::error::{SearchError, SearchResult};
use crate::types::{Reference, ReferenceParam, SearchParamPath};

use super::super::bson_builder::{build_bson, or_paths};
use super::super::query_builder::QueryCompiler;
use super::MatchContext;

/// Builds predicates for reference parameters.
pub struct ReferenceHandler;

impl ReferenceHandler {
    /// Builds the predicate document for a non-chained reference
    /// parameter.
    pub fn build(
        param: &ReferenceParam,
        compiler: &QueryCompiler<'_>,
        ctx: MatchContext<'_>,
    ) -> SearchResult<Document> {
        or_paths(
            |path| {
                if path.fhir_type == "Resource" {
                    return Self::inlined(param, path, compiler);
                }

                let criteria = match &param.reference {
                    Reference::Local { resource_type, id } => {
                        let mut criteria = doc! { "reference__id": id.as_str() };
                        if let Some(resource_type) = resource_type {
                            criteria.insert("reference__type", resource_type.as_str());
                        }
                        criteria
                    }
                    Reference::External { url } => doc! { "reference": ctx.ci(url) },
                    Reference::Chained { .. } | Reference::ReverseChained { .. } => {
                        return Err(SearchError::internal(format!(
                            "parameter \"{}\": chained references must be compiled in pipeline mode",
                            param.info.name
                        )));
                    }
                };
                build_bson(&path.path, Bson::Document(criteria))
            },
            &param.info.paths,
        )
    }

    /// Predicate against a resource embedded at the path (path type
    /// `"Resource"`): matched by `_id`/`resourceType`, or by the chained
    /// sub-query compiled recursively against the embedded document.
    fn inlined(
        param: &ReferenceParam,
        path: &SearchParamPath,
        compiler: &QueryCompiler<'_>,
    ) -> SearchResult<Document> {
        let criteria = match &param.reference {
            Reference::Local { resource_type, id } => {
                let mut criteria = Document::new();
                if let Some(resource_type) = resource_type {
                    criteria.insert("resourceType", resource_type.as_str());
                }
                criteria.insert("_id", id.as_str());
                criteria
            }
            Reference::Chained {
                resource_type,
                query,
            } => {
                let mut criteria = compiler.create_query_object(query)?;
                criteria.insert("resourceType", resource_type.as_str());
                criteria
            }
            Reference::External { .. } => {
                return Err(SearchError::unsupported(format!(
                    "parameter \"{}\": external references cannot match contained resources",
                    param.info.name
                )));
            }
            Reference::ReverseChained { .. } => {
                return Err(SearchError::internal(format!(
                    "parameter \"{}\": reverse-chained references must be compiled in pipeline mode",
                    param.info.name
                )));
            }
        };
        build_bson(&path.path, Bson::Document(criteria))
    }
}
