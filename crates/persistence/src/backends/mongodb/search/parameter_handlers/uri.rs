//! URI parameter predicate builder.

use bson::{Bson, Document};

use crate::error::SearchResult;
use crate::types::UriParam;

use super::super::bson_builder::{build_bson, or_paths};

/// Builds literal-equality predicates for URI parameters.
pub struct UriHandler;

impl UriHandler {
    /// Builds the predicate document for a URI parameter. URIs are
    /// matched exactly and case-sensitively.
    pub fn build(param: &UriParam) -> SearchResult<Document> {
        or_paths(
            |path| build_bson(&path.path, Bson::String(param.uri.clone())),
            &param.info.paths,
        )
    }
}
