//! Search provider trait.
//!
//! The REST layer talks to the search subsystem through
//! [`SearchProvider`]; the MongoDB implementation is
//! [`MongoSearcher`](crate::backends::mongodb::MongoSearcher).

use async_trait::async_trait;
use bson::Document;

use crate::error::SearchResult;
use crate::types::Query;

/// The outcome of a search: matching documents plus the total.
#[derive(Debug, Clone, Default)]
pub struct SearchSet {
    /// The matching resource documents, in result order. Pipeline searches
    /// carry joined `_included…`/`_revIncluded…`/`_lookup…` fields alongside
    /// the resource content.
    pub resources: Vec<Document>,

    /// Total number of matches across all pages. Zero when total counting
    /// is disabled.
    pub total: u32,
}

impl SearchSet {
    /// A result set holding only a total, for `_summary=count` searches.
    pub fn count_only(total: u32) -> Self {
        Self {
            resources: Vec::new(),
            total,
        }
    }
}

/// Executes parsed FHIR search queries.
#[async_trait]
pub trait SearchProvider {
    /// Runs the query and returns the matching resources and the total.
    ///
    /// # Errors
    ///
    /// * [`SearchError::Unsupported`](crate::error::SearchError::Unsupported) -
    ///   the query uses an unimplemented feature
    /// * [`SearchError::Invalid`](crate::error::SearchError::Invalid) -
    ///   a parameter's content is invalid
    /// * [`SearchError::Database`](crate::error::SearchError::Database) -
    ///   a driver operation failed
    async fn search(&self, query: &Query) -> SearchResult<SearchSet>;
}
