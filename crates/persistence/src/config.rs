//! Search configuration.

use serde::{Deserialize, Serialize};

/// Configuration flags for the search subsystem.
///
/// These are operator-level knobs; connection settings belong to the driver
/// and are passed separately when constructing a
/// [`MongoSearcher`](crate::backends::mongodb::MongoSearcher).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
    /// Compute and return the total result count for each search.
    pub count_total_results: bool,

    /// Match string-like values case-insensitively.
    pub enable_ci_searches: bool,

    /// Force case-sensitive matching for token parameters even when
    /// case-insensitive searches are enabled. R4 leans towards
    /// case-sensitive tokens, whereas STU3 text suggests case-insensitive.
    pub token_parameters_case_sensitive: bool,

    /// The server is deployed read-only. Required for the count cache:
    /// cached totals are only valid while the data cannot change.
    pub readonly: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            count_total_results: true,
            enable_ci_searches: true,
            token_parameters_case_sensitive: false,
            readonly: false,
        }
    }
}

impl SearchConfig {
    /// Returns true if cached totals may be read and written.
    pub fn count_cache_enabled(&self) -> bool {
        self.readonly && self.count_total_results
    }
}
