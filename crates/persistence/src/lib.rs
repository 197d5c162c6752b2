//! Ambra FHIR Server Persistence Layer
//!
//! This crate compiles parsed FHIR search queries into MongoDB queries and
//! executes them. It covers the full search grammar the REST layer hands
//! down: all parameter types with their prefixes and multi-value OR
//! semantics, result modifiers (`_sort`, `_count`, `_offset`, `_summary`),
//! `_include`/`_revinclude` joins, and chained / reverse-chained (`_has`)
//! traversals across collections.
//!
//! # Architecture
//!
//! - [`types`] - The parsed query model: [`types::Query`], the
//!   [`types::SearchParam`] variants, and the shared parameter metadata
//!   ([`types::SearchParamInfo`]) the compiler consults but never mutates.
//! - [`error`] - The search error taxonomy with HTTP status and
//!   operation-outcome mapping.
//! - [`core`] - The [`core::SearchProvider`] trait the REST layer consumes.
//! - [`backends`] - The MongoDB backend: query/pipeline compilation and the
//!   [`backends::mongodb::MongoSearcher`] executor.
//!
//! Simple queries compile to a single conjunctive filter document and run
//! through `find`; queries with includes or chains compile to an
//! aggregation pipeline built from `$match` and `$lookup` stages.
//!
//! # Quick Start
//!
//! ```no_run
//! use ambra_persistence::backends::mongodb::MongoSearcher;
//! use ambra_persistence::config::SearchConfig;
//! use ambra_persistence::types::Query;
//!
//! # async fn run(query: Query) -> Result<(), Box<dyn std::error::Error>> {
//! let searcher = MongoSearcher::connect(
//!     "mongodb://localhost:27017",
//!     "fhir",
//!     SearchConfig::default(),
//! )
//! .await?;
//!
//! let set = searcher.search(&query).await?;
//! println!("{} of {} results", set.resources.len(), set.total);
//!
//! searcher.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use crate::config::SearchConfig;
pub use crate::core::{SearchProvider, SearchSet};
pub use crate::error::{SearchError, SearchResult};
pub use crate::types::{Query, QueryOptions, SearchParam};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
