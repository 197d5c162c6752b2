//! MongoDB search compilation.
//!
//! This module translates the parsed search query model into MongoDB
//! queries:
//!
//! - Path normalisation from dictionary element paths to field paths
//! - One predicate builder per parameter kind
//! - A query assembler merging per-parameter predicates into one
//!   conjunctive filter document
//! - A pipeline assembler for `_include`/`_revinclude` joins and
//!   (reverse-)chained searches
//! - An options translator for `_sort`/`_offset`/`_count`
//!
//! Compilation is pure: it touches no database state and never mutates the
//! shared search-parameter dictionary.

pub mod bson_builder;
pub mod naming;
pub mod options;
pub mod parameter_handlers;
pub mod path;
pub mod pipeline_builder;
pub mod query_builder;

use std::fmt;

use bson::Document;

pub use query_builder::QueryCompiler;

/// A compiled search: either a single filter document for `find`, or an
/// aggregation pipeline. Structurally never both.
#[derive(Debug, Clone)]
pub enum CompiledQuery {
    /// A conjunctive filter document, executed with `find`.
    Filter {
        /// The resource type being searched.
        resource: String,
        /// The filter document.
        filter: Document,
    },
    /// An ordered aggregation pipeline, for queries with includes or
    /// chains.
    Pipeline {
        /// The resource type being searched.
        resource: String,
        /// The pipeline stages, starting with a `$match`.
        stages: Vec<Document>,
    },
}

impl CompiledQuery {
    /// The resource type being searched.
    pub fn resource(&self) -> &str {
        match self {
            CompiledQuery::Filter { resource, .. } => resource,
            CompiledQuery::Pipeline { resource, .. } => resource,
        }
    }

    /// True for the aggregation form.
    pub fn uses_pipeline(&self) -> bool {
        matches!(self, CompiledQuery::Pipeline { .. })
    }
}

impl fmt::Display for CompiledQuery {
    /// Renders the compiled query for diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledQuery::Filter { resource, filter } => {
                write!(f, "Resource: {resource}; Query: {filter}")
            }
            CompiledQuery::Pipeline { resource, stages } => {
                write!(f, "Resource: {resource}; Pipeline: [")?;
                for (i, stage) in stages.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{stage}")?;
                }
                write!(f, "]")
            }
        }
    }
}
