//! Core types for the parsed search query model.
//!
//! The URL parser (upstream of this crate) produces a [`Query`] value; the
//! compiler consumes it without re-parsing any text. Parameter metadata
//! ([`SearchParamInfo`]) comes from the server's search-parameter
//! dictionary and is shared across requests: the compiler clones before
//! rewriting, never mutates in place.

mod dates;
mod numbers;
mod search_params;

pub use dates::{DatePrecision, FhirDateTime};
pub use numbers::FhirNumber;
pub use search_params::{
    CompositeParam, DateParam, IncludeOption, NumberParam, OrParam, Prefix, QuantityParam, Query,
    QueryOptions, Reference, ReferenceParam, SearchParam, SearchParamInfo, SearchParamPath,
    SortOption, StringParam, SummaryMode, TokenParam, UriParam,
};
