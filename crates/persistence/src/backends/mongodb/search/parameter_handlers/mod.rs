//! Predicate builders, one per search parameter kind.
//!
//! Each handler turns a typed parameter into a predicate document scoped
//! to a single path; multi-path parameters are lifted into a disjunction
//! by [`or_paths`](super::bson_builder::or_paths).

pub mod date;
pub mod number;
pub mod quantity;
pub mod reference;
pub mod string;
pub mod token;
pub mod uri;

pub use date::DateHandler;
pub use number::NumberHandler;
pub use quantity::QuantityHandler;
pub use reference::ReferenceHandler;
pub use string::StringHandler;
pub use token::TokenHandler;
pub use uri::UriHandler;

use bson::Bson;
use regex::escape;

use crate::config::SearchConfig;

/// Case-sensitivity context threaded through the string-like handlers.
///
/// Case-insensitive matches are represented as anchored regular
/// expressions with escaped metacharacters and the `i` option; with the
/// flags off, plain string equality is emitted instead.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// The active search configuration.
    pub config: &'a SearchConfig,
}

impl MatchContext<'_> {
    /// Case-insensitive whole-value match.
    pub fn ci(&self, value: &str) -> Bson {
        if self.config.enable_ci_searches {
            anchored_regex(value, true)
        } else {
            Bson::String(value.to_string())
        }
    }

    /// Case-insensitive whole-value match for token parameters, which can
    /// be forced case-sensitive independently.
    pub fn ci_token(&self, value: &str) -> Bson {
        if self.config.enable_ci_searches && !self.config.token_parameters_case_sensitive {
            anchored_regex(value, true)
        } else {
            Bson::String(value.to_string())
        }
    }

    /// Case-insensitive starts-with match.
    pub fn ci_starts_with(&self, value: &str) -> Bson {
        if self.config.enable_ci_searches {
            anchored_regex(value, false)
        } else {
            Bson::String(value.to_string())
        }
    }
}

fn anchored_regex(value: &str, both_ends: bool) -> Bson {
    let pattern = if both_ends {
        format!("^{}$", escape(value))
    } else {
        format!("^{}", escape(value))
    };
    Bson::RegularExpression(bson::Regex {
        pattern,
        options: "i".to_string(),
    })
}
