//! Search path normalisation.
//!
//! Dictionary element paths carry two kinds of bracket markers: empty `[]`
//! for collection elements and numeric `[N]` for indexed elements, e.g.
//! `"[]name.family"` or `"[0]entry.resource"`. Mongo field paths use dot
//! notation with numeric segments, so the markers are rewritten:
//!
//! - [`mongo_field_path`] produces a plain field path for direct key
//!   reference
//! - [`indexed_path`] rewrites only the numeric indexers, keeping the `[]`
//!   markers for array-structure inspection
//!
//! Both are pure string transforms over the path grammar.

use std::sync::LazyLock;

use regex::Regex;

static BRACKET_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]([^.]+)").expect("bracket index pattern"));

/// Rewrites a search path to a Mongo field path, so
/// `"[]element.[0]target.[]product.element"` becomes
/// `"element.target.0.product.element"`.
pub fn mongo_field_path(path: &str) -> String {
    indexed_path(path).replace("[]", "")
}

/// Rewrites only the numeric indexers, so
/// `"[]element.[0]target.[]product.element"` becomes
/// `"[]element.target.0.[]product.element"`.
pub fn indexed_path(path: &str) -> String {
    BRACKET_INDEX.replace_all(path, "$2.$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_markers_are_dropped() {
        assert_eq!(mongo_field_path("[]name.family"), "name.family");
        assert_eq!(
            mongo_field_path("[]element.[]target.[]product.element"),
            "element.target.product.element"
        );
    }

    #[test]
    fn test_numeric_indexers_become_dot_segments() {
        assert_eq!(mongo_field_path("[0]entry.resource"), "entry.0.resource");
        assert_eq!(
            mongo_field_path("[]element.[0]target.[]product.element"),
            "element.target.0.product.element"
        );
    }

    #[test]
    fn test_indexed_path_keeps_collection_markers() {
        assert_eq!(indexed_path("[]name.family"), "[]name.family");
        assert_eq!(
            indexed_path("[]element.[0]target.[]product.element"),
            "[]element.target.0.[]product.element"
        );
    }

    #[test]
    fn test_plain_paths_pass_through() {
        assert_eq!(mongo_field_path("birthDate"), "birthDate");
        assert_eq!(indexed_path("birthDate"), "birthDate");
    }

    #[test]
    fn test_normalisation_is_idempotent() {
        for path in [
            "[]name.family",
            "[0]entry.resource",
            "[]element.[0]target.[]product.element",
            "birthDate",
        ] {
            let once = mongo_field_path(path);
            assert_eq!(mongo_field_path(&once), once);
        }
    }
}
