//! Predicate projection onto field paths.
//!
//! Predicate builders produce path-agnostic criteria; [`build_bson`]
//! projects a criteria value onto a concrete search path, taking care of
//! array segments (element-match composition) and query operators
//! (`$or` rebuilt under the projected path). [`or_paths`] lifts a
//! multi-path parameter into a disjunction, and [`merge`] folds
//! per-parameter predicates into one conjunctive document without ever
//! silently overwriting a contested key.

use std::sync::LazyLock;

use bson::{doc, Bson, Document};
use regex::Regex;

use crate::error::{SearchError, SearchResult};
use crate::types::SearchParamPath;

use super::path::{indexed_path, mongo_field_path};

/// Splits an indexed path at its last `[]` marker: the left capture is the
/// array container, the right capture the trailing subfield (possibly
/// empty).
static ARRAY_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*\[\][^.]*)\.?([^\[\]]*)").expect("array split pattern"));

/// Projects `criteria` onto the field path derived from `path`.
///
/// - Scalar criteria bind the normalised field path directly.
/// - Compound criteria over a path with an array marker are wrapped in an
///   `$elemMatch` on the array container, with the trailing subfield
///   composed inside and `$or` branches rebuilt under it.
/// - Compound criteria over a plain path bind `path.key` per entry, with
///   query operators routed through the operator merger.
pub fn build_bson(path: &str, criteria: Bson) -> SearchResult<Document> {
    let mut result = Document::new();
    let indexed = indexed_path(path);
    let normalized = mongo_field_path(path);

    match criteria {
        Bson::Document(compound) => {
            let split = ARRAY_SPLIT.captures(&indexed);
            if let Some(caps) = split.filter(|_| compound.len() > 1) {
                // An array in the path plus composite criteria needs an
                // $elemMatch so all parts test the same array element.
                let container = caps[1].replace("[]", "");
                let subfield = &caps[2];
                let mut element = Document::new();
                if subfield.is_empty() {
                    element = compound;
                } else {
                    for (key, value) in compound {
                        if is_query_operator(&key) {
                            process_query_operator_criteria(subfield, &key, value, &mut element)?;
                        } else {
                            element.insert(format!("{subfield}.{key}"), value);
                        }
                    }
                }
                result.insert(container, doc! { "$elemMatch": element });
            } else {
                for (key, value) in compound {
                    if is_query_operator(&key) {
                        process_query_operator_criteria(&normalized, &key, value, &mut result)?;
                    } else {
                        result.insert(format!("{normalized}.{key}"), value);
                    }
                }
            }
        }
        scalar => {
            result.insert(normalized, scalar);
        }
    }
    Ok(result)
}

fn is_query_operator(key: &str) -> bool {
    key.starts_with('$')
}

/// Routes a `$`-operator entry into `result`, keeping `$or` at the top
/// level with its branches rebuilt under `path` and accumulating other
/// operators under the path key.
fn process_query_operator_criteria(
    path: &str,
    key: &str,
    value: Bson,
    result: &mut Document,
) -> SearchResult<()> {
    if key == "$or" {
        return process_or_criteria(path, value, result);
    }
    match result.get_mut(path) {
        Some(Bson::Document(existing)) => {
            existing.insert(key, value);
        }
        _ => {
            result.insert(path, doc! { key: value });
        }
    }
    Ok(())
}

fn process_or_criteria(path: &str, value: Bson, result: &mut Document) -> SearchResult<()> {
    let Bson::Array(branches) = value else {
        return Err(SearchError::internal(
            "disjunction criteria is not an array of documents",
        ));
    };
    let mut rebuilt = Vec::with_capacity(branches.len());
    for branch in branches {
        let Bson::Document(branch) = branch else {
            return Err(SearchError::internal(
                "disjunction criteria is not an array of documents",
            ));
        };
        rebuilt.push(Bson::Document(build_bson(path, Bson::Document(branch))?));
    }
    result.insert("$or", rebuilt);
    Ok(())
}

/// Builds a predicate for each path and combines the results as a
/// disjunction. A predicate that is itself a top-level `$or` has its
/// branches flattened into the outer disjunction. With a single path the
/// predicate is returned unwrapped.
pub fn or_paths<F>(mut single: F, paths: &[SearchParamPath]) -> SearchResult<Document>
where
    F: FnMut(&SearchParamPath) -> SearchResult<Document>,
{
    let mut branches: Vec<Bson> = Vec::with_capacity(paths.len());
    for path in paths {
        let predicate = single(path)?;
        let nested = if predicate.len() == 1 {
            predicate.get("$or").and_then(Bson::as_array).cloned()
        } else {
            None
        };
        match nested {
            Some(inner) => branches.extend(inner),
            None => branches.push(Bson::Document(predicate)),
        }
    }

    if let [Bson::Document(single)] = branches.as_mut_slice() {
        return Ok(std::mem::take(single));
    }
    Ok(doc! { "$or": branches })
}

/// Merges a per-parameter predicate into the accumulated query document.
///
/// A key already present in the accumulator is never overwritten: the
/// incoming entry is promoted into an explicit `$and` conjunction, as are
/// any `$and` branches the incoming document carries.
pub fn merge(into: &mut Document, from: Document) {
    let mut conjuncts: Vec<Bson> = match into.remove("$and") {
        Some(Bson::Array(existing)) => existing,
        _ => Vec::new(),
    };

    for (key, value) in from {
        if key == "$and" {
            if let Bson::Array(branches) = value {
                conjuncts.extend(branches);
            }
        } else if into.contains_key(&key) {
            conjuncts.push(Bson::Document(doc! { key: value }));
        } else {
            into.insert(key, value);
        }
    }

    if !conjuncts.is_empty() {
        into.insert("$and", conjuncts);
    }
}
