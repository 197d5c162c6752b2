//! Options translation.
//!
//! `_sort`, `_offset` and `_count` become driver find options in simple
//! query mode, or trailing `$sort`/`$skip`/`$limit` stages in aggregation
//! mode. `_include` and `_revinclude` become `$lookup` stages joining the
//! referenced (or referring) collections into named result fields.

use std::sync::LazyLock;

use bson::{doc, Document};
use mongodb::options::FindOptions;
use regex::Regex;
use tracing::warn;

use crate::types::{QueryOptions, SortOption};

use super::naming::{pluralize_lower_resource_name, title_case};
use super::path::mongo_field_path;

static NUMERIC_INDEXER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("numeric indexer pattern"));

/// Translates options into driver find options (simple query mode).
pub fn find_options(options: &QueryOptions) -> FindOptions {
    let mut find = FindOptions::default();

    let sort = sort_document(&remove_parallel_array_sorts(&options.sort));
    if !sort.is_empty() {
        find.sort = Some(sort);
    }
    if options.offset > 0 {
        find.skip = Some(u64::from(options.offset));
    }
    find.limit = Some(i64::from(options.count));
    find
}

/// Translates options into trailing pipeline stages (aggregation mode):
/// `$sort`, `$skip`, `$limit`, then the include and reverse-include
/// `$lookup` joins.
pub fn pipeline_stages(resource: &str, options: &QueryOptions) -> Vec<Document> {
    let mut stages = Vec::new();

    let sort = sort_document(&remove_parallel_array_sorts(&options.sort));
    if !sort.is_empty() {
        stages.push(doc! { "$sort": sort });
    }
    if options.offset > 0 {
        stages.push(doc! { "$skip": i64::from(options.offset) });
    }
    stages.push(doc! { "$limit": i64::from(options.count) });

    append_include_stages(&mut stages, options);
    append_rev_include_stages(&mut stages, resource, options);
    stages
}

fn sort_document(sort: &[SortOption]) -> Document {
    let mut fields = Document::new();
    for option in sort {
        // With multiple paths only the first is sortable; anything more
        // would need per-path merging the driver cannot express.
        let Some(path) = option.parameter.paths.first() else {
            warn!(
                parameter = %option.parameter.name,
                "ignoring sort on parameter without a search path"
            );
            continue;
        };
        let direction = if option.descending { -1 } else { 1 };
        fields.insert(mongo_field_path(&path.path), direction);
    }
    fields
}

/// Drops sort keys whose path shares a parallel-array prefix with an
/// earlier key. The server cannot sort across parallel arrays; keeping
/// such a key would fail the whole query.
fn remove_parallel_array_sorts(sort: &[SortOption]) -> Vec<SortOption> {
    let mut kept: Vec<SortOption> = Vec::with_capacity(sort.len());
    for option in sort {
        let path = option.parameter.paths.first().map(|p| p.path.as_str());
        let conflicting = kept.iter().find(|earlier| {
            match (path, earlier.parameter.paths.first()) {
                (Some(path), Some(earlier_path)) => {
                    is_parallel_array_path(path, &earlier_path.path)
                }
                _ => false,
            }
        });
        match conflicting {
            Some(earlier) => {
                warn!(
                    parameter = %option.parameter.name,
                    conflicts_with = %earlier.parameter.name,
                    "dropping sub-sort: paths lie in parallel arrays"
                );
            }
            None => kept.push(option.clone()),
        }
    }
    kept
}

/// True if the two paths diverge after passing through a shared array
/// marker, i.e. they address parallel arrays.
fn is_parallel_array_path(path1: &str, path2: &str) -> bool {
    if !path1.contains('[') || !path2.contains('[') {
        return false;
    }

    // Numeric indexers address one element, not the whole array; compare
    // with them generalised away.
    let path1 = NUMERIC_INDEXER.replace_all(path1, "[]");
    let path2 = NUMERIC_INDEXER.replace_all(path2, "[]");

    let bytes1 = path1.as_bytes();
    let bytes2 = path2.as_bytes();
    for i in 0..bytes1.len().min(bytes2.len()) {
        if bytes1[i] != bytes2[i] {
            return path1[..i].contains('[');
        }
    }
    false
}

/// `$lookup` stages for `_include`: one join per reference path and
/// target resource type, skipping the `"Any"` wildcard.
fn append_include_stages(stages: &mut Vec<Document>, options: &QueryOptions) {
    for include in &options.include {
        let parameter = &include.parameter;
        let multi_path = parameter.paths.len() > 1;
        for (path_index, path) in parameter.paths.iter().enumerate() {
            if path.fhir_type != "Reference" {
                continue;
            }
            let local_field = format!("{}.reference__id", mongo_field_path(&path.path));
            for target in &parameter.targets {
                if target == "Any" {
                    continue;
                }
                let mut result_field = format!(
                    "_included{target}ResourcesReferencedBy{}",
                    title_case(&parameter.name)
                );
                if multi_path {
                    result_field.push_str(&format!("Path{}", path_index + 1));
                }
                stages.push(doc! {
                    "$lookup": {
                        "from": pluralize_lower_resource_name(target),
                        "localField": local_field.as_str(),
                        "foreignField": "_id",
                        "as": result_field,
                    },
                });
            }
        }
    }
}

/// `$lookup` stages for `_revinclude`: one join per reference path of the
/// referring parameter, kept only when its targets cover the searched
/// resource type.
fn append_rev_include_stages(stages: &mut Vec<Document>, resource: &str, options: &QueryOptions) {
    for include in &options.rev_include {
        let parameter = &include.parameter;
        let targets_search_resource = parameter
            .targets
            .iter()
            .any(|target| target == resource || target == "Any");
        if !targets_search_resource {
            continue;
        }

        let from = pluralize_lower_resource_name(&parameter.resource);
        let multi_path = parameter.paths.len() > 1;
        for (path_index, path) in parameter.paths.iter().enumerate() {
            if path.fhir_type != "Reference" {
                continue;
            }
            let foreign_field = format!("{}.reference__id", mongo_field_path(&path.path));
            let mut result_field = format!(
                "_revIncluded{}ResourcesReferencing{}",
                parameter.resource,
                title_case(&parameter.name)
            );
            if multi_path {
                result_field.push_str(&format!("Path{}", path_index + 1));
            }
            stages.push(doc! {
                "$lookup": {
                    "from": from.as_str(),
                    "localField": "_id",
                    "foreignField": foreign_field,
                    "as": result_field,
                },
            });
        }
    }
}
