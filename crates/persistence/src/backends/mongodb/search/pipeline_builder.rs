//! Pipeline assembler.
//!
//! Queries with chained or reverse-chained parameters (or include
//! options) compile to an aggregation pipeline: a `$match` over the
//! standard parameters, then per chained parameter one `$lookup` per
//! reference path followed by a `$match` over the joined documents.
//!
//! The `$match` sub-parameters have their paths prefixed with the
//! `_lookupN.` join fields. Parameter metadata is always cloned before
//! rewriting; the shared search-parameter dictionary stays immutable.

use bson::{doc, Document};

use crate::error::{SearchError, SearchResult};
use crate::types::{OrParam, Query, Reference, ReferenceParam, SearchParam, SearchParamInfo};

use super::naming::pluralize_lower_resource_name;
use super::path::mongo_field_path;
use super::query_builder::QueryCompiler;

impl QueryCompiler<'_> {
    /// Builds the aggregation pipeline for a query using chained
    /// parameters, reverse-chained parameters, or includes.
    ///
    /// The first stage is always a `$match` over the standard parameters,
    /// even when empty. Include joins are appended later by the options
    /// translator.
    pub(crate) fn create_pipeline(&self, query: &Query) -> SearchResult<Vec<Document>> {
        let mut standard: Vec<&SearchParam> = Vec::new();
        let mut chained: Vec<&SearchParam> = Vec::new();
        let mut reverse_chained: Vec<&SearchParam> = Vec::new();

        for param in &query.params {
            if param.uses_chained_search() {
                chained.push(param);
            } else if param.uses_reverse_chained_search() {
                reverse_chained.push(param);
            } else {
                standard.push(param);
            }
        }

        let standard: Vec<SearchParam> = standard.into_iter().cloned().collect();
        let mut pipeline = vec![doc! { "$match": self.create_query_from_params(&standard)? }];

        for param in chained {
            pipeline.extend(self.chained_search_stages(param)?);
        }
        for param in reverse_chained {
            pipeline.extend(self.reverse_chained_search_stages(param)?);
        }

        Ok(pipeline)
    }

    /// Stages for one chained parameter: a `$lookup` into the referenced
    /// resource's collection per reference path, then a `$match` over the
    /// joined documents.
    fn chained_search_stages(&self, param: &SearchParam) -> SearchResult<Vec<Document>> {
        let (lookup_ref, or_param) = lookup_reference(param)?;
        let Reference::Chained {
            resource_type,
            query,
        } = &lookup_ref.reference
        else {
            return Err(SearchError::internal(
                "chained search stage built from a non-chained reference",
            ));
        };

        let mut stages = self.lookup_stages(lookup_ref, |path| {
            (
                format!("{}.reference__id", mongo_field_path(path)),
                "_id".to_string(),
            )
        }, resource_type);

        let matchable = match or_param {
            Some(or) => {
                let searchable = searchable_or_from_chained(or)?;
                prepend_lookup_key(
                    &[SearchParam::Or(searchable)],
                    lookup_ref.info.paths.len(),
                )
            }
            None => prepend_lookup_key(&query.params, lookup_ref.info.paths.len()),
        };

        stages.push(doc! { "$match": self.create_query_from_params(&matchable)? });
        Ok(stages)
    }

    /// Stages for one reverse-chained (`_has`) parameter: symmetric to the
    /// chained case with the join direction reversed.
    fn reverse_chained_search_stages(&self, param: &SearchParam) -> SearchResult<Vec<Document>> {
        let (lookup_ref, or_param) = lookup_reference(param)?;
        let Reference::ReverseChained {
            resource_type,
            query,
        } = &lookup_ref.reference
        else {
            return Err(SearchError::internal(
                "reverse-chained search stage built from a non-reverse-chained reference",
            ));
        };

        let mut stages = self.lookup_stages(lookup_ref, |path| {
            (
                "_id".to_string(),
                format!("{}.reference__id", mongo_field_path(path)),
            )
        }, resource_type);

        let matchable = match or_param {
            Some(or) => {
                let searchable = searchable_or_from_chained(or)?;
                prepend_lookup_key(
                    &[SearchParam::Or(searchable)],
                    lookup_ref.info.paths.len(),
                )
            }
            None => prepend_lookup_key(&query.params, lookup_ref.info.paths.len()),
        };

        stages.push(doc! { "$match": self.create_query_from_params(&matchable)? });
        Ok(stages)
    }

    /// One `$lookup` stage per reference path, joined as `_lookup{i}`.
    fn lookup_stages<F>(
        &self,
        lookup_ref: &ReferenceParam,
        fields: F,
        foreign_resource: &str,
    ) -> Vec<Document>
    where
        F: Fn(&str) -> (String, String),
    {
        let collection = pluralize_lower_resource_name(foreign_resource);
        lookup_ref
            .info
            .paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let (local_field, foreign_field) = fields(&path.path);
                doc! {
                    "$lookup": {
                        "from": collection.as_str(),
                        "localField": local_field,
                        "foreignField": foreign_field,
                        "as": format!("_lookup{i}"),
                    },
                }
            })
            .collect()
    }
}

/// Extracts the reference parameter that supplies the `$lookup` stage. For
/// a disjunction of chained references any one member will do (they share
/// paths); the disjunction itself is returned alongside for `$match`
/// rebuilding.
fn lookup_reference(param: &SearchParam) -> SearchResult<(&ReferenceParam, Option<&OrParam>)> {
    match param {
        SearchParam::Reference(reference) => Ok((reference, None)),
        SearchParam::Or(or) => match or.items.first() {
            Some(SearchParam::Reference(reference)) => Ok((reference, Some(or))),
            _ => Err(SearchError::internal(
                "chained search disjunction has no reference parameter for the lookup",
            )),
        },
        _ => Err(SearchError::internal(
            "chained search stages require a reference parameter",
        )),
    }
}

/// Prefixes every search path with its `_lookup{J}.` join field, where
/// `J = pathIndex mod numReferencePaths`. Parameters are cloned wholesale,
/// so the shared dictionary entries behind them are never touched. With
/// multiple reference paths each parameter's paths are duplicated N-fold
/// so one disjunction tests all combinations.
fn prepend_lookup_key(params: &[SearchParam], num_reference_paths: usize) -> Vec<SearchParam> {
    params
        .iter()
        .cloned()
        .map(|mut param| {
            match &mut param {
                SearchParam::Or(or) => {
                    for item in &mut or.items {
                        rewrite_paths(item.info_mut(), num_reference_paths);
                    }
                }
                other => rewrite_paths(other.info_mut(), num_reference_paths),
            }
            param
        })
        .collect()
}

fn rewrite_paths(info: &mut SearchParamInfo, num_reference_paths: usize) {
    if num_reference_paths > 1 {
        duplicate_paths(info, num_reference_paths);
    }
    for (i, path) in info.paths.iter_mut().enumerate() {
        path.path = format!("_lookup{}.{}", i % num_reference_paths, path.path);
    }
}

/// Duplicates each path n times in place: `[a, b]` with n = 3 becomes
/// `[a, a, a, b, b, b]`.
fn duplicate_paths(info: &mut SearchParamInfo, n: usize) {
    let mut duplicated = Vec::with_capacity(info.paths.len() * n);
    for path in &info.paths {
        for _ in 0..n {
            duplicated.push(path.clone());
        }
    }
    info.paths = duplicated;
}

/// Rebuilds a disjunction of chained references as a disjunction of their
/// sub-queries' search parameters, ready for `$match` compilation.
fn searchable_or_from_chained(or: &OrParam) -> SearchResult<OrParam> {
    let mut items = Vec::with_capacity(or.items.len());
    for item in &or.items {
        let SearchParam::Reference(reference) = item else {
            return Err(SearchError::internal(
                "chained search disjunction contains a non-reference item",
            ));
        };
        let sub_param = match &reference.reference {
            Reference::Chained { query, .. } | Reference::ReverseChained { query, .. } => {
                // A chained sub-query carries exactly one search parameter.
                query.params.first().cloned().ok_or_else(|| {
                    SearchError::internal("chained sub-query carries no search parameter")
                })?
            }
            _ => {
                return Err(SearchError::internal(
                    "chained search disjunction contains a non-chained reference",
                ));
            }
        };
        items.push(sub_param);
    }
    Ok(OrParam {
        info: or.info.clone(),
        items,
    })
}
