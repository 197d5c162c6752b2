//! Token parameter predicate builder.
//!
//! Token matching is governed by the `(system, code, any_system)` triple:
//!
//! - `system|` matches the system only
//! - `code` (any system) matches the code only
//! - `|code` matches the code with no system present
//! - `system|code` matches both
//!
//! and the target type decides where system and code land in the stored
//! document.

use bson::{doc, Bson, Document};

use crate::error::{SearchError, SearchResult};
use crate::types::TokenParam;

use super::super::bson_builder::{build_bson, or_paths};
use super::MatchContext;

/// Builds predicates for token parameters, dispatching on the FHIR
/// datatype at each path.
pub struct TokenHandler;

impl TokenHandler {
    /// Builds the predicate document for a token parameter.
    pub fn build(param: &TokenParam, ctx: MatchContext<'_>) -> SearchResult<Document> {
        let mut system_criteria: Option<Bson> = None;
        let mut code_criteria: Option<Bson> = None;

        match (&param.code, &param.system) {
            (None, Some(system)) => {
                system_criteria = Some(ctx.ci_token(system));
            }
            (Some(code), None) => {
                code_criteria = Some(ctx.ci_token(code));
                if !param.any_system {
                    system_criteria = Some(Bson::Document(doc! { "$exists": false }));
                }
            }
            (Some(code), Some(system)) => {
                code_criteria = Some(ctx.ci_token(code));
                system_criteria = Some(ctx.ci_token(system));
            }
            (None, None) => {
                return Err(SearchError::invalid(format!(
                    "parameter \"{}\" has neither system nor code",
                    param.info.name
                )));
            }
        }

        or_paths(
            |path| {
                let mut criteria = Document::new();
                match path.fhir_type.as_str() {
                    "Coding" => {
                        if let Some(system) = &system_criteria {
                            criteria.insert("system", system.clone());
                        }
                        if let Some(code) = &code_criteria {
                            criteria.insert("code", code.clone());
                        }
                    }
                    "CodeableConcept" => match (&system_criteria, &code_criteria) {
                        (Some(system), Some(code)) => {
                            // Both parts must match the same coding entry.
                            criteria.insert(
                                "coding",
                                doc! { "$elemMatch": { "system": system.clone(), "code": code.clone() } },
                            );
                        }
                        (system, code) => {
                            if let Some(system) = system {
                                criteria.insert("coding.system", system.clone());
                            }
                            if let Some(code) = code {
                                criteria.insert("coding.code", code.clone());
                            }
                        }
                    },
                    "Identifier" => {
                        if let Some(system) = &system_criteria {
                            criteria.insert("system", system.clone());
                        }
                        if let Some(code) = &code_criteria {
                            criteria.insert("value", code.clone());
                        }
                    }
                    "ContactPoint" => {
                        criteria.insert("value", ctx.ci(param.code.as_deref().unwrap_or("")));
                        if !param.any_system {
                            criteria
                                .insert("use", ctx.ci_token(param.system.as_deref().unwrap_or("")));
                        }
                    }
                    "boolean" => {
                        return match param.code.as_deref() {
                            Some("true") => build_bson(&path.path, Bson::Boolean(true)),
                            Some("false") => build_bson(&path.path, Bson::Boolean(false)),
                            _ => Err(SearchError::invalid(format!(
                                "parameter \"{}\": \"{}\" is not a boolean",
                                param.info.name,
                                param.code.as_deref().unwrap_or("")
                            ))),
                        };
                    }
                    "string" => {
                        return build_bson(&path.path, ctx.ci(param.code.as_deref().unwrap_or("")));
                    }
                    "code" => {
                        return build_bson(
                            &path.path,
                            ctx.ci_token(param.code.as_deref().unwrap_or("")),
                        );
                    }
                    "id" => {
                        // Ids are always matched case-sensitively.
                        return build_bson(
                            &path.path,
                            Bson::String(param.code.clone().unwrap_or_default()),
                        );
                    }
                    _ => {}
                }
                build_bson(&path.path, Bson::Document(criteria))
            },
            &param.info.paths,
        )
    }
}
