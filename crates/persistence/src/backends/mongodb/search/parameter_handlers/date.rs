//! Date parameter predicate builder.
//!
//! Date predicates compare precision windows, not instants. Stored
//! date/dateTime values are denormalised to `__from`/`__to` window bounds;
//! Periods expose `start.__from`/`end.__to`; instants are stored as plain
//! timestamps; Timing carries an `event` array of dates.

use bson::{doc, Bson, DateTime, Document};

use crate::error::{SearchError, SearchResult};
use crate::types::{DateParam, Prefix};

use super::super::bson_builder::{build_bson, or_paths};

/// Builds date predicates, dispatching on the FHIR datatype at each path.
pub struct DateHandler;

impl DateHandler {
    /// Builds the predicate document for a date parameter.
    pub fn build(param: &DateParam) -> SearchResult<Document> {
        or_paths(
            |path| match path.fhir_type.as_str() {
                "date" | "dateTime" => {
                    build_bson(&path.path, Bson::Document(Self::ranged(param)?))
                }
                "instant" => build_bson(&path.path, Bson::Document(Self::instant(param)?)),
                "Period" => build_bson(&path.path, Bson::Document(Self::period(param)?)),
                "Timing" => build_bson(
                    &format!("{}.event", path.path),
                    Bson::Document(Self::ranged(param)?),
                ),
                _ => Ok(Document::new()),
            },
            &param.info.paths,
        )
    }

    /// Criteria over denormalised `__from`/`__to` window bounds
    /// (date, dateTime, and Timing events).
    fn ranged(param: &DateParam) -> SearchResult<Document> {
        let low = DateTime::from_chrono(param.date.range_low_incl());
        let high = DateTime::from_chrono(param.date.range_high_excl());

        let criteria = match param.info.effective_prefix() {
            // The range of the search value fully contains the range of
            // the target value.
            Prefix::Eq => doc! {
                "__from": { "$gte": low },
                "__to": { "$lte": high },
            },
            // The range above the search value overlaps the target range.
            Prefix::Gt => doc! {
                "__to": { "$gt": high },
            },
            // The range below the search value overlaps the target range.
            Prefix::Lt => doc! {
                "__from": { "$lt": low },
            },
            Prefix::Ge => doc! {
                "$or": [
                    { "__to": { "$gte": high } },
                    { "__from": { "$gte": low } },
                ],
            },
            Prefix::Le => doc! {
                "$or": [
                    { "__from": { "$lte": low } },
                    { "__to": { "$lte": high } },
                ],
            },
            // Target lies entirely above the search range.
            Prefix::Sa => doc! {
                "__from": { "$gt": high },
            },
            // Target lies entirely below the search range.
            Prefix::Eb => doc! {
                "__to": { "$lt": low },
            },
            Prefix::Ne => return Err(unsupported_prefix(param)),
        };
        Ok(criteria)
    }

    /// Criteria over a single stored timestamp.
    fn instant(param: &DateParam) -> SearchResult<Document> {
        let low = DateTime::from_chrono(param.date.range_low_incl());
        let high = DateTime::from_chrono(param.date.range_high_excl());

        let criteria = match param.info.effective_prefix() {
            Prefix::Eq => doc! { "$gte": low, "$lt": high },
            Prefix::Gt => doc! { "$gt": low },
            Prefix::Ge => doc! { "$gte": low },
            Prefix::Sa => doc! { "$gt": high },
            Prefix::Lt | Prefix::Eb => doc! { "$lt": low },
            Prefix::Le => doc! { "$lt": high },
            Prefix::Ne => return Err(unsupported_prefix(param)),
        };
        Ok(criteria)
    }

    /// Criteria over a Period's `start.__from`/`end.__to` bounds. The
    /// ordering prefixes also admit open-ended periods: a missing `end`
    /// means "ongoing", a missing `start` means "unbounded below".
    fn period(param: &DateParam) -> SearchResult<Document> {
        let low = DateTime::from_chrono(param.date.range_low_incl());
        let high = DateTime::from_chrono(param.date.range_high_excl());

        let criteria = match param.info.effective_prefix() {
            Prefix::Eq => doc! {
                "start.__from": { "$gte": low },
                "end.__to": { "$lte": high },
            },
            Prefix::Gt => doc! {
                "$or": [
                    { "end.__to": { "$gt": high } },
                    Self::ongoing(),
                ],
            },
            Prefix::Lt => doc! {
                "$or": [
                    { "start.__from": { "$lt": low } },
                    Self::unbounded_start(),
                ],
            },
            Prefix::Ge => doc! {
                "$or": [
                    { "end.__to": { "$gte": high } },
                    { "start.__from": { "$gte": low } },
                    Self::ongoing(),
                ],
            },
            Prefix::Le => doc! {
                "$or": [
                    { "start.__from": { "$lte": low } },
                    { "end.__to": { "$lte": high } },
                    Self::unbounded_start(),
                ],
            },
            Prefix::Sa => doc! {
                "start.__from": { "$gt": high },
            },
            Prefix::Eb => doc! {
                "end.__to": { "$lt": low },
            },
            Prefix::Ne => return Err(unsupported_prefix(param)),
        };
        Ok(criteria)
    }

    /// A period with a start but no end.
    fn ongoing() -> Document {
        doc! { "start.__from": { "$exists": true }, "end": Bson::Null }
    }

    /// A period with an end but no start.
    fn unbounded_start() -> Document {
        doc! { "end.__to": { "$exists": true }, "start": Bson::Null }
    }
}

fn unsupported_prefix(param: &DateParam) -> SearchError {
    SearchError::unsupported(format!(
        "parameter \"{}\": prefix {} is not supported for dates",
        param.info.name,
        param.info.effective_prefix()
    ))
}
