//! Count cache for read-only deployments.
//!
//! Counting totals is the expensive half of a search, and on a read-only
//! server a total can never go stale. Totals are memoized in a dedicated
//! `countcache` collection keyed by a fingerprint of the raw query string.
//! Lookups and inserts are best-effort: a cache failure only costs a
//! recount.

use bson::doc;
use md5::{Digest, Md5};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The collection holding cached totals.
pub const COUNT_CACHE_COLLECTION: &str = "countcache";

/// One cached total, keyed by the query fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountCacheEntry {
    /// The query fingerprint.
    #[serde(rename = "_id")]
    pub id: String,
    /// The cached total.
    pub count: u32,
}

/// The stable fingerprint of a search: the hex MD5 of
/// `resource + "?" + rawQueryString`.
pub fn query_fingerprint(resource: &str, raw_query: &str) -> String {
    let digest = Md5::digest(format!("{resource}?{raw_query}").as_bytes());
    format!("{digest:x}")
}

/// Handle on the count cache collection.
#[derive(Debug, Clone)]
pub struct CountCache {
    collection: Collection<CountCacheEntry>,
}

impl CountCache {
    /// Opens the cache in the given database.
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(COUNT_CACHE_COLLECTION),
        }
    }

    /// Looks up a cached total. Lookup failures are treated as misses.
    pub async fn get(&self, fingerprint: &str) -> Option<u32> {
        match self
            .collection
            .find_one(doc! { "_id": fingerprint })
            .await
        {
            Ok(Some(entry)) => Some(entry.count),
            Ok(None) => None,
            Err(error) => {
                debug!(%error, fingerprint, "count cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Inserts a computed total, ignoring errors. Concurrent searches may
    /// race on the same fingerprint; the value is a pure function of the
    /// key under the read-only invariant, so a duplicate-key rejection
    /// loses nothing.
    pub async fn put(&self, fingerprint: &str, count: u32) {
        let entry = CountCacheEntry {
            id: fingerprint.to_string(),
            count,
        };
        if let Err(error) = self.collection.insert_one(entry).await {
            debug!(%error, fingerprint, "count cache insert failed, ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_hex_md5() {
        let a = query_fingerprint("Patient", "gender=male");
        let b = query_fingerprint("Patient", "gender=male");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_separates_resource_and_query() {
        assert_ne!(
            query_fingerprint("Patient", "gender=male"),
            query_fingerprint("Practitioner", "gender=male")
        );
        assert_ne!(
            query_fingerprint("Patient", "gender=male"),
            query_fingerprint("Patient", "gender=female")
        );
    }
}
