//! Search executor.
//!
//! [`MongoSearcher`] compiles a parsed query and dispatches it to the
//! driver: a plain `find` for simple queries, the aggregation framework
//! when the compilation produced a pipeline. It computes totals (directly,
//! or via the read-only count cache), honours `_summary=count`, and
//! decodes the result cursor.
//!
//! The executor holds no mutable state; concurrent searches share the
//! database handle. Cancellation is drop-based: dropping the `search`
//! future aborts the in-flight driver operation, and the count cache is
//! only written after a fully successful iteration.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::AggregateOptions;
use mongodb::{Client, Collection, Cursor, Database};
use tracing::debug;

use crate::config::SearchConfig;
use crate::core::{SearchProvider, SearchSet};
use crate::error::{SearchError, SearchResult};
use crate::types::{Query, QueryOptions, SummaryMode};

use super::count_cache::{query_fingerprint, CountCache};
use super::search::naming::pluralize_lower_resource_name;
use super::search::options::{find_options, pipeline_stages};
use super::search::{CompiledQuery, QueryCompiler};

/// Executes FHIR searches against a MongoDB database.
pub struct MongoSearcher {
    db: Database,
    client: Option<Client>,
    config: SearchConfig,
}

impl MongoSearcher {
    /// Creates a searcher over an already-connected database handle. The
    /// caller keeps ownership of the connection lifecycle.
    pub fn new(db: Database, config: SearchConfig) -> Self {
        Self {
            db,
            client: None,
            config,
        }
    }

    /// Creates a searcher with its own connection. Call
    /// [`close`](Self::close) when done.
    pub async fn connect(
        uri: &str,
        database: &str,
        config: SearchConfig,
    ) -> SearchResult<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| SearchError::from_driver(e, "connecting to MongoDB failed"))?;
        let db = client.database(database);
        Ok(Self {
            db,
            client: Some(client),
            config,
        })
    }

    /// Shuts down a connection opened by [`connect`](Self::connect). For
    /// a searcher over an injected database handle this is a no-op.
    pub async fn close(self) {
        if let Some(client) = self.client {
            client.shutdown().await;
        }
    }

    /// The underlying database handle, for custom search implementations.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The active search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs a search and returns the matching resources and the total.
    ///
    /// The sequence is: count-cache lookup (read-only deployments), then
    /// the count query unless a cached total was adopted, then the search
    /// itself, then a best-effort cache insert of a freshly computed
    /// total.
    pub async fn search(&self, query: &Query) -> SearchResult<SearchSet> {
        let cache = CountCache::new(&self.db);
        let mut do_count = true;
        let mut total: u32 = 0;
        let mut fingerprint: Option<String> = None;

        // A cached total can only be trusted when the server is read-only.
        if self.config.count_cache_enabled() {
            let hash = query_fingerprint(&query.resource, &query.raw_query);
            if let Some(cached) = cache.get(&hash).await {
                debug!(fingerprint = %hash, cached, "count cache hit");
                total = cached;
                do_count = false;
                if total == 0 {
                    // The query cannot return anything; skip it entirely.
                    return Ok(SearchSet::count_only(0));
                }
            }
            fingerprint = Some(hash);
        }

        if !self.config.count_total_results {
            do_count = false;
        }

        let compiler = QueryCompiler::new(&self.config);
        let compiled = compiler.compile(query)?;
        let summary_count = query.options.summary == Some(SummaryMode::Count);

        let (cursor, computed_total) = match &compiled {
            CompiledQuery::Filter { resource, filter } => {
                debug!(query = %compiled, count = do_count, "dispatching find");
                self.find(resource, filter, &query.options, do_count, summary_count)
                    .await?
            }
            CompiledQuery::Pipeline { resource, stages } => {
                debug!(query = %compiled, count = do_count, "dispatching aggregation");
                self.aggregate(resource, stages, &query.options, do_count, summary_count)
                    .await?
            }
        };

        // _summary=count short-circuits result collection.
        if summary_count {
            return Ok(SearchSet::count_only(computed_total));
        }

        let mut resources = Vec::new();
        if let Some(mut cursor) = cursor {
            while let Some(document) = cursor
                .try_next()
                .await
                .map_err(|e| SearchError::from_driver(e, "search result decoding failed"))?
            {
                resources.push(document);
            }
        }

        if do_count {
            // A fresh total on a read-only server is worth keeping.
            if let Some(hash) = &fingerprint {
                cache.put(hash, computed_total).await;
            }
            total = computed_total;
        }

        Ok(SearchSet { resources, total })
    }

    /// Runs a simple query through `find`, counting first if needed.
    async fn find(
        &self,
        resource: &str,
        filter: &Document,
        options: &QueryOptions,
        do_count: bool,
        summary_count: bool,
    ) -> SearchResult<(Option<Cursor<Document>>, u32)> {
        let collection = self.collection(resource);

        let mut total: u32 = 0;
        if do_count || summary_count {
            let count = collection
                .count_documents(filter.clone())
                .await
                .map_err(|e| SearchError::from_driver(e, "search count operation failed"))?;
            total = count as u32;
        }

        if summary_count {
            return Ok((None, total));
        }

        let cursor = collection
            .find(filter.clone())
            .with_options(find_options(options))
            .await
            .map_err(|e| SearchError::from_driver(e, "search find operation failed"))?;
        Ok((Some(cursor), total))
    }

    /// Runs a pipeline query through the aggregation framework, counting
    /// first if needed.
    async fn aggregate(
        &self,
        resource: &str,
        stages: &[Document],
        options: &QueryOptions,
        do_count: bool,
        summary_count: bool,
    ) -> SearchResult<(Option<Cursor<Document>>, u32)> {
        let collection = self.collection(resource);

        let mut total: u32 = 0;
        if do_count || summary_count {
            if let [only_match] = stages {
                // The pipeline exists only for include joins, so the whole
                // collection is filtered by the initial $match alone; a
                // plain count against that expression is faster than an
                // aggregation.
                let filter = only_match
                    .get_document("$match")
                    .ok()
                    .cloned()
                    .unwrap_or_default();
                let count = collection
                    .count_documents(filter)
                    .await
                    .map_err(|e| SearchError::from_driver(e, "search count operation failed"))?;
                total = count as u32;
            } else {
                total = self.aggregate_count(&collection, stages).await?;
            }
        }

        if summary_count {
            return Ok((None, total));
        }

        let mut pipeline = stages.to_vec();
        pipeline.extend(pipeline_stages(resource, options));
        let cursor = collection
            .aggregate(pipeline)
            .with_options(
                AggregateOptions::builder()
                    .allow_disk_use(true)
                    .build(),
            )
            .await
            .map_err(|e| SearchError::from_driver(e, "aggregate operation failed"))?;
        Ok((Some(cursor), total))
    }

    /// Counts pipeline results by appending a `$group` sum stage.
    async fn aggregate_count(
        &self,
        collection: &Collection<Document>,
        stages: &[Document],
    ) -> SearchResult<u32> {
        let mut count_pipeline = stages.to_vec();
        count_pipeline.push(doc! {
            "$group": { "_id": Bson::Null, "total": { "$sum": 1 } },
        });

        let mut cursor = collection
            .aggregate(count_pipeline)
            .await
            .map_err(|e| SearchError::from_driver(e, "aggregate count failed"))?;

        match cursor
            .try_next()
            .await
            .map_err(|e| SearchError::from_driver(e, "aggregate count decoding failed"))?
        {
            Some(result) => Ok(match result.get("total") {
                Some(Bson::Int32(total)) => *total as u32,
                Some(Bson::Int64(total)) => *total as u32,
                Some(Bson::Double(total)) => *total as u32,
                _ => 0,
            }),
            None => {
                // An empty group stage means zero matches.
                debug!("aggregate count returned no row");
                Ok(0)
            }
        }
    }

    fn collection(&self, resource: &str) -> Collection<Document> {
        self.db.collection(&pluralize_lower_resource_name(resource))
    }
}

#[async_trait]
impl SearchProvider for MongoSearcher {
    async fn search(&self, query: &Query) -> SearchResult<SearchSet> {
        MongoSearcher::search(self, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The driver connects lazily, so constructing and shutting down a
    // searcher needs no running server.
    #[tokio::test]
    async fn test_connect_and_close_without_server() {
        let searcher = MongoSearcher::connect(
            "mongodb://localhost:27017",
            "fhir",
            SearchConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(searcher.database().name(), "fhir");
        assert!(searcher.config().count_total_results);
        searcher.close().await;
    }

    #[tokio::test]
    async fn test_close_leaves_injected_database_untouched() {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let searcher = MongoSearcher::new(client.database("fhir"), SearchConfig::default());
        // No owned client, so close must not shut anything down.
        searcher.close().await;
        assert_eq!(client.database("fhir").name(), "fhir");
    }
}
