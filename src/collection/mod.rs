//! The collection handle every engine component talks to.
//!
//! [`CollectionHandle`] is the narrow capability set the pager, exporter and
//! importer need from a database collection. [`MongoCollection`] backs it
//! with the MongoDB driver; [`MemoryCollection`] keeps documents in process
//! and evaluates a useful subset of the query language, which makes it the
//! stand-in for a server in tests and offline tooling.
//!
//! Index management ([`IndexDefinition`], [`IndexInfo`]) goes through the
//! same handle.

pub mod index;
pub mod memory;
pub mod mongo;

#[cfg(test)]
pub(crate) mod testing;

pub use index::{ID_INDEX_NAME, IndexDefinition, IndexInfo, default_index_name};
pub use memory::MemoryCollection;
pub use mongo::MongoCollection;

use async_trait::async_trait;
use mongodb::bson::{Document, doc};

use crate::error::Result;
use crate::transfer::export::StreamingQuery;

/// Parameters of a single find operation.
///
/// `None` for filter, projection or sort means "no restriction"; an empty
/// document means the same thing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRequest {
    pub filter: Option<Document>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: u64,
    pub limit: Option<i64>,
}

impl FindRequest {
    pub fn new(filter: Option<Document>) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection;
        self
    }

    pub fn sort(mut self, sort: Option<Document>) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter to send to the server; an absent filter matches everything.
    pub fn filter_or_empty(&self) -> Document {
        self.filter.clone().unwrap_or_default()
    }
}

/// Capabilities the engine needs from a collection.
///
/// Implementations must be shareable across tasks: many cursors, exporters
/// and importers may hold the same handle.
#[async_trait]
pub trait CollectionHandle: Send + Sync {
    /// Collection name, for logs and messages.
    fn name(&self) -> &str;

    /// Count documents matching `filter` (all documents when `None`).
    async fn count(&self, filter: Option<&Document>) -> Result<u64>;

    /// Run a find and collect every returned document.
    async fn find(&self, request: FindRequest) -> Result<Vec<Document>>;

    /// Run a find and stream the results in batches of `batch_size`.
    async fn find_stream(
        &self,
        request: FindRequest,
        batch_size: u32,
    ) -> Result<Box<dyn StreamingQuery>>;

    /// Insert a single document.
    async fn insert(&self, document: Document) -> Result<()>;

    /// Insert documents in order, returning how many were inserted.
    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64>;

    /// Remove one document: by `_id` when present, otherwise by exact match.
    async fn remove(&self, document: &Document) -> Result<u64>;

    /// Replace the document with the same `_id` (upserting), or insert it
    /// when it has no `_id`.
    async fn save(&self, document: Document) -> Result<()>;

    /// Drop the whole collection.
    async fn drop_collection(&self) -> Result<()>;

    /// Every index of the collection, `_id_` first.
    async fn list_indexes(&self) -> Result<Vec<IndexInfo>>;

    /// Create an index and return its name.
    ///
    /// Creating an index identical to an existing one succeeds and returns
    /// the existing name.
    async fn create_index(&self, definition: IndexDefinition) -> Result<String>;

    /// Drop the index called `name`; the `_id_` index cannot be dropped.
    async fn drop_index(&self, name: &str) -> Result<()>;
}

/// Selector used by `remove`: the `_id` alone when the document has one.
pub(crate) fn identity_filter(document: &Document) -> Document {
    match document.get("_id") {
        Some(id) => doc! { "_id": id.clone() },
        None => document.clone(),
    }
}
