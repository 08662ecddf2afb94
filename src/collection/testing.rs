//! Collection double whose operations can be made to fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use mongodb::bson::Document;

use super::{CollectionHandle, FindRequest, IndexDefinition, IndexInfo, MemoryCollection};
use crate::error::{QueryError, Result};
use crate::transfer::export::StreamingQuery;

/// Wraps a [`MemoryCollection`]; reads or writes fail while switched off.
pub(crate) struct FlakyCollection {
    pub inner: MemoryCollection,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    pub drops: AtomicUsize,
    pub insert_calls: AtomicUsize,
}

impl FlakyCollection {
    pub fn new(inner: MemoryCollection) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            drops: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(QueryError::Unavailable("server selection timed out".into()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl CollectionHandle for FlakyCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn count(&self, filter: Option<&Document>) -> Result<u64> {
        self.check(&self.fail_reads)?;
        self.inner.count(filter).await
    }

    async fn find(&self, request: FindRequest) -> Result<Vec<Document>> {
        self.check(&self.fail_reads)?;
        self.inner.find(request).await
    }

    async fn find_stream(
        &self,
        request: FindRequest,
        batch_size: u32,
    ) -> Result<Box<dyn StreamingQuery>> {
        self.check(&self.fail_reads)?;
        self.inner.find_stream(request, batch_size).await
    }

    async fn insert(&self, document: Document) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(document).await
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64> {
        self.check(&self.fail_writes)?;
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_many(documents).await
    }

    async fn remove(&self, document: &Document) -> Result<u64> {
        self.check(&self.fail_writes)?;
        self.inner.remove(document).await
    }

    async fn save(&self, document: Document) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.inner.save(document).await
    }

    async fn drop_collection(&self) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.drops.fetch_add(1, Ordering::SeqCst);
        self.inner.drop_collection().await
    }

    async fn list_indexes(&self) -> Result<Vec<IndexInfo>> {
        self.check(&self.fail_reads)?;
        self.inner.list_indexes().await
    }

    async fn create_index(&self, definition: IndexDefinition) -> Result<String> {
        self.check(&self.fail_writes)?;
        self.inner.create_index(definition).await
    }

    async fn drop_index(&self, name: &str) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.inner.drop_index(name).await
    }
}
