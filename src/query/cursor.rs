//! Page-at-a-time browsing of a collection.

use std::sync::Arc;

use mongodb::bson::Document;
use tracing::debug;

use super::spec::QuerySpec;
use crate::collection::CollectionHandle;
use crate::error::{MongoviewError, Result};

/// State produced by one successful [`PageCursor::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot {
    /// 1-based page number, within `1..=page_count`.
    pub page: u64,
    pub page_count: u64,
    /// Matching documents counted during the update.
    pub total: u64,
    pub documents: Vec<Document>,
}

impl Default for PageSnapshot {
    fn default() -> Self {
        Self {
            page: 1,
            page_count: 1,
            total: 0,
            documents: Vec::new(),
        }
    }
}

/// Pagination engine over a collection handle.
///
/// Setters only record the desired query; [`update`](Self::update) counts,
/// clamps the requested page and fetches it, then swaps in the new
/// [`PageSnapshot`] as a whole. A failed update leaves the previous
/// snapshot and the requested page untouched.
///
/// The cursor does no locking of its own. Callers that update from a
/// background task share it through [`crate::worker::SharedCursor`].
pub struct PageCursor {
    collection: Arc<dyn CollectionHandle>,
    spec: QuerySpec,
    requested_page: u64,
    snapshot: Arc<PageSnapshot>,
}

impl PageCursor {
    pub fn new(collection: Arc<dyn CollectionHandle>, spec: QuerySpec) -> Self {
        Self {
            collection,
            spec,
            requested_page: 1,
            snapshot: Arc::new(PageSnapshot::default()),
        }
    }

    pub fn collection(&self) -> &Arc<dyn CollectionHandle> {
        &self.collection
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Request page `page`; it is clamped on the next update.
    pub fn set_page(&mut self, page: u64) {
        self.requested_page = page;
    }

    pub fn set_items_per_page(&mut self, items_per_page: u32) -> Result<()> {
        self.spec.set_items_per_page(items_per_page)
    }

    pub fn set_criteria(&mut self, criteria: Option<Document>) {
        self.spec.set_criteria(criteria);
    }

    pub fn set_projection(&mut self, projection: Option<Document>) {
        self.spec.set_projection(projection);
    }

    pub fn set_sort(&mut self, sort: Option<Document>) {
        self.spec.set_sort(sort);
    }

    /// Replace the whole query shape.
    pub fn set_spec(&mut self, spec: QuerySpec) {
        self.spec = spec;
    }

    /// Recompute the page bounds and fetch the requested page.
    pub async fn update(&mut self) -> Result<()> {
        let total = self.collection.count(self.spec.criteria()).await?;
        let page_count = self.spec.page_count(total);
        let page = self.requested_page.clamp(1, page_count);
        if page != self.requested_page {
            debug!(
                "Clamped page {} to {} ({} pages)",
                self.requested_page, page, page_count
            );
        }

        let documents = self.collection.find(self.spec.page_request(page)).await?;
        debug!(
            "Page {}/{} of '{}': {} of {} documents",
            page,
            page_count,
            self.collection.name(),
            documents.len(),
            total
        );

        self.requested_page = page;
        self.snapshot = Arc::new(PageSnapshot {
            page,
            page_count,
            total,
            documents,
        });
        Ok(())
    }

    /// Go back to the first page and update.
    pub async fn reload(&mut self) -> Result<()> {
        self.set_page(1);
        self.update().await
    }

    /// The state installed by the last successful update.
    pub fn snapshot(&self) -> Arc<PageSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn page(&self) -> u64 {
        self.snapshot.page
    }

    /// Page that the next update will try to fetch.
    pub fn requested_page(&self) -> u64 {
        self.requested_page
    }

    pub fn page_count(&self) -> u64 {
        self.snapshot.page_count
    }

    pub fn total(&self) -> u64 {
        self.snapshot.total
    }

    pub fn items_per_page(&self) -> u32 {
        self.spec.items_per_page()
    }

    /// Copy of the current page's documents.
    pub fn documents(&self) -> Vec<Document> {
        self.snapshot.documents.clone()
    }

    pub fn row_count(&self) -> usize {
        self.snapshot.documents.len()
    }

    /// Document at `index` within the current page.
    pub fn row_value(&self, index: usize) -> Result<&Document> {
        self.snapshot
            .documents
            .get(index)
            .ok_or(MongoviewError::IndexOutOfRange {
                index,
                len: self.snapshot.documents.len(),
            })
    }

    pub fn has_previous(&self) -> bool {
        self.snapshot.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.snapshot.page < self.snapshot.page_count
    }

    pub fn first(&mut self) {
        self.set_page(1);
    }

    pub fn previous(&mut self) {
        self.set_page(self.snapshot.page.saturating_sub(1).max(1));
    }

    pub fn next(&mut self) {
        self.set_page((self.snapshot.page + 1).min(self.snapshot.page_count));
    }

    pub fn last(&mut self) {
        self.set_page(self.snapshot.page_count);
    }

    pub async fn insert_document(&self, document: Document) -> Result<()> {
        self.collection.insert(document).await
    }

    /// Replace a document by `_id`, inserting it when it has none.
    pub async fn save_document(&self, document: Document) -> Result<()> {
        self.collection.save(document).await
    }

    /// Remove the document shown at `index` from the collection.
    pub async fn remove_row(&self, index: usize) -> Result<u64> {
        let document = self.row_value(index)?;
        self.collection.remove(document).await
    }
}
