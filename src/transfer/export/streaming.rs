//! Batch streaming of query results for export.
//!
//! An export never materialises the whole result set: the collection hands
//! out a [`StreamingQuery`] and the coordinator pulls one batch at a time.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Cursor;
use mongodb::bson::Document;
use tracing::{debug, info};

use crate::error::{QueryError, Result};

/// Source of documents delivered in batches.
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch, or `None` once the results are exhausted.
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>>;

    /// Release the underlying cursor.
    async fn close(&mut self) -> Result<()>;
}

/// Streams a live driver cursor.
pub struct CursorStreamingQuery {
    cursor: Option<Cursor<Document>>,
    batch_size: u32,
    total_fetched: u64,
    collection: String,
}

impl CursorStreamingQuery {
    pub fn new(cursor: Cursor<Document>, batch_size: u32, collection: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor),
            batch_size: batch_size.max(1),
            total_fetched: 0,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl StreamingQuery for CursorStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let mut batch = Vec::with_capacity(self.batch_size as usize);
        for _ in 0..self.batch_size {
            match cursor.try_next().await {
                Ok(Some(doc)) => batch.push(doc),
                Ok(None) => break,
                Err(e) => {
                    self.cursor = None;
                    return Err(QueryError::Cursor(e.to_string()).into());
                }
            }
        }

        if batch.is_empty() {
            debug!(
                "Cursor on '{}' exhausted after {} documents",
                self.collection, self.total_fetched
            );
            self.cursor = None;
            return Ok(None);
        }

        self.total_fetched += batch.len() as u64;
        debug!(
            "Fetched batch of {} documents from '{}' (total: {})",
            batch.len(),
            self.collection,
            self.total_fetched
        );
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<()> {
        if self.cursor.take().is_some() {
            info!(
                "Closed cursor on '{}' after {} documents",
                self.collection, self.total_fetched
            );
        }
        Ok(())
    }
}

/// Streams documents already held in memory.
#[derive(Debug)]
pub struct BufferedStreamingQuery {
    remaining: VecDeque<Document>,
    batch_size: usize,
}

impl BufferedStreamingQuery {
    pub fn new(documents: Vec<Document>, batch_size: u32) -> Self {
        Self {
            remaining: documents.into(),
            batch_size: batch_size.max(1) as usize,
        }
    }
}

#[async_trait]
impl StreamingQuery for BufferedStreamingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        if self.remaining.is_empty() {
            return Ok(None);
        }
        let take = self.batch_size.min(self.remaining.len());
        Ok(Some(self.remaining.drain(..take).collect()))
    }

    async fn close(&mut self) -> Result<()> {
        self.remaining.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_buffered_batches() {
        let docs = (0..5).map(|i| doc! { "i": i }).collect();
        let mut query = BufferedStreamingQuery::new(docs, 2);
        let mut sizes = Vec::new();
        while let Some(batch) = query.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(query.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_buffered_close_discards_rest() {
        let mut query = BufferedStreamingQuery::new(vec![doc! { "a": 1 }], 10);
        query.close().await.unwrap();
        assert!(query.next_batch().await.unwrap().is_none());
    }

    #[test]
    fn test_streaming_query_trait_object() {
        fn _accepts_streaming_query(_query: Box<dyn StreamingQuery>) {}
    }
}
