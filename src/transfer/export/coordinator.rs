//! Export coordinator for orchestrating export operations
//!
//! Pulls batches from a [`StreamingQuery`], hands them to a [`FormatWriter`]
//! and reports progress. A cancellation token is checked between batches.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::streaming::StreamingQuery;
use super::writers::FormatWriter;
use crate::error::Result;
use crate::transfer::progress::ProgressTracker;

/// Result of an export operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Number of documents exported
    pub documents_exported: u64,
    /// Encoded bytes written to the destination
    pub bytes_written: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
    /// Whether the export was cancelled
    pub cancelled: bool,
}

/// Coordinator for export operations
pub struct ExportCoordinator<'a> {
    query: Box<dyn StreamingQuery>,
    tracker: ProgressTracker,
    writer: Box<dyn FormatWriter + 'a>,
    cancel_token: Option<CancellationToken>,
}

impl<'a> ExportCoordinator<'a> {
    /// Create a new export coordinator
    pub fn new(
        query: Box<dyn StreamingQuery>,
        tracker: ProgressTracker,
        writer: Box<dyn FormatWriter + 'a>,
    ) -> Self {
        Self {
            query,
            tracker,
            writer,
            cancel_token: None,
        }
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Execute the export operation
    ///
    /// Streams every batch to the writer and finalizes it. On cancellation
    /// the output written so far is finalized and a summary with
    /// `cancelled = true` is returned. Query and write failures propagate;
    /// output already flushed stays in place.
    ///
    /// # Returns
    /// * `Result<ExportSummary>` - Export statistics or error
    pub async fn execute(&mut self) -> Result<ExportSummary> {
        let start_time = Instant::now();

        info!("Starting export operation");
        let mut exported = 0u64;
        let mut batch_count = 0u32;

        loop {
            if self.cancel_token.as_ref().is_some_and(|t| t.is_cancelled()) {
                info!("Export cancelled after {} documents", exported);

                let _ = self.writer.finalize().await;
                let _ = self.query.close().await;
                self.tracker.finish();

                return Ok(ExportSummary {
                    documents_exported: exported,
                    bytes_written: self.writer.bytes_written(),
                    elapsed_ms: start_time.elapsed().as_millis() as u64,
                    cancelled: true,
                });
            }

            debug!("Fetching batch #{}", batch_count + 1);

            let batch = match self.query.next_batch().await {
                Ok(batch) => batch,
                Err(e) => {
                    let _ = self.writer.finalize().await;
                    self.tracker.finish();
                    return Err(e);
                }
            };

            match batch {
                Some(docs) => {
                    let count = self.writer.write_batch(&docs).await?;

                    exported += count as u64;
                    self.tracker.update(exported);

                    batch_count += 1;
                    if batch_count % 10 == 0 {
                        info!(
                            "Progress: {} documents exported ({} batches)",
                            exported, batch_count
                        );
                    }
                }
                None => {
                    debug!("No more documents available");
                    break;
                }
            }
        }

        self.writer.finalize().await?;
        self.query.close().await?;

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        self.tracker.finish();

        let bytes_written = self.writer.bytes_written();
        info!(
            "Export completed: {} documents, {} bytes, {} ms",
            exported, bytes_written, elapsed_ms
        );

        Ok(ExportSummary {
            documents_exported: exported,
            bytes_written,
            elapsed_ms,
            cancelled: false,
        })
    }
}
