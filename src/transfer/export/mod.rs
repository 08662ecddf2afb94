//! Streaming export of a query result set
//!
//! The export system is built on three components:
//!
//! 1. **StreamingQuery**: delivers the matching documents in batches
//! 2. **ProgressTracker**: counters and an optional progress bar
//! 3. **FormatWriter**: encodes documents as JSON Lines or a JSON array
//!
//! [`ExportCoordinator`] runs the pipeline; [`Exporter`] wires it to a
//! collection handle and a destination file or sink.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use mongoview::collection::{CollectionHandle, MemoryCollection};
//! # use mongoview::transfer::{ExportProperties, Exporter};
//! # async fn run() -> mongoview::Result<()> {
//! let collection: Arc<dyn CollectionHandle> = Arc::new(MemoryCollection::new("people"));
//! let properties = ExportProperties::builder("people", "people.jsonl")
//!     .json_array(false)
//!     .build();
//! let summary = Exporter::new(collection).export(&properties).await?;
//! println!("{} documents", summary.documents_exported);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod streaming;
pub mod writers;

pub use coordinator::{ExportCoordinator, ExportSummary};
pub use streaming::{BufferedStreamingQuery, CursorStreamingQuery, StreamingQuery};
pub use writers::{FormatWriter, JsonArrayWriter, JsonLinesWriter};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use mongodb::bson::Document;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::codec::{CharacterEncoding, DocumentCodec, JsonMode};
use crate::collection::{CollectionHandle, FindRequest};
use crate::config::TransferConfig;
use crate::error::Result;
use crate::transfer::progress::{ProgressTracker, TransferDirection};

/// What to export and how to write it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProperties {
    pub collection_name: String,
    pub criteria: Option<Document>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub destination: PathBuf,
    pub encoding: CharacterEncoding,
    /// Wrap all documents in one JSON array instead of one object per line.
    pub json_array: bool,
    pub json_mode: JsonMode,
    pub batch_size: u32,
    pub show_progress: bool,
}

impl ExportProperties {
    pub fn builder(
        collection_name: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> ExportPropertiesBuilder {
        ExportPropertiesBuilder {
            properties: ExportProperties {
                collection_name: collection_name.into(),
                criteria: None,
                projection: None,
                sort: None,
                destination: destination.into(),
                encoding: CharacterEncoding::Utf8,
                json_array: false,
                json_mode: JsonMode::Relaxed,
                batch_size: 1000,
                show_progress: false,
            },
        }
    }

    fn find_request(&self) -> FindRequest {
        FindRequest::new(self.criteria.clone())
            .projection(self.projection.clone())
            .sort(self.sort.clone())
    }
}

/// Builder for [`ExportProperties`].
#[derive(Debug, Clone)]
pub struct ExportPropertiesBuilder {
    properties: ExportProperties,
}

impl ExportPropertiesBuilder {
    pub fn criteria(mut self, criteria: Option<Document>) -> Self {
        self.properties.criteria = criteria;
        self
    }

    pub fn projection(mut self, projection: Option<Document>) -> Self {
        self.properties.projection = projection;
        self
    }

    pub fn sort(mut self, sort: Option<Document>) -> Self {
        self.properties.sort = sort;
        self
    }

    pub fn encoding(mut self, encoding: CharacterEncoding) -> Self {
        self.properties.encoding = encoding;
        self
    }

    pub fn json_array(mut self, json_array: bool) -> Self {
        self.properties.json_array = json_array;
        self
    }

    pub fn json_mode(mut self, json_mode: JsonMode) -> Self {
        self.properties.json_mode = json_mode;
        self
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.properties.batch_size = batch_size.max(1);
        self
    }

    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.properties.show_progress = show_progress;
        self
    }

    /// Take encoding, format, batch size and progress from configuration.
    pub fn transfer_defaults(mut self, config: &TransferConfig) -> Result<Self> {
        self.properties.encoding = CharacterEncoding::from_name(&config.encoding)?;
        self.properties.json_array = config.json_array;
        self.properties.json_mode = config.json_mode;
        self.properties.batch_size = config.batch_size.max(1);
        self.properties.show_progress = config.progress;
        Ok(self)
    }

    pub fn build(self) -> ExportProperties {
        self.properties
    }
}

/// Streams query results from a collection to a destination.
pub struct Exporter {
    collection: Arc<dyn CollectionHandle>,
    cancel_token: Option<CancellationToken>,
}

impl Exporter {
    pub fn new(collection: Arc<dyn CollectionHandle>) -> Self {
        Self {
            collection,
            cancel_token: None,
        }
    }

    /// Stop between batches once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Export to `properties.destination`, replacing any existing file.
    ///
    /// Lines already flushed stay on disk when the export fails part way.
    pub async fn export(&self, properties: &ExportProperties) -> Result<ExportSummary> {
        let file = writers::create_writer(&properties.destination).await?;
        info!(
            "Exporting '{}' to {} ({})",
            properties.collection_name,
            properties.destination.display(),
            properties.encoding
        );
        self.export_to_writer(properties, file).await
    }

    /// Export to an arbitrary byte sink; `properties.destination` is ignored.
    pub async fn export_to_writer<W>(
        &self,
        properties: &ExportProperties,
        sink: W,
    ) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let codec = DocumentCodec::new(properties.json_mode, 0);
        let writer: Box<dyn FormatWriter + '_> = if properties.json_array {
            Box::new(JsonArrayWriter::new(sink, properties.encoding, codec))
        } else {
            Box::new(JsonLinesWriter::new(sink, properties.encoding, codec))
        };

        let total = if properties.show_progress {
            Some(self.collection.count(properties.criteria.as_ref()).await?)
        } else {
            None
        };
        let tracker = ProgressTracker::new(TransferDirection::Export, total, properties.show_progress);

        let query = self
            .collection
            .find_stream(properties.find_request(), properties.batch_size)
            .await?;

        let mut coordinator = ExportCoordinator::new(query, tracker, writer);
        if let Some(token) = &self.cancel_token {
            coordinator = coordinator.with_cancellation(token.clone());
        }
        coordinator.execute().await
    }
}

/// File name for an export started at `now`: `export-YYYYmmdd-HHMMSS.jsonl`
/// (`.json` for array output).
pub fn default_file_name(now: DateTime<Local>, json_array: bool) -> String {
    let extension = if json_array { "json" } else { "jsonl" };
    format!("export-{}.{}", now.format("%Y%m%d-%H%M%S"), extension)
}

/// Default destination inside `dir` for an export starting now.
pub fn default_destination(dir: &Path, json_array: bool) -> PathBuf {
    dir.join(default_file_name(Local::now(), json_array))
}
