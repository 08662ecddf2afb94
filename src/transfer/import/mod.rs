//! Line-delimited JSON import.
//!
//! Every non-blank line of the source is either one JSON object or a JSON
//! array of objects. Lines that fail to decode or parse, or that hold any
//! other shape, are skipped and recorded in the [`ImportReport`]; the rest of
//! the file is still imported. Reading the source and inserting into the
//! collection are fatal when they fail.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use mongodb::bson::{Bson, Document};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::charset::BOM;
use crate::codec::{CharacterEncoding, DocumentCodec, LineDecoder, bson_type_name};
use crate::collection::CollectionHandle;
use crate::config::TransferConfig;
use crate::error::{ImportError, ParseError, ParseErrorKind, Result};
use crate::transfer::progress::{ProgressTracker, TransferDirection};

const READ_CHUNK: usize = 64 * 1024;

/// Where to import from and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportProperties {
    pub collection_name: String,
    pub source: PathBuf,
    pub encoding: CharacterEncoding,
    /// Drop the target collection before the first insert.
    pub drop_existing: bool,
    /// Documents buffered per `insert_many` call.
    pub batch_size: u32,
    pub show_progress: bool,
}

impl ImportProperties {
    pub fn builder(
        collection_name: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> ImportPropertiesBuilder {
        ImportPropertiesBuilder {
            properties: ImportProperties {
                collection_name: collection_name.into(),
                source: source.into(),
                encoding: CharacterEncoding::Utf8,
                drop_existing: false,
                batch_size: 1000,
                show_progress: false,
            },
        }
    }
}

/// Builder for [`ImportProperties`].
#[derive(Debug, Clone)]
pub struct ImportPropertiesBuilder {
    properties: ImportProperties,
}

impl ImportPropertiesBuilder {
    pub fn encoding(mut self, encoding: CharacterEncoding) -> Self {
        self.properties.encoding = encoding;
        self
    }

    pub fn drop_existing(mut self, drop_existing: bool) -> Self {
        self.properties.drop_existing = drop_existing;
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

    /// Take encoding, batch size and progress from configuration.
    pub fn transfer_defaults(mut self, config: &TransferConfig) -> Result<Self> {
        self.properties.encoding = CharacterEncoding::from_name(&config.encoding)?;
        self.properties.batch_size = config.batch_size.max(1);
        self.properties.show_progress = config.progress;
        Ok(self)
    }

    pub fn build(self) -> ImportProperties {
        self.properties
    }
}

/// A source line that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number in the source.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl From<ParseError> for LineError {
    fn from(error: ParseError) -> Self {
        Self {
            line: error.line.unwrap_or(0),
            message: error.message,
        }
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: u64,
    pub lines_read: usize,
    pub errors: Vec<LineError>,
    pub cancelled: bool,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Inserts documents read from a line-delimited JSON source.
pub struct Importer {
    collection: Arc<dyn CollectionHandle>,
    codec: DocumentCodec,
    cancel_token: Option<CancellationToken>,
}

impl Importer {
    pub fn new(collection: Arc<dyn CollectionHandle>) -> Self {
        Self {
            collection,
            codec: DocumentCodec::default(),
            cancel_token: None,
        }
    }

    /// Stop between lines once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Import from the file at `properties.source`.
    pub async fn import_from(&self, properties: &ImportProperties) -> Result<ImportReport> {
        let file = tokio::fs::File::open(&properties.source)
            .await
            .map_err(|e| ImportError::Open {
                path: properties.source.display().to_string(),
                source: e,
            })?;
        info!(
            "Importing {} into '{}' ({})",
            properties.source.display(),
            properties.collection_name,
            properties.encoding
        );
        self.import_from_reader(properties, file).await
    }

    /// Import from any byte source; `properties.source` is ignored.
    pub async fn import_from_reader<R>(
        &self,
        properties: &ImportProperties,
        mut reader: R,
    ) -> Result<ImportReport>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut run = ImportRun::new(self, properties);
        let mut decoder = LineDecoder::new(properties.encoding);
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let read = reader.read(&mut chunk).await.map_err(ImportError::Read)?;
            if read == 0 {
                break;
            }
            decoder.push(&chunk[..read]);
            while let Some(raw) = decoder.next_line() {
                if run.is_cancelled() {
                    return run.finish(true).await;
                }
                run.consume(&decoder, &raw).await?;
            }
        }

        if let Some(raw) = decoder.finish() {
            if run.is_cancelled() {
                return run.finish(true).await;
            }
            run.consume(&decoder, &raw).await?;
        }
        run.finish(false).await
    }
}

/// State of one import pass.
struct ImportRun<'a> {
    importer: &'a Importer,
    properties: &'a ImportProperties,
    pending: Vec<Document>,
    dropped: bool,
    report: ImportReport,
    tracker: ProgressTracker,
}

impl<'a> ImportRun<'a> {
    fn new(importer: &'a Importer, properties: &'a ImportProperties) -> Self {
        Self {
            importer,
            properties,
            pending: Vec::new(),
            dropped: false,
            report: ImportReport::default(),
            tracker: ProgressTracker::new(TransferDirection::Import, None, properties.show_progress),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.importer
            .cancel_token
            .as_ref()
            .is_some_and(|t| t.is_cancelled())
    }

    async fn consume(&mut self, decoder: &LineDecoder, raw: &[u8]) -> Result<()> {
        self.report.lines_read += 1;
        let line_number = self.report.lines_read;

        match self.parse_line(decoder, raw, line_number) {
            Ok(docs) => self.pending.extend(docs),
            Err(error) => {
                warn!("Skipping line {}: {}", line_number, error.message);
                self.tracker.reject();
                self.report.errors.push(error.into());
            }
        }

        if self.pending.len() >= self.properties.batch_size as usize {
            self.flush().await?;
        }
        Ok(())
    }

    fn parse_line(
        &self,
        decoder: &LineDecoder,
        raw: &[u8],
        line_number: usize,
    ) -> std::result::Result<Vec<Document>, ParseError> {
        let text = decoder
            .decode_line(raw)
            .map_err(|e| e.at_line(line_number))?;
        let text = if line_number == 1 {
            text.strip_prefix(BOM).unwrap_or(&text)
        } else {
            &text
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match self
            .importer
            .codec
            .parse_value(text)
            .map_err(|e| e.at_line(line_number))?
        {
            Bson::Document(doc) => Ok(vec![doc]),
            Bson::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Bson::Document(doc) => Ok(doc),
                    other => Err(ParseError::new(
                        ParseErrorKind::NotADocument,
                        format!(
                            "array element {i} is {}, expected a JSON object",
                            bson_type_name(&other)
                        ),
                    )
                    .at_line(line_number)),
                })
                .collect(),
            other => Err(ParseError::not_a_document(bson_type_name(&other)).at_line(line_number)),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.properties.drop_existing && !self.dropped {
            info!(
                "Dropping collection '{}' before import",
                self.properties.collection_name
            );
            self.importer.collection.drop_collection().await?;
            self.dropped = true;
        }

        let docs = std::mem::take(&mut self.pending);
        let inserted = self.importer.collection.insert_many(docs).await?;
        self.report.inserted += inserted;
        self.tracker.update(self.report.inserted);
        debug!(
            "Inserted {} documents (total: {})",
            inserted, self.report.inserted
        );
        Ok(())
    }

    async fn finish(mut self, cancelled: bool) -> Result<ImportReport> {
        if cancelled {
            info!("Import cancelled after {} lines", self.report.lines_read);
            self.pending.clear();
        } else {
            self.flush().await?;
        }
        self.tracker.finish();
        self.report.cancelled = cancelled;
        info!(
            "Import completed: {} documents inserted, {} lines read, {} skipped",
            self.report.inserted,
            self.report.lines_read,
            self.report.errors.len()
        );
        Ok(self.report)
    }
}
