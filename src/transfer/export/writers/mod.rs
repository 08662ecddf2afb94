//! Format writers for export operations
//!
//! A writer turns batches of documents into encoded text on an async sink.
//! Both formats serialize each document through [`DocumentCodec::to_compact`],
//! so a document never spans more than one line of output.

use async_trait::async_trait;
use mongodb::bson::Document;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::codec::{CharacterEncoding, DocumentCodec};
use crate::error::{ExportError, Result};

pub mod array;
pub mod jsonl;

pub use array::JsonArrayWriter;
pub use jsonl::JsonLinesWriter;

/// Trait for writing documents to an export format
#[async_trait]
pub trait FormatWriter: Send {
    /// Write a batch of documents
    ///
    /// # Arguments
    /// * `docs` - Slice of documents to write
    ///
    /// # Returns
    /// * `Result<usize>` - Number of documents written
    async fn write_batch(&mut self, docs: &[Document]) -> Result<usize>;

    /// Finalize the output (write closing syntax, flush buffers)
    async fn finalize(&mut self) -> Result<()>;

    /// Encoded bytes handed to the sink so far
    fn bytes_written(&self) -> u64;
}

/// Encoded text output shared by the concrete writers.
pub(crate) struct EncodedSink<W> {
    inner: W,
    encoding: CharacterEncoding,
    codec: DocumentCodec,
    bytes: u64,
}

impl<W> EncodedSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(inner: W, encoding: CharacterEncoding, codec: DocumentCodec) -> Self {
        Self {
            inner,
            encoding,
            codec,
            bytes: 0,
        }
    }

    pub(crate) fn serialize(&self, doc: &Document) -> Result<String> {
        Ok(self.codec.to_compact(doc)?)
    }

    /// Encode and write `text` without flushing.
    pub(crate) async fn write_text(&mut self, text: &str) -> Result<()> {
        let bytes = self.encoding.encode(text)?;
        self.inner
            .write_all(&bytes)
            .await
            .map_err(ExportError::Write)?;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await.map_err(ExportError::Write)?;
        Ok(())
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Create the destination file behind a buffered writer
///
/// # Arguments
/// * `path` - File path to create (truncated when it exists)
///
/// # Returns
/// * `Result<BufWriter<File>>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    validate_path(path)?;
    let file = File::create(path).await.map_err(|e| ExportError::Open {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::with_capacity(64 * 1024, file))
}

/// Check that the destination's parent directory exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ExportError::Open {
                path: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("directory does not exist: {}", parent.display()),
                ),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MongoviewError;

    #[test]
    fn test_validate_path_missing_directory() {
        let err = validate_path(Path::new("/nonexistent/directory/file.jsonl")).unwrap_err();
        assert!(matches!(err, MongoviewError::Export(ExportError::Open { .. })));
        assert!(validate_path(Path::new("relative.jsonl")).is_ok());
    }

    #[tokio::test]
    async fn test_encoded_sink_counts_encoded_bytes() {
        let mut out = Vec::new();
        let mut sink = EncodedSink::new(&mut out, CharacterEncoding::Utf16Le, DocumentCodec::default());
        sink.write_text("ab").await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(sink.bytes(), 4);
        assert_eq!(out, vec![b'a', 0, b'b', 0]);
    }
}
