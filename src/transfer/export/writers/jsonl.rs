//! JSON Lines writer for export operations
//!
//! Each document is written as one compact JSON object followed by the
//! encoding's LF, and the sink is flushed after every line so an
//! interrupted export leaves only complete lines behind.

use async_trait::async_trait;
use mongodb::bson::Document;
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::codec::{CharacterEncoding, DocumentCodec};
use crate::error::Result;

use super::{EncodedSink, FormatWriter};

/// Writer for JSON Lines format
pub struct JsonLinesWriter<W> {
    sink: EncodedSink<W>,
    written: usize,
}

impl<W> JsonLinesWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a JSON Lines writer over `inner`
    ///
    /// # Arguments
    /// * `inner` - Destination byte sink
    /// * `encoding` - Character encoding of the output text
    /// * `codec` - Codec used to serialize each document
    pub fn new(inner: W, encoding: CharacterEncoding, codec: DocumentCodec) -> Self {
        Self {
            sink: EncodedSink::new(inner, encoding, codec),
            written: 0,
        }
    }
}

#[async_trait]
impl<W> FormatWriter for JsonLinesWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_batch(&mut self, docs: &[Document]) -> Result<usize> {
        for doc in docs {
            let mut line = self.sink.serialize(doc)?;
            line.push('\n');
            self.sink.write_text(&line).await?;
            self.sink.flush().await?;
        }

        self.written += docs.len();
        debug!(
            "Wrote {} documents to JSON Lines (total: {})",
            docs.len(),
            self.written
        );
        Ok(docs.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.sink.flush().await?;
        debug!("Finalized JSON Lines output ({} documents)", self.written);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.sink.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonMode;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_jsonl_writer_one_line_per_document() {
        let mut out = Vec::new();
        let mut writer =
            JsonLinesWriter::new(&mut out, CharacterEncoding::Utf8, DocumentCodec::default());

        let docs = vec![
            doc! { "name": "Alice", "bio": "line one\nline two" },
            doc! { "name": "Bob", "age": 25 },
        ];
        assert_eq!(writer.write_batch(&docs).await.unwrap(), 2);
        writer.write_batch(&[doc! { "id": 3 }]).await.unwrap();
        writer.finalize().await.unwrap();
        let bytes = writer.bytes_written();

        let content = String::from_utf8(out).unwrap();
        assert_eq!(bytes, content.len() as u64);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"name":"Alice","bio":"line one\nline two"}"#);
        assert_eq!(lines[2], r#"{"id":3}"#);
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_jsonl_writer_canonical_utf16() {
        let mut out = Vec::new();
        let codec = DocumentCodec::new(JsonMode::Canonical, 0);
        let mut writer = JsonLinesWriter::new(&mut out, CharacterEncoding::Utf16Be, codec);
        writer.write_batch(&[doc! { "n": 1 }]).await.unwrap();
        writer.finalize().await.unwrap();

        let text = CharacterEncoding::Utf16Be.decode(&out).unwrap();
        assert_eq!(text, "{\"n\":{\"$numberInt\":\"1\"}}\n");
    }

    #[tokio::test]
    async fn test_jsonl_writer_rejects_unencodable_text() {
        let mut out = Vec::new();
        let mut writer =
            JsonLinesWriter::new(&mut out, CharacterEncoding::Ascii, DocumentCodec::default());
        assert!(writer.write_batch(&[doc! { "s": "naïve" }]).await.is_err());
    }
}
