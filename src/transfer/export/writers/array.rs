//! JSON array writer for export operations
//!
//! Output layout:
//!
//! ```text
//! [
//! {"a":1},
//! {"a":2}
//! ]
//! ```
//!
//! An export with no documents produces `[]`.

use async_trait::async_trait;
use mongodb::bson::Document;
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::codec::{CharacterEncoding, DocumentCodec};
use crate::error::Result;

use super::{EncodedSink, FormatWriter};

/// Writer streaming all documents into a single JSON array
pub struct JsonArrayWriter<W> {
    sink: EncodedSink<W>,
    written: usize,
    finalized: bool,
}

impl<W> JsonArrayWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(inner: W, encoding: CharacterEncoding, codec: DocumentCodec) -> Self {
        Self {
            sink: EncodedSink::new(inner, encoding, codec),
            written: 0,
            finalized: false,
        }
    }
}

#[async_trait]
impl<W> FormatWriter for JsonArrayWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_batch(&mut self, docs: &[Document]) -> Result<usize> {
        for doc in docs {
            let json = self.sink.serialize(doc)?;
            let separator = if self.written == 0 { "[\n" } else { ",\n" };
            self.sink.write_text(separator).await?;
            self.sink.write_text(&json).await?;
            self.written += 1;
        }
        self.sink.flush().await?;
        debug!(
            "Wrote {} documents to JSON array (total: {})",
            docs.len(),
            self.written
        );
        Ok(docs.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        let closing = if self.written == 0 { "[]\n" } else { "\n]\n" };
        self.sink.write_text(closing).await?;
        self.sink.flush().await?;
        self.finalized = true;
        debug!("Finalized JSON array output ({} documents)", self.written);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.sink.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    async fn render(batches: Vec<Vec<Document>>) -> String {
        let mut out = Vec::new();
        let mut writer =
            JsonArrayWriter::new(&mut out, CharacterEncoding::Utf8, DocumentCodec::default());
        for batch in &batches {
            writer.write_batch(batch).await.unwrap();
        }
        writer.finalize().await.unwrap();
        writer.finalize().await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_array_writer_commas_across_batches() {
        let text = render(vec![
            vec![doc! { "a": 1 }, doc! { "a": 2 }],
            vec![],
            vec![doc! { "a": 3 }],
        ])
        .await;
        assert_eq!(text, "[\n{\"a\":1},\n{\"a\":2},\n{\"a\":3}\n]\n");

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_array_writer_empty() {
        assert_eq!(render(vec![]).await, "[]\n");
    }
}
