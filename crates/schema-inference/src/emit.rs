//! Output framing (§6): NDJSON (one compact document per line) or a single
//! JSON array, written incrementally to any `AsyncWrite` so the pipeline
//! never holds the whole output in memory.

use crate::error::Error;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmitFormat {
    Ndjson,
    JsonArray,
}

pub struct Emitter<W> {
    writer: W,
    format: EmitFormat,
    wrote_any: bool,
}

impl<W: AsyncWrite + Unpin> Emitter<W> {
    pub fn new(writer: W, format: EmitFormat) -> Self {
        Emitter {
            writer,
            format,
            wrote_any: false,
        }
    }

    pub async fn start(&mut self) -> Result<(), Error> {
        if self.format == EmitFormat::JsonArray {
            self.writer.write_all(b"[\n").await?;
        }
        Ok(())
    }

    pub async fn write_doc(&mut self, value: &Value) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;
        match self.format {
            EmitFormat::Ndjson => {
                self.writer.write_all(&bytes).await?;
                self.writer.write_all(b"\n").await?;
            }
            EmitFormat::JsonArray => {
                if self.wrote_any {
                    self.writer.write_all(b",\n").await?;
                }
                self.writer.write_all(&bytes).await?;
            }
        }
        self.wrote_any = true;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<W, Error> {
        if self.format == EmitFormat::JsonArray {
            self.writer.write_all(b"\n]\n").await?;
        }
        self.writer.flush().await?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ndjson_frames_one_document_per_line() {
        let mut emitter = Emitter::new(Vec::new(), EmitFormat::Ndjson);
        emitter.start().await.unwrap();
        emitter.write_doc(&json!({"a": 1})).await.unwrap();
        emitter.write_doc(&json!({"a": 2})).await.unwrap();
        let out = emitter.finish().await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[tokio::test]
    async fn json_array_wraps_and_separates_with_commas() {
        let mut emitter = Emitter::new(Vec::new(), EmitFormat::JsonArray);
        emitter.start().await.unwrap();
        emitter.write_doc(&json!({"a": 1})).await.unwrap();
        emitter.write_doc(&json!({"a": 2})).await.unwrap();
        let out = emitter.finish().await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "[\n{\"a\":1},\n{\"a\":2}\n]\n");
    }

    #[tokio::test]
    async fn empty_json_array_is_brackets_with_a_blank_line() {
        let mut emitter = Emitter::new(Vec::new(), EmitFormat::JsonArray);
        emitter.start().await.unwrap();
        let out = emitter.finish().await.unwrap();
        assert_eq!(out, b"[\n\n]\n");
    }
}
