//! Document sources for the `profile` subcommand (§4.5): an in-memory
//! vector (used by tests and small inputs) or a line-delimited NDJSON
//! stream read incrementally off any `AsyncBufRead`.

use crate::error::Error;
use serde_json::Value;
use tokio::io::{AsyncBufRead, Lines};

pub enum DocumentSource<R> {
    Vec(std::vec::IntoIter<Value>),
    Ndjson(Lines<R>),
}

impl<R: AsyncBufRead + Unpin> DocumentSource<R> {
    pub fn ndjson(reader: R) -> Self {
        use tokio::io::AsyncBufReadExt;
        DocumentSource::Ndjson(reader.lines())
    }

    /// Reads the next document, skipping blank lines, or `None` at
    /// end-of-stream.
    pub async fn next_doc(&mut self) -> Result<Option<Value>, Error> {
        match self {
            DocumentSource::Vec(items) => Ok(items.next()),
            DocumentSource::Ndjson(lines) => loop {
                match lines.next_line().await? {
                    None => return Ok(None),
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => {
                        return serde_json::from_str(&line)
                            .map(Some)
                            .map_err(Error::from)
                    }
                },
            },
        }
    }
}

impl<R> DocumentSource<R> {
    pub fn from_vec(items: Vec<Value>) -> Self {
        DocumentSource::Vec(items.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn vec_source_yields_items_in_order() {
        let mut source: DocumentSource<BufReader<&[u8]>> =
            DocumentSource::from_vec(vec![json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(source.next_doc().await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(source.next_doc().await.unwrap(), Some(json!({"a": 2})));
        assert_eq!(source.next_doc().await.unwrap(), None);
    }

    #[tokio::test]
    async fn ndjson_source_skips_blank_lines() {
        let text = "{\"a\":1}\n\n{\"a\":2}\n";
        let reader = BufReader::new(text.as_bytes());
        let mut source = DocumentSource::ndjson(reader);
        assert_eq!(source.next_doc().await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(source.next_doc().await.unwrap(), Some(json!({"a": 2})));
        assert_eq!(source.next_doc().await.unwrap(), None);
    }
}
