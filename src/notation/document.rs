//! Document Parsing
//!
//! Splits notation source into documents and converts each into a [`Node`].
//! Two framings are supported:
//!
//! - YAML multi-document source (`---` separated), used by `read_all`
//! - Line-delimited source, where every non-blank line is one document,
//!   used when compiling a stream of chunks

use log::debug;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use super::node::Node;
use crate::error::Result;

/// Parses every YAML document in `source`.
///
/// Empty documents are skipped.
pub fn parse_documents(source: &str) -> Result<Vec<Node>> {
    let mut documents = Vec::new();

    for document in serde_yaml::Deserializer::from_str(source) {
        let value = YamlValue::deserialize(document)?;
        if value.is_null() {
            debug!("Skipping empty document");
            continue;
        }
        documents.push(Node::from_yaml(value)?);
    }

    debug!("Parsed {} document(s) ({} bytes)", documents.len(), source.len());
    Ok(documents)
}

/// Parses a single line-framed document.
pub fn parse_line(line: &str) -> Result<Node> {
    let value: YamlValue = serde_yaml::from_str(line)?;
    Node::from_yaml(value)
}

/// Reassembles arbitrary text chunks into complete lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completed, without terminators.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(index) = self.pending.find('\n') {
            let mut line: String = self.pending.drain(..=index).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiple_documents() {
        let docs = parse_documents("arn:foo\n---\n- a\n- b\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], Node::from("arn:foo"));
        assert!(matches!(docs[1], Node::Sequence(ref items) if items.len() == 2));
    }

    #[test]
    fn test_parse_empty_source() {
        assert!(parse_documents("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(parse_documents("this is not valid yaml: [[[").is_err());
    }

    #[test]
    fn test_line_splitter_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push("arn:f").is_empty());
        assert_eq!(splitter.push("oo\narn:bar\r\n!pa"), vec!["arn:foo", "arn:bar"]);
        assert_eq!(splitter.push("ss done"), Vec::<String>::new());
        assert_eq!(splitter.finish(), Some("!pass done".to_string()));
    }

    #[test]
    fn test_line_splitter_empty_finish() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push("a\n"), vec!["a"]);
        assert_eq!(splitter.finish(), None);
    }
}
