//! Notation Nodes
//!
//! The closed set of shapes a reader can receive. Source documents are
//! tokenized by `serde_yaml`; its value tree is converted into [`Node`] so that
//! readers dispatch on a small, explicit variant instead of the tokenizer's
//! own representation.
//!
//! # Example Notation
//!
//! ```yaml
//! - arn:aws:lambda:us-east-1:123:function:fetch
//! - !retry [arn:aws:lambda:us-east-1:123:function:store, 5]
//! - !if [[$.status, "str=", ok], done, failed]
//! ```

use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};
use serde_yaml::Value as YamlValue;

use crate::error::{CompileError, Result};

/// One node of a notation document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Node>),
    Mapping(IndexMap<String, Node>),
    /// A node carrying an explicit notation tag (stored without the leading `!`).
    Tagged(String, Box<Node>),
}

impl Node {
    /// Wraps a payload in a notation tag.
    pub fn tagged(tag: impl Into<String>, payload: Node) -> Self {
        Node::Tagged(tag.into(), Box::new(payload))
    }

    /// Converts a `serde_yaml` value tree into a notation node.
    pub fn from_yaml(value: YamlValue) -> Result<Self> {
        Ok(match value {
            YamlValue::Null => Node::Null,
            YamlValue::Bool(b) => Node::Bool(b),
            YamlValue::Number(n) => Node::Number(yaml_number(&n)?),
            YamlValue::String(s) => Node::String(s),
            YamlValue::Sequence(items) => Node::Sequence(
                items
                    .into_iter()
                    .map(Node::from_yaml)
                    .collect::<Result<Vec<_>>>()?,
            ),
            YamlValue::Mapping(mapping) => {
                let mut entries = IndexMap::with_capacity(mapping.len());
                for (key, value) in mapping {
                    entries.insert(yaml_key(key)?, Node::from_yaml(value)?);
                }
                Node::Mapping(entries)
            }
            YamlValue::Tagged(tagged) => {
                let serde_yaml::value::TaggedValue { tag, value } = *tagged;
                let name = tag.to_string();
                let name = name.trim_start_matches('!').to_string();
                Node::tagged(name, Node::from_yaml(value)?)
            }
        })
    }

    /// Converts plain JSON data (e.g. a resolver answer) into a node.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Node::Null,
            JsonValue::Bool(b) => Node::Bool(b),
            JsonValue::Number(n) => Node::Number(n),
            JsonValue::String(s) => Node::String(s),
            JsonValue::Array(items) => {
                Node::Sequence(items.into_iter().map(Node::from_json).collect())
            }
            JsonValue::Object(map) => Node::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, Node::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts the node into plain JSON data.
    ///
    /// Fails if a notation tag appears anywhere inside, since tags only have
    /// meaning in state positions.
    pub fn into_json(self) -> Result<JsonValue> {
        Ok(match self {
            Node::Null => JsonValue::Null,
            Node::Bool(b) => JsonValue::Bool(b),
            Node::Number(n) => JsonValue::Number(n),
            Node::String(s) => JsonValue::String(s),
            Node::Sequence(items) => JsonValue::Array(
                items
                    .into_iter()
                    .map(Node::into_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Node::Mapping(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key, value.into_json()?);
                }
                JsonValue::Object(map)
            }
            Node::Tagged(tag, _) => {
                return Err(CompileError::syntax(format!(
                    "tag '!{}' is not allowed inside data",
                    tag
                )))
            }
        })
    }

    /// Returns the string content of a string node.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// True for a mapping that already is a compiled branch (`StartAt` present).
    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Mapping(entries) if entries.contains_key("StartAt"))
    }

    /// Spreads a reader payload into positional arguments.
    ///
    /// A sequence yields its elements, null yields nothing, and any other
    /// node is a single argument.
    pub fn into_args(self) -> Vec<Node> {
        match self {
            Node::Sequence(items) => items,
            Node::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// Short description of the node's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
            Node::Tagged(..) => "tagged node",
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::String(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Sequence(items)
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Result<Number> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Number::from(u));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .ok_or_else(|| CompileError::syntax(format!("number '{}' is not finite", n)))
}

fn yaml_key(key: YamlValue) -> Result<String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        other => Err(CompileError::syntax(format!(
            "mapping keys must be scalars, found {:?}",
            other
        ))),
    }
}
