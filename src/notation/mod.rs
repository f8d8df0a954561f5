//! Notation Input Module
//!
//! Turns source text into notation nodes that the compiler's readers
//! dispatch on.
//!
//! # Structure
//!
//! - [`node`]: The closed node variant (scalars, sequences, mappings, tags)
//! - [`document`]: Multi-document and line-delimited framing

pub mod document;
pub mod node;

pub use document::{parse_documents, parse_line, LineSplitter};
pub use node::Node;
