//! Statecraft - Shorthand State Machine Compiler
//!
//! Compiles a compact, tagged YAML notation into complete state-machine
//! definitions for a workflow execution engine. Authors write bare resource
//! references, short lists and minimal maps; the compiler fills in names,
//! types, `Next`/`End` transitions, parallel branches and choice rules.
//!
//! # Architecture
//!
//! The library is organized into five modules:
//!
//! - [`notation`]: Source text to notation nodes
//! - [`compiler`]: Readers, key normalization, defaulting and sequencing
//! - [`machine`]: Output data model and structural validation
//! - [`driver`]: Whole-document and line-streaming entry points
//! - [`error`]: The crate error type
//!
//! # Example
//!
//! ```rust,no_run
//! use statecraft::{read_all, Compiler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = "- arn:aws:lambda:fetch\n- !try [arn:aws:lambda:store, arn:aws:lambda:alert]\n";
//!
//!     let mut compiler = Compiler::new();
//!     let machine = read_all(&mut compiler, source).await?;
//!
//!     println!("{}", serde_json::to_string_pretty(&machine)?);
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod driver;
pub mod error;
pub mod machine;
pub mod notation;

// Re-export commonly used types
pub use compiler::{Compiler, MapResolver, ResourceResolver};
pub use driver::{read_all, read_stream, read_to_stream};
pub use error::{CompileError, Result};
pub use machine::{Branch, State, StateType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Statecraft";
