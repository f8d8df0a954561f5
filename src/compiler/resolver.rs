//! Resource Resolution
//!
//! A resolver maps a short reference written in the notation (`fetch`,
//! `billing:charge`) to the value it stands for: a concrete resource
//! identifier, a positional shorthand list, or a whole compiled machine that
//! is then embedded as a submachine.
//!
//! Resolvers may be asynchronous. Answering `Ok(None)` means "unresolved":
//! the reference is used as written. Answering `Err` aborts the document.

use std::collections::HashMap;
use std::error::Error;
use std::fs;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

/// Error type resolvers may fail with.
pub type ResolveError = Box<dyn Error + Send + Sync>;

/// Looks up short references during compilation.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// Resolves `reference`, or returns `Ok(None)` to leave it as written.
    async fn resolve(&self, reference: &str) -> Result<Option<Value>, ResolveError>;
}

/// Resolver that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

#[async_trait]
impl ResourceResolver for IdentityResolver {
    async fn resolve(&self, _reference: &str) -> Result<Option<Value>, ResolveError> {
        Ok(None)
    }
}

/// Resolver backed by an in-memory table.
///
/// # Example YAML Format
///
/// ```yaml
/// fetch: arn:aws:lambda:us-east-1:123456789012:function:fetch
/// store: [$.payload, arn:aws:lambda:us-east-1:123456789012:function:store, $.stored]
/// audit:
///   StartAt: log
///   States:
///     log: { Type: Pass, End: true }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    entries: HashMap<String, Value>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a resolution.
    pub fn insert(&mut self, reference: impl Into<String>, value: Value) {
        self.entries.insert(reference.into(), value);
    }

    /// Builds a resolver from a YAML (or JSON) mapping.
    pub fn from_yaml_str(source: &str) -> Result<Self, Box<dyn Error>> {
        let entries: HashMap<String, Value> = serde_yaml::from_str(source)
            .map_err(|e| format!("Failed to parse resource table: {}", e))?;
        debug!("Loaded {} resource resolutions", entries.len());
        Ok(Self { entries })
    }

    /// Loads a resolver from a YAML (or JSON) file.
    pub fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        info!("Loading resource table from: {}", path);

        let content = fs::read_to_string(path).map_err(|e| {
            format!(
                "Failed to read resource table '{}': {}. Check that the file exists and is readable.",
                path, e
            )
        })?;

        Self::from_yaml_str(&content)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResourceResolver for MapResolver {
    async fn resolve(&self, reference: &str) -> Result<Option<Value>, ResolveError> {
        Ok(self.entries.get(reference).cloned())
    }
}
