//! Symbol Generation
//!
//! Deterministic unique names keyed by prefix: `task_0`, `task_1`,
//! `choice_0`, ... Each compilation owns its own generator, so independent
//! compilations never share counters.

use std::collections::HashMap;

use log::debug;

/// Prefix used when a symbol is requested with an empty key.
const FALLBACK_PREFIX: &str = "sym";

/// Allocates `<prefix>_<n>` names with one counter per prefix.
#[derive(Debug, Clone, Default)]
pub struct SymbolGenerator {
    counters: HashMap<String, usize>,
}

impl SymbolGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused name for `prefix`.
    ///
    /// # Example
    ///
    /// ```
    /// use statecraft::compiler::SymbolGenerator;
    ///
    /// let mut symbols = SymbolGenerator::new();
    /// assert_eq!(symbols.next("task"), "task_0");
    /// assert_eq!(symbols.next("task"), "task_1");
    /// assert_eq!(symbols.next(""), "sym_0");
    /// ```
    pub fn next(&mut self, prefix: &str) -> String {
        let prefix = if prefix.is_empty() { FALLBACK_PREFIX } else { prefix };
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let symbol = format!("{}_{}", prefix, counter);
        *counter += 1;

        debug!("Allocated symbol '{}'", symbol);
        symbol
    }
}
