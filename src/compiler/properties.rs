//! State Properties
//!
//! Turns a loosely written mapping into a fully-formed [`State`]:
//!
//! 1. Key normalization: abbreviated or mis-cased keys are matched to
//!    canonical field names (`n` → `Name`, `res` → `Resource`, `rp` → `Retry`)
//! 2. Defaulting: missing `Type`, `Name` and `Resource` are filled in
//! 3. Decoding: each canonical field is checked and converted to its typed form
//!
//! Key matching is a best-effort heuristic, not a guaranteed-unambiguous
//! parse. Authors who need a specific field can always spell it out.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::symbols::SymbolGenerator;
use crate::error::{CompileError, Result};
use crate::machine::{State, StateType};
use crate::notation::Node;

/// Canonical state fields, in priority order.
///
/// When a key shares an equally long prefix with several names, the one
/// listed first wins, so `n` resolves to `Name` rather than `Next`.
pub const CANONICAL_PROPERTIES: &[&str] = &[
    "Type",
    "InputPath",
    "OutputPath",
    "Resource",
    "Result",
    "ResultPath",
    "Retry",
    "Parameters",
    "Name",
    "Next",
    "End",
    "Branches",
    "Catch",
    "Choices",
    "Default",
    "TimeoutSeconds",
    "HeartbeatSeconds",
    "Seconds",
    "SecondsPath",
    "Timestamp",
    "TimestampPath",
    "Cause",
    "Error",
    "Comment",
];

/// A mapping whose keys are canonical property names.
pub type Properties = IndexMap<&'static str, Node>;

/// Finds the candidate sharing the longest case-insensitive prefix with `key`.
///
/// An exact case-insensitive match wins outright. Ties go to the earlier
/// candidate. Returns `None` when no candidate shares even one character.
///
/// # Example
///
/// ```
/// use statecraft::compiler::properties::{find_best_match, CANONICAL_PROPERTIES};
///
/// assert_eq!(find_best_match("n", CANONICAL_PROPERTIES), Some("Name"));
/// assert_eq!(find_best_match("resultpath", CANONICAL_PROPERTIES), Some("ResultPath"));
/// assert_eq!(find_best_match("zzz", CANONICAL_PROPERTIES), None);
/// ```
pub fn find_best_match(key: &str, candidates: &[&'static str]) -> Option<&'static str> {
    let key = key.to_lowercase();
    let mut best: Option<(&'static str, usize)> = None;

    for &candidate in candidates {
        let lowered = candidate.to_lowercase();
        if lowered == key {
            return Some(candidate);
        }

        let shared = key
            .chars()
            .zip(lowered.chars())
            .take_while(|(a, b)| a == b)
            .count();

        if shared > 0 && best.map_or(true, |(_, length)| shared > length) {
            best = Some((candidate, shared));
        }
    }

    best.map(|(candidate, _)| candidate)
}

/// Renames every key of `entries` to its canonical property name.
///
/// Unmatched keys are dropped. Exactly spelled keys take precedence over
/// abbreviations that land on the same property. Afterwards a `Result`
/// holding a `$.` path becomes `ResultPath`, and a `Resource` holding a
/// literal value becomes `Result`.
pub fn normalize_keys(entries: IndexMap<String, Node>) -> Properties {
    let mut properties = Properties::new();
    let mut exact: Vec<&'static str> = Vec::new();

    for (key, value) in entries {
        let Some(canonical) = find_best_match(&key, CANONICAL_PROPERTIES) else {
            warn!("Dropping unrecognized property '{}'", key);
            continue;
        };

        let is_exact = canonical.eq_ignore_ascii_case(&key);
        if properties.contains_key(canonical) {
            if exact.contains(&canonical) && !is_exact {
                warn!("Ignoring '{}': '{}' is already set", key, canonical);
                continue;
            }
            warn!("Property '{}' overrides an earlier '{}'", key, canonical);
        }
        if is_exact {
            exact.push(canonical);
        }
        if key != canonical {
            debug!("Normalized property '{}' -> '{}'", key, canonical);
        }
        properties.insert(canonical, value);
    }

    fix_result_fields(&mut properties);
    properties
}

fn fix_result_fields(properties: &mut Properties) {
    let result_is_path = matches!(
        properties.get("Result"),
        Some(Node::String(s)) if s.starts_with("$.")
    );
    if result_is_path {
        if let Some(path) = properties.shift_remove("Result") {
            properties.insert("ResultPath", path);
        }
    }

    let resource_is_literal = matches!(
        properties.get("Resource"),
        Some(node) if node.as_str().is_none() && !node.is_null()
    );
    if resource_is_literal {
        if let Some(literal) = properties.shift_remove("Resource") {
            properties.insert("Result", literal);
        }
    }
}

/// Fills in `Type`, `Name` and `Resource` where the author left them out.
///
/// - `Type` defaults to `Task`
/// - a `Task` uses its own `Name` as its resource reference
/// - a missing `Name` is generated from the lower-cased type
/// - an untyped state with no `Name` to resolve becomes a `Pass`, even when
///   it carries a `Resource`
///
/// Explicitly written fields are never replaced.
pub fn apply_defaults(properties: &mut Properties, symbols: &mut SymbolGenerator) -> Result<()> {
    let explicit_type = match properties.get("Type") {
        Some(node) if !node.is_null() => Some(parse_type(node)?),
        _ => None,
    };
    let mut state_type = explicit_type.unwrap_or_default();

    let name = optional_string(properties, "Name")?;
    let derived_resource = match state_type {
        StateType::Task => name.clone(),
        _ => None,
    };
    let has_resource = match state_type {
        StateType::Task => derived_resource.is_some(),
        _ => optional_string(properties, "Resource")?.is_some(),
    };

    let name = match name {
        Some(name) => name,
        None => symbols.next(&state_type.symbol_prefix()),
    };

    if !has_resource && explicit_type.is_none() {
        state_type = StateType::Pass;
    }

    properties.insert("Name", Node::String(name));
    properties.insert("Type", Node::from(state_type.as_str()));
    if let Some(resource) = derived_resource {
        properties
            .entry("Resource")
            .or_insert(Node::String(resource));
    }
    Ok(())
}

/// Converts canonical properties into a typed state.
///
/// `Branches` are returned untouched so the caller can compile them as
/// nested branches. Null-valued properties are treated as absent.
pub fn decode_state(properties: Properties) -> Result<(State, Option<Node>)> {
    let mut state = State::default();
    let mut branches = None;

    for (key, node) in properties {
        if node.is_null() {
            continue;
        }
        match key {
            "Type" => state.state_type = parse_type(&node)?,
            "Name" => state.name = Some(expect_string(key, node)?),
            "Comment" => state.comment = Some(expect_string(key, node)?),
            "Resource" => state.resource = Some(expect_string(key, node)?),
            "InputPath" => state.input_path = Some(expect_string(key, node)?),
            "OutputPath" => state.output_path = Some(expect_string(key, node)?),
            "ResultPath" => state.result_path = Some(expect_string(key, node)?),
            "Next" => state.next = Some(expect_string(key, node)?),
            "Default" => state.default = Some(expect_string(key, node)?),
            "SecondsPath" => state.seconds_path = Some(expect_string(key, node)?),
            "Timestamp" => state.timestamp = Some(expect_string(key, node)?),
            "TimestampPath" => state.timestamp_path = Some(expect_string(key, node)?),
            "Cause" => state.cause = Some(expect_string(key, node)?),
            "Error" => state.error = Some(expect_string(key, node)?),
            "Parameters" => state.parameters = Some(node.into_json()?),
            "Result" => state.result = Some(node.into_json()?),
            "End" => state.end = Some(expect_bool(key, node)?),
            "TimeoutSeconds" => state.timeout_seconds = Some(expect_seconds(key, node)?),
            "HeartbeatSeconds" => state.heartbeat_seconds = Some(expect_seconds(key, node)?),
            "Seconds" => state.seconds = Some(expect_seconds(key, node)?),
            "Retry" => state.retry = Some(decode_clauses(key, node)?),
            "Catch" => state.catch = Some(decode_clauses(key, node)?),
            "Choices" => state.choices = Some(decode_clauses(key, node)?),
            "Branches" => branches = Some(node),
            other => debug!("Ignoring property '{}'", other),
        }
    }

    Ok((state, branches))
}

fn parse_type(node: &Node) -> Result<StateType> {
    let name = node
        .as_str()
        .ok_or_else(|| CompileError::syntax(format!("'Type' must be a string, found {}", node.kind())))?;
    name.parse().map_err(CompileError::Syntax)
}

fn optional_string(properties: &Properties, key: &str) -> Result<Option<String>> {
    match properties.get(key) {
        None | Some(Node::Null) => Ok(None),
        Some(node) => expect_string(key, node.clone()).map(Some),
    }
}

fn expect_string(key: &str, node: Node) -> Result<String> {
    match node {
        Node::String(s) => Ok(s),
        other => Err(CompileError::syntax(format!(
            "'{}' must be a string, found {}",
            key,
            other.kind()
        ))),
    }
}

fn expect_bool(key: &str, node: Node) -> Result<bool> {
    match node {
        Node::Bool(b) => Ok(b),
        other => Err(CompileError::syntax(format!(
            "'{}' must be a boolean, found {}",
            key,
            other.kind()
        ))),
    }
}

fn expect_seconds(key: &str, node: Node) -> Result<u64> {
    match &node {
        Node::Number(n) => n.as_u64(),
        _ => None,
    }
    .ok_or_else(|| {
        CompileError::syntax(format!(
            "'{}' must be a whole number of seconds, found {}",
            key,
            node.kind()
        ))
    })
}

/// Decodes a clause list; a single clause may be written without the list.
fn decode_clauses<T: DeserializeOwned>(key: &str, node: Node) -> Result<Vec<T>> {
    let value = match node.into_json()? {
        Value::Array(items) => Value::Array(items),
        single => Value::Array(vec![single]),
    };
    serde_json::from_value(value)
        .map_err(|e| CompileError::syntax(format!("invalid '{}' clause: {}", key, e)))
}
