//! State Machine Data Model
//!
//! Core data structures of a compiled state machine, serialized in the
//! execution engine's JSON schema.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "StartAt": "fetch",
//!   "States": {
//!     "fetch": { "Type": "Task", "Resource": "arn:fetch", "Next": "store" },
//!     "store": { "Type": "Task", "Resource": "arn:store", "End": true }
//!   }
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::choice::ChoiceClause;

/// Error name matching every failure in the execution engine.
pub const ALL_ERRORS: &str = "States.ALL";

/// The kind of a state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateType {
    #[default]
    Task,
    Pass,
    Fail,
    Succeed,
    Choice,
    Parallel,
    Wait,
}

impl StateType {
    /// Terminal types carry their own control flow and never get `Next`/`End`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StateType::Choice | StateType::Succeed | StateType::Fail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateType::Task => "Task",
            StateType::Pass => "Pass",
            StateType::Fail => "Fail",
            StateType::Succeed => "Succeed",
            StateType::Choice => "Choice",
            StateType::Parallel => "Parallel",
            StateType::Wait => "Wait",
        }
    }

    /// Prefix used when generating names for states of this type.
    pub fn symbol_prefix(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Task" => StateType::Task,
            "Pass" => StateType::Pass,
            "Fail" => StateType::Fail,
            "Succeed" => StateType::Succeed,
            "Choice" => StateType::Choice,
            "Parallel" => StateType::Parallel,
            "Wait" => StateType::Wait,
            other => return Err(format!("unknown state type '{}'", other)),
        })
    }
}

/// Retry policy attached to a state. Emitted as data only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct RetryClause {
    pub error_equals: Vec<String>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_interval_seconds() -> u64 {
    1
}

// Engine default for decoded clauses; `!retry` uses its own default of 1.0.
fn default_backoff_rate() -> f64 {
    2.0
}

impl RetryClause {
    /// A retry clause matching every error.
    pub fn all_errors(max_attempts: u32, interval_seconds: u64, backoff_rate: f64) -> Self {
        Self {
            error_equals: vec![ALL_ERRORS.to_string()],
            max_attempts,
            interval_seconds,
            backoff_rate,
        }
    }
}

/// Error handler attached to a state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CatchClause {
    pub error_equals: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,

    pub next: String,
}

/// One step of a compiled state machine.
///
/// The name is the state's key in its owning [`Branch`] and is therefore not
/// serialized as a field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct State {
    #[serde(skip)]
    pub name: Option<String>,

    #[serde(rename = "Type")]
    pub state_type: StateType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<Vec<RetryClause>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch: Option<Vec<CatchClause>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<Branch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<ChoiceClause>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl State {
    /// Creates an unnamed state of the given type.
    pub fn new(state_type: StateType) -> Self {
        Self {
            state_type,
            ..Self::default()
        }
    }

    /// Creates a named state of the given type.
    ///
    /// # Example
    ///
    /// ```
    /// use statecraft::machine::{State, StateType};
    ///
    /// let state = State::named("fetch", StateType::Task).with_resource("arn:fetch");
    /// assert_eq!(state.name.as_deref(), Some("fetch"));
    /// ```
    pub fn named(name: impl Into<String>, state_type: StateType) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(state_type)
        }
    }

    /// Sets the resource identifier.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets an explicit transition target.
    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state_type.is_terminal()
    }

    /// True once either `Next` or `End` has been set.
    pub fn has_transition(&self) -> bool {
        self.next.is_some() || self.end.is_some()
    }

    /// Forces the transition to `next`, discarding any `End` marker.
    pub fn force_next(&mut self, next: impl Into<String>) {
        self.next = Some(next.into());
        self.end = None;
    }

    /// Forces `End = true`, discarding any `Next` target.
    pub fn force_end(&mut self) {
        self.next = None;
        self.end = Some(true);
    }
}

/// A `{StartAt, States}` graph: a complete workflow or sub-workflow.
///
/// `States` keeps document order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Branch {
    pub start_at: String,
    pub states: IndexMap<String, State>,
}

impl Branch {
    /// Gets a state by name.
    pub fn get_state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// State names in document order.
    pub fn state_names(&self) -> Vec<&str> {
        self.states.keys().map(String::as_str).collect()
    }

    /// Returns the number of states in the branch.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if the branch has no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_types() {
        assert!(StateType::Choice.is_terminal());
        assert!(StateType::Succeed.is_terminal());
        assert!(StateType::Fail.is_terminal());
        assert!(!StateType::Task.is_terminal());
        assert!(!StateType::Parallel.is_terminal());
        assert!(!StateType::Wait.is_terminal());
    }

    #[test]
    fn test_state_type_parse() {
        assert_eq!("Parallel".parse::<StateType>().unwrap(), StateType::Parallel);
        assert!("Map".parse::<StateType>().is_err());
        assert_eq!(StateType::Choice.symbol_prefix(), "choice");
    }

    #[test]
    fn test_state_serializes_without_name() {
        let state = State::named("fetch", StateType::Task)
            .with_resource("arn:fetch")
            .with_next("store");

        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"Type": "Task", "Resource": "arn:fetch", "Next": "store"})
        );
    }

    #[test]
    fn test_force_transitions() {
        let mut state = State::named("a", StateType::Pass);
        state.end = Some(true);
        state.force_next("b");
        assert_eq!(state.next.as_deref(), Some("b"));
        assert!(state.end.is_none());

        state.force_end();
        assert!(state.next.is_none());
        assert_eq!(state.end, Some(true));
    }

    #[test]
    fn test_branch_round_trip_keeps_order() {
        let value = json!({
            "StartAt": "z",
            "States": {
                "z": {"Type": "Pass", "Next": "a"},
                "a": {"Type": "Succeed"}
            }
        });
        let branch: Branch = serde_json::from_value(value).unwrap();
        assert_eq!(branch.start_at, "z");
        assert_eq!(branch.state_names(), vec!["z", "a"]);
        assert_eq!(branch.get_state("a").unwrap().state_type, StateType::Succeed);
    }

    #[test]
    fn test_retry_defaults_when_decoding() {
        let retry: RetryClause =
            serde_json::from_value(json!({"ErrorEquals": ["Timeout"]})).unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.interval_seconds, 1);
        assert_eq!(retry.backoff_rate, 2.0);
    }

    #[test]
    fn test_catch_clause_serialization() {
        let catch = CatchClause {
            error_equals: vec![ALL_ERRORS.to_string()],
            result_path: Some("$.work-error".to_string()),
            next: "recover".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&catch).unwrap(),
            json!({"ErrorEquals": ["States.ALL"], "ResultPath": "$.work-error", "Next": "recover"})
        );
    }
}
