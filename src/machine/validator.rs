//! State Machine Validation
//!
//! Structural checks for compiled branches:
//! - `StartAt` names an existing state
//! - Every `Next`, `Default` and `Catch` target names an existing state
//! - Non-terminal states carry exactly one of `Next`/`End`
//! - Nested `Parallel` branches satisfy the same rules
//!
//! The compiler does not run these checks itself; callers opt in.

use log::{debug, info};

use super::model::{Branch, State};
use crate::error::{CompileError, Result};

/// Structural problem types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureError {
    EmptyBranch,
    MissingStart(String),
    DanglingReference { state: String, reference: String },
    MissingTransition(String),
    ConflictingTransition(String),
}

impl std::fmt::Display for StructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBranch => write!(f, "Branch has no states"),
            Self::MissingStart(name) => write!(f, "StartAt references unknown state '{}'", name),
            Self::DanglingReference { state, reference } => {
                write!(f, "State '{}' references unknown state '{}'", state, reference)
            }
            Self::MissingTransition(state) => {
                write!(f, "State '{}' has neither Next nor End", state)
            }
            Self::ConflictingTransition(state) => {
                write!(f, "State '{}' has both Next and End", state)
            }
        }
    }
}

/// Collects the targets a state may transition to.
fn transition_targets(state: &State) -> Vec<&str> {
    let mut targets = Vec::new();

    if let Some(next) = &state.next {
        targets.push(next.as_str());
    }
    if let Some(default) = &state.default {
        targets.push(default.as_str());
    }
    for choice in state.choices.iter().flatten() {
        targets.push(choice.next.as_str());
    }
    for catch in state.catch.iter().flatten() {
        targets.push(catch.next.as_str());
    }

    targets
}

/// Returns every structural problem in a branch and its nested branches.
pub fn find_problems(branch: &Branch) -> Vec<StructureError> {
    let mut problems = Vec::new();

    if branch.is_empty() {
        problems.push(StructureError::EmptyBranch);
        return problems;
    }

    if !branch.states.contains_key(&branch.start_at) {
        problems.push(StructureError::MissingStart(branch.start_at.clone()));
    }

    for (name, state) in &branch.states {
        for target in transition_targets(state) {
            if !branch.states.contains_key(target) {
                problems.push(StructureError::DanglingReference {
                    state: name.clone(),
                    reference: target.to_string(),
                });
            }
        }

        if !state.is_terminal() {
            match (state.next.is_some(), state.end == Some(true)) {
                (false, false) => problems.push(StructureError::MissingTransition(name.clone())),
                (true, true) => problems.push(StructureError::ConflictingTransition(name.clone())),
                _ => {}
            }
        }

        for nested in state.branches.iter().flatten() {
            problems.extend(find_problems(nested));
        }
    }

    problems
}

/// Validates a compiled branch, failing with every problem found.
pub fn validate_branch(branch: &Branch) -> Result<()> {
    info!("Validating branch with {} states", branch.len());

    let problems = find_problems(branch);
    if !problems.is_empty() {
        return Err(CompileError::Structural(
            problems.iter().map(|p| p.to_string()).collect(),
        ));
    }

    debug!("Branch order: {:?}", branch.state_names());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::model::{CatchClause, StateType, ALL_ERRORS};
    use indexmap::IndexMap;

    fn branch(start: &str, states: Vec<State>) -> Branch {
        let mut map = IndexMap::new();
        for state in states {
            map.insert(state.name.clone().unwrap(), state);
        }
        Branch {
            start_at: start.to_string(),
            states: map,
        }
    }

    fn end(mut state: State) -> State {
        state.end = Some(true);
        state
    }

    #[test]
    fn test_valid_branch() {
        let b = branch(
            "a",
            vec![
                State::named("a", StateType::Task).with_resource("a").with_next("b"),
                end(State::named("b", StateType::Pass)),
            ],
        );
        assert!(validate_branch(&b).is_ok());
    }

    #[test]
    fn test_empty_branch() {
        let b = Branch::default();
        assert_eq!(find_problems(&b), vec![StructureError::EmptyBranch]);
    }

    #[test]
    fn test_missing_start() {
        let b = branch("ghost", vec![end(State::named("a", StateType::Pass))]);
        assert!(find_problems(&b).contains(&StructureError::MissingStart("ghost".to_string())));
    }

    #[test]
    fn test_dangling_next_and_catch() {
        let mut a = State::named("a", StateType::Task).with_next("b");
        a.catch = Some(vec![CatchClause {
            error_equals: vec![ALL_ERRORS.to_string()],
            result_path: None,
            next: "recover".to_string(),
        }]);
        let b = branch("a", vec![a]);

        let problems = find_problems(&b);
        assert_eq!(problems.len(), 2);

        let result = validate_branch(&b);
        match result {
            Err(CompileError::Structural(messages)) => {
                assert!(messages.iter().any(|m| m.contains("'recover'")));
            }
            other => panic!("expected structural error, got {:?}", other),
        }
    }

    #[test]
    fn test_transition_rules() {
        let mut both = State::named("both", StateType::Pass).with_next("none");
        both.end = Some(true);
        let b = branch(
            "both",
            vec![both, State::named("none", StateType::Pass), State::named("done", StateType::Succeed)],
        );

        let problems = find_problems(&b);
        assert!(problems.contains(&StructureError::ConflictingTransition("both".to_string())));
        assert!(problems.contains(&StructureError::MissingTransition("none".to_string())));
        assert!(!problems.iter().any(|p| p.to_string().contains("'done'")));
    }

    #[test]
    fn test_nested_branches_are_checked() {
        let inner = branch("x", vec![State::named("x", StateType::Pass).with_next("y")]);
        let mut parallel = end(State::named("p", StateType::Parallel));
        parallel.branches = Some(vec![inner]);
        let b = branch("p", vec![parallel]);

        let problems = find_problems(&b);
        assert!(problems.contains(&StructureError::DanglingReference {
            state: "x".to_string(),
            reference: "y".to_string(),
        }));
    }

    #[test]
    fn test_structure_error_display() {
        let err = StructureError::EmptyBranch;
        assert_eq!(err.to_string(), "Branch has no states");

        let err = StructureError::MissingTransition("s".to_string());
        assert!(err.to_string().contains("'s'"));
    }
}
