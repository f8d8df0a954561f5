//! State Machine Module
//!
//! Output data structures for compiled state machines and the optional
//! structural validator.
//!
//! # Structure
//!
//! - [`model`]: States, branches, retry and catch clauses
//! - [`choice`]: Typed choice predicates and clauses
//! - [`validator`]: Reference integrity checking

pub mod choice;
pub mod model;
pub mod validator;

pub use choice::{ChoiceClause, Comparison, Predicate, TypePrefix};
pub use model::{Branch, CatchClause, RetryClause, State, StateType, ALL_ERRORS};
pub use validator::validate_branch;
