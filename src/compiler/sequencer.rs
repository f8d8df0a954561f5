//! Branch Sequencer
//!
//! Assembles an ordered list of items into a [`Branch`], linking each state
//! to the one after it.
//!
//! # Linking Rules
//!
//! - The first item's name becomes `StartAt`
//! - A non-terminal state with neither `Next` nor `End` gets `Next` set to the
//!   following item's name
//! - The last state gets `End: true` under the same condition
//! - Anything written explicitly is left as authored

use futures::future::BoxFuture;
use indexmap::IndexMap;
use log::debug;

use super::Compiler;
use crate::error::{CompileError, Result};
use crate::machine::{Branch, State, StateType};
use crate::notation::Node;

impl Compiler {
    /// Compiles one item, or a sequence of items, into a branch.
    ///
    /// A mapping that already has `StartAt` is returned as is. Inside the
    /// sequence, a nested sequence becomes a `Parallel` state whose elements
    /// are each compiled as a branch.
    pub fn branch(&mut self, input: Node) -> BoxFuture<'_, Result<Branch>> {
        Box::pin(async move {
            if input.is_branch() {
                return serde_json::from_value(input.into_json()?)
                    .map_err(|e| CompileError::syntax(format!("invalid branch: {}", e)));
            }

            let items = input.into_args();
            if items.is_empty() {
                return Err(CompileError::syntax("a branch needs at least one state"));
            }

            let mut states: IndexMap<String, State> = IndexMap::new();
            let mut previous: Option<String> = None;

            for item in items {
                let mut state = match item {
                    Node::Sequence(_) => self.parallel(item).await?,
                    other => self.state(other).await?,
                };

                let name = match state.name.take() {
                    Some(name) => name,
                    None => self.gensym(&state.state_type.symbol_prefix()),
                };
                if states.contains_key(&name) {
                    return Err(CompileError::syntax(format!(
                        "duplicate state name '{}' in branch (repeat a step with !dupe)",
                        name
                    )));
                }

                if let Some(prev) = previous.as_ref().and_then(|p| states.get_mut(p)) {
                    link(prev, &name);
                }

                previous = Some(name.clone());
                states.insert(name, state);
            }

            if let Some(last) = previous.as_ref().and_then(|p| states.get_mut(p)) {
                if !last.is_terminal() && !last.has_transition() {
                    last.end = Some(true);
                }
            }

            let start_at = states.keys().next().cloned().unwrap_or_default();
            debug!("Assembled branch of {} state(s) starting at '{}'", states.len(), start_at);
            Ok(Branch { start_at, states })
        })
    }

    /// Compiles a `Parallel` state with one branch per element of `input`.
    pub fn parallel(&mut self, input: Node) -> BoxFuture<'_, Result<State>> {
        Box::pin(async move {
            let mut branches = Vec::new();
            for item in input.into_args() {
                branches.push(self.branch(item).await?);
            }
            if branches.is_empty() {
                return Err(CompileError::syntax("a parallel state needs at least one branch"));
            }

            let mut state = State::named(self.gensym("parallel"), StateType::Parallel);
            state.branches = Some(branches);
            Ok(state)
        })
    }
}

fn link(previous: &mut State, next: &str) {
    if !previous.is_terminal() && !previous.has_transition() {
        previous.next = Some(next.to_string());
    }
}
