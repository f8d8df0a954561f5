//! Notation Readers
//!
//! A reader turns the payload of one notation tag (`!if`, `!try`, ...) into a
//! state. Readers are looked up by tag in a [`ReaderRegistry`]; untagged
//! nodes never reach the registry and are dispatched by shape instead.
//!
//! # Built-in Tags
//!
//! | Tag | Payload | Result |
//! |-----|---------|--------|
//! | `pass`, `fail`, `succeed` | name, nothing, or a mapping | state of that type |
//! | `state` | any state notation | the compiled state |
//! | `dupe`, `^` | shorthand | task with a freshly generated name |
//! | `parallel` | list of branches | `Parallel` state |
//! | `if` | `[[var, op, value], then, else?]` | `Choice` state |
//! | `try` | `[state, catchNext]` | state with a catch-all `Catch` |
//! | `retry` | `[state, max?, interval?, backoff?]` | state with a catch-all `Retry` |
//! | `next` | `[state, target]` | state forced to `Next: target` |
//! | `end` | state | state forced to `End: true` |
//! | `params`, `@` | path, mapping, or nothing | projecting `Pass` state |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::choices::build_choices;
use super::Compiler;
use crate::error::{CompileError, Result};
use crate::machine::{CatchClause, RetryClause, State, StateType, ALL_ERRORS};
use crate::notation::Node;

/// Name used in a catch `ResultPath` when the wrapped state has no name.
const UNNAMED_STATE: &str = "last";

/// Handler for one notation tag.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Compiles the tag's payload into a state.
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State>;
}

/// Dispatch table from tag name (without `!`) to reader.
#[derive(Clone)]
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn Reader>>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderRegistry {
    /// Creates a registry with every built-in reader.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_default_readers();
        registry
    }

    /// Creates a registry without any readers.
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Registers a reader, replacing any reader already bound to `tag`.
    pub fn register(&mut self, tag: &str, reader: impl Reader + 'static) {
        let tag = tag.trim_start_matches('!');
        if self.readers.insert(tag.to_string(), Arc::new(reader)).is_some() {
            debug!("Replaced reader for '!{}'", tag);
        }
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Reader>> {
        self.readers.get(tag).cloned()
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.readers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    fn register_default_readers(&mut self) {
        self.register("pass", TerminalReader(StateType::Pass));
        self.register("fail", TerminalReader(StateType::Fail));
        self.register("succeed", TerminalReader(StateType::Succeed));
        self.register("state", StateReader);
        self.register("dupe", DupeReader);
        self.register("^", DupeReader);
        self.register("parallel", ParallelReader);
        self.register("if", IfReader);
        self.register("try", TryReader);
        self.register("retry", RetryReader);
        self.register("next", NextReader);
        self.register("end", EndReader);
        self.register("params", ParamsReader);
        self.register("@", ParamsReader);
    }
}

/// `!pass`, `!fail` and `!succeed`.
pub struct TerminalReader(pub StateType);

#[async_trait]
impl Reader for TerminalReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        let entries = match input {
            Node::Null => Default::default(),
            Node::String(name) => [("Name".to_string(), Node::String(name))].into_iter().collect(),
            Node::Mapping(entries) => entries,
            other => {
                return Err(CompileError::syntax(format!(
                    "!{} expects a name or a mapping, found {}",
                    self.0.symbol_prefix(),
                    other.kind()
                )))
            }
        };
        compiler.translate(entries, Some(self.0)).await
    }
}

/// `!state`: explicit spelling of the untagged dispatch.
pub struct StateReader;

#[async_trait]
impl Reader for StateReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        compiler.state(input).await
    }
}

/// `!dupe` / `!^`.
pub struct DupeReader;

#[async_trait]
impl Reader for DupeReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        compiler.dupe(input).await
    }
}

/// `!parallel`.
pub struct ParallelReader;

#[async_trait]
impl Reader for ParallelReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        compiler.parallel(input).await
    }
}

/// `!if [[variable, operator, value], consequent, alternate?]`.
pub struct IfReader;

#[async_trait]
impl Reader for IfReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        let [condition, consequent, alternate] = positional::<3>("if", input, 2)?;

        let [variable, operator, value] = positional::<3>("if condition", condition, 3)?;
        let variable = expect_string("if", "variable", variable)?;
        let operator = expect_string("if", "operator", operator)?;
        let consequent = expect_string("if", "consequent", consequent)?;

        let consequent = compiler.short_name(&consequent, false);
        let choices = build_choices(&operator, &variable, value.into_json()?, &consequent)?;

        let mut state = State::named(compiler.gensym("choice"), StateType::Choice);
        state.choices = Some(choices);
        state.default = match alternate {
            Node::Null => None,
            other => {
                let alternate = expect_string("if", "alternate", other)?;
                Some(compiler.short_name(&alternate, false))
            }
        };
        Ok(state)
    }
}

/// `!try [state, catchNext]`.
pub struct TryReader;

#[async_trait]
impl Reader for TryReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        let [inner, catch_next] = positional::<2>("try", input, 2)?;
        let catch_next = expect_string("try", "catch target", catch_next)?;

        let mut state = compiler.state(inner).await?;
        let name = state.name.as_deref().unwrap_or(UNNAMED_STATE);

        state.catch = Some(vec![CatchClause {
            error_equals: vec![ALL_ERRORS.to_string()],
            result_path: Some(format!("$.{}-error", name)),
            next: compiler.short_name(&catch_next, false),
        }]);
        Ok(state)
    }
}

/// `!retry [state, maxAttempts = 3, intervalSeconds = 1, backoffRate = 1]`.
pub struct RetryReader;

const DEFAULT_MAX_ATTEMPTS: u64 = 3;
const DEFAULT_INTERVAL_SECONDS: u64 = 1;
const DEFAULT_BACKOFF_RATE: f64 = 1.0;

#[async_trait]
impl Reader for RetryReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        let [inner, max_attempts, interval, backoff] = positional::<4>("retry", input, 1)?;

        let max_attempts = optional_whole("max attempts", max_attempts, DEFAULT_MAX_ATTEMPTS)?;
        let max_attempts = u32::try_from(max_attempts).map_err(|_| {
            CompileError::syntax(format!("!retry max attempts {} is too large", max_attempts))
        })?;
        let interval = optional_whole("interval", interval, DEFAULT_INTERVAL_SECONDS)?;
        let backoff = match backoff {
            Node::Null => DEFAULT_BACKOFF_RATE,
            Node::Number(n) => n.as_f64().ok_or_else(|| {
                CompileError::syntax("!retry backoff rate must be a number")
            })?,
            other => {
                return Err(CompileError::syntax(format!(
                    "!retry backoff rate must be a number, found {}",
                    other.kind()
                )))
            }
        };

        let mut state = compiler.state(inner).await?;
        state.retry = Some(vec![RetryClause::all_errors(max_attempts, interval, backoff)]);
        Ok(state)
    }
}

/// `!next [state, target]`.
pub struct NextReader;

#[async_trait]
impl Reader for NextReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        let [inner, target] = positional::<2>("next", input, 2)?;
        let target = expect_string("next", "target", target)?;

        let mut state = compiler.state(inner).await?;
        state.force_next(target);
        Ok(state)
    }
}

/// `!end state`.
pub struct EndReader;

#[async_trait]
impl Reader for EndReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        let mut state = compiler.state(input).await?;
        state.force_end();
        Ok(state)
    }
}

/// `!params` / `!@`: a `Pass` state that only reshapes its input.
pub struct ParamsReader;

#[async_trait]
impl Reader for ParamsReader {
    async fn read(&self, compiler: &mut Compiler, input: Node) -> Result<State> {
        let mut state = State::named(compiler.gensym("pass"), StateType::Pass);
        match input {
            Node::String(path) => state.output_path = Some(path),
            Node::Null => state.parameters = Some(serde_json::json!({})),
            node @ Node::Mapping(_) => state.parameters = Some(node.into_json()?),
            other => {
                return Err(CompileError::syntax(format!(
                    "!params expects a path or a mapping, found {}",
                    other.kind()
                )))
            }
        }
        Ok(state)
    }
}

/// Destructures a reader's argument list into exactly `N` slots.
///
/// At least `required` arguments must be present; missing optional slots are
/// `Null`. A payload that is not a sequence counts as a single argument.
fn positional<const N: usize>(tag: &str, input: Node, required: usize) -> Result<[Node; N]> {
    let args = input.into_args();
    if args.len() < required || args.len() > N {
        return Err(CompileError::syntax(format!(
            "!{} expects {} to {} arguments, found {}",
            tag,
            required,
            N,
            args.len()
        )));
    }

    let mut args = args.into_iter();
    Ok(std::array::from_fn(|_| args.next().unwrap_or(Node::Null)))
}

fn expect_string(tag: &str, what: &str, node: Node) -> Result<String> {
    match node {
        Node::String(s) => Ok(s),
        other => Err(CompileError::syntax(format!(
            "!{} {} must be a string, found {}",
            tag,
            what,
            other.kind()
        ))),
    }
}

fn optional_whole(what: &str, node: Node, default: u64) -> Result<u64> {
    let whole = match &node {
        Node::Null => return Ok(default),
        Node::Number(n) => n.as_u64(),
        _ => None,
    };
    whole.ok_or_else(|| {
        CompileError::syntax(format!(
            "!retry {} must be a whole number, found {}",
            what,
            node.kind()
        ))
    })
}
