//! Notation Compiler
//!
//! Expands shorthand notation into complete state-machine definitions.
//!
//! # Structure
//!
//! - [`symbols`]: Unique name allocation
//! - [`properties`]: Key normalization, defaulting and field decoding
//! - [`choices`]: Comparison expansion into typed choice rules
//! - [`resolver`]: Pluggable lookup of short resource references
//! - [`readers`]: Tag dispatch and the built-in readers
//! - [`sequencer`]: Branch assembly with implicit `Next`/`End` linking
//!
//! All mutable compilation state (symbol counters, the short-name cache)
//! lives in one [`Compiler`] value that is borrowed mutably for the whole
//! compilation, so independent compilations never interfere.

pub mod choices;
pub mod properties;
pub mod readers;
pub mod resolver;
pub mod sequencer;
pub mod symbols;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use log::debug;

use crate::error::{CompileError, Result};
use crate::machine::{Branch, State, StateType};
use crate::notation::Node;

pub use readers::{Reader, ReaderRegistry};
pub use resolver::{IdentityResolver, MapResolver, ResolveError, ResourceResolver};
pub use symbols::SymbolGenerator;

/// `OutputPath` of a submachine wrapper: the last output of its only branch.
pub const SUBMACHINE_OUTPUT_PATH: &str = "$.0[-1:]";

/// Separator between namespace segments of a resource reference.
const NAMESPACE_SEPARATOR: char = ':';

/// The compilation context threaded through every reader.
///
/// # Example
///
/// ```rust,no_run
/// use statecraft::compiler::{Compiler, MapResolver};
/// use statecraft::notation::Node;
///
/// # async fn demo() -> statecraft::error::Result<()> {
/// let mut resolver = MapResolver::new();
/// resolver.insert("fetch", serde_json::json!("arn:aws:lambda:us-east-1:1:function:fetch"));
///
/// let mut compiler = Compiler::new().with_resolver(resolver);
/// let branch = compiler
///     .branch(Node::Sequence(vec![Node::from("fetch"), Node::from("arn:store")]))
///     .await?;
/// assert_eq!(branch.start_at, "fetch");
/// # Ok(())
/// # }
/// ```
pub struct Compiler {
    symbols: SymbolGenerator,
    short_names: HashMap<String, String>,
    resolver: Arc<dyn ResourceResolver>,
    registry: ReaderRegistry,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Creates a compiler with the built-in readers and no resolver.
    pub fn new() -> Self {
        Self {
            symbols: SymbolGenerator::new(),
            short_names: HashMap::new(),
            resolver: Arc::new(IdentityResolver),
            registry: ReaderRegistry::new(),
        }
    }

    /// Sets the resolver consulted for shorthand references.
    pub fn with_resolver(mut self, resolver: impl ResourceResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Sets a shared resolver.
    pub fn with_shared_resolver(mut self, resolver: Arc<dyn ResourceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Registers (or replaces) the reader for a notation tag.
    pub fn with_reader(mut self, tag: &str, reader: impl Reader + 'static) -> Self {
        self.registry.register(tag, reader);
        self
    }

    /// Starts from an existing symbol generator.
    pub fn with_symbols(mut self, symbols: SymbolGenerator) -> Self {
        self.symbols = symbols;
        self
    }

    /// Allocates a fresh unique name derived from `prefix`.
    pub fn gensym(&mut self, prefix: &str) -> String {
        self.symbols.next(prefix)
    }

    /// Returns the state name used for a resource reference.
    ///
    /// A namespaced reference (`arn:...:fetch`) is named after its last
    /// segment, cached per full reference. Plain references are their own
    /// name, so a target written ahead of its state still matches it. With
    /// `generate_new` a fresh symbol is always allocated.
    pub fn short_name(&mut self, reference: &str, generate_new: bool) -> String {
        let last_segment = reference
            .rsplit(NAMESPACE_SEPARATOR)
            .next()
            .unwrap_or(reference);

        if generate_new {
            return self.gensym(last_segment);
        }
        if !reference.contains(NAMESPACE_SEPARATOR) {
            return reference.to_string();
        }
        if let Some(name) = self.short_names.get(reference) {
            return name.clone();
        }

        debug!("Naming '{}' as '{}'", reference, last_segment);
        self.short_names
            .insert(reference.to_string(), last_segment.to_string());
        last_segment.to_string()
    }

    /// Resolves a reference through the resolver, falling back to the
    /// reference itself when it is unresolved.
    pub async fn resolve(&self, reference: &str) -> Result<Node> {
        let resolved = self
            .resolver
            .resolve(reference)
            .await
            .map_err(|e| CompileError::Resolution {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        Ok(match resolved {
            Some(value) => {
                debug!("Resolved '{}' -> {}", reference, value);
                Node::from_json(value)
            }
            None => Node::from(reference),
        })
    }

    /// Compiles one node into a state.
    ///
    /// Tagged nodes go to their reader, strings and sequences are shorthand
    /// tasks, and mappings are explicit states.
    pub fn state(&mut self, node: Node) -> BoxFuture<'_, Result<State>> {
        self.state_with(node, false)
    }

    /// Like [`Compiler::state`], but shorthand tasks always get a fresh name.
    pub fn dupe(&mut self, node: Node) -> BoxFuture<'_, Result<State>> {
        self.state_with(node, true)
    }

    fn state_with(&mut self, node: Node, generate_new: bool) -> BoxFuture<'_, Result<State>> {
        Box::pin(async move {
            match node {
                Node::Tagged(tag, payload) => {
                    let reader = self.registry.get(&tag).ok_or_else(|| {
                        CompileError::syntax(format!("unknown notation tag '!{}'", tag))
                    })?;
                    debug!("Dispatching '!{}' reader", tag);
                    reader.read(self, *payload).await
                }
                node @ (Node::String(_) | Node::Sequence(_)) => {
                    self.shorthand(node, generate_new).await
                }
                Node::Mapping(entries) => self.translate(entries, None).await,
                other => Err(CompileError::syntax(format!(
                    "invalid state object: expected string, sequence or mapping, found {}",
                    other.kind()
                ))),
            }
        })
    }

    /// Expands a shorthand task reference.
    ///
    /// A string is resolved first. The (resolved) value then selects the
    /// layout:
    /// - a machine (`StartAt` present) becomes a submachine `Parallel` state
    /// - a single value is the `Resource`
    /// - `[Parameters-map, Resource, ResultPath?]`
    /// - `[$.input-path, Resource, ResultPath?]`
    /// - `[Resource, ResultPath?]`
    pub async fn shorthand(&mut self, node: Node, generate_new: bool) -> Result<State> {
        let resolved = match &node {
            Node::String(reference) => self.resolve(reference).await?,
            _ => node.clone(),
        };

        if resolved.is_branch() {
            let reference = node.as_str().unwrap_or_default().to_string();
            return self.submachine(&reference, resolved);
        }

        let mut items = match resolved {
            Node::Sequence(items) => items,
            single => return self.task(single, None, None, None, generate_new),
        };

        if items.is_empty() {
            return Err(CompileError::syntax("shorthand task list is empty"));
        }
        if items.len() == 1 {
            return self.task(items.remove(0), None, None, None, generate_new);
        }
        if items.len() > 3 {
            return Err(CompileError::syntax(format!(
                "shorthand task takes at most 3 elements, found {}",
                items.len()
            )));
        }

        let mut items = items.into_iter();
        let first = items.next().unwrap_or(Node::Null);
        let second = items.next().unwrap_or(Node::Null);
        let third = items.next().unwrap_or(Node::Null);

        match first {
            Node::Mapping(_) => {
                let parameters = first.into_json()?;
                self.task(second, Some(parameters), None, optional_path(third)?, generate_new)
            }
            Node::String(ref path) if path.starts_with('$') => {
                let input_path = path.clone();
                self.task(second, None, Some(input_path), optional_path(third)?, generate_new)
            }
            _ => {
                if !third.is_null() {
                    return Err(CompileError::syntax(
                        "shorthand task without parameters or input path takes at most 2 elements",
                    ));
                }
                self.task(first, None, None, optional_path(second)?, generate_new)
            }
        }
    }

    fn task(
        &mut self,
        resource: Node,
        parameters: Option<serde_json::Value>,
        input_path: Option<String>,
        result_path: Option<String>,
        generate_new: bool,
    ) -> Result<State> {
        let resource = match resource {
            Node::String(resource) => resource,
            other => {
                return Err(CompileError::syntax(format!(
                    "task resource must be a string, found {}",
                    other.kind()
                )))
            }
        };

        let name = self.short_name(&resource, generate_new);
        Ok(State {
            parameters,
            input_path,
            result_path,
            ..State::named(name, StateType::Task).with_resource(resource)
        })
    }

    fn submachine(&mut self, reference: &str, machine: Node) -> Result<State> {
        let machine: Branch = serde_json::from_value(machine.into_json()?).map_err(|e| {
            CompileError::syntax(format!("invalid machine for '{}': {}", reference, e))
        })?;

        let mut state = State::named(self.gensym(reference), StateType::Parallel);
        state.branches = Some(vec![machine]);
        state.output_path = Some(SUBMACHINE_OUTPUT_PATH.to_string());
        Ok(state)
    }

    /// Compiles an explicit state mapping: normalize keys, apply defaults,
    /// decode fields and compile nested `Branches`.
    ///
    /// `forced_type` overrides whatever type the mapping declares.
    pub async fn translate(
        &mut self,
        entries: IndexMap<String, Node>,
        forced_type: Option<StateType>,
    ) -> Result<State> {
        let mut props = properties::normalize_keys(entries);
        if let Some(state_type) = forced_type {
            props.insert("Type", Node::from(state_type.as_str()));
        }
        properties::apply_defaults(&mut props, &mut self.symbols)?;

        let (mut state, branches) = properties::decode_state(props)?;
        if let Some(branches) = branches {
            let mut compiled = Vec::new();
            for item in branches.into_args() {
                compiled.push(self.branch(item).await?);
            }
            state.branches = Some(compiled);
        }
        Ok(state)
    }
}

fn optional_path(node: Node) -> Result<Option<String>> {
    match node {
        Node::Null => Ok(None),
        Node::String(path) => Ok(Some(path)),
        other => Err(CompileError::syntax(format!(
            "result path must be a string, found {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingResolver;

    #[async_trait::async_trait]
    impl ResourceResolver for FailingResolver {
        async fn resolve(&self, _reference: &str) -> std::result::Result<Option<serde_json::Value>, ResolveError> {
            Err("registry offline".into())
        }
    }

    #[test]
    fn test_short_name_caches_namespaced_references() {
        let mut compiler = Compiler::new();
        assert_eq!(compiler.short_name("arn:aws:fetch", false), "fetch");
        assert_eq!(compiler.short_name("arn:aws:fetch", false), "fetch");
        assert_eq!(compiler.short_name("plain", false), "plain");
    }

    #[test]
    fn test_short_name_is_last_segment_for_every_namespace() {
        let mut compiler = Compiler::new();
        assert_eq!(compiler.short_name("done", false), "done");
        assert_eq!(compiler.short_name("arn:a:done", false), "done");
        assert_eq!(compiler.short_name("arn:b:done", false), "done");
    }

    #[test]
    fn test_short_name_generate_new() {
        let mut compiler = Compiler::new();
        let first = compiler.short_name("arn:aws:fetch", true);
        let second = compiler.short_name("arn:aws:fetch", true);
        assert_eq!(first, "fetch_0");
        assert_eq!(second, "fetch_1");
    }

    #[test]
    fn test_with_symbols_continues_counters() {
        let mut symbols = SymbolGenerator::new();
        symbols.next("choice");
        let mut compiler = Compiler::new().with_symbols(symbols);
        assert_eq!(compiler.gensym("choice"), "choice_1");
    }

    #[tokio::test]
    async fn test_shorthand_single_resource() {
        let mut compiler = Compiler::new();
        let state = compiler.state(Node::from("arn:foo")).await.unwrap();

        assert_eq!(state.name.as_deref(), Some("foo"));
        assert_eq!(state.state_type, StateType::Task);
        assert_eq!(state.resource.as_deref(), Some("arn:foo"));
    }

    #[tokio::test]
    async fn test_shorthand_positional_layouts() {
        let mut compiler = Compiler::new();

        let state = compiler
            .state(Node::Sequence(vec![Node::from("arn:only")]))
            .await
            .unwrap();
        assert_eq!(state.resource.as_deref(), Some("arn:only"));

        let state = compiler
            .state(Node::Sequence(vec![
                Node::from_json(json!({"id.$": "$.id"})),
                Node::from("arn:fetch"),
                Node::from("$.fetched"),
            ]))
            .await
            .unwrap();
        assert_eq!(state.parameters, Some(json!({"id.$": "$.id"})));
        assert_eq!(state.resource.as_deref(), Some("arn:fetch"));
        assert_eq!(state.result_path.as_deref(), Some("$.fetched"));

        let state = compiler
            .state(Node::Sequence(vec![Node::from("$.input"), Node::from("arn:store")]))
            .await
            .unwrap();
        assert_eq!(state.input_path.as_deref(), Some("$.input"));
        assert_eq!(state.resource.as_deref(), Some("arn:store"));
        assert!(state.result_path.is_none());

        let state = compiler
            .state(Node::Sequence(vec![Node::from("arn:notify"), Node::from("$.sent")]))
            .await
            .unwrap();
        assert_eq!(state.resource.as_deref(), Some("arn:notify"));
        assert_eq!(state.result_path.as_deref(), Some("$.sent"));
        assert!(state.parameters.is_none() && state.input_path.is_none());
    }

    #[tokio::test]
    async fn test_shorthand_uses_resolver() {
        let mut resolver = MapResolver::new();
        resolver.insert("fetch", json!("arn:aws:lambda:fetch-v2"));
        resolver.insert("store", json!(["$.payload", "arn:aws:lambda:store", "$.stored"]));
        let mut compiler = Compiler::new().with_resolver(resolver);

        let state = compiler.state(Node::from("fetch")).await.unwrap();
        assert_eq!(state.name.as_deref(), Some("fetch-v2"));
        assert_eq!(state.resource.as_deref(), Some("arn:aws:lambda:fetch-v2"));

        let state = compiler.state(Node::from("store")).await.unwrap();
        assert_eq!(state.input_path.as_deref(), Some("$.payload"));
        assert_eq!(state.result_path.as_deref(), Some("$.stored"));
    }

    #[tokio::test]
    async fn test_shorthand_submachine() {
        let mut resolver = MapResolver::new();
        resolver.insert(
            "audit",
            json!({"StartAt": "log", "States": {"log": {"Type": "Pass", "End": true}}}),
        );
        let mut compiler = Compiler::new().with_resolver(resolver);

        let state = compiler.state(Node::from("audit")).await.unwrap();
        assert_eq!(state.name.as_deref(), Some("audit_0"));
        assert_eq!(state.state_type, StateType::Parallel);
        assert_eq!(state.output_path.as_deref(), Some(SUBMACHINE_OUTPUT_PATH));

        let branches = state.branches.unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].start_at, "log");
    }

    #[tokio::test]
    async fn test_resolver_failure_aborts() {
        let mut compiler = Compiler::new().with_resolver(FailingResolver);
        let result = compiler.state(Node::from("fetch")).await;

        match result {
            Err(CompileError::Resolution { reference, message }) => {
                assert_eq!(reference, "fetch");
                assert!(message.contains("offline"));
            }
            other => panic!("expected resolution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_shapes_are_syntax_errors() {
        let mut compiler = Compiler::new();
        assert!(matches!(
            compiler.state(Node::Bool(true)).await,
            Err(CompileError::Syntax(_))
        ));
        assert!(matches!(
            compiler.state(Node::Sequence(vec![])).await,
            Err(CompileError::Syntax(_))
        ));
        assert!(matches!(
            compiler.state(Node::tagged("teleport", Node::Null)).await,
            Err(CompileError::Syntax(_))
        ));

        let overlong = Node::from_json(json!(["$.in", "arn:fn:work", "$.out", "$.extra"]));
        assert!(matches!(
            compiler.shorthand(overlong, false).await,
            Err(CompileError::Syntax(_))
        ));
        let two_without_input = Node::from_json(json!(["arn:fn:work", "$.out", "$.extra"]));
        assert!(matches!(
            compiler.shorthand(two_without_input, false).await,
            Err(CompileError::Syntax(_))
        ));
    }

    #[tokio::test]
    async fn test_explicit_mapping_state() {
        let mut compiler = Compiler::new();
        let node = Node::from_json(json!({"n": "notify", "res": "arn:sns:notify", "timeout": 30}));
        let state = compiler.state(node).await.unwrap();

        assert_eq!(state.name.as_deref(), Some("notify"));
        assert_eq!(state.state_type, StateType::Task);
        assert_eq!(state.resource.as_deref(), Some("arn:sns:notify"));
        assert_eq!(state.timeout_seconds, Some(30));
    }

    #[tokio::test]
    async fn test_explicit_mapping_compiles_branches() {
        let mut compiler = Compiler::new();
        let node = Node::from_json(json!({
            "Type": "Parallel",
            "Branches": [["arn:a", "arn:b"], "arn:c"]
        }));
        let state = compiler.state(node).await.unwrap();

        assert_eq!(state.name.as_deref(), Some("parallel_0"));
        let branches = state.branches.unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].state_names(), vec!["a", "b"]);
        assert_eq!(branches[1].start_at, "c");
    }
}
