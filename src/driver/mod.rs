//! Driving Surface
//!
//! Entry points that take source text and produce compiled machines.
//!
//! # Structure
//!
//! - [`read_all`]: One materialized branch from a (multi-document) source
//! - [`stream`]: Line-delimited compilation of a chunk stream, one JSON
//!   document per input line

pub mod stream;

use log::{debug, info};

use crate::compiler::Compiler;
use crate::error::{CompileError, Result};
use crate::machine::Branch;
use crate::notation::{parse_documents, Node};

pub use stream::{read_stream, read_to_stream};

/// Compiles every document of `source` into one branch.
///
/// # Example
///
/// ```rust,no_run
/// use statecraft::compiler::Compiler;
/// use statecraft::driver::read_all;
///
/// # async fn demo() -> statecraft::error::Result<()> {
/// let mut compiler = Compiler::new();
/// let branch = read_all(&mut compiler, "[arn:foo, arn:bar]").await?;
/// assert_eq!(branch.start_at, "foo");
/// # Ok(())
/// # }
/// ```
pub async fn read_all(compiler: &mut Compiler, source: &str) -> Result<Branch> {
    let documents = parse_documents(source)?;
    info!("Compiling {} document(s)", documents.len());
    read_documents(compiler, documents).await
}

/// Compiles already-parsed documents into one branch.
///
/// An untagged top-level sequence contributes its elements as items; any
/// other document is a single item. A lone item that is already a branch is
/// returned unchanged.
pub async fn read_documents(compiler: &mut Compiler, documents: Vec<Node>) -> Result<Branch> {
    let mut items = Vec::new();
    for document in documents {
        match document {
            Node::Sequence(elements) => items.extend(elements),
            other => items.push(other),
        }
    }

    if items.is_empty() {
        return Err(CompileError::syntax("no states to compile"));
    }
    debug!("Sequencing {} top-level item(s)", items.len());

    if items.len() == 1 && items[0].is_branch() {
        return compiler.branch(items.remove(0)).await;
    }
    compiler.branch(Node::Sequence(items)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::MapResolver;
    use crate::machine::{validate_branch, StateType};
    use serde_json::json;

    #[tokio::test]
    async fn test_read_all_yaml_sequence() {
        let mut compiler = Compiler::new();
        let branch = read_all(&mut compiler, "- arn:foo\n- arn:bar\n").await.unwrap();

        assert_eq!(branch.start_at, "foo");
        assert_eq!(branch.get_state("foo").unwrap().next.as_deref(), Some("bar"));
        assert_eq!(branch.get_state("bar").unwrap().end, Some(true));
    }

    #[tokio::test]
    async fn test_read_all_flattens_documents() {
        let mut compiler = Compiler::new();
        let source = "- arn:a\n---\narn:b\n---\n- arn:c\n";
        let branch = read_all(&mut compiler, source).await.unwrap();
        assert_eq!(branch.state_names(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_read_all_tagged_notation() {
        let mut compiler = Compiler::new();
        let source = r#"
- !try [arn:fn:charge, arn:fn:refund]
- !if [[$.total, ">", 100], arn:fn:review, arn:fn:ship]
- arn:fn:review
- !next [arn:fn:ship, done]
- arn:fn:refund
- !succeed done
"#;
        let branch = read_all(&mut compiler, source).await.unwrap();

        assert_eq!(
            branch.state_names(),
            vec!["charge", "choice_0", "review", "ship", "refund", "done"]
        );
        assert_eq!(branch.get_state("choice_0").unwrap().state_type, StateType::Choice);
        assert_eq!(branch.get_state("review").unwrap().next.as_deref(), Some("ship"));
        assert_eq!(branch.get_state("ship").unwrap().next.as_deref(), Some("done"));
        assert!(validate_branch(&branch).is_ok());
    }

    #[tokio::test]
    async fn test_read_all_parallel_end_to_end() {
        let mut compiler = Compiler::new();
        let branch = read_all(&mut compiler, r#"[["arn:a", "arn:b"]]"#).await.unwrap();

        assert_eq!(
            serde_json::to_value(&branch).unwrap(),
            json!({
                "StartAt": "parallel_0",
                "States": {
                    "parallel_0": {
                        "Type": "Parallel",
                        "End": true,
                        "Branches": [
                            {"StartAt": "a", "States": {"a": {"Type": "Task", "Resource": "arn:a", "End": true}}},
                            {"StartAt": "b", "States": {"b": {"Type": "Task", "Resource": "arn:b", "End": true}}}
                        ]
                    }
                }
            })
        );
    }

    #[tokio::test]
    async fn test_read_all_branch_passthrough() {
        let mut compiler = Compiler::new();
        let source = "StartAt: x\nStates:\n  x: {Type: Succeed}\n";
        let branch = read_all(&mut compiler, source).await.unwrap();
        assert_eq!(branch.start_at, "x");
        assert_eq!(branch.len(), 1);
    }

    #[tokio::test]
    async fn test_read_all_with_submachine() {
        let mut resolver = MapResolver::new();
        resolver.insert(
            "audit",
            json!({"StartAt": "log", "States": {"log": {"Type": "Pass", "End": true}}}),
        );
        let mut compiler = Compiler::new().with_resolver(resolver);

        let branch = read_all(&mut compiler, "[arn:fn:load, audit]").await.unwrap();
        let wrapper = branch.get_state("audit_0").unwrap();
        assert_eq!(wrapper.state_type, StateType::Parallel);
        assert_eq!(wrapper.end, Some(true));
        assert_eq!(branch.get_state("load").unwrap().next.as_deref(), Some("audit_0"));
    }

    #[tokio::test]
    async fn test_targets_written_before_their_state() {
        let mut compiler = Compiler::new();
        let source = "- !if [[$.x, \"=\", 1], done]\n- arn:x:work\n- arn:x:done\n";
        let branch = read_all(&mut compiler, source).await.unwrap();

        assert_eq!(branch.state_names(), vec!["choice_0", "work", "done"]);
        assert!(validate_branch(&branch).is_ok());

        let mut compiler = Compiler::new();
        let source = "- !try [arn:x:charge, refund]\n- arn:x:refund\n";
        let branch = read_all(&mut compiler, source).await.unwrap();

        let charge = branch.get_state("charge").unwrap();
        assert_eq!(charge.catch.as_ref().unwrap()[0].next, "refund");
        assert_eq!(branch.state_names(), vec!["charge", "refund"]);
        assert!(validate_branch(&branch).is_ok());
    }

    #[tokio::test]
    async fn test_embedded_machines_keep_authored_order() {
        let mut compiler = Compiler::new();
        let source = "StartAt: z\nStates:\n  z: {Type: Pass, Next: a}\n  a: {Type: Succeed}\n";
        let branch = read_all(&mut compiler, source).await.unwrap();
        assert_eq!(branch.state_names(), vec!["z", "a"]);
        assert!(validate_branch(&branch).is_ok());

        let mut resolver = MapResolver::new();
        resolver.insert(
            "audit",
            json!({
                "StartAt": "zeta",
                "States": {
                    "zeta": {"Type": "Pass", "Next": "alpha"},
                    "alpha": {"Type": "Pass", "End": true}
                }
            }),
        );
        let mut compiler = Compiler::new().with_resolver(resolver);
        let branch = read_all(&mut compiler, "[audit, !params {zulu: 1, alpha: 2}]")
            .await
            .unwrap();
        assert!(validate_branch(&branch).is_ok());

        let wrapper = branch.get_state("audit_0").unwrap();
        let inner = &wrapper.branches.as_ref().unwrap()[0];
        assert_eq!(inner.state_names(), vec!["zeta", "alpha"]);

        let params = branch.get_state("pass_0").unwrap().parameters.as_ref().unwrap();
        let keys: Vec<&String> = params.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zulu", "alpha"]);
    }

    #[tokio::test]
    async fn test_read_all_errors() {
        let mut compiler = Compiler::new();
        assert!(matches!(read_all(&mut compiler, "").await, Err(CompileError::Syntax(_))));
        assert!(matches!(read_all(&mut compiler, "- [unclosed").await, Err(CompileError::Yaml(_))));
        assert!(matches!(read_all(&mut compiler, "- 42\n").await, Err(CompileError::Syntax(_))));
    }

    #[tokio::test]
    async fn test_independent_compilers_do_not_share_symbols() {
        let mut first = Compiler::new();
        let mut second = Compiler::new();
        let a = read_all(&mut first, "- !pass\n").await.unwrap();
        let b = read_all(&mut second, "- !pass\n").await.unwrap();
        assert_eq!(a.start_at, b.start_at);
    }
}
