//! Statement-level code tree.
//!
//! Statements are opaque beyond three shapes: a plain statement, a nested
//! block, and a guarded (try-shaped) block with optional handlers and an
//! optional cleanup body. Equality is structural; plain statement text is
//! whitespace-normalized on construction so that formatting never affects
//! identity.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

const INDENT: &str = "    ";

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn normalize(code: &str) -> String {
    whitespace().replace_all(code.trim(), " ").into_owned()
}

fn normalized_code<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize(&raw))
}

/// Exception handler attached to a guarded block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handler {
    pub exception: String,
    pub binding: String,
    #[serde(default)]
    pub body: Vec<Statement>,
}

/// One node of a method body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Plain {
        #[serde(deserialize_with = "normalized_code")]
        code: String,
    },
    Block {
        #[serde(default)]
        statements: Vec<Statement>,
    },
    Guarded {
        #[serde(default)]
        body: Vec<Statement>,
        #[serde(default)]
        handlers: Vec<Handler>,
        #[serde(default)]
        cleanup: Option<Vec<Statement>>,
    },
}

/// Which child sequence of a statement a path step descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Contents of a plain block.
    Block,
    /// Primary body of a guarded block.
    Primary,
    /// Cleanup body of a guarded block.
    Cleanup,
}

/// One step of a path from a top-level sequence to a nested sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    pub index: usize,
    pub slot: Slot,
}

impl Statement {
    pub fn plain(code: impl AsRef<str>) -> Self {
        Statement::Plain {
            code: normalize(code.as_ref()),
        }
    }

    pub fn block(statements: Vec<Statement>) -> Self {
        Statement::Block { statements }
    }

    /// Wrap `body` in a guard that swallows every `exception`.
    pub fn suppressing(body: Vec<Statement>, exception: &str) -> Self {
        Statement::Guarded {
            body,
            handlers: vec![Handler {
                exception: exception.to_string(),
                binding: "ex".to_string(),
                body: Vec::new(),
            }],
            cleanup: None,
        }
    }

    /// A call statement, optionally through a freshly constructed receiver.
    pub fn call(new_receiver: Option<&str>, method: &str) -> Self {
        match new_receiver {
            Some(class) => Statement::plain(format!("new {class}().{method}();")),
            None => Statement::plain(format!("{method}();")),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Statement::Block { .. })
    }

    pub fn slot(&self, slot: Slot) -> Option<&Vec<Statement>> {
        match (self, slot) {
            (Statement::Block { statements }, Slot::Block) => Some(statements),
            (Statement::Guarded { body, .. }, Slot::Primary) => Some(body),
            (Statement::Guarded { cleanup, .. }, Slot::Cleanup) => cleanup.as_ref(),
            _ => None,
        }
    }

    pub fn slot_mut(&mut self, slot: Slot) -> Option<&mut Vec<Statement>> {
        match (self, slot) {
            (Statement::Block { statements }, Slot::Block) => Some(statements),
            (Statement::Guarded { body, .. }, Slot::Primary) => Some(body),
            (Statement::Guarded { cleanup, .. }, Slot::Cleanup) => cleanup.as_mut(),
            _ => None,
        }
    }

    /// Append this statement's source lines at `depth`.
    pub fn render_into(&self, depth: usize, out: &mut Vec<String>) {
        let pad = INDENT.repeat(depth);
        match self {
            Statement::Plain { code } => out.push(format!("{pad}{code}")),
            Statement::Block { statements } => {
                out.push(format!("{pad}{{"));
                render_all(statements, depth + 1, out);
                out.push(format!("{pad}}}"));
            }
            Statement::Guarded {
                body,
                handlers,
                cleanup,
            } => {
                out.push(format!("{pad}try {{"));
                render_all(body, depth + 1, out);
                for handler in handlers {
                    out.push(format!(
                        "{pad}}} catch ({} {}) {{",
                        handler.exception, handler.binding
                    ));
                    render_all(&handler.body, depth + 1, out);
                }
                if let Some(cleanup) = cleanup {
                    out.push(format!("{pad}}} finally {{"));
                    render_all(cleanup, depth + 1, out);
                }
                out.push(format!("{pad}}}"));
            }
        }
    }
}

fn render_all(statements: &[Statement], depth: usize, out: &mut Vec<String>) {
    for statement in statements {
        statement.render_into(depth, out);
    }
}

/// Render `statements` as a braced block, one line per entry.
pub fn render_block(statements: &[Statement], depth: usize) -> Vec<String> {
    let mut out = Vec::new();
    Statement::block(statements.to_vec()).render_into(depth, &mut out);
    out
}

/// Statement count used in reports: a guarded block counts its primary body.
pub fn statements_size(statements: &[Statement]) -> usize {
    statements
        .iter()
        .map(|s| match s {
            Statement::Guarded { body, .. } => body.len(),
            _ => 1,
        })
        .sum()
}

/// Follow `path` from `root` to a nested sequence.
pub fn resolve<'a>(root: &'a [Statement], path: &[Step]) -> Option<&'a [Statement]> {
    let mut current = root;
    for step in path {
        current = current.get(step.index)?.slot(step.slot)?.as_slice();
    }
    Some(current)
}

/// Mutable variant of [`resolve`].
pub fn resolve_mut<'a>(root: &'a mut Vec<Statement>, path: &[Step]) -> Option<&'a mut Vec<Statement>> {
    let mut current = root;
    for step in path {
        current = current.get_mut(step.index)?.slot_mut(step.slot)?;
    }
    Some(current)
}

/// Remove one occurrence of each `targets` statement from `body`.
///
/// Matching is by structural identity, one target per matching statement,
/// and only at the top level of `body`.
pub fn strip(body: &[Statement], targets: &[Statement]) -> Vec<Statement> {
    let mut remaining = targets.to_vec();
    let mut kept = Vec::with_capacity(body.len());
    for statement in body {
        match remaining.iter().position(|t| t == statement) {
            Some(pos) => {
                remaining.remove(pos);
            }
            None => kept.push(statement.clone()),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_is_whitespace_normalized() {
        assert_eq!(Statement::plain("  x =\n   1;  "), Statement::plain("x = 1;"));
        assert_ne!(Statement::plain("x = 1;"), Statement::plain("x = 2;"));
    }

    #[test]
    fn test_deserialize_normalizes_code() {
        let json = r#"{"kind":"plain","code":"foo(   a,\n b);"}"#;
        let stmt: Statement = serde_json::from_str(json).expect("deserialize");
        assert_eq!(stmt, Statement::plain("foo( a, b);"));
    }

    #[test]
    fn test_render_guarded_with_handler_and_cleanup() {
        let stmt = Statement::Guarded {
            body: vec![Statement::plain("a();")],
            handlers: vec![Handler {
                exception: "Throwable".into(),
                binding: "ex".into(),
                body: vec![],
            }],
            cleanup: Some(vec![Statement::plain("b();")]),
        };
        let mut out = Vec::new();
        stmt.render_into(0, &mut out);
        assert_eq!(
            out,
            vec![
                "try {",
                "    a();",
                "} catch (Throwable ex) {",
                "} finally {",
                "    b();",
                "}",
            ]
        );
    }

    #[test]
    fn test_render_block_nests() {
        let lines = render_block(
            &[Statement::plain("a();"), Statement::block(vec![Statement::plain("b();")])],
            0,
        );
        assert_eq!(lines, vec!["{", "    a();", "    {", "        b();", "    }", "}"]);
    }

    #[test]
    fn test_statements_size_counts_guarded_body() {
        let stmts = vec![
            Statement::plain("a();"),
            Statement::suppressing(
                vec![Statement::plain("b();"), Statement::plain("c();")],
                "Throwable",
            ),
            Statement::block(vec![Statement::plain("d();"), Statement::plain("e();")]),
        ];
        assert_eq!(statements_size(&stmts), 4);
    }

    #[test]
    fn test_resolve_mut_reaches_nested_slot() {
        let mut stmts = vec![
            Statement::plain("a();"),
            Statement::block(vec![Statement::suppressing(
                vec![Statement::plain("b();")],
                "Throwable",
            )]),
        ];
        let path = [
            Step { index: 1, slot: Slot::Block },
            Step { index: 0, slot: Slot::Primary },
        ];
        let inner = resolve_mut(&mut stmts, &path).expect("path resolves");
        inner.push(Statement::plain("c();"));
        assert_eq!(resolve(&stmts, &path).map(|s| s.len()), Some(2));
        assert!(resolve(&stmts, &[Step { index: 0, slot: Slot::Block }]).is_none());
    }

    #[test]
    fn test_strip_removes_one_occurrence_per_target() {
        let a = Statement::plain("a();");
        let b = Statement::plain("b();");
        let body = vec![a.clone(), b.clone(), a.clone()];
        assert_eq!(strip(&body, &[a.clone()]), vec![b.clone(), a.clone()]);
        assert_eq!(strip(&body, &[Statement::plain("z();")]), body);
    }

    #[test]
    fn test_call_rendering() {
        assert_eq!(
            Statement::call(Some("FooTest"), "polluterHelper"),
            Statement::plain("new FooTest().polluterHelper();")
        );
        assert_eq!(Statement::call(None, "setUp"), Statement::plain("setUp();"));
    }
}
