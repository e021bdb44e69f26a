//! Statement-set minimization over the statement tree.
//!
//! One pass is: top-level [`ddmin`], then recursive refinement of every
//! nested block and guard (each validated against the whole top-level
//! sequence), then unraveling of top-level blocks into their parent. Passes
//! repeat until a pass leaves the sequence unchanged.

use futures::future::BoxFuture;
use tracing::debug;

use crate::ddmin::{ddmin, Validity};
use crate::probe::BlockProbe;
use crate::statement::{resolve, resolve_mut, Slot, Statement, Step};

/// Minimize `statements` to a fixpoint under `validity`.
pub async fn minimize<V>(statements: Vec<Statement>, validity: &mut V) -> Vec<Statement>
where
    V: Validity<Statement> + ?Sized,
{
    let mut current = statements;
    let mut pass = 0usize;
    loop {
        pass += 1;
        let previous = current.clone();

        let mut reduced = ddmin(current, 2, validity).await;
        refine(&mut reduced, Vec::new(), validity).await;
        current = unravel(reduced, validity).await;

        debug!(pass, size = current.len(), "minimization pass");
        if current == previous {
            return current;
        }
    }
}

/// Reduce the sequence at `path` in place.
async fn minimize_slot<V>(root: &mut Vec<Statement>, path: &[Step], validity: &mut V)
where
    V: Validity<Statement> + ?Sized,
{
    let Some(items) = resolve(root, path).map(<[Statement]>::to_vec) else {
        return;
    };
    let reduced = {
        let mut block = BlockProbe::new(&mut *validity, root.clone(), path.to_vec());
        ddmin(items, 2, &mut block).await
    };
    if let Some(slot) = resolve_mut(root, path) {
        *slot = reduced;
    }
}

fn child(path: &[Step], index: usize, slot: Slot) -> Vec<Step> {
    let mut child = path.to_vec();
    child.push(Step { index, slot });
    child
}

/// Recursively minimize every nested sequence under `path`.
fn refine<'a, V>(
    root: &'a mut Vec<Statement>,
    path: Vec<Step>,
    validity: &'a mut V,
) -> BoxFuture<'a, ()>
where
    V: Validity<Statement> + ?Sized,
{
    Box::pin(async move {
        let len = resolve(root, &path).map_or(0, <[Statement]>::len);
        for index in 0..len {
            let Some(statement) = resolve(root, &path).and_then(|s| s.get(index)).cloned() else {
                continue;
            };
            match statement {
                Statement::Block { .. } => {
                    let inner = child(&path, index, Slot::Block);
                    minimize_slot(root, &inner, validity).await;
                    refine(root, inner, validity).await;
                }
                Statement::Guarded { cleanup, .. } => {
                    let primary = child(&path, index, Slot::Primary);
                    minimize_slot(root, &primary, validity).await;
                    refine(root, primary, validity).await;

                    if cleanup.is_some() {
                        let cleanup = child(&path, index, Slot::Cleanup);
                        minimize_slot(root, &cleanup, validity).await;
                        refine(root, cleanup.clone(), validity).await;
                        drop_empty_cleanup(root, &path, index);
                    }

                    try_collapse_guard(root, &path, index, validity).await;
                }
                Statement::Plain { .. } => {}
            }
        }
    })
}

fn drop_empty_cleanup(root: &mut Vec<Statement>, path: &[Step], index: usize) {
    if let Some(Statement::Guarded { cleanup, .. }) =
        resolve_mut(root, path).and_then(|s| s.get_mut(index))
    {
        if cleanup.as_ref().is_some_and(Vec::is_empty) {
            *cleanup = None;
        }
    }
}

/// Replace a cleanup-less guard with a plain block of its primary body,
/// keeping the change only if the whole sequence stays valid.
async fn try_collapse_guard<V>(root: &mut Vec<Statement>, path: &[Step], index: usize, validity: &mut V)
where
    V: Validity<Statement> + ?Sized,
{
    let Some(slot) = resolve_mut(root, path) else {
        return;
    };
    let original = match slot.get(index) {
        Some(guard @ Statement::Guarded { cleanup: None, .. }) => guard.clone(),
        _ => return,
    };
    let Statement::Guarded { body, .. } = &original else {
        return;
    };
    slot[index] = Statement::block(body.clone());

    if !validity.valid(root.as_slice()).await {
        if let Some(slot) = resolve_mut(root, path) {
            slot[index] = original;
        }
    }
}

/// Splice top-level blocks into their parent where that stays valid.
/// Empty blocks are dropped outright.
async fn unravel<V>(statements: Vec<Statement>, validity: &mut V) -> Vec<Statement>
where
    V: Validity<Statement> + ?Sized,
{
    let mut done: Vec<Statement> = Vec::with_capacity(statements.len());
    for (index, statement) in statements.iter().enumerate() {
        let Statement::Block { statements: inner } = statement else {
            done.push(statement.clone());
            continue;
        };
        if inner.is_empty() {
            continue;
        }
        let candidate: Vec<Statement> = done
            .iter()
            .chain(inner.iter())
            .chain(statements[index + 1..].iter())
            .cloned()
            .collect();
        if validity.valid(&candidate).await {
            done.extend(inner.iter().cloned());
        } else {
            done.push(statement.clone());
        }
    }
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn p(code: &str) -> Statement {
        Statement::plain(code)
    }

    /// Flattened plain statements in execution order.
    fn flatten(statements: &[Statement], out: &mut Vec<String>) {
        for s in statements {
            match s {
                Statement::Plain { code } => out.push(code.clone()),
                Statement::Block { statements } => flatten(statements, out),
                Statement::Guarded { body, cleanup, .. } => {
                    flatten(body, out);
                    if let Some(cleanup) = cleanup {
                        flatten(cleanup, out);
                    }
                }
            }
        }
    }

    /// Valid iff the required statements execute, in the given order.
    struct Executes {
        required: Vec<&'static str>,
        calls: usize,
    }

    #[async_trait]
    impl Validity<Statement> for Executes {
        async fn valid(&mut self, items: &[Statement]) -> bool {
            self.calls += 1;
            let mut ran = Vec::new();
            flatten(items, &mut ran);
            let mut pos = 0;
            for code in ran {
                if pos < self.required.len() && code == self.required[pos] {
                    pos += 1;
                }
            }
            pos == self.required.len()
        }
    }

    #[tokio::test]
    async fn test_flat_sequence() {
        let mut v = Executes { required: vec!["b();"], calls: 0 };
        let out = minimize(vec![p("a();"), p("b();"), p("c();")], &mut v).await;
        assert_eq!(out, vec![p("b();")]);
    }

    #[tokio::test]
    async fn test_nested_block_is_reduced_and_unraveled() {
        let mut v = Executes { required: vec!["x();"], calls: 0 };
        let input = vec![
            Statement::block(vec![p("pre1();"), p("pre2();")]),
            p("a();"),
            Statement::block(vec![p("w();"), p("x();"), p("y();")]),
            Statement::block(vec![]),
        ];
        let out = minimize(input, &mut v).await;
        assert_eq!(out, vec![p("x();")]);
    }

    #[tokio::test]
    async fn test_guard_is_collapsed_when_vestigial() {
        let mut v = Executes { required: vec!["b();", "d();"], calls: 0 };
        let input = vec![
            Statement::suppressing(vec![p("a();"), p("b();")], "Throwable"),
            p("c();"),
            p("d();"),
        ];
        let out = minimize(input, &mut v).await;
        assert_eq!(out, vec![p("b();"), p("d();")]);
    }

    /// Valid only while `b();` stays inside a guard.
    struct NeedsGuard;

    #[async_trait]
    impl Validity<Statement> for NeedsGuard {
        async fn valid(&mut self, items: &[Statement]) -> bool {
            items.iter().any(|s| match s {
                Statement::Guarded { body, .. } => body.contains(&Statement::plain("b();")),
                _ => false,
            })
        }
    }

    #[tokio::test]
    async fn test_guard_kept_when_needed() {
        let input = vec![
            p("a();"),
            Statement::suppressing(vec![p("a();"), p("b();")], "Throwable"),
        ];
        let out = minimize(input, &mut NeedsGuard).await;
        assert_eq!(out, vec![Statement::suppressing(vec![p("b();")], "Throwable")]);
    }

    #[tokio::test]
    async fn test_empty_cleanup_is_removed() {
        let mut v = Executes { required: vec!["a();"], calls: 0 };
        let input = vec![Statement::Guarded {
            body: vec![p("z();"), p("a();")],
            handlers: vec![],
            cleanup: Some(vec![]),
        }];
        let out = minimize(input, &mut v).await;
        // guard collapses to a block once cleanup is gone, then unravels
        assert_eq!(out, vec![p("a();")]);
    }

    #[tokio::test]
    async fn test_result_is_one_minimal_subsequence() {
        let mut v = Executes { required: vec!["b();", "e();"], calls: 0 };
        let input = vec![
            p("a();"),
            Statement::block(vec![p("b();"), Statement::block(vec![p("c();"), p("d();")])]),
            p("e();"),
            p("f();"),
        ];
        let out = minimize(input, &mut v).await;
        assert_eq!(out, vec![p("b();"), p("e();")]);
        for i in 0..out.len() {
            let mut smaller = out.clone();
            smaller.remove(i);
            assert!(!v.valid(&smaller).await);
        }
    }

    #[tokio::test]
    async fn test_idempotent_on_own_output() {
        let mut v = Executes { required: vec!["c();"], calls: 0 };
        let input = vec![
            Statement::block(vec![p("a();"), Statement::block(vec![p("b();"), p("c();")])]),
            p("d();"),
        ];
        let once = minimize(input, &mut v).await;
        let twice = minimize(once.clone(), &mut v).await;
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_deep_nesting_converges() {
        // each unravel exposes one more reducible statement
        let mut nested = vec![p("core();"), p("noise0();")];
        for depth in 1..6 {
            nested = vec![Statement::block(nested), p(&format!("noise{depth}();"))];
        }
        let mut v = Executes { required: vec!["core();"], calls: 0 };
        let out = minimize(nested, &mut v).await;
        assert_eq!(out, vec![p("core();")]);
        assert!(v.calls < 500);
    }
}
