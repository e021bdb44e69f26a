//! Lifecycle hook resolution over a class hierarchy.
//!
//! Two recognition modes:
//!
//! - **Annotated**: hooks are whatever [`ClassHierarchy::declared_hooks`]
//!   reports per category. The class chain is walked outward; a hook name
//!   seen in a subclass shadows the same name further up. Hooks declared by
//!   the class itself are inlined, inherited ones become bare calls.
//!   Pre-hooks run superclass first, post-hooks subclass first.
//! - **Legacy**: selected when the chain reaches the configured legacy base
//!   class. Only per-test hooks exist, under fixed names; a local
//!   declaration is inlined, otherwise an inherited one is called.

use std::collections::HashSet;

use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::Result;
use crate::source::{HookCategory, MethodId, SourceTree};
use crate::statement::Statement;

/// `class` followed by its ancestors, nearest first.
pub fn class_chain<S: SourceTree + ?Sized>(tree: &S, class: &str) -> Result<Vec<String>> {
    let mut chain = vec![class.to_string()];
    let mut seen: HashSet<String> = chain.iter().cloned().collect();
    let mut current = class.to_string();
    while let Some(parent) = tree.superclass(&current)? {
        if !seen.insert(parent.clone()) {
            debug!(class = %class, parent = %parent, "cycle in class hierarchy");
            break;
        }
        chain.push(parent.clone());
        current = parent;
    }
    Ok(chain)
}

/// Whether `candidate` names `base`, allowing an unqualified spelling.
fn names_class(candidate: &str, base: &str) -> bool {
    candidate == base || base.rsplit('.').next() == Some(candidate)
}

/// Statements reproducing `class`'s `category` hooks.
pub fn hook_statements<S: SourceTree + ?Sized>(
    tree: &S,
    class: &str,
    category: HookCategory,
    config: &EngineConfig,
) -> Result<Vec<Statement>> {
    let chain = class_chain(tree, class)?;
    if chain.iter().any(|c| names_class(c, &config.legacy_base)) {
        legacy_hooks(tree, class, &chain, category, config)
    } else {
        annotated_hooks(tree, class, &chain, category, config)
    }
}

fn legacy_hooks<S: SourceTree + ?Sized>(
    tree: &S,
    class: &str,
    chain: &[String],
    category: HookCategory,
    config: &EngineConfig,
) -> Result<Vec<Statement>> {
    let name = match category {
        HookCategory::PreTest => &config.legacy_setup,
        HookCategory::PostTest => &config.legacy_teardown,
        HookCategory::PreSuite | HookCategory::PostSuite => return Ok(Vec::new()),
    };
    if tree.declares_method(class, name)? {
        return local_body(tree, class, name, config);
    }
    for ancestor in chain.iter().skip(1) {
        if tree.declares_method(ancestor, name)? {
            return Ok(vec![Statement::call(None, name)]);
        }
    }
    Ok(Vec::new())
}

fn annotated_hooks<S: SourceTree + ?Sized>(
    tree: &S,
    class: &str,
    chain: &[String],
    category: HookCategory,
    config: &EngineConfig,
) -> Result<Vec<Statement>> {
    let local = tree.declared_hooks(class, category)?;
    let mut seen: HashSet<String> = local.iter().cloned().collect();
    let mut inherited = Vec::new();
    for ancestor in chain.iter().skip(1) {
        for name in tree.declared_hooks(ancestor, category)? {
            if seen.insert(name.clone()) {
                inherited.push(name);
            }
        }
    }

    let mut inlined = Vec::new();
    for name in &local {
        inlined.extend(local_body(tree, class, name, config)?);
    }
    let mut calls: Vec<Statement> = inherited.iter().map(|n| Statement::call(None, n)).collect();

    if category.is_pre() {
        calls.reverse();
        calls.extend(inlined);
        Ok(calls)
    } else {
        inlined.extend(calls);
        Ok(inlined)
    }
}

/// Body of `class.name`, guarded when the method declares checked exceptions.
fn local_body<S: SourceTree + ?Sized>(
    tree: &S,
    class: &str,
    name: &str,
    config: &EngineConfig,
) -> Result<Vec<Statement>> {
    let Some(unit) = tree.find_method(&MethodId::new(class, name))? else {
        return Ok(Vec::new());
    };
    if unit.declares_throws {
        Ok(vec![Statement::suppressing(unit.body, &config.catch_type)])
    } else {
        Ok(unit.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ClassModel, MemorySourceTree, MethodModel};

    fn p(code: &str) -> Statement {
        Statement::plain(code)
    }

    fn annotated_tree() -> MemorySourceTree {
        MemorySourceTree::from_classes(vec![
            ClassModel::new("a.Base")
                .with_method(MethodModel::hook("baseInit", HookCategory::PreTest, vec![p("base();")]))
                .with_method(MethodModel::hook("init", HookCategory::PreTest, vec![p("shadowed();")]))
                .with_method(MethodModel::hook("baseDone", HookCategory::PostTest, vec![p("x();")])),
            ClassModel::new("a.Mid")
                .extends("a.Base")
                .with_method(MethodModel::hook("midInit", HookCategory::PreTest, vec![p("mid();")]))
                .with_method(MethodModel::hook("midDone", HookCategory::PostTest, vec![p("y();")])),
            ClassModel::new("a.LeafTest")
                .extends("a.Mid")
                .with_method(MethodModel::hook("init", HookCategory::PreTest, vec![p("leaf();")]))
                .with_method(
                    MethodModel::hook("done", HookCategory::PostTest, vec![p("close();")]).throwing(),
                ),
        ])
    }

    #[test]
    fn test_class_chain_walks_outward() {
        let tree = annotated_tree();
        assert_eq!(
            class_chain(&tree, "a.LeafTest").expect("chain"),
            vec!["a.LeafTest", "a.Mid", "a.Base"]
        );
    }

    #[test]
    fn test_pre_hooks_superclass_first_then_local_inline() {
        let tree = annotated_tree();
        let stmts = hook_statements(&tree, "a.LeafTest", HookCategory::PreTest, &EngineConfig::default())
            .expect("hooks");
        assert_eq!(stmts, vec![p("baseInit();"), p("midInit();"), p("leaf();")]);
    }

    #[test]
    fn test_post_hooks_local_first_and_guarded_when_throwing() {
        let tree = annotated_tree();
        let stmts = hook_statements(&tree, "a.LeafTest", HookCategory::PostTest, &EngineConfig::default())
            .expect("hooks");
        assert_eq!(
            stmts,
            vec![
                Statement::suppressing(vec![p("close();")], "Throwable"),
                p("midDone();"),
                p("baseDone();"),
            ]
        );
    }

    #[test]
    fn test_no_suite_hooks() {
        let tree = annotated_tree();
        let stmts = hook_statements(&tree, "a.LeafTest", HookCategory::PreSuite, &EngineConfig::default())
            .expect("hooks");
        assert!(stmts.is_empty());
    }

    #[test]
    fn test_legacy_local_setup_is_inlined() {
        let tree = MemorySourceTree::from_classes(vec![ClassModel::new("a.OldTest")
            .extends("junit.framework.TestCase")
            .with_method(MethodModel::helper("setUp", vec![p("prepare();")]))]);
        let config = EngineConfig::default();
        let pre = hook_statements(&tree, "a.OldTest", HookCategory::PreTest, &config).expect("hooks");
        assert_eq!(pre, vec![p("prepare();")]);
        let post = hook_statements(&tree, "a.OldTest", HookCategory::PostTest, &config).expect("hooks");
        assert!(post.is_empty());
        let suite = hook_statements(&tree, "a.OldTest", HookCategory::PreSuite, &config).expect("hooks");
        assert!(suite.is_empty());
    }

    #[test]
    fn test_legacy_inherited_teardown_is_called() {
        let tree = MemorySourceTree::from_classes(vec![
            ClassModel::new("a.OldBase")
                .extends("TestCase")
                .with_method(MethodModel::helper("tearDown", vec![p("reset();")])),
            ClassModel::new("a.OldTest").extends("a.OldBase"),
        ]);
        let post = hook_statements(&tree, "a.OldTest", HookCategory::PostTest, &EngineConfig::default())
            .expect("hooks");
        assert_eq!(post, vec![p("tearDown();")]);
    }
}
