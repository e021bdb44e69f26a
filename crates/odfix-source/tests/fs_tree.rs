//! Integration tests for FsSourceTree with a content-addressed stub parser.
//!
//! The stub parser prints `<file>.<first 16 hex of sha256>.json`, so each
//! test registers the model for every text the tree is expected to produce.

use odfix_core::{ClassHierarchy, HookCategory, MethodId, SourceTree, Statement};
use odfix_source::model::{insert_method, splice_body};
use odfix_source::{ClassEntry, FileModel, FsSourceTree, MethodEntry, SourceConfig};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FOO: &str = "\
package a;

public class FooTest extends BaseTest {
    @Before
    public void init() {
        reset();
    }

    @Test(expected = IllegalStateException.class)
    public void testA() {
        a();
        b();
    }
}
";

fn p(code: &str) -> Statement {
    Statement::plain(code)
}

fn method(name: &str, begin: usize, start: usize, end: usize, statements: Vec<Statement>) -> MethodEntry {
    MethodEntry {
        name: name.to_string(),
        hooks: vec![],
        test_members: vec![],
        declares_throws: false,
        begin_line: begin,
        body_start: start,
        body_end: end,
        statements,
    }
}

fn foo_class() -> ClassEntry {
    let mut init = method("init", 4, 5, 7, vec![p("reset();")]);
    init.hooks = vec![HookCategory::PreTest];
    let mut test = method("testA", 9, 10, 13, vec![p("a();"), p("b();")]);
    test.test_members = vec!["expected".to_string()];
    ClassEntry {
        name: "a.FooTest".to_string(),
        superclass: Some("a.BaseTest".to_string()),
        end_line: 14,
        methods: vec![init, test],
    }
}

fn register(path: &Path, text: &str, model: &FileModel) {
    let digest = hex::encode(Sha256::digest(text.as_bytes()));
    let sidecar = PathBuf::from(format!("{}.{}.json", path.display(), &digest[..16]));
    std::fs::write(sidecar, serde_json::to_vec(model).expect("model json")).expect("write model");
}

fn setup() -> (TempDir, FsSourceTree, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("src/test/java");
    let path = root.join("a/FooTest.java");
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, FOO).expect("write source");
    register(&path, FOO, &FileModel { classes: vec![foo_class()] });

    let config = SourceConfig {
        parser: vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"cat "$1.$(sha256sum < "$1" | cut -c1-16).json""#.to_string(),
            "parse".to_string(),
        ],
        ..SourceConfig::default().with_root(&root)
    };
    (dir, FsSourceTree::new(config), path)
}

#[test]
fn test_lookup_through_parser() {
    let (_dir, tree, path) = setup();

    assert_eq!(tree.test_files().expect("files"), vec![path.clone()]);
    let unit = tree
        .find_method(&MethodId::new("a.FooTest", "testA"))
        .expect("lookup")
        .expect("present");
    assert_eq!(unit.path, path);
    assert_eq!(unit.begin_line, 9);
    assert!(unit.expects_exception);
    assert_eq!(unit.body, vec![p("a();"), p("b();")]);

    assert_eq!(tree.superclass("a.FooTest").expect("super"), Some("a.BaseTest".to_string()));
    assert_eq!(
        tree.declared_hooks("a.FooTest", HookCategory::PreTest).expect("hooks"),
        vec!["init"]
    );
    assert!(tree.declares_method("a.FooTest", "init").expect("declares"));
    assert_eq!(tree.superclass("a.Missing").expect("super"), None);
    assert!(tree
        .find_method(&MethodId::new("a.FooTest", "nope"))
        .expect("lookup")
        .is_none());
}

#[test]
fn test_add_flush_and_restore() {
    let (_dir, mut tree, path) = setup();
    let original = tree.read_file(&path).expect("read");

    // expected texts and their models
    let (with_helper, line) =
        insert_method(FOO, &foo_class(), "public void polluterHelper()").expect("insert");
    let mut class = foo_class();
    class.end_line += 3;
    class.methods.push(method("polluterHelper", line, line, line + 1, vec![]));
    register(&path, &with_helper, &FileModel { classes: vec![class.clone()] });

    let helper_entry = class.methods[2].clone();
    let filled = splice_body(&with_helper, &helper_entry, &[p("b();")]).expect("splice");
    let mut filled_class = class.clone();
    filled_class.end_line += 1;
    filled_class.methods[2] = method("polluterHelper", line, line, line + 2, vec![p("b();")]);
    register(&path, &filled, &FileModel { classes: vec![filled_class] });

    let helper = tree.add_method("a.FooTest", "polluterHelper").expect("add");
    assert_eq!(helper.begin_line, line);
    assert!(helper.body.is_empty());
    assert_eq!(std::fs::read_to_string(&path).expect("read"), with_helper);

    let flushed = tree.flush(&helper.with_body(vec![p("b();")])).expect("flush");
    assert_eq!(flushed.body, vec![p("b();")]);
    let text = std::fs::read_to_string(&path).expect("read");
    assert!(text.contains("    public void polluterHelper() {\n        b();\n    }\n}\n"));

    tree.write_file(&path, &original).expect("restore");
    assert_eq!(tree.read_file(&path).expect("read"), original);
    assert_eq!(
        tree.find_method(&MethodId::new("a.FooTest", "polluterHelper"))
            .expect("lookup"),
        None
    );
}

#[test]
fn test_parser_failure_surfaces_as_source_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();
    std::fs::write(root.join("Broken.java"), "class Broken {").expect("write");
    let config = SourceConfig {
        parser: vec!["sh".into(), "-c".into(), "echo 'syntax error' >&2; exit 3".into(), "parse".into()],
        ..SourceConfig::default().with_root(&root)
    };
    let tree = FsSourceTree::new(config);
    let err = tree
        .find_method(&MethodId::new("Broken", "m"))
        .expect_err("parser fails");
    assert!(err.to_string().contains("syntax error"));
}
