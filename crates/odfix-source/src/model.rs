//! File model emitted by the parser front-end, and text splicing against it.
//!
//! Line numbers are 1-based. `body_start` is the line holding a method's
//! opening brace and `body_end` the line holding its closing brace; `end_line`
//! is the line holding a class's closing brace.

use odfix_core::{HookCategory, Statement};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::Result;

const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileModel {
    #[serde(default)]
    pub classes: Vec<ClassEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    /// Fully qualified class name.
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    pub end_line: usize,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub name: String,
    /// Lifecycle categories the method is annotated with.
    #[serde(default)]
    pub hooks: Vec<HookCategory>,
    /// Members set on the method's test annotation, if it has one.
    #[serde(default)]
    pub test_members: Vec<String>,
    #[serde(default)]
    pub declares_throws: bool,
    pub begin_line: usize,
    pub body_start: usize,
    pub body_end: usize,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl FileModel {
    pub fn class(&self, name: &str) -> Option<&ClassEntry> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Reject models whose line numbers cannot belong to a `lines`-line file.
    pub fn validate(&self, path: &str, lines: usize) -> Result<()> {
        let invalid = |reason: String| SourceError::InvalidModel {
            path: path.to_string(),
            reason,
        };
        for class in &self.classes {
            if class.end_line == 0 || class.end_line > lines {
                return Err(invalid(format!("{}: end line {} out of range", class.name, class.end_line)));
            }
            for m in &class.methods {
                let ordered = 0 < m.begin_line && m.begin_line <= m.body_start && m.body_start <= m.body_end;
                if !ordered || m.body_end > lines {
                    return Err(invalid(format!("{}.{}: bad line span", class.name, m.name)));
                }
            }
        }
        Ok(())
    }
}

impl ClassEntry {
    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.iter().find(|m| m.name == name)
    }
}

fn leading_ws(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn render(statements: &[Statement], indent: &str) -> Vec<String> {
    let mut rendered = Vec::new();
    for statement in statements {
        statement.render_into(0, &mut rendered);
    }
    rendered.into_iter().map(|l| format!("{indent}{l}")).collect()
}

fn join(lines: Vec<String>, trailing_newline: bool) -> String {
    let mut text = lines.join("\n");
    if trailing_newline {
        text.push('\n');
    }
    text
}

/// Replace the body of `method` in `text` with `body`.
pub fn splice_body(text: &str, method: &MethodEntry, body: &[Statement]) -> Result<String> {
    let lines: Vec<&str> = text.lines().collect();
    let (start, end) = (method.body_start - 1, method.body_end - 1);
    let bad = |reason: &str| SourceError::InvalidModel {
        path: method.name.clone(),
        reason: reason.to_string(),
    };
    let opening = lines.get(start).ok_or_else(|| bad("body start past end of file"))?;
    let closing = lines.get(end).ok_or_else(|| bad("body end past end of file"))?;

    let (head, tail) = if start == end {
        let open = opening.find('{').ok_or_else(|| bad("no opening brace"))?;
        let close = opening.rfind('}').filter(|c| *c > open).ok_or_else(|| bad("no closing brace"))?;
        (
            opening[..=open].to_string(),
            format!("{}{}", leading_ws(opening), &opening[close..]),
        )
    } else {
        let open = opening.rfind('{').ok_or_else(|| bad("no opening brace"))?;
        let close = closing.find('}').ok_or_else(|| bad("no closing brace"))?;
        (
            opening[..=open].to_string(),
            format!("{}{}", leading_ws(opening), &closing[close..]),
        )
    };

    let indent = format!("{}{INDENT}", leading_ws(opening));
    let mut out: Vec<String> = lines[..start].iter().map(|l| l.to_string()).collect();
    out.push(head);
    out.extend(render(body, &indent));
    out.push(tail);
    out.extend(lines[end + 1..].iter().map(|l| l.to_string()));
    Ok(join(out, text.ends_with('\n')))
}

/// Declare an empty method with `declaration` just before `class`'s closing
/// brace. Returns the new text and the declaration's line number.
pub fn insert_method(text: &str, class: &ClassEntry, declaration: &str) -> Result<(String, usize)> {
    let lines: Vec<&str> = text.lines().collect();
    let end = class.end_line - 1;
    let closing = lines.get(end).ok_or_else(|| SourceError::InvalidModel {
        path: class.name.clone(),
        reason: "class end past end of file".to_string(),
    })?;
    let indent = format!("{}{INDENT}", leading_ws(closing));

    let mut out: Vec<String> = lines[..end].iter().map(|l| l.to_string()).collect();
    out.push(String::new());
    let begin_line = out.len() + 1;
    out.push(format!("{indent}{declaration} {{"));
    out.push(format!("{indent}}}"));
    out.extend(lines[end..].iter().map(|l| l.to_string()));
    Ok((join(out, text.ends_with('\n')), begin_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
package a;

public class FooTest {
    @Test
    public void testA() {
        a();
        b();
    }

    public void empty() { }
}
";

    fn method(name: &str, begin: usize, start: usize, end: usize) -> MethodEntry {
        MethodEntry {
            name: name.to_string(),
            hooks: vec![],
            test_members: vec![],
            declares_throws: false,
            begin_line: begin,
            body_start: start,
            body_end: end,
            statements: vec![],
        }
    }

    fn class() -> ClassEntry {
        ClassEntry {
            name: "a.FooTest".to_string(),
            superclass: None,
            end_line: 11,
            methods: vec![method("testA", 4, 5, 8), method("empty", 10, 10, 10)],
        }
    }

    #[test]
    fn test_splice_multi_line_body() {
        let body = vec![
            Statement::plain("x();"),
            Statement::suppressing(vec![Statement::plain("y();")], "Throwable"),
        ];
        let out = splice_body(SOURCE, &class().methods[0], &body).expect("splice");
        let expected = "\
package a;

public class FooTest {
    @Test
    public void testA() {
        x();
        try {
            y();
        } catch (Throwable ex) {
        }
    }

    public void empty() { }
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_splice_single_line_body() {
        let out = splice_body(SOURCE, &class().methods[1], &[Statement::plain("z();")]).expect("splice");
        assert!(out.contains("    public void empty() {\n        z();\n    }\n}\n"));
    }

    #[test]
    fn test_splice_then_restore_text() {
        let entry = method("testA", 4, 5, 8);
        let out = splice_body(SOURCE, &entry, &[Statement::plain("a();"), Statement::plain("b();")])
            .expect("splice");
        assert_eq!(out, SOURCE);
    }

    #[test]
    fn test_insert_method() {
        let (out, line) = insert_method(SOURCE, &class(), "public void polluterHelper()").expect("insert");
        assert_eq!(line, 12);
        assert!(out.ends_with(
            "    public void empty() { }\n\n    public void polluterHelper() {\n    }\n}\n"
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let model = FileModel {
            classes: vec![class()],
        };
        assert!(model.validate("Foo.java", 11).is_ok());
        assert!(matches!(
            model.validate("Foo.java", 9),
            Err(SourceError::InvalidModel { .. })
        ));
    }
}
