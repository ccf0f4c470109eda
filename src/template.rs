// src/template.rs

//! Template evaluation scope and renderer
//!
//! A template takes a packaged source file plus a scope and produces
//! bytes. The scope is a tree of string values addressed by dotted paths;
//! the image configuration and cloud metadata both feed it. The template
//! language is deliberately small: `{{ dotted.path }}` substitution with
//! unresolved keys treated as errors.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// A node in the evaluation scope
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    Value(String),
    Tree(BTreeMap<String, ScopeValue>),
}

/// Structured key-value tree handed to the template renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    root: BTreeMap<String, ScopeValue>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string value at a dotted path, creating intermediate trees
    pub fn set(&mut self, path: &str, value: &str) {
        let mut node = &mut self.root;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.insert(part.to_string(), ScopeValue::Value(value.to_string()));
                return;
            }
            let child = node
                .entry(part.to_string())
                .or_insert_with(|| ScopeValue::Tree(BTreeMap::new()));
            match child {
                ScopeValue::Tree(tree) => node = tree,
                ScopeValue::Value(_) => {
                    *child = ScopeValue::Tree(BTreeMap::new());
                    let ScopeValue::Tree(tree) = child else {
                        unreachable!()
                    };
                    node = tree;
                }
            }
        }
    }

    /// Look up a string value by dotted path
    pub fn get(&self, path: &str) -> Option<&str> {
        let mut node = &self.root;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            match node.get(part)? {
                ScopeValue::Value(value) => {
                    return if parts.peek().is_none() {
                        Some(value)
                    } else {
                        None
                    };
                }
                ScopeValue::Tree(tree) => node = tree,
            }
        }
        None
    }
}

/// Render template source against a scope
///
/// Replaces each `{{ dotted.path }}` occurrence with the scope value at
/// that path. An unresolved key fails the render; templates are part of a
/// package's declared content and a half-filled config file is worse than
/// an aborted install.
pub fn render(source: &str, scope: &Scope) -> Result<String> {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(Error::ParseError(
                "unterminated {{ in template".to_string(),
            ));
        };

        let key = after[..end].trim();
        let value = scope
            .get(key)
            .ok_or_else(|| Error::NotFound(format!("template key {}", key)))?;
        output.push_str(value);
        rest = &after[end + 2..];
    }

    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        let mut scope = Scope::new();
        scope.set("image.os", "linux");
        scope.set("image.arch", "x86_64");
        scope.set("cloud.provider", "aws");
        scope.set("cloud.tags.role", "frontend");
        scope
    }

    #[test]
    fn test_scope_get() {
        let scope = scope();
        assert_eq!(scope.get("image.os"), Some("linux"));
        assert_eq!(scope.get("cloud.tags.role"), Some("frontend"));
        assert_eq!(scope.get("cloud.tags.missing"), None);
        assert_eq!(scope.get("image.os.deeper"), None);
    }

    #[test]
    fn test_render_substitutes() {
        let rendered = render(
            "os={{ image.os }} role={{cloud.tags.role}}\n",
            &scope(),
        )
        .unwrap();
        assert_eq!(rendered, "os=linux role=frontend\n");
    }

    #[test]
    fn test_render_passthrough_without_tokens() {
        let rendered = render("plain text\n", &scope()).unwrap();
        assert_eq!(rendered, "plain text\n");
    }

    #[test]
    fn test_render_unknown_key_fails() {
        assert!(matches!(
            render("{{ nope }}", &scope()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_render_unterminated_fails() {
        assert!(matches!(
            render("{{ image.os", &scope()),
            Err(Error::ParseError(_))
        ));
    }
}
