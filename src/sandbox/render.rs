//! Template evaluation against a context's globals.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

use super::globals::{Global, Globals};
use super::natives::{NativeFn, to_display};
use super::registry::OverrideRegistry;
use super::template::{Condition, ContentKind, DataRef, Directive, Node, Root, Template};

/// Nested `{call}`/`{delcall}` limit.
const MAX_CALL_DEPTH: usize = 64;

static NULL: Value = Value::Null;

/// What a template function returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    /// Output of a non-`text` template, already escaped for its kind.
    Sanitized { kind: ContentKind, content: String },
}

impl Content {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text(_) => ContentKind::Text,
            Self::Sanitized { kind, .. } => *kind,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Sanitized { content: s, .. } => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) | Self::Sanitized { content: s, .. } => s,
        }
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Renderer<'a> {
    globals: &'a Globals,
    registry: &'a OverrideRegistry,
    ij: &'a Value,
}

struct Scope<'a> {
    data: &'a Value,
    locals: Vec<(String, &'a Value)>,
    kind: ContentKind,
    depth: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(globals: &'a Globals, registry: &'a OverrideRegistry, ij: &'a Value) -> Self {
        Self {
            globals,
            registry,
            ij,
        }
    }

    pub fn render(&self, template: &'a Template, data: &'a Value) -> Result<Content, String> {
        self.render_at(template, data, 0)
    }

    fn render_at(&self, template: &'a Template, data: &'a Value, depth: usize) -> Result<Content, String> {
        if depth > MAX_CALL_DEPTH {
            return Err(format!("call depth exceeds {MAX_CALL_DEPTH} at `{}`", template.name));
        }
        let mut scope = Scope {
            data,
            locals: Vec::new(),
            kind: template.kind,
            depth,
        };
        let mut out = String::new();
        self.nodes(&template.body, &mut scope, &mut out)?;

        Ok(match template.kind {
            ContentKind::Text => Content::Text(out),
            kind => Content::Sanitized { kind, content: out },
        })
    }

    fn nodes(&self, nodes: &'a [Node], scope: &mut Scope<'a>, out: &mut String) -> Result<(), String> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Print { value, directives } => {
                    let value = self.lookup(value, scope);
                    out.push_str(&self.print(value, directives, scope.kind)?);
                }
                Node::If { branches, otherwise } => {
                    let taken = branches
                        .iter()
                        .find(|(condition, _)| self.test(condition, scope))
                        .map(|(_, body)| body)
                        .or(otherwise.as_ref());
                    if let Some(body) = taken {
                        self.nodes(body, scope, out)?;
                    }
                }
                Node::Foreach { var, list, body, empty } => match self.lookup(list, scope) {
                    Value::Array(items) if !items.is_empty() => {
                        for item in items {
                            scope.locals.push((var.clone(), item));
                            let result = self.nodes(body, scope, out);
                            scope.locals.pop();
                            result?;
                        }
                    }
                    Value::Array(_) | Value::Null => {
                        if let Some(empty) = empty {
                            self.nodes(empty, scope, out)?;
                        }
                    }
                    other => return Err(format!("{{foreach}} over a non-list value `{other}`")),
                },
                Node::Call { callee, data } => {
                    let template = self.template(callee)?;
                    let data = match data {
                        Some(reference) => self.lookup(reference, scope),
                        None => scope.data,
                    };
                    let content = self
                        .render_at(template, data, scope.depth + 1)
                        .map_err(|e| format!("in `{callee}`: {e}"))?;
                    out.push_str(content.as_str());
                }
                Node::DelCall {
                    name,
                    variant,
                    allow_empty,
                } => match self.registry.resolve(name, variant) {
                    Some(target) => {
                        let template = self.template(target)?;
                        let content = self
                            .render_at(template, scope.data, scope.depth + 1)
                            .map_err(|e| format!("in delegate `{name}`: {e}"))?;
                        out.push_str(content.as_str());
                    }
                    None if *allow_empty => {}
                    None => {
                        return Err(format!(
                            "found no active implementation for delegate call to `{name}:{variant}`"
                        ));
                    }
                },
            }
        }
        Ok(())
    }

    fn lookup(&self, reference: &DataRef, scope: &Scope<'a>) -> &'a Value {
        let base = match &reference.root {
            Root::Data => scope.data,
            Root::Ij => self.ij,
            Root::Local(name) => scope
                .locals
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map_or(&NULL, |(_, v)| *v),
        };
        reference.path.iter().fold(base, |value, segment| match value {
            Value::Object(map) => map.get(segment).unwrap_or(&NULL),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .unwrap_or(&NULL),
            _ => &NULL,
        })
    }

    fn test(&self, condition: &Condition, scope: &Scope<'a>) -> bool {
        truthy(self.lookup(&condition.value, scope)) != condition.negated
    }

    fn template(&self, name: &str) -> Result<&'a Template, String> {
        match self.globals.resolve(name) {
            Some(Global::Template(template)) => Ok(template.as_ref()),
            Some(other) => Err(format!("`{name}` is a {}, not a template", other.kind_name())),
            None => Err(format!("`{name}` is not defined")),
        }
    }

    fn native(&self, directive: &str) -> Result<NativeFn, String> {
        match self.globals.resolve(&format!("soy.$${directive}")) {
            Some(Global::Native(f)) => Ok(*f),
            _ => Err(format!("unknown print directive `|{directive}`")),
        }
    }

    fn print(&self, value: &Value, directives: &[Directive], kind: ContentKind) -> Result<String, String> {
        let mut current = Cow::Borrowed(value);
        for directive in directives {
            let f = self.native(&directive.name)?;
            current = Cow::Owned(f(current.as_ref(), &directive.args)?);
        }

        let escaped = directives.iter().any(|d| {
            matches!(
                d.name.as_str(),
                "noAutoescape" | "escapeHtml" | "escapeHtmlAttribute" | "escapeUri" | "filterNormalizeUri"
            )
        });
        let autoescape = match kind {
            _ if escaped => None,
            ContentKind::Html => Some("escapeHtml"),
            ContentKind::Attributes => Some("escapeHtmlAttribute"),
            ContentKind::Uri => Some("filterNormalizeUri"),
            ContentKind::Text | ContentKind::Css | ContentKind::Js => None,
        };
        if let Some(name) = autoescape {
            current = Cow::Owned(self.native(name)?(current.as_ref(), &[])?);
        }

        Ok(to_display(&current))
    }
}

/// Truthiness of a data value.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
