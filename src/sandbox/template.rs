//! Template bodies: tag scanning and the node tree.
//!
//! ```text
//! body lines ──join──> "Dear {$title} {$surname},{\n}..."
//!            ──scan──> [Text, Tag, Text, Tag, ...]
//!            ──parse─> [Node]
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Output mode of a template. Everything except `Text` yields sanitized content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKind {
    #[default]
    Html,
    Text,
    Uri,
    Attributes,
    Css,
    Js,
}

impl ContentKind {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "html" => Self::Html,
            "text" => Self::Text,
            "uri" => Self::Uri,
            "attributes" => Self::Attributes,
            "css" => Self::Css,
            "js" => Self::Js,
            _ => return None,
        })
    }
}

/// A compiled template function.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub kind: ContentKind,
    pub body: Vec<Node>,
}

/// Where a data reference starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Root {
    Data,
    Ij,
    /// A `foreach` loop variable.
    Local(String),
}

/// `$name.field.field`
#[derive(Debug, Clone, PartialEq)]
pub struct DataRef {
    pub root: Root,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negated: bool,
    pub value: DataRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Print {
        value: DataRef,
        directives: Vec<Directive>,
    },
    If {
        branches: Vec<(Condition, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
    Foreach {
        var: String,
        list: DataRef,
        body: Vec<Node>,
        empty: Option<Vec<Node>>,
    },
    Call {
        callee: String,
        data: Option<DataRef>,
    },
    DelCall {
        name: String,
        variant: String,
        allow_empty: bool,
    },
}

impl Template {
    /// Build a template from its raw body lines.
    pub fn parse(name: &str, kind: ContentKind, lines: &[&str]) -> Result<Self, String> {
        let joined = join_lines(lines);
        let pieces = scan(&joined)?;
        let mut parser = Parser {
            pieces: pieces.into_iter(),
            locals: Vec::new(),
        };
        let (body, end) = parser.nodes(&[])?;
        debug_assert!(end.is_none());
        Ok(Self {
            name: name.to_string(),
            kind,
            body,
        })
    }
}

/// Trim each line and join them.
///
/// A space is kept between two lines unless the join touches a tag or markup.
pub fn join_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let tight = out.is_empty()
            || out.ends_with(['>', '}'])
            || line.starts_with(['<', '{']);
        if !tight {
            out.push(' ');
        }
        out.push_str(line);
    }
    out
}

#[derive(Debug, PartialEq)]
enum Piece {
    Text(String),
    Tag(String),
}

fn scan(body: &str) -> Result<Vec<Piece>, String> {
    let mut pieces = Vec::new();
    let mut rest = body;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            pieces.push(Piece::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed tag near `{}`", preview(&rest[open..])))?;
        let tag = &after[..close];
        if tag.contains('{') {
            return Err(format!("unclosed tag near `{}`", preview(&rest[open..])));
        }
        pieces.push(Piece::Tag(tag.trim().to_string()));
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(format!("stray `}}` in `{}`", preview(rest)));
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest.to_string()));
    }
    Ok(pieces)
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(24) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// `name="value"` pairs. ASCII names only; the crate builds regex without
/// Unicode classes.
static ATTR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z0-9_]+)="([^"]*)""#).ok());

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    ATTR.as_ref()?
        .captures_iter(tag)
        .find(|c| &c[1] == name)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

struct Parser {
    pieces: std::vec::IntoIter<Piece>,
    locals: Vec<String>,
}

impl Parser {
    /// Parse until one of `terminators` (or the end when empty).
    fn nodes(&mut self, terminators: &[&str]) -> Result<(Vec<Node>, Option<String>), String> {
        let mut nodes = Vec::new();
        while let Some(piece) = self.pieces.next() {
            let tag = match piece {
                Piece::Text(text) => {
                    push_text(&mut nodes, &text);
                    continue;
                }
                Piece::Tag(tag) => tag,
            };

            let keyword = tag.split_whitespace().next().unwrap_or_default();
            if terminators.contains(&keyword) {
                return Ok((nodes, Some(tag)));
            }

            match keyword {
                "sp" => push_text(&mut nodes, " "),
                "nil" => {}
                "lb" => push_text(&mut nodes, "{"),
                "rb" => push_text(&mut nodes, "}"),
                "\\n" => push_text(&mut nodes, "\n"),
                "\\t" => push_text(&mut nodes, "\t"),
                "if" => nodes.push(self.if_block(&tag)?),
                "foreach" => nodes.push(self.foreach_block(&tag)?),
                "call" => nodes.push(call(&tag, &self.locals)?),
                "delcall" => nodes.push(delcall(&tag)?),
                "print" => nodes.push(print(tag["print".len()..].trim(), &self.locals)?),
                k if k.starts_with('$') => nodes.push(print(&tag, &self.locals)?),
                "else" | "elseif" | "/if" | "ifempty" | "/foreach" => {
                    return Err(format!("`{{{tag}}}` outside its block"));
                }
                _ => return Err(format!("unknown command `{{{tag}}}`")),
            }
        }

        if terminators.is_empty() {
            Ok((nodes, None))
        } else {
            Err(format!("missing `{{{}}}`", terminators[terminators.len() - 1]))
        }
    }

    fn if_block(&mut self, tag: &str) -> Result<Node, String> {
        let mut branches = Vec::new();
        let mut condition = parse_condition(&tag["if".len()..], &self.locals)?;
        loop {
            let (body, end) = self.nodes(&["elseif", "else", "/if"])?;
            branches.push((condition, body));
            let end = end.unwrap_or_default();
            match end.split_whitespace().next() {
                Some("elseif") => {
                    condition = parse_condition(&end["elseif".len()..], &self.locals)?;
                }
                Some("else") => {
                    let (otherwise, _) = self.nodes(&["/if"])?;
                    return Ok(Node::If {
                        branches,
                        otherwise: Some(otherwise),
                    });
                }
                _ => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                    });
                }
            }
        }
    }

    fn foreach_block(&mut self, tag: &str) -> Result<Node, String> {
        let args: Vec<&str> = tag.split_whitespace().collect();
        let [_, var, "in", list] = args.as_slice() else {
            return Err(format!("expected `{{foreach $var in $list}}`, got `{{{tag}}}`"));
        };
        let var = var
            .strip_prefix('$')
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("bad loop variable in `{{{tag}}}`"))?
            .to_string();
        let list = parse_ref(list, &self.locals)?;

        self.locals.push(var.clone());
        let result = self.nodes(&["ifempty", "/foreach"]);
        let (body, end) = match result {
            Ok(parsed) => parsed,
            Err(e) => {
                self.locals.pop();
                return Err(e);
            }
        };
        self.locals.pop();

        let empty = match end.as_deref() {
            Some("ifempty") => Some(self.nodes(&["/foreach"])?.0),
            _ => None,
        };
        Ok(Node::Foreach {
            var,
            list,
            body,
            empty,
        })
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn parse_ref(text: &str, locals: &[String]) -> Result<DataRef, String> {
    let name = text
        .trim()
        .strip_prefix('$')
        .ok_or_else(|| format!("expected a `$` reference, got `{text}`"))?;
    let mut segments = name.split('.').map(str::to_string);
    let head = segments.next().unwrap_or_default();
    let path: Vec<String> = segments.collect();

    let well_formed = |s: &String| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_');
    if !well_formed(&head) || !path.iter().all(well_formed) {
        return Err(format!("malformed reference `{text}`"));
    }

    Ok(if locals.contains(&head) {
        DataRef {
            root: Root::Local(head),
            path,
        }
    } else if head == "ij" {
        DataRef {
            root: Root::Ij,
            path,
        }
    } else {
        let mut full = vec![head];
        full.extend(path);
        DataRef {
            root: Root::Data,
            path: full,
        }
    })
}

fn parse_condition(text: &str, locals: &[String]) -> Result<Condition, String> {
    let text = text.trim();
    match text.strip_prefix("not ") {
        Some(rest) => Ok(Condition {
            negated: true,
            value: parse_ref(rest, locals)?,
        }),
        None => Ok(Condition {
            negated: false,
            value: parse_ref(text, locals)?,
        }),
    }
}

fn print(tag: &str, locals: &[String]) -> Result<Node, String> {
    let mut parts = tag.split('|');
    let value = parse_ref(parts.next().unwrap_or_default(), locals)?;
    let directives = parts.map(parse_directive).collect::<Result<_, _>>()?;
    Ok(Node::Print { value, directives })
}

fn parse_directive(text: &str) -> Result<Directive, String> {
    let (name, args) = match text.split_once(':') {
        Some((name, args)) => (name.trim(), Some(args)),
        None => (text.trim(), None),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("bad print directive `|{text}`"));
    }
    let args = match args {
        Some(args) => args
            .split(',')
            .map(|arg| parse_literal(arg.trim()))
            .collect::<Result<_, _>>()?,
        None => Vec::new(),
    };
    Ok(Directive {
        name: name.to_string(),
        args,
    })
}

/// Directive arguments: JSON literals, plus single-quoted strings.
fn parse_literal(text: &str) -> Result<Value, String> {
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Value::String(inner.to_string()));
    }
    serde_json::from_str(text).map_err(|_| format!("bad directive argument `{text}`"))
}

fn self_closing<'a>(tag: &'a str, keyword: &str) -> Result<&'a str, String> {
    tag[keyword.len()..]
        .trim()
        .strip_suffix('/')
        .map(str::trim)
        .ok_or_else(|| format!("`{{{tag}}}` must be self-closing (`/}}`)"))
}

fn call(tag: &str, locals: &[String]) -> Result<Node, String> {
    let rest = self_closing(tag, "call")?;
    let callee = rest.split_whitespace().next().unwrap_or_default();
    super::globals::split_path(callee)?;
    let data = match attribute(rest, "data") {
        Some("all") | None => None,
        Some(reference) => Some(parse_ref(reference, locals)?),
    };
    Ok(Node::Call {
        callee: callee.to_string(),
        data,
    })
}

fn delcall(tag: &str) -> Result<Node, String> {
    let rest = self_closing(tag, "delcall")?;
    let name = rest.split_whitespace().next().unwrap_or_default();
    super::globals::split_path(name)?;
    Ok(Node::DelCall {
        name: name.to_string(),
        variant: attribute(rest, "variant").unwrap_or_default().to_string(),
        allow_empty: attribute(rest, "allowemptydefault") == Some("true"),
    })
}
