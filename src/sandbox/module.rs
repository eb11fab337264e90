//! Generated module parsing.
//!
//! ```text
//! // comment
//! provide mail.letters
//! require soy
//! native soy.$$escapeHtml = escapeHtml
//! set mail.letters.VERSION = "2"
//! template mail.letters.formletter kind="text"
//!   Dear {$title} {$surname},
//! end
//! deltemplate mail.sig variant="short" priority 1 = mail.letters.shortSig
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;

use super::globals::split_path;
use super::template::{ContentKind, Template};
use crate::error::{Error, Result};

#[derive(Debug, Error, PartialEq)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

/// One executable statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Provide(String),
    Require(String),
    Native { path: String, builtin: String },
    Set { path: String, value: Value },
    Template(Arc<Template>),
    DelTemplate {
        name: String,
        variant: String,
        priority: i64,
        target: String,
    },
}

/// A module's source text, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    pub origin: PathBuf,
    pub text: String,
}

impl ModuleSource {
    pub fn new(origin: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }

    /// Read every path concurrently, returning sources in input order.
    ///
    /// The first unreadable path fails the whole batch.
    pub async fn fetch_all(paths: &[PathBuf]) -> Result<Vec<Self>> {
        let mut tasks = JoinSet::new();
        for (index, path) in paths.iter().enumerate() {
            let path = path.clone();
            tasks.spawn(async move {
                let text = tokio::fs::read_to_string(&path).await;
                (index, path, text)
            });
        }

        let mut slots: Vec<Option<Self>> = vec![None; paths.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, path, text) =
                joined.map_err(|e| Error::load(PathBuf::new(), e.to_string()))?;
            let text = text.map_err(|e| Error::load(&path, e.to_string()))?;
            slots[index] = Some(Self::new(path, text));
        }
        Ok(slots.into_iter().flatten().collect())
    }

    pub fn parse(&self) -> Result<Vec<Statement>> {
        parse(&self.text).map_err(|e| Error::load(&self.origin, e.to_string()))
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }
}

/// Parse module text into statements.
pub fn parse(text: &str) -> Result<Vec<Statement>, SyntaxError> {
    let mut statements = Vec::new();
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((line, raw)) = lines.next() {
        let err = |message: String| SyntaxError { line, message };
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let (keyword, rest) = trimmed
            .split_once(char::is_whitespace)
            .map(|(k, r)| (k, r.trim()))
            .unwrap_or((trimmed, ""));

        let statement = match keyword {
            "provide" => Statement::Provide(name(rest).map_err(err)?),
            "require" => Statement::Require(name(rest).map_err(err)?),
            "native" => {
                let (path, builtin) = assignment(rest).map_err(err)?;
                Statement::Native {
                    path: name(path).map_err(err)?,
                    builtin: builtin.to_string(),
                }
            }
            "set" => {
                let (path, literal) = assignment(rest).map_err(err)?;
                let value = serde_json::from_str(literal)
                    .map_err(|e| err(format!("bad literal for `{path}`: {e}")))?;
                Statement::Set {
                    path: name(path).map_err(err)?,
                    value,
                }
            }
            "template" => {
                let mut head = rest.split_whitespace();
                let template_name = name(head.next().unwrap_or_default()).map_err(err)?;
                let kind = match head.next() {
                    None => ContentKind::default(),
                    Some(attr) => attr
                        .strip_prefix("kind=\"")
                        .and_then(|k| k.strip_suffix('"'))
                        .and_then(ContentKind::parse)
                        .ok_or_else(|| err(format!("bad template attribute `{attr}`")))?,
                };

                let mut body = Vec::new();
                let mut closed = false;
                for (_, body_line) in lines.by_ref() {
                    match body_line.trim() {
                        "end" => {
                            closed = true;
                            break;
                        }
                        t if t.starts_with("template ") => {
                            return Err(err(format!("template `{template_name}` is not closed")));
                        }
                        _ => body.push(body_line),
                    }
                }
                if !closed {
                    return Err(err(format!("template `{template_name}` is missing `end`")));
                }

                let template = Template::parse(&template_name, kind, &body)
                    .map_err(|e| err(format!("in template `{template_name}`: {e}")))?;
                Statement::Template(Arc::new(template))
            }
            "deltemplate" => deltemplate(rest).map_err(err)?,
            other => return Err(err(format!("unknown statement `{other}`"))),
        };
        statements.push(statement);
    }

    Ok(statements)
}

fn name(text: &str) -> Result<String, String> {
    let text = text.trim();
    split_path(text)?;
    Ok(text.to_string())
}

fn assignment(text: &str) -> Result<(&str, &str), String> {
    text.split_once('=')
        .map(|(l, r)| (l.trim(), r.trim()))
        .filter(|(l, r)| !l.is_empty() && !r.is_empty())
        .ok_or_else(|| format!("expected `<name> = <value>`, got `{text}`"))
}

/// `name [variant="v"] [priority N] = target`
fn deltemplate(text: &str) -> Result<Statement, String> {
    // `variant="..."` may itself contain `=`; the target never does.
    let (head, target) = text
        .rsplit_once('=')
        .map(|(l, r)| (l.trim(), r.trim()))
        .filter(|(l, r)| !l.is_empty() && !r.is_empty())
        .ok_or_else(|| format!("expected `<name> ... = <target>`, got `{text}`"))?;
    let mut words = head.split_whitespace();
    let delegate = name(words.next().unwrap_or_default())?;

    let mut variant = String::new();
    let mut priority = 0;
    while let Some(word) = words.next() {
        if let Some(v) = word.strip_prefix("variant=\"").and_then(|v| v.strip_suffix('"')) {
            variant = v.to_string();
        } else if word == "priority" {
            let n = words.next().ok_or("`priority` needs a number")?;
            priority = n
                .parse()
                .map_err(|_| format!("bad priority `{n}`"))?;
        } else {
            return Err(format!("unexpected `{word}` in deltemplate"));
        }
    }

    Ok(Statement::DelTemplate {
        name: delegate,
        variant,
        priority,
        target: name(target)?,
    })
}
