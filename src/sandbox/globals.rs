//! A context's global environment: a tree of dotted names.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::natives::NativeFn;
use super::template::Template;

/// One node in the global tree.
#[derive(Clone)]
pub enum Global {
    Namespace(BTreeMap<String, Global>),
    Template(Arc<Template>),
    Native(NativeFn),
    Value(Value),
}

impl Global {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Namespace(_) => "namespace",
            Self::Template(_) => "template",
            Self::Native(_) => "native helper",
            Self::Value(_) => "value",
        }
    }
}

impl std::fmt::Debug for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespace(children) => f
                .debug_set()
                .entries(children.keys())
                .finish(),
            Self::Template(t) => write!(f, "Template({})", t.name),
            Self::Native(_) => f.write_str("Native"),
            Self::Value(v) => write!(f, "Value({v})"),
        }
    }
}

/// Split and check a dotted path (`a.b.$$c`).
pub fn split_path(path: &str) -> Result<Vec<&str>, String> {
    let segments: Vec<&str> = path.split('.').collect();
    let valid = |s: &&str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    };
    if segments.iter().all(valid) {
        Ok(segments)
    } else {
        Err(format!("`{path}` is not a valid dotted name"))
    }
}

#[derive(Debug, Default, Clone)]
pub struct Globals {
    root: BTreeMap<String, Global>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a dotted name up. `None` for invalid or unbound names.
    pub fn resolve(&self, path: &str) -> Option<&Global> {
        let segments = split_path(path).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut node = self.root.get(*first)?;
        for segment in rest {
            match node {
                Global::Namespace(children) => node = children.get(*segment)?,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Make sure every segment of `path` exists as a namespace.
    pub fn provide(&mut self, path: &str) -> Result<(), String> {
        let segments = split_path(path)?;
        self.namespace_mut(&segments, path).map(|_| ())
    }

    /// Bind `value` at `path`, creating parent namespaces. Rebinding replaces.
    pub fn define(&mut self, path: &str, value: Global) -> Result<(), String> {
        let segments = split_path(path)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| format!("`{path}` is empty"))?;
        let parent = if parents.is_empty() {
            &mut self.root
        } else {
            self.namespace_mut(parents, path)?
        };
        if let Some(Global::Namespace(children)) = parent.get(*leaf)
            && !children.is_empty()
            && !matches!(value, Global::Namespace(_))
        {
            return Err(format!("`{path}` is already a non-empty namespace"));
        }
        parent.insert((*leaf).to_string(), value);
        Ok(())
    }

    fn namespace_mut(
        &mut self,
        segments: &[&str],
        path: &str,
    ) -> Result<&mut BTreeMap<String, Global>, String> {
        let mut map = &mut self.root;
        for segment in segments {
            let node = map
                .entry((*segment).to_string())
                .or_insert_with(|| Global::Namespace(BTreeMap::new()));
            map = match node {
                Global::Namespace(children) => children,
                other => {
                    return Err(format!(
                        "cannot provide `{path}`: `{segment}` is a {}",
                        other.kind_name()
                    ));
                }
            };
        }
        Ok(map)
    }
}
