//! One isolated execution environment.

use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::globals::{Global, Globals, split_path};
use super::module::{ModuleSource, Statement};
use super::natives;
use super::registry::OverrideRegistry;
use super::render::{Content, Renderer};
use super::support::SUPPORT_MODULES;
use super::template::{ContentKind, Template};
use crate::debug;
use crate::error::{Error, Result};

/// A resolved template function.
#[derive(Debug, Clone)]
pub struct TemplateFn(Arc<Template>);

impl TemplateFn {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> ContentKind {
        self.0.kind
    }

    /// Run the template against `context`'s globals and delegates.
    pub fn call(&self, context: &SandboxContext, data: &Value, ij: &Value) -> Result<Content> {
        Renderer::new(&context.globals, &context.registry, ij)
            .render(&self.0, data)
            .map_err(|message| Error::Render {
                template: self.0.name.clone(),
                message,
            })
    }
}

/// Globals, delegate registry and function cache of one locale.
///
/// Runtime support runs on the first load only. Later loads clear the
/// delegate registry instead, so re-executed `deltemplate` statements do not
/// collide with their earlier registrations.
#[derive(Debug)]
pub struct SandboxContext {
    locale: Option<String>,
    globals: Globals,
    registry: OverrideRegistry,
    initialized: bool,
    support_executions: usize,
    extra_support: Vec<ModuleSource>,
    functions: FxHashMap<String, TemplateFn>,
}

impl SandboxContext {
    pub fn new(locale: Option<String>) -> Self {
        debug!("sandbox"; "new context for {}", locale.as_deref().unwrap_or("default locale"));
        Self {
            locale,
            globals: Globals::new(),
            registry: OverrideRegistry::new(),
            initialized: false,
            support_executions: 0,
            extra_support: Vec::new(),
            functions: FxHashMap::default(),
        }
    }

    /// Modules executed right after the built-in support, once.
    pub fn with_extra_support(mut self, modules: Vec<ModuleSource>) -> Self {
        self.extra_support = modules;
        self
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// How many times the runtime support has run in this context.
    pub fn support_executions(&self) -> usize {
        self.support_executions
    }

    pub fn registry(&self) -> &OverrideRegistry {
        &self.registry
    }

    /// Read `paths` concurrently, then execute them in order.
    pub async fn load_modules(&mut self, paths: &[PathBuf]) -> Result<()> {
        let sources = ModuleSource::fetch_all(paths).await?;
        self.load_sources(&sources)
    }

    /// Execute already-fetched modules in order.
    ///
    /// Stops at the first failing module. The function cache is cleared only
    /// when every module succeeded.
    pub fn load_sources(&mut self, sources: &[ModuleSource]) -> Result<()> {
        if self.initialized {
            self.reset_override_registry();
        } else {
            self.run_support()?;
        }

        for source in sources {
            self.execute(source)?;
        }
        self.functions.clear();
        debug!("sandbox"; "{} module(s) loaded into {}", sources.len(),
            self.locale.as_deref().unwrap_or("default context"));
        Ok(())
    }

    /// Forget every registered delegate.
    pub fn reset_override_registry(&mut self) {
        self.registry.clear();
    }

    fn run_support(&mut self) -> Result<()> {
        self.initialized = true;
        self.support_executions += 1;

        for (name, text) in SUPPORT_MODULES {
            self.execute(&ModuleSource::new(*name, *text))?;
        }
        let extra = std::mem::take(&mut self.extra_support);
        let result = extra.iter().try_for_each(|source| self.execute(source));
        self.extra_support = extra;
        result
    }

    fn execute(&mut self, source: &ModuleSource) -> Result<()> {
        let fail = |message: String| Error::load(source.origin(), message);

        for statement in source.parse()? {
            match statement {
                Statement::Provide(path) => self.globals.provide(&path).map_err(fail)?,
                Statement::Require(path) => {
                    if self.globals.resolve(&path).is_none() {
                        return Err(fail(format!("goog.require could not find: {path}")));
                    }
                }
                Statement::Native { path, builtin } => {
                    let f = natives::lookup(&builtin)
                        .ok_or_else(|| fail(format!("unknown builtin `{builtin}`")))?;
                    self.globals.define(&path, Global::Native(f)).map_err(fail)?;
                }
                Statement::Set { path, value } => {
                    self.globals.define(&path, Global::Value(value)).map_err(fail)?;
                }
                Statement::Template(template) => {
                    let name = template.name.clone();
                    self.globals.define(&name, Global::Template(template)).map_err(fail)?;
                }
                Statement::DelTemplate {
                    name,
                    variant,
                    priority,
                    target,
                } => self
                    .registry
                    .register(&name, &variant, priority, &target)
                    .map_err(fail)?,
            }
        }
        Ok(())
    }

    /// Resolve a dotted name to a template function, caching the result.
    pub fn get_function(&mut self, name: &str) -> Result<TemplateFn> {
        if let Some(f) = self.functions.get(name) {
            return Ok(f.clone());
        }

        let unknown = |reason: String| Error::UnknownTemplate {
            name: name.to_string(),
            reason,
        };
        split_path(name).map_err(unknown)?;
        let f = match self.globals.resolve(name) {
            Some(Global::Template(template)) => TemplateFn(Arc::clone(template)),
            Some(other) => return Err(unknown(format!("resolves to a {}", other.kind_name()))),
            None => return Err(unknown("not defined in this context".into())),
        };

        self.functions.insert(name.to_string(), f.clone());
        Ok(f)
    }

    /// Render `name` and coerce the result to a string.
    pub fn render(&mut self, name: &str, data: &Value, ij: &Value) -> Result<String> {
        let f = self.get_function(name)?;
        Ok(f.call(self, data, ij)?.into_string())
    }

    pub fn cached_functions(&self) -> usize {
        self.functions.len()
    }
}
