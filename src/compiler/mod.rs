//! Compiler instance: options, sandbox contexts and the compile pipeline.
//!
//! # Module Structure
//!
//! ```text
//! compiler/
//! ├── args       # external compiler command line
//! ├── concat     # per-locale bundles
//! ├── output     # OutputLayout (generated file paths)
//! ├── pipeline   # compile → post-compile → load, watch passes
//! └── mod.rs     # Compiler (this file)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let compiler = Compiler::new(CompileOptions::from_path(path)?);
//! compiler.compile_templates(Path::new("templates")).await?;
//! let html = compiler.render("mail.letters.formletter", &data, &Value::Null, None)?;
//! ```

mod args;
mod concat;
mod output;
mod pipeline;

#[cfg(test)]
mod tests;

pub use output::{CONCAT_SUFFIX, GENERATED_EXT, OutputLayout};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::{CompileOptions, ConfigError, OptionsPatch};
use crate::error::{Error, Result};
use crate::sandbox::{ModuleSource, SandboxContext, TemplateFn};
use crate::utils::path::find_files;
use crate::watch::PassOutcome;
use crate::{debug, log};

/// Compiles template sources and serves the loaded templates.
///
/// Cloning is cheap; clones share options, contexts and the watcher.
#[derive(Clone)]
pub struct Compiler {
    shared: Arc<Shared>,
}

struct Shared {
    options: RwLock<CompileOptions>,
    contexts: Mutex<FxHashMap<Option<String>, SandboxContext>>,
    /// Active output root of the last compile.
    output_root: Mutex<Option<PathBuf>>,
    watch: Mutex<Option<pipeline::WatchTarget>>,
    events: broadcast::Sender<PassOutcome>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                options: RwLock::new(options),
                contexts: Mutex::new(FxHashMap::default()),
                output_root: Mutex::new(None),
                watch: Mutex::new(None),
                events,
            }),
        }
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> CompileOptions {
        self.shared.options.read().clone()
    }

    /// Merge overrides into the options. Unchanged on error.
    pub fn set_options(&self, patch: OptionsPatch) -> Result<()> {
        self.shared.options.write().merge(patch)?;
        Ok(())
    }

    /// Outcomes of watch-triggered passes.
    pub fn subscribe(&self) -> broadcast::Receiver<PassOutcome> {
        self.shared.events.subscribe()
    }

    /// Output root of the most recent compile, if any.
    pub fn output_root(&self) -> Option<PathBuf> {
        self.shared.output_root.lock().clone()
    }

    /// Compile every `*.soy` file under `dir`.
    pub async fn compile_templates(&self, dir: &Path) -> Result<()> {
        let files = find_files(dir, ".soy").map_err(|e| Error::io(dir, e))?;
        log!("compile"; "found {} template file(s) in {}", files.len(), dir.display());
        self.compile_template_files(dir, &files).await
    }

    /// Compile `files` (relative to `dir`, or absolute inside it).
    pub async fn compile_template_files(&self, dir: &Path, files: &[PathBuf]) -> Result<()> {
        self.run_initial_compile(dir, files).await
    }

    /// Load every generated `*.soy.js` module under `dir` into a context.
    pub async fn load_compiled_templates(&self, dir: &Path, locale: Option<&str>) -> Result<()> {
        let files: Vec<PathBuf> = find_files(dir, ".soy.js")
            .map_err(|e| Error::io(dir, e))?
            .into_iter()
            .map(|f| dir.join(f))
            .collect();
        self.load_compiled_template_files(&files, locale).await
    }

    /// Load generated modules, in order, into the context for `locale`.
    pub async fn load_compiled_template_files(
        &self,
        files: &[PathBuf],
        locale: Option<&str>,
    ) -> Result<()> {
        let extra_support = self.options().context_paths;
        self.load_into_context(locale, files, &extra_support).await
    }

    /// Resolve a template of the `locale` context (`None`: default context).
    pub fn get_template_fn(&self, name: &str, locale: Option<&str>) -> Result<TemplateFn> {
        self.ensure_loading_enabled()?;
        let mut contexts = self.shared.contexts.lock();
        let context = contexts
            .get_mut(&locale.map(str::to_string))
            .ok_or_else(|| no_context(name, locale))?;
        context.get_function(name)
    }

    /// Render a template to a string.
    pub fn render(&self, name: &str, data: &Value, ij: &Value, locale: Option<&str>) -> Result<String> {
        self.ensure_loading_enabled()?;
        let mut contexts = self.shared.contexts.lock();
        let context = contexts
            .get_mut(&locale.map(str::to_string))
            .ok_or_else(|| no_context(name, locale))?;
        context.render(name, data, ij)
    }

    /// Run `f` on the raw context for `locale`, if one exists.
    pub fn with_context<R>(
        &self,
        locale: Option<&str>,
        f: impl FnOnce(&mut SandboxContext) -> R,
    ) -> Option<R> {
        self.shared
            .contexts
            .lock()
            .get_mut(&locale.map(str::to_string))
            .map(f)
    }

    /// Install `context` for its locale, returning the one it replaces.
    pub fn replace_context(&self, context: SandboxContext) -> Option<SandboxContext> {
        let key = context.locale().map(str::to_string);
        self.shared.contexts.lock().insert(key, context)
    }

    /// Stop watching and, if configured, remove this run's output directory.
    pub async fn cleanup(&self) -> Result<()> {
        self.shared.watch.lock().take();

        let options = self.options();
        if !(options.erase_temporary_files && options.unique_dir) {
            return Ok(());
        }
        let root = self.shared.output_root.lock().take();
        if let Some(root) = root {
            match tokio::fs::remove_dir_all(&root).await {
                Ok(()) => debug!("compile"; "removed {}", root.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(root, e)),
            }
        }
        Ok(())
    }

    fn ensure_loading_enabled(&self) -> Result<()> {
        if self.shared.options.read().load_compiled_templates {
            Ok(())
        } else {
            Err(ConfigError::LoadingDisabled.into())
        }
    }

    /// Fetch `files`, then execute them into the `locale` context.
    ///
    /// The context is created on first use, with `extra_support` as its
    /// additional support modules.
    async fn load_into_context(
        &self,
        locale: Option<&str>,
        files: &[PathBuf],
        extra_support: &[PathBuf],
    ) -> Result<()> {
        let key = locale.map(str::to_string);
        let sources = ModuleSource::fetch_all(files).await?;

        let exists = self.shared.contexts.lock().contains_key(&key);
        if !exists {
            let extra = ModuleSource::fetch_all(extra_support).await?;
            self.shared
                .contexts
                .lock()
                .entry(key.clone())
                .or_insert_with(|| SandboxContext::new(key.clone()).with_extra_support(extra));
        }

        let mut contexts = self.shared.contexts.lock();
        let context = contexts
            .entry(key.clone())
            .or_insert_with(|| SandboxContext::new(key));
        context.load_sources(&sources)
    }
}

fn no_context(name: &str, locale: Option<&str>) -> Error {
    Error::UnknownTemplate {
        name: name.to_string(),
        reason: match locale {
            Some(locale) => format!("no templates loaded for locale `{locale}`"),
            None => "no templates loaded".to_string(),
        },
    }
}
