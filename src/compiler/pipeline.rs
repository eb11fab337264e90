//! Compile pipeline.
//!
//! ```text
//! initial:  files ─> filter_dirty ─> compile(dirty) ─> post_compile(all) per locale
//!                                                      ├─ concat (optional, failures logged)
//!                                                      └─ load into the locale's context
//! watch:    changed ─────────────────> compile(changed) ─> post_compile(all) per locale
//! ```
//!
//! Each compile call that enables watching adds a registration holding its
//! own input dir, layout and file list. A watched file belongs to the first
//! registration that listed it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::args::compiler_command;
use super::concat::concat_files;
use super::{Compiler, OutputLayout};
use crate::cache::filter_dirty;
use crate::config::{CompileOptions, ConfigError};
use crate::error::{Error, Result};
use crate::utils::path::{normalize_path, relative_to};
use crate::watch::{PassFuture, PassRunner, Scheduler, WatchSet};
use crate::{debug, log};

/// What watch passes recompile against.
pub(super) struct WatchTarget {
    set: WatchSet,
    registrations: Vec<Registration>,
}

/// One compile call's view of its sources.
struct Registration {
    input_dir: PathBuf,
    layout: OutputLayout,
    /// Files of that call, relative to `input_dir`.
    files: Vec<PathBuf>,
}

impl Registration {
    /// `path` (absolute) relative to this registration, if it lists it.
    fn owns(&self, path: &Path) -> Option<PathBuf> {
        relative_to(path, &self.input_dir).filter(|file| self.files.contains(file))
    }
}

impl Compiler {
    pub(super) async fn run_initial_compile(&self, dir: &Path, files: &[PathBuf]) -> Result<()> {
        let options = self.options();
        let files = relativize(dir, files)?;
        let dir = &normalize_path(dir);
        let multi_locale = options.is_multi_locale();

        let layout = OutputLayout::new(self.prepare_output_root(&options), multi_locale);
        let precompiled = options
            .precompiled_dir
            .as_ref()
            .map(|root| OutputLayout::new(root.clone(), multi_locale));

        let dirty = filter_dirty(&layout, precompiled.as_ref(), &files, &options.locale_keys()).await;
        self.compile(dir, &layout, &files, &dirty, &options).await?;

        if options.allow_dynamic_recompile {
            self.watch(dir, &layout, &files, &options);
        }
        Ok(())
    }

    /// Active output root for a new run.
    fn prepare_output_root(&self, options: &CompileOptions) -> PathBuf {
        let base = std::path::absolute(options.base_output_dir())
            .unwrap_or_else(|_| options.base_output_dir().to_path_buf());
        let root = if options.unique_dir {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default();
            base.join(millis.to_string())
        } else {
            base
        };
        *self.shared.output_root.lock() = Some(root.clone());
        root
    }

    /// Run the compiler over `dirty`, then post-process `all` per locale.
    ///
    /// An empty `dirty` skips the compiler but still post-processes.
    async fn compile(
        &self,
        dir: &Path,
        layout: &OutputLayout,
        all: &[PathBuf],
        dirty: &[PathBuf],
        options: &CompileOptions,
    ) -> Result<()> {
        if dirty.is_empty() {
            debug!("compile"; "nothing to compile, {} file(s) up to date", all.len());
        } else {
            tokio::fs::create_dir_all(layout.root())
                .await
                .map_err(|e| Error::io(layout.root(), e))?;

            let cmd = compiler_command(options, layout, dir, dirty)?;
            log!("compile"; "compiling {} file(s)", dirty.len());
            debug!("compile"; "{}", cmd.display());
            cmd.run().await?;
        }

        for locale in options.locale_keys() {
            self.post_compile(layout, all, locale.as_deref(), options).await?;
        }
        Ok(())
    }

    async fn post_compile(
        &self,
        layout: &OutputLayout,
        files: &[PathBuf],
        locale: Option<&str>,
        options: &CompileOptions,
    ) -> Result<()> {
        let paths = layout.artifacts(files, locale);

        if options.concat_output {
            let dest = layout.concat(&options.concat_file_name, locale);
            match concat_files(&paths, &dest).await {
                Ok(()) => debug!("compile"; "wrote {}", dest.display()),
                Err(e) => log!("compile"; "concatenation into {} failed: {}", dest.display(), e),
            }
        }

        if options.load_compiled_templates {
            self.load_into_context(locale, &paths, &options.context_paths).await?;
        }
        Ok(())
    }

    /// Register `files` for watching, starting the watcher on first use.
    ///
    /// `dir` is already normalized.
    fn watch(&self, dir: &Path, layout: &OutputLayout, files: &[PathBuf], options: &CompileOptions) {
        let mut guard = self.shared.watch.lock();
        if guard.is_none() {
            let scheduler =
                Scheduler::new(options.debounce(), self.pass_runner(), self.shared.events.clone());
            match WatchSet::new(scheduler) {
                Ok(set) => {
                    *guard = Some(WatchTarget {
                        set,
                        registrations: Vec::new(),
                    });
                }
                Err(e) => {
                    log!("watch"; "cannot start watcher: {}", e);
                    return;
                }
            }
        }
        let Some(target) = guard.as_mut() else {
            return;
        };

        for file in files {
            target.set.register(&dir.join(file));
        }
        let existing = target
            .registrations
            .iter_mut()
            .find(|r| r.input_dir.as_path() == dir && r.layout == *layout);
        match existing {
            Some(registration) => {
                for file in files {
                    if !registration.files.contains(file) {
                        registration.files.push(file.clone());
                    }
                }
            }
            None => target.registrations.push(Registration {
                input_dir: dir.to_path_buf(),
                layout: layout.clone(),
                files: files.to_vec(),
            }),
        }
        log!("watch"; "watching {} file(s)", target.set.files().len());
    }

    fn pass_runner(&self) -> PassRunner {
        let shared = Arc::downgrade(&self.shared);
        Arc::new(move |changed: Vec<PathBuf>| {
            let shared = shared.clone();
            Box::pin(async move {
                match shared.upgrade() {
                    Some(shared) => Compiler { shared }.recompile(changed).await,
                    None => Ok(()),
                }
            }) as PassFuture
        })
    }

    /// Watch pass: recompile `changed` (absolute) in the registration that
    /// owns each file, reloading that registration's files.
    ///
    /// Every affected registration is recompiled; the first error is returned.
    async fn recompile(&self, changed: Vec<PathBuf>) -> Result<()> {
        let passes: Vec<_> = {
            let guard = self.shared.watch.lock();
            let Some(target) = guard.as_ref() else {
                return Ok(());
            };
            let mut dirty: Vec<Vec<PathBuf>> = vec![Vec::new(); target.registrations.len()];
            for path in &changed {
                let owner = target
                    .registrations
                    .iter()
                    .enumerate()
                    .find_map(|(i, r)| r.owns(path).map(|file| (i, file)));
                match owner {
                    Some((i, file)) => dirty[i].push(file),
                    None => debug!("watch"; "{} is not part of any compile", path.display()),
                }
            }
            target
                .registrations
                .iter()
                .zip(dirty)
                .filter(|(_, dirty)| !dirty.is_empty())
                .map(|(r, dirty)| (r.input_dir.clone(), r.layout.clone(), r.files.clone(), dirty))
                .collect()
        };
        let options = self.options();

        let mut first_error = None;
        for (dir, layout, all, dirty) in passes {
            if let Err(e) = self.compile(&dir, &layout, &all, &dirty, &options).await {
                log!("watch"; "recompile in {} failed: {}", dir.display(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn relativize(dir: &Path, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    files
        .iter()
        .map(|file| {
            relative_to(file, dir).ok_or_else(|| {
                Error::from(ConfigError::Validation(format!(
                    "`{}` is not inside `{}`",
                    file.display(),
                    dir.display()
                )))
            })
        })
        .collect()
}
