//! Compiler configuration (`soyloader.toml`).
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error      # ConfigError
//! ├── patch      # OptionsPatch (explicit, typed merge)
//! ├── util       # config discovery + strict TOML parsing
//! └── mod.rs     # CompileOptions (this file)
//! ```
//!
//! # Example
//!
//! ```toml
//! input_dir = "templates"
//! output_dir = "build/soy"
//! unique_dir = false
//! precompiled_dir = "prebuilt/soy"
//! locales = ["en", "pt-BR"]
//! message_file_path_format = "i18n/translations_{LOCALE}.xlf"
//! allow_dynamic_recompile = true
//! concat_output = true
//! ```

mod error;
mod patch;
mod util;

pub use error::ConfigError;
pub use patch::OptionsPatch;
pub use util::find_config_file;

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Default config file name, searched upward from cwd by the CLI.
pub const CONFIG_FILE: &str = "soyloader.toml";

/// How the compiler treats `{css}` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CssHandlingScheme {
    Literal,
    Reference,
    Goog,
}

impl CssHandlingScheme {
    /// Value passed to `--cssHandlingScheme`.
    pub const fn as_flag(self) -> &'static str {
        match self {
            Self::Literal => "LITERAL",
            Self::Reference => "REFERENCE",
            Self::Goog => "GOOG",
        }
    }
}

/// Configuration of one compiler instance.
///
/// Immutable once built; changed only through [`CompileOptions::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Root of the template sources.
    pub input_dir: PathBuf,
    /// Root of the generated code. Falls back to `tmp_dir`.
    pub output_dir: Option<PathBuf>,
    /// Scratch root used when no `output_dir` is set.
    pub tmp_dir: PathBuf,
    /// Put each run's output in a fresh `<output>/<unix-millis>` directory.
    pub unique_dir: bool,
    /// Read-only root of previously compiled artifacts.
    pub precompiled_dir: Option<PathBuf>,
    /// Translation targets. Empty means a single unlocalized output.
    pub locales: Vec<String>,
    /// Message catalog path with a `{LOCALE}` placeholder.
    pub message_file_path_format: Option<String>,
    /// Watch compiled sources and recompile on change.
    pub allow_dynamic_recompile: bool,
    /// Load compiled output into sandbox contexts.
    ///
    /// Loading needs `compiler_program`: the java compiler's JavaScript
    /// output is not in the module language.
    pub load_compiled_templates: bool,
    /// Concatenate each locale's output into one file.
    pub concat_output: bool,
    pub concat_file_name: String,
    /// Remove the unique output directory on cleanup.
    pub erase_temporary_files: bool,

    pub should_provide_require_soy_namespaces: bool,
    pub should_provide_require_js_functions: bool,
    pub should_generate_jsdoc: bool,
    pub use_closure_style: bool,
    pub css_handling_scheme: Option<CssHandlingScheme>,
    pub plugin_modules: Vec<String>,
    pub classpath: Vec<PathBuf>,
    pub proto_file_descriptors: Option<PathBuf>,

    /// Java launcher used to run `compiler_jar`.
    pub java_path: String,
    pub compiler_jar: PathBuf,
    /// Replaces the java launcher: program followed by leading arguments.
    /// Required while `load_compiled_templates` is on.
    pub compiler_program: Option<Vec<String>>,

    /// Extra modules executed with the runtime support, once per context.
    pub context_paths: Vec<PathBuf>,
    /// Minimum gap between two accepted change notifications for one file.
    pub debounce_ms: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            input_dir: std::env::current_dir().unwrap_or_default(),
            output_dir: None,
            tmp_dir: std::env::temp_dir().join("soynode"),
            unique_dir: true,
            precompiled_dir: None,
            locales: Vec::new(),
            message_file_path_format: None,
            allow_dynamic_recompile: false,
            load_compiled_templates: true,
            concat_output: false,
            concat_file_name: "compiled".to_string(),
            erase_temporary_files: false,
            should_provide_require_soy_namespaces: true,
            should_provide_require_js_functions: false,
            should_generate_jsdoc: false,
            use_closure_style: false,
            css_handling_scheme: None,
            plugin_modules: Vec::new(),
            classpath: Vec::new(),
            proto_file_descriptors: None,
            java_path: "java".to_string(),
            compiler_jar: PathBuf::from("SoyToJsSrcCompiler.jar"),
            compiler_program: None,
            context_paths: Vec::new(),
            debounce_ms: 300,
        }
    }
}

impl CompileOptions {
    /// Parse options from TOML, rejecting unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: Self = util::parse_strict(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a config file.
    ///
    /// Relative paths in the file are resolved against the file's directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut options = Self::from_toml_str(&content)?;
        if let Some(root) = path.parent() {
            options.resolve_paths(root);
        }
        Ok(options)
    }

    /// Apply an override set, then re-validate.
    ///
    /// On failure `self` is left untouched.
    pub fn merge(&mut self, patch: OptionsPatch) -> Result<(), ConfigError> {
        let mut merged = self.clone();
        patch.apply_to(&mut merged);
        merged.validate()?;
        *self = merged;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.should_provide_require_soy_namespaces && self.should_provide_require_js_functions {
            return Err(ConfigError::Validation(
                "`should_provide_require_soy_namespaces` and \
                 `should_provide_require_js_functions` are mutually exclusive"
                    .into(),
            ));
        }
        if self.concat_file_name.is_empty() {
            return Err(ConfigError::Validation(
                "`concat_file_name` must not be empty".into(),
            ));
        }
        let mut seen = rustc_hash::FxHashSet::default();
        for locale in &self.locales {
            if locale.trim().is_empty() {
                return Err(ConfigError::Validation("empty locale in `locales`".into()));
            }
            if !seen.insert(locale.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate locale `{locale}`"
                )));
            }
        }
        if let Some(program) = &self.compiler_program
            && program.is_empty()
        {
            return Err(ConfigError::Validation(
                "`compiler_program` must name a program".into(),
            ));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, root: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        join(&mut self.input_dir);
        join(&mut self.tmp_dir);
        join(&mut self.compiler_jar);
        if let Some(dir) = self.output_dir.as_mut() {
            join(dir);
        }
        if let Some(dir) = self.precompiled_dir.as_mut() {
            join(dir);
        }
        if let Some(path) = self.proto_file_descriptors.as_mut() {
            join(path);
        }
        self.classpath.iter_mut().for_each(join);
        self.context_paths.iter_mut().for_each(join);
    }

    /// Output root before per-run uniquification.
    pub fn base_output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.tmp_dir)
    }

    /// More than one locale means per-locale output subdirectories.
    pub fn is_multi_locale(&self) -> bool {
        self.locales.len() > 1
    }

    /// Locales to produce output for; `None` is the unlocalized default.
    pub fn locale_keys(&self) -> Vec<Option<String>> {
        if self.locales.is_empty() {
            vec![None]
        } else {
            self.locales.iter().cloned().map(Some).collect()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
