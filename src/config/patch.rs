//! Typed option overrides.
//!
//! Every overridable option appears here exactly once; anything else in a
//! parsed patch is an unknown key and is rejected.

use serde::Deserialize;
use std::path::PathBuf;

use super::{CompileOptions, ConfigError, CssHandlingScheme, util};

/// A partial set of [`CompileOptions`]; `None` leaves a field unchanged.
///
/// Optional options take `Some(None)` to clear them. TOML has no null, so a
/// parsed patch can only set those.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptionsPatch {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<Option<PathBuf>>,
    pub tmp_dir: Option<PathBuf>,
    pub unique_dir: Option<bool>,
    pub precompiled_dir: Option<Option<PathBuf>>,
    pub locales: Option<Vec<String>>,
    pub message_file_path_format: Option<Option<String>>,
    pub allow_dynamic_recompile: Option<bool>,
    pub load_compiled_templates: Option<bool>,
    pub concat_output: Option<bool>,
    pub concat_file_name: Option<String>,
    pub erase_temporary_files: Option<bool>,
    pub should_provide_require_soy_namespaces: Option<bool>,
    pub should_provide_require_js_functions: Option<bool>,
    pub should_generate_jsdoc: Option<bool>,
    pub use_closure_style: Option<bool>,
    pub css_handling_scheme: Option<Option<CssHandlingScheme>>,
    pub plugin_modules: Option<Vec<String>>,
    pub classpath: Option<Vec<PathBuf>>,
    pub proto_file_descriptors: Option<Option<PathBuf>>,
    pub java_path: Option<String>,
    pub compiler_jar: Option<PathBuf>,
    pub compiler_program: Option<Option<Vec<String>>>,
    pub context_paths: Option<Vec<PathBuf>>,
    pub debounce_ms: Option<u64>,
}

impl OptionsPatch {
    /// Parse a patch from TOML, rejecting unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        util::parse_strict(content)
    }

    pub(super) fn apply_to(self, options: &mut CompileOptions) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn set_some<T>(slot: &mut Option<T>, value: Option<Option<T>>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut options.input_dir, self.input_dir);
        set_some(&mut options.output_dir, self.output_dir);
        set(&mut options.tmp_dir, self.tmp_dir);
        set(&mut options.unique_dir, self.unique_dir);
        set_some(&mut options.precompiled_dir, self.precompiled_dir);
        set(&mut options.locales, self.locales);
        set_some(
            &mut options.message_file_path_format,
            self.message_file_path_format,
        );
        set(
            &mut options.allow_dynamic_recompile,
            self.allow_dynamic_recompile,
        );
        set(
            &mut options.load_compiled_templates,
            self.load_compiled_templates,
        );
        set(&mut options.concat_output, self.concat_output);
        set(&mut options.concat_file_name, self.concat_file_name);
        set(&mut options.erase_temporary_files, self.erase_temporary_files);
        set(
            &mut options.should_provide_require_soy_namespaces,
            self.should_provide_require_soy_namespaces,
        );
        set(
            &mut options.should_provide_require_js_functions,
            self.should_provide_require_js_functions,
        );
        set(&mut options.should_generate_jsdoc, self.should_generate_jsdoc);
        set(&mut options.use_closure_style, self.use_closure_style);
        set_some(&mut options.css_handling_scheme, self.css_handling_scheme);
        set(&mut options.plugin_modules, self.plugin_modules);
        set(&mut options.classpath, self.classpath);
        set_some(
            &mut options.proto_file_descriptors,
            self.proto_file_descriptors,
        );
        set(&mut options.java_path, self.java_path);
        set(&mut options.compiler_jar, self.compiler_jar);
        set_some(&mut options.compiler_program, self.compiler_program);
        set(&mut options.context_paths, self.context_paths);
        set(&mut options.debounce_ms, self.debounce_ms);
    }
}
