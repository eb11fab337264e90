//! External compiler command line.
//!
//! ```text
//! java -classpath <jar>:<classpath...> com.google.template.soy.SoyToJsSrcCompiler
//!      [--shouldGenerateJsdoc] [--shouldProvideRequireSoyNamespaces]
//!      [--shouldProvideRequireJsFunctions] [--useClosureStyle]
//!      [--pluginModules a,b] [--cssHandlingScheme GOOG]
//!      [--locales en,de --messageFilePathFormat i18n/{LOCALE}.xlf]
//!      [--protoFileDescriptors desc.pb]
//!      --outputPathFormat <root>/[{LOCALE}/]{INPUT_DIRECTORY}/{INPUT_FILE_NAME}.js
//!      <dirty files...>
//! ```

use std::path::{Path, PathBuf};

use super::OutputLayout;
use crate::config::{CompileOptions, ConfigError};
use crate::utils::exec::{COMPILER_FILTER, Cmd};

const COMPILER_CLASS: &str = "com.google.template.soy.SoyToJsSrcCompiler";

/// Build the compiler invocation for `files`, run from `input_dir`.
///
/// The java launcher is only accepted when compiled output is not loaded.
pub fn compiler_command(
    options: &CompileOptions,
    layout: &OutputLayout,
    input_dir: &Path,
    files: &[PathBuf],
) -> Result<Cmd, ConfigError> {
    let cmd = match &options.compiler_program {
        Some(program) => Cmd::from_slice(program),
        None if options.load_compiled_templates => {
            return Err(ConfigError::Validation(
                "the java compiler emits JavaScript, which the sandbox cannot load; \
                 set `compiler_program` or disable `load_compiled_templates`"
                    .into(),
            ));
        }
        None => {
            let entries = std::iter::once(&options.compiler_jar).chain(&options.classpath);
            let classpath = std::env::join_paths(entries)
                .map_err(|e| ConfigError::Validation(format!("bad classpath: {e}")))?;
            Cmd::new(&options.java_path)
                .arg("-classpath")
                .arg(classpath)
                .arg(COMPILER_CLASS)
        }
    };

    let flag = |on: bool, name: &'static str| if on { name } else { "" };
    let mut cmd = cmd.args([
        flag(options.should_generate_jsdoc, "--shouldGenerateJsdoc"),
        flag(
            options.should_provide_require_soy_namespaces,
            "--shouldProvideRequireSoyNamespaces",
        ),
        flag(
            options.should_provide_require_js_functions,
            "--shouldProvideRequireJsFunctions",
        ),
        flag(options.use_closure_style, "--useClosureStyle"),
    ]);

    if !options.plugin_modules.is_empty() {
        cmd = cmd
            .arg("--pluginModules")
            .arg(options.plugin_modules.join(","));
    }
    if let Some(scheme) = options.css_handling_scheme {
        cmd = cmd.arg("--cssHandlingScheme").arg(scheme.as_flag());
    }
    if !options.locales.is_empty() {
        cmd = cmd.arg("--locales").arg(options.locales.join(","));
        if let Some(format) = &options.message_file_path_format {
            cmd = cmd.arg("--messageFilePathFormat").arg(format);
        }
    }
    if let Some(descriptors) = &options.proto_file_descriptors {
        cmd = cmd.arg("--protoFileDescriptors").arg(descriptors);
    }

    Ok(cmd
        .arg("--outputPathFormat")
        .arg(layout.path_format())
        .args(files)
        .cwd(input_dir)
        .filter(&COMPILER_FILTER))
}
