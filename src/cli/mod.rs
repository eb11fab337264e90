//! Command-line interface module.

mod args;

pub use args::{Cli, Commands};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use soyloader::config::find_config_file;
use soyloader::{CompileOptions, Compiler, OptionsPatch, log};
use tokio::sync::Notify;

/// Options from the config file, or defaults when there is none.
pub fn load_options(cli: &Cli) -> Result<CompileOptions> {
    match find_config_file(&cli.config) {
        Some(path) => {
            log!("config"; "using {}", path.display());
            CompileOptions::from_path(&path)
                .with_context(|| format!("failed to load `{}`", path.display()))
        }
        None => Ok(CompileOptions::default()),
    }
}

pub async fn compile(options: CompileOptions, dir: Option<&Path>, watch: bool) -> Result<()> {
    let dir = dir.map_or_else(|| options.input_dir.clone(), Path::to_path_buf);
    let compiler = Compiler::new(options);
    if watch {
        compiler.set_options(OptionsPatch {
            allow_dynamic_recompile: Some(true),
            ..Default::default()
        })?;
    }

    compiler
        .compile_templates(&dir)
        .await
        .with_context(|| format!("failed to compile `{}`", dir.display()))?;
    if let Some(root) = compiler.output_root() {
        log!("compile"; "output in {}", root.display());
    }

    if watch {
        log!("watch"; "watching {} (Ctrl+C to stop)", dir.display());
        wait_for_shutdown().await?;
    }
    compiler.cleanup().await?;
    Ok(())
}

pub async fn render(
    options: CompileOptions,
    dir: PathBuf,
    template: &str,
    data: &str,
    ij: &str,
    locale: Option<&str>,
) -> Result<()> {
    let data: Value = serde_json::from_str(data).context("`--data` is not valid JSON")?;
    let ij: Value = serde_json::from_str(ij).context("`--ij` is not valid JSON")?;

    let compiler = Compiler::new(options);
    compiler.set_options(OptionsPatch {
        allow_dynamic_recompile: Some(false),
        load_compiled_templates: Some(true),
        ..Default::default()
    })?;
    compiler
        .compile_templates(&dir)
        .await
        .with_context(|| format!("failed to compile `{}`", dir.display()))?;

    let output = compiler.render(template, &data, &ij, locale);
    compiler.cleanup().await?;
    println!("{}", output?);
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    let notify = Arc::new(Notify::new());
    let handler = Arc::clone(&notify);
    ctrlc::set_handler(move || handler.notify_one())
        .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))?;
    notify.notified().await;
    log!("watch"; "shutting down...");
    Ok(())
}
