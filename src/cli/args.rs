//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use soyloader::config::CONFIG_FILE;
use std::path::PathBuf;

/// Compile Soy templates and render them from the generated code
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compile every template under a directory
    #[command(visible_alias = "c")]
    Compile {
        /// Template directory (default: `input_dir` from the config)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Keep running and recompile templates when they change
        #[arg(short, long)]
        watch: bool,
    },

    /// Compile a directory and render one template to stdout
    #[command(visible_alias = "r")]
    Render {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: PathBuf,

        /// Fully qualified template name, e.g. `mail.letters.hello`
        template: String,

        /// Template data as a JSON object
        #[arg(short, long, default_value = "{}")]
        data: String,

        /// Injected data (`$ij`) as a JSON object
        #[arg(long, default_value = "{}")]
        ij: String,

        /// Locale to render with (must be one of the configured locales)
        #[arg(short, long)]
        locale: Option<String>,
    },
}
