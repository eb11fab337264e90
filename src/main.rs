//! soyloader - Soy template compiler and loader.

mod cli;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    soyloader::logger::set_verbose(cli.verbose);

    let options = cli::load_options(&cli)?;
    match &cli.command {
        Commands::Compile { dir, watch } => cli::compile(options, dir.as_deref(), *watch).await,
        Commands::Render {
            dir,
            template,
            data,
            ij,
            locale,
        } => {
            cli::render(options, dir.clone(), template, data, ij, locale.as_deref()).await
        }
    }
}
