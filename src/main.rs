//! Patchcord CLI
//!
//! Command-line host for the Patchcord graph engine.

use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use patchcord::cli::commands;
use patchcord::cli::{Cli, Commands};
use patchcord::EngineConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Patchcord v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::resolve_config(cli.config.as_deref(), cli.patch_dir.as_deref())?;
    debug!("{:?}", config);

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("Patchcord v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &EngineConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Nodes => commands::list_nodes(),
        Commands::Patches { search } => commands::list_patches(config, search.as_deref()),
        Commands::Show { patch } => commands::show_patch(config, &patch),
        Commands::Render {
            patch,
            input,
            output,
            block_size,
        } => commands::render_file(config, &patch, &input, &output, block_size),
        Commands::ExportFactory { dir } => commands::export_factory(config, &dir),
    }
}
