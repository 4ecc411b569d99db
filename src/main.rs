// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Install {
            formula,
            prefix,
            build_root,
            keep_build_root,
            source_cache,
            path,
            timeout,
            skip_test,
        } => commands::cmd_install(commands::InstallOptions {
            formula_path: formula,
            prefix,
            build_root,
            keep_build_root,
            source_cache,
            path,
            timeout,
            skip_test,
        }),
        Commands::Fetch {
            formula,
            dest,
            source_cache,
        } => commands::cmd_fetch(&formula, &dest, source_cache.as_deref()),
        Commands::Validate { formula } => commands::cmd_validate(&formula),
        Commands::Test { formula, prefix } => commands::cmd_test(&formula, &prefix),
        Commands::Checksum { file, algorithm } => commands::cmd_checksum(&file, &algorithm),
        Commands::Show { formula } => commands::cmd_show(&formula),
    }
}
