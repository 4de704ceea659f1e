use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use localpair::{
    app::load_config,
    cache::CacheCoordinator,
    cli::{handle_command, run_shell, Cli, Workspace},
    context::CodeAnalyzer,
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let cache = Arc::new(CacheCoordinator::new(config.cache.coordinator_config())?);
    let analyzer = CodeAnalyzer::new(cache, config.analysis)?;

    // Determine project path
    let root = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let workspace = Workspace::new(analyzer, root, cli.format);

    match &cli.command {
        Some(command) => handle_command(command, &workspace).await,
        None => run_shell(&workspace).await,
    }
}
