use anyhow::{Context, Result};
use clap::Parser;
use log::info;

mod cli;

use cli::{Cli, Commands};

fn init_logging(log_file: Option<&std::path::Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));

    if let Some(path) = log_file {
        // Truncate on each run
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder
            .filter_level(log::LevelFilter::Debug)
            .parse_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    info!("Starting dataverse-cli");

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Token(args) => cli::commands::handle_token_command(args, config_path).await?,
        Commands::Resource(args) => cli::commands::handle_resource_command(args)?,
        Commands::Get(args) => cli::commands::handle_get_command(args, config_path).await?,
        Commands::Raw(args) => cli::commands::handle_raw_command(args, config_path).await?,
        Commands::Batch(args) => cli::commands::handle_batch_command(args, config_path).await?,
    }

    Ok(())
}
