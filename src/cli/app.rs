use super::commands::auth::{ResourceCommands, TokenCommands};
use super::commands::batch::BatchCommands;
use super::commands::raw::{GetCommands, RawCommands};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dataverse-cli")]
#[command(about = "A CLI tool for calling the Microsoft Dataverse Web API")]
#[command(version)]
pub struct Cli {
    /// Config file (TOML); defaults to the user config file, then DATAVERSE_* variables
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire an access token with the configured app credentials
    Token(TokenCommands),
    /// Print the environment URL named by an access token's audience
    Resource(ResourceCommands),
    /// Execute a GET request
    Get(GetCommands),
    /// Execute raw HTTP requests to the Web API
    Raw(RawCommands),
    /// Send a $batch request built from a JSON file of sub-requests
    Batch(BatchCommands),
}
