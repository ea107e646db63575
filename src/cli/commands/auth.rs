//! Token and claim commands

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use colored::*;
use std::path::Path;

use dataverse_client::auth::{AuthToken, claims};

use super::Session;

#[derive(Args)]
pub struct TokenCommands {
    /// Print the full access token
    #[arg(long)]
    pub show: bool,
}

#[derive(Args)]
pub struct ResourceCommands {
    /// JWT access token
    pub token: String,
}

pub async fn handle_token_command(args: TokenCommands, config_path: Option<&Path>) -> Result<()> {
    let session = Session::open(config_path)?;
    let token = session.token().await?;

    print_token(&token, args.show);
    Ok(())
}

pub fn handle_resource_command(args: ResourceCommands) -> Result<()> {
    match claims::resource_from_access_token(&args.token) {
        Some(url) => {
            println!("{}", url);
            Ok(())
        }
        None => anyhow::bail!("No Dataverse audience found in token"),
    }
}

fn print_token(token: &AuthToken, show: bool) {
    let remaining = token.remaining(Utc::now()).num_seconds();

    println!("{} {}", "Resource:".bold(), token.resource.cyan());
    println!("{} {}", "Type:".bold(), token.token_type);
    println!(
        "{} {} ({}s remaining)",
        "Expires:".bold(),
        token.expires_on.format("%Y-%m-%d %H:%M:%S UTC"),
        remaining
    );

    if show {
        println!("{} {}", "Token:".bold(), token.access_token);
    } else {
        println!("{} {}", "Token:".bold(), token.preview().dimmed());
    }
}
