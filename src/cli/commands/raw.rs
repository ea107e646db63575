//! Single-request commands

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::*;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

use dataverse_client::api::{HttpResult, Method, RequestOptions};

use super::Session;

#[derive(Args)]
pub struct GetCommands {
    /// Path and query (e.g., "api/data/v9.2/accounts?$select=name&$top=5")
    pub query: String,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Include status, timing and request ids
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Args)]
pub struct RawCommands {
    /// Path and query relative to the environment URL
    pub endpoint: String,

    /// HTTP method
    #[arg(long, default_value = "get")]
    pub method: HttpMethod,

    /// Request body data (JSON, or sent verbatim when a Content-Type header is given)
    #[arg(long)]
    pub data: Option<String>,

    /// Extra request header as "Name: value"; repeatable
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Include status, timing and request ids
    #[arg(long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => Method::Post,
            HttpMethod::Patch => Method::Patch,
            HttpMethod::Delete => Method::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact JSON (no whitespace, for piping)
    JsonCompact,
    /// The whole structured result, including status and headers
    Full,
}

pub async fn handle_get_command(args: GetCommands, config_path: Option<&Path>) -> Result<()> {
    let raw = RawCommands {
        endpoint: args.query,
        method: HttpMethod::Get,
        data: None,
        headers: Vec::new(),
        format: args.format,
        verbose: args.verbose,
        no_color: false,
    };
    handle_raw_command(raw, config_path).await
}

pub async fn handle_raw_command(args: RawCommands, config_path: Option<&Path>) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let method = Method::from(args.method);
    if matches!(method, Method::Post | Method::Patch) && args.data.is_none() {
        anyhow::bail!("{} request requires --data", method);
    }

    let session = Session::open(config_path)?;
    let token = session.token().await?;

    let headers = args
        .headers
        .iter()
        .map(|header| parse_header(header))
        .collect::<Result<Vec<_>>>()?;

    let mut request = RequestOptions::new(method, &token.resource, &args.endpoint, &token.access_token);
    if let Some(data) = &args.data {
        request = request.with_body(request_body(data, &headers)?);
    }
    for (name, value) in headers {
        request = request.with_header(name, value);
    }

    if args.verbose {
        println!("{} {}", method.to_string().bright_yellow(), args.endpoint.cyan());
    }

    let start = Instant::now();
    let result = session.client.execute(&request).await?;
    let elapsed = start.elapsed();

    if args.verbose {
        print_summary(&result, elapsed.as_secs_f64() * 1000.0);
    }

    println!("{}", format_output(&result, args.format)?);

    match result.error {
        Some(error) if !result.success => anyhow::bail!(error),
        _ => Ok(()),
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Header '{}' must look like 'Name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Header '{}' has an empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// JSON unless the caller set their own Content-Type, in which case the text goes out as-is
fn request_body(data: &str, headers: &[(String, String)]) -> Result<Value> {
    let has_content_type = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    if has_content_type {
        return Ok(Value::String(data.to_string()));
    }
    serde_json::from_str(data).context("--data must be valid JSON (or pass a Content-Type header)")
}

fn print_summary(result: &HttpResult, elapsed_ms: f64) {
    let status = match result.status_code {
        Some(code) if result.success => code.to_string().bright_green(),
        Some(code) => code.to_string().bright_red(),
        None => "no response".bright_red(),
    };
    println!("Status: {}  ({:.2}ms)", status, elapsed_ms);
    if let Some(id) = &result.request_id {
        println!("Request id: {}", id.dimmed());
    }
    println!();
}

/// Render the content (or raw body when it isn't JSON)
fn format_output(result: &HttpResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Full => serde_json::to_string_pretty(result).context("Failed to format result"),
        OutputFormat::Json | OutputFormat::JsonCompact => match &result.content {
            Some(content) if matches!(format, OutputFormat::Json) => {
                serde_json::to_string_pretty(content).context("Failed to format JSON output")
            }
            Some(content) => serde_json::to_string(content).context("Failed to format JSON output"),
            None => Ok(result.raw_content.clone().unwrap_or_default()),
        },
    }
}
