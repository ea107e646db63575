//! $batch command

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use dataverse_client::api::{BatchRequestBuilder, BatchSubRequest};

use super::Session;

#[derive(Args)]
pub struct BatchCommands {
    /// JSON file holding an array of sub-requests: {method, path, body?, content_id?, headers?}
    pub file: PathBuf,

    /// Wrap the sub-requests in a single changeset (all-or-nothing)
    #[arg(long)]
    pub changeset: bool,

    /// Ask the service to keep going after a failed sub-request
    #[arg(long)]
    pub continue_on_error: bool,

    /// Batch id used in the boundary; a random one by default
    #[arg(long)]
    pub batch_id: Option<String>,

    /// Print the composed request body without sending it
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_batch_command(args: BatchCommands, config_path: Option<&Path>) -> Result<()> {
    let requests = read_sub_requests(&args.file)?;
    info!("Loaded {} sub-request(s) from {}", requests.len(), args.file.display());

    let mut builder = BatchRequestBuilder::new()
        .use_changeset(args.changeset)
        .continue_on_error(args.continue_on_error)
        .add_requests(requests);
    if let Some(batch_id) = args.batch_id {
        builder = builder.with_batch_id(batch_id);
    }
    let batch = builder.build();

    if args.dry_run {
        println!("{} {}", "Content-Type:".bold(), batch.content_type());
        println!();
        print!("{}", batch.body());
        return Ok(());
    }

    let session = Session::open(config_path)?;
    let token = session.token().await?;

    eprintln!(
        "Sending batch {} with {} request(s) to {}",
        batch.batch_id.cyan(),
        batch.request_count,
        token.resource.cyan()
    );

    let response = session.client.execute_batch(&token, &batch).await?;

    eprintln!("Status: {}", response.status.to_string().bright_green());
    print!("{}", response.body());
    Ok(())
}

fn read_sub_requests(path: &Path) -> Result<Vec<BatchSubRequest>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse batch file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataverse_client::api::Method;

    #[test]
    fn test_read_sub_requests() {
        let path = std::env::temp_dir().join(format!("dataverse-batch-{}.json", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"[
                {"method": "POST", "path": "api/data/v9.2/accounts", "body": {"name": "Contoso"}, "content_id": "1"},
                {"method": "get", "path": "/api/data/v9.2/contacts?$top=1"}
            ]"#,
        )
        .unwrap();

        let requests = read_sub_requests(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].content_id.as_deref(), Some("1"));
        assert_eq!(requests[1].method, Method::Get);
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = read_sub_requests(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/batch.json"));
    }
}
