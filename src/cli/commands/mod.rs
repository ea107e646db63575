pub mod auth;
pub mod batch;
pub mod raw;

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dataverse_client::api::{DataverseClient, ReqwestTransport};
use dataverse_client::auth::{AuthToken, TokenCache, TokenProvider};
use dataverse_client::config::Config;

pub use auth::{handle_resource_command, handle_token_command};
pub use batch::handle_batch_command;
pub use raw::{handle_get_command, handle_raw_command};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Loaded config plus the clients built from it
pub struct Session {
    pub config: Config,
    pub provider: TokenProvider<Arc<ReqwestTransport>>,
    pub client: DataverseClient<Arc<ReqwestTransport>>,
}

impl Session {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path).context("Failed to load configuration")?;
        debug!("Using config: {:?}", config);

        let timeout = config.timeout().unwrap_or(DEFAULT_TIMEOUT);
        let transport = Arc::new(ReqwestTransport::with_timeout(timeout)?);

        let mut provider = TokenProvider::new(Arc::clone(&transport))
            .with_authority_host(&config.authority_host)
            .with_endpoint(config.token_endpoint);
        if config.cache_tokens {
            provider = provider.with_cache(Arc::new(TokenCache::new()));
        }

        let client = DataverseClient::new(transport).with_timeout(timeout);

        Ok(Self {
            config,
            provider,
            client,
        })
    }

    pub async fn token(&self) -> Result<AuthToken> {
        self.provider
            .get_token(&self.config.credentials(), &self.config.environment_url)
            .await
            .with_context(|| format!("Failed to acquire token for {}", self.config.environment_url))
    }
}
