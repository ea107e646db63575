//! Client for the Microsoft Dataverse Web API
//!
//! - [`api`]: single-request execution and `$batch` composition
//! - [`auth`]: client-credentials tokens, caching and claim reading
//! - [`config`]: environment and file based configuration

pub mod api;
pub mod auth;
pub mod config;

pub use api::{BatchRequestBuilder, BatchSubRequest, DataverseClient, HttpResult, Method, RequestOptions};
pub use auth::{AuthError, AuthToken, ClientCredentials, TokenCache, TokenEndpoint, TokenProvider};
pub use config::Config;
