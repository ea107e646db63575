use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;

use super::constants::{self, headers};
use super::models::{HttpResult, Method, RequestOptions};
use super::operations::{BatchError, BatchRequest, BatchResponse, Operation};
use super::request_headers::HeaderOptions;
use super::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::auth::AuthToken;

/// Dataverse Web API client over a pluggable transport
#[derive(Debug, Clone)]
pub struct DataverseClient<T: HttpTransport = ReqwestTransport> {
    transport: T,
    default_timeout: Option<Duration>,
}

impl DataverseClient<ReqwestTransport> {
    /// Client over the default pooled reqwest transport
    pub fn with_default_transport() -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new()?))
    }
}

impl<T: HttpTransport> DataverseClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            default_timeout: None,
        }
    }

    /// Timeout applied to requests that don't set their own
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute one request and map the outcome into an [`HttpResult`]
    ///
    /// HTTP error statuses and network failures come back as `Ok` with
    /// `success == false`; only a missing URL is an `Err`.
    pub async fn execute(&self, request: &RequestOptions) -> Result<HttpResult> {
        if request.url.trim().is_empty() {
            anyhow::bail!("A Dataverse URL is required to execute a request");
        }
        if request.method == Method::Put {
            anyhow::bail!("PUT is only supported inside $batch requests");
        }

        let url = constants::join_url(request.url.trim(), &request.query);

        let caller_content_type = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(headers::CONTENT_TYPE));

        let mut options = HeaderOptions::new()
            .bearer(&request.access_token)
            .accept_json()
            .odata();

        let body = request.body.as_ref().map(|body| encode_body(body, caller_content_type));
        if body.is_some() && !caller_content_type {
            options = options.content_type(headers::CONTENT_TYPE_JSON);
        }
        let header_list = options.extend(request.headers.iter().cloned()).build();

        debug!("{} {}", request.method, url);

        let http_request = HttpRequest {
            method: request.method,
            url: url.clone(),
            headers: header_list,
            body,
            timeout: request.timeout.or(self.default_timeout),
        };

        match self.transport.send(http_request).await {
            Ok(response) => {
                let result = HttpResult::from_response(response);
                if let Some(error) = &result.error {
                    warn!("{} {} failed: {}", request.method, url, error);
                }
                Ok(result)
            }
            Err(error) => {
                warn!("{} {} failed without a response: {}", request.method, url, error);
                Ok(HttpResult::from_transport_error(&error))
            }
        }
    }

    pub async fn get(&self, token: &AuthToken, query: &str) -> Result<HttpResult> {
        self.execute(&RequestOptions::new(Method::Get, &token.resource, query, &token.access_token))
            .await
    }

    pub async fn retrieve(&self, token: &AuthToken, entity: &str, id: &str) -> Result<HttpResult> {
        self.execute_operation(token, &Operation::retrieve(entity, id)).await
    }

    pub async fn create(&self, token: &AuthToken, entity: &str, data: Value) -> Result<HttpResult> {
        self.execute_operation(token, &Operation::create(entity, data)).await
    }

    pub async fn update(&self, token: &AuthToken, entity: &str, id: &str, data: Value) -> Result<HttpResult> {
        self.execute_operation(token, &Operation::update(entity, id, data)).await
    }

    pub async fn delete(&self, token: &AuthToken, entity: &str, id: &str) -> Result<HttpResult> {
        self.execute_operation(token, &Operation::delete(entity, id)).await
    }

    /// Execute a typed operation as a single request
    pub async fn execute_operation(&self, token: &AuthToken, operation: &Operation) -> Result<HttpResult> {
        let sub_request = operation.to_sub_request();
        let request = RequestOptions {
            method: sub_request.method,
            url: token.resource.clone(),
            query: sub_request.path,
            access_token: token.access_token.clone(),
            body: sub_request.body,
            headers: sub_request.headers,
            timeout: None,
        };
        self.execute(&request)
            .await
            .with_context(|| format!("Failed to execute {} on {}", operation.operation_type(), operation.entity()))
    }

    /// POST a composed batch to `<resource>/api/data/v9.2/$batch`
    ///
    /// Returns the raw multipart response. Unlike [`Self::execute`], any
    /// transport failure or non-2xx status is an `Err` ([`BatchError`]).
    pub async fn execute_batch(&self, token: &AuthToken, batch: &BatchRequest) -> Result<BatchResponse> {
        let base_url = constants::normalize_base_url(token.resource.trim());
        if base_url.is_empty() {
            return Err(BatchError::MissingResource.into());
        }

        let url = constants::batch_endpoint(base_url);
        debug!(
            "POST {} (batch {}, {} request(s))",
            url, batch.batch_id, batch.request_count
        );

        let request = HttpRequest {
            method: Method::Post,
            url,
            headers: batch.headers(token),
            body: Some(batch.body.clone()),
            timeout: self.default_timeout,
        };

        let response = self.transport.send(request).await.map_err(BatchError::from)?;

        if !response.is_success() {
            return Err(BatchError::Status {
                status: response.status,
                body: response.body,
            }
            .into());
        }

        Ok(BatchResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }
}

/// Body passthrough when the caller chose the Content-Type, JSON otherwise
fn encode_body(body: &Value, caller_content_type: bool) -> String {
    match body {
        Value::String(raw) if caller_content_type => raw.clone(),
        other => other.to_string(),
    }
}
