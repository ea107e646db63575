//! Dataverse $batch request builder
//!
//! Frames an ordered list of sub-requests into a multipart/mixed OData v4.0
//! batch body, optionally wrapped in a single changeset. Parts are emitted in
//! insertion order and Content-IDs are written verbatim, so `$<id>` references
//! in later bodies are resolved by the server, never here.

use log::debug;
use uuid::Uuid;

use super::sub_request::BatchSubRequest;
use crate::api::constants::{self, CRLF, multipart};
use crate::api::operations::Operation;
use crate::api::request_headers::{HeaderOptions, PreferDirective};
use crate::auth::AuthToken;

/// Builder for creating Dataverse $batch requests
#[derive(Debug, Clone)]
pub struct BatchRequestBuilder {
    batch_id: String,
    changeset_id: String,
    use_changeset: bool,
    continue_on_error: bool,
    requests: Vec<BatchSubRequest>,
}

impl Default for BatchRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRequestBuilder {
    /// Create a new batch request builder with a fresh batch id
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4().to_string(),
            // Generated even when no changeset is used
            changeset_id: Uuid::new_v4().to_string(),
            use_changeset: false,
            continue_on_error: false,
            requests: Vec::new(),
        }
    }

    /// Use a caller-supplied batch id instead of a generated one
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = batch_id.into();
        self
    }

    /// Wrap all sub-requests in one transactional changeset
    pub fn use_changeset(mut self, enabled: bool) -> Self {
        self.use_changeset = enabled;
        self
    }

    /// Ask the server to keep executing after a failed part
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn add_request(mut self, request: BatchSubRequest) -> Self {
        self.requests.push(request.normalized());
        self
    }

    pub fn add_requests(self, requests: impl IntoIterator<Item = BatchSubRequest>) -> Self {
        requests.into_iter().fold(self, Self::add_request)
    }

    /// Add a typed operation; its Content-ID is its 1-based position in the batch
    pub fn add_operation(self, operation: &Operation) -> Self {
        let content_id = (self.requests.len() + 1).to_string();
        let request = operation.to_sub_request().with_content_id(content_id);
        self.add_request(request)
    }

    pub fn add_operations(self, operations: &[Operation]) -> Self {
        operations.iter().fold(self, Self::add_operation)
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn changeset_id(&self) -> &str {
        &self.changeset_id
    }

    pub fn batch_boundary(&self) -> String {
        format!("{}{}", constants::BATCH_BOUNDARY_PREFIX, self.batch_id)
    }

    pub fn changeset_boundary(&self) -> String {
        format!("{}{}", constants::CHANGESET_BOUNDARY_PREFIX, self.changeset_id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Build the complete batch request body
    pub fn build(self) -> BatchRequest {
        let batch_boundary = self.batch_boundary();
        let changeset_boundary = self.changeset_boundary();
        let body = self.compose_body(&batch_boundary, &changeset_boundary);

        debug!(
            "Composed batch {} with {} request(s), changeset: {}",
            self.batch_id,
            self.requests.len(),
            self.use_changeset
        );

        BatchRequest {
            batch_id: self.batch_id,
            content_type: format!("multipart/mixed; boundary=\"{}\"", batch_boundary),
            batch_boundary,
            changeset_boundary,
            use_changeset: self.use_changeset,
            continue_on_error: self.continue_on_error,
            request_count: self.requests.len(),
            body,
        }
    }

    fn compose_body(&self, batch_boundary: &str, changeset_boundary: &str) -> String {
        let mut lines: Vec<String> = Vec::new();

        if self.use_changeset {
            lines.push(format!("--{}", batch_boundary));
            lines.push(format!("Content-Type: multipart/mixed; boundary=\"{}\"", changeset_boundary));
            lines.push(String::new());
        }

        let part_boundary = if self.use_changeset {
            changeset_boundary
        } else {
            batch_boundary
        };

        for request in &self.requests {
            lines.push(format!("--{}", part_boundary));
            lines.push(multipart::PART_CONTENT_TYPE.to_string());
            lines.push(multipart::PART_TRANSFER_ENCODING.to_string());
            if self.use_changeset {
                if let Some(content_id) = &request.content_id {
                    lines.push(format!("Content-ID: {}", content_id));
                }
            }
            lines.push(String::new());

            // No Host header: the enclosing request supplies it
            lines.push(format!("{} {} {}", request.method, request.path, multipart::HTTP_VERSION));

            for (name, value) in &request.headers {
                lines.push(format!("{}: {}", name, value));
            }

            if let Some(body) = request.encoded_body() {
                lines.push(multipart::ENTRY_CONTENT_TYPE.to_string());
                lines.push(String::new());
                lines.push(body);
            }

            lines.push(String::new());
        }

        if self.use_changeset {
            lines.push(format!("--{}--", changeset_boundary));
        }
        lines.push(format!("--{}--", batch_boundary));
        lines.push(String::new());

        lines.join(CRLF)
    }
}

/// Complete batch request ready to send
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub batch_id: String,
    pub batch_boundary: String,
    pub changeset_boundary: String,
    pub use_changeset: bool,
    pub continue_on_error: bool,
    pub request_count: usize,
    pub content_type: String,
    pub body: String,
}

impl BatchRequest {
    /// Get the Content-Type header value
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Get the request body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Headers for the outer POST to the $batch endpoint
    pub fn headers(&self, token: &AuthToken) -> Vec<(String, String)> {
        let mut options = HeaderOptions::new()
            .authorization(&token.token_type, &token.access_token)
            .odata()
            .if_none_match_null()
            .accept_json()
            .content_type(self.content_type.clone());

        if self.continue_on_error {
            options = options.prefer(PreferDirective::ContinueOnError);
        }

        options.build()
    }
}
