//! Raw $batch response
//!
//! The multipart response body is handed back untouched; splitting it into
//! parts is left to the caller, who can use [`BatchResponse::boundary`].

use std::collections::HashMap;
use thiserror::Error;

use crate::api::transport::TransportError;

/// Failure of the outer $batch HTTP call
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Batch request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Batch request requires a resource URL on the auth token")]
    MissingResource,
}

/// Response of a successful $batch call
#[derive(Debug, Clone)]
pub struct BatchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl BatchResponse {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Response boundary, from the Content-Type header or else the first delimiter line
    pub fn boundary(&self) -> Option<String> {
        self.content_type()
            .and_then(boundary_parameter)
            .or_else(|| {
                self.body
                    .lines()
                    .map(str::trim_end)
                    .find(|line| line.starts_with("--batchresponse_"))
                    .map(|line| line.trim_start_matches("--").trim_end_matches("--").to_string())
            })
    }
}

/// Extract the `boundary=` parameter of a multipart Content-Type value
pub fn boundary_parameter(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .filter(|boundary| !boundary.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: Option<&str>, body: &str) -> BatchResponse {
        let mut headers = HashMap::new();
        if let Some(value) = content_type {
            headers.insert("content-type".to_string(), value.to_string());
        }
        BatchResponse {
            status: 200,
            headers,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_boundary_from_content_type() {
        let response = response(
            Some("multipart/mixed; boundary=batchresponse_f44bd09d-573f-4a30-bca0-2e500ee7e139"),
            "",
        );
        assert_eq!(
            response.boundary().as_deref(),
            Some("batchresponse_f44bd09d-573f-4a30-bca0-2e500ee7e139")
        );
    }

    #[test]
    fn test_quoted_boundary_parameter() {
        assert_eq!(
            boundary_parameter("multipart/mixed; boundary=\"batch_123\"").as_deref(),
            Some("batch_123")
        );
        assert_eq!(boundary_parameter("application/json"), None);
        assert_eq!(boundary_parameter("multipart/mixed; boundary="), None);
    }

    #[test]
    fn test_boundary_falls_back_to_body() {
        let response = response(
            None,
            "--batchresponse_12345\r\nContent-Type: application/http\r\n\r\n--batchresponse_12345--\r\n",
        );
        assert_eq!(response.boundary().as_deref(), Some("batchresponse_12345"));
    }
}
