use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::constants::headers;
use super::transport::{HttpResponse, TransportError};

/// HTTP verbs supported by the Dataverse Web API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "PUT" => Ok(Self::Put),
            other => anyhow::bail!(
                "Unsupported HTTP method '{}': expected one of GET, POST, PATCH, DELETE, PUT",
                other
            ),
        }
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One logical request for the single-request executor
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Environment base URL, e.g. `https://org.crm.dynamics.com`
    pub url: String,
    /// Path plus query string, e.g. `api/data/v9.2/accounts?$top=5`
    pub query: String,
    pub access_token: String,
    pub body: Option<Value>,
    /// Extra headers; these override the defaults by name
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>, query: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: query.into(),
            access_token: access_token.into(),
            body: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Uniform result of a single Dataverse call
///
/// HTTP error statuses and network failures are both reported here with
/// `success == false`; a missing `status_code` means no response arrived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpResult {
    pub status_code: Option<u16>,
    pub headers: Option<HashMap<String, String>>,
    pub content: Option<Value>,
    pub raw_content: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl HttpResult {
    /// Map a received response, whatever its status, into a result
    pub fn from_response(response: HttpResponse) -> Self {
        let success = response.is_success();
        let request_id = response.header(headers::SERVICE_REQUEST_ID).map(str::to_string);
        let correlation_id = response.header(headers::CLIENT_REQUEST_ID).map(str::to_string);
        let content = parse_json_lenient(&response.body);

        let error = if success {
            None
        } else {
            Some(status_error_message(response.status, content.as_ref()))
        };

        Self {
            status_code: Some(response.status),
            headers: Some(response.headers),
            content,
            raw_content: Some(response.body),
            success,
            error,
            request_id,
            correlation_id,
        }
    }

    /// Result for a call that never produced an HTTP response
    pub fn from_transport_error(error: &TransportError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    /// Case-insensitive response header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Get the parsed content, returning the error message if the call failed
    pub fn into_result(self) -> Result<Value, String> {
        if self.success {
            Ok(self.content.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}

/// Parse a body as JSON, returning `None` for empty or non-JSON text
pub fn parse_json_lenient(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Extract the message from a Dataverse error body
///
/// Handles `{"error":{"code":..,"message":..}}` and `{"Message":..}`.
pub fn extract_error_message(body: &Value) -> Option<String> {
    if let Some(error_obj) = body.get("error") {
        if let Some(message) = error_obj.get("message").and_then(|m| m.as_str()) {
            let code = error_obj.get("code").and_then(|c| c.as_str()).unwrap_or("Unknown");
            return Some(format!("[{}] {}", code, message));
        }
    }

    body.get("Message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn status_error_message(status: u16, content: Option<&Value>) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status");

    match content.and_then(extract_error_message) {
        Some(detail) => format!(
            "Response status code does not indicate success: {} ({}). {}",
            status, reason, detail
        ),
        None => format!(
            "Response status code does not indicate success: {} ({}).",
            status, reason
        ),
    }
}
