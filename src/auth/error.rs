use serde::Deserialize;
use thiserror::Error;

use crate::api::transport::TransportError;

/// Classified failure from the OAuth token endpoint
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid client secret: the secret is wrong or has expired ({0})")]
    InvalidClientSecret(String),
    #[error("Invalid client: the application was not found in the tenant ({0})")]
    InvalidClient(String),
    #[error("Unauthorized client: the application may not use this grant ({0})")]
    UnauthorizedClient(String),
    #[error("Invalid scope: check the environment URL ({0})")]
    InvalidScope(String),
    #[error("Invalid resource: the environment was not found for this tenant ({0})")]
    InvalidResource(String),
    #[error("Tenant not found: check the tenant id ({0})")]
    TenantNotFound(String),
    #[error("Invalid grant ({0})")]
    InvalidGrant(String),
    #[error("Token request failed with status {status}: [{code}] {description}")]
    Other {
        status: u16,
        code: String,
        description: String,
    },
    #[error("Token endpoint returned an unreadable response: {0}")]
    MalformedResponse(String),
    #[error("Token request failed: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
    #[serde(default)]
    error_codes: Vec<u64>,
}

impl OAuthErrorBody {
    fn has_code(&self, code: u64) -> bool {
        self.error_codes.contains(&code) || self.error_description.contains(&format!("AADSTS{}", code))
    }
}

impl AuthError {
    /// Classify a non-2xx token endpoint response
    pub fn from_token_response(status: u16, body: &str) -> Self {
        let parsed: OAuthErrorBody = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Self::Other {
                    status,
                    code: "unknown".to_string(),
                    description: body.trim().to_string(),
                };
            }
        };

        let description = first_line(&parsed.error_description);

        if parsed.has_code(7000215) || parsed.has_code(7000222) {
            Self::InvalidClientSecret(description)
        } else if parsed.has_code(700016) {
            Self::InvalidClient(description)
        } else if parsed.has_code(90002) || parsed.has_code(900023) {
            Self::TenantNotFound(description)
        } else if parsed.has_code(500011) || parsed.error == "invalid_resource" {
            Self::InvalidResource(description)
        } else if parsed.has_code(70011) || parsed.error == "invalid_scope" {
            Self::InvalidScope(description)
        } else {
            match parsed.error.as_str() {
                "unauthorized_client" => Self::UnauthorizedClient(description),
                "invalid_client" => Self::InvalidClient(description),
                "invalid_grant" => Self::InvalidGrant(description),
                "" => Self::Other {
                    status,
                    code: "unknown".to_string(),
                    description,
                },
                code => Self::Other {
                    status,
                    code: code.to_string(),
                    description,
                },
            }
        }
    }
}

// Azure descriptions carry trace and correlation ids on following lines
fn first_line(description: &str) -> String {
    description.lines().next().unwrap_or_default().trim().to_string()
}
