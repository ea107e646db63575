//! Shared helpers for integration tests

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use dataverse_client::auth::AuthToken;
use serde_json::Value;

/// Unsigned JWT carrying the given claims
pub fn fake_jwt(claims: Value) -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Token pointed at a mock server
pub fn token_for(resource: &str) -> AuthToken {
    AuthToken {
        access_token: "test-access-token".to_string(),
        token_type: "Bearer".to_string(),
        expires_in: 3600,
        expires_on: Utc::now() + Duration::seconds(3600),
        resource: resource.to_string(),
    }
}

/// Address nothing is listening on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
