//! Unverified JWT claim reading
//!
//! Used to recover the Dataverse environment URL from an access token this
//! client was issued. No signature check is made; nothing here is a security
//! boundary.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::Value;

/// Host suffix shared by every Dataverse environment
pub const DATAVERSE_HOST_SUFFIX: &str = ".dynamics.com";

/// Decode the payload segment of a compact JWT
///
/// Returns `None` unless the token has exactly three segments and the middle
/// one is base64url-encoded JSON.
pub fn decode_payload(token: &str) -> Option<Value> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let mut payload = segments[1].trim_end_matches('=').to_string();
    match payload.len() % 4 {
        0 => {}
        1 => return None,
        remainder => payload.push_str(&"=".repeat(4 - remainder)),
    }

    let bytes = URL_SAFE.decode(payload.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Environment URL named by the token's `aud` claim
///
/// `aud` may be a string or an array; the first entry that looks like a
/// Dataverse host wins. Result is `https://<lowercase host>`.
pub fn resource_from_access_token(token: &str) -> Option<String> {
    let claims = decode_payload(token)?;
    match claims.get("aud")? {
        Value::String(audience) => normalize_dataverse_url(audience),
        Value::Array(audiences) => audiences
            .iter()
            .filter_map(Value::as_str)
            .find_map(normalize_dataverse_url),
        _ => None,
    }
}

/// Expiry from the `exp` claim, if present
pub fn expiry_from_access_token(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode_payload(token)?;
    let exp = match claims.get("exp")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(exp, 0)
}

/// Canonical form of a Dataverse URL, or `None` if it isn't one
pub fn normalize_dataverse_url(candidate: &str) -> Option<String> {
    let url = Url::parse(candidate.trim()).ok()?;
    if !matches!(url.scheme(), "https" | "http") {
        return None;
    }

    let host = url.host_str()?.to_ascii_lowercase();
    if !host.ends_with(DATAVERSE_HOST_SUFFIX) {
        return None;
    }

    Some(format!("https://{}", host))
}
