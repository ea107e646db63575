//! Logical sub-requests carried inside a $batch body

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::constants;
use crate::api::models::Method;

/// One request framed as a part of a $batch body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubRequest {
    pub method: Method,
    /// Server-relative path, always starting with `/`
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Only emitted inside a changeset; must be unique within it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default, with = "header_list", skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

impl BatchSubRequest {
    pub fn new(method: Method, path: impl AsRef<str>) -> Self {
        Self {
            method,
            path: constants::normalize_path(path.as_ref()),
            body: None,
            content_id: None,
            headers: Vec::new(),
        }
    }

    /// Validating constructor for verbs arriving as text
    pub fn parse(method: &str, path: impl AsRef<str>) -> Result<Self> {
        Ok(Self::new(method.parse()?, path))
    }

    pub fn get(path: impl AsRef<str>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl AsRef<str>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn patch(path: impl AsRef<str>, body: Value) -> Self {
        Self::new(Method::Patch, path).with_body(body)
    }

    pub fn put(path: impl AsRef<str>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn delete(path: impl AsRef<str>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Re-apply the leading-slash invariant (e.g. after deserialization)
    pub(crate) fn normalized(mut self) -> Self {
        if !self.path.starts_with('/') {
            self.path = constants::normalize_path(&self.path);
        }
        self
    }

    /// Body text as it goes on the wire: strings verbatim, anything else compact JSON
    pub fn encoded_body(&self) -> Option<String> {
        self.body.as_ref().map(|body| match body {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        })
    }
}

/// Headers as a JSON object, keeping document order
mod header_list {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(headers: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(headers.len()))?;
        for (name, value) in headers {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, String)>, D::Error> {
        struct OrderedHeaders;

        impl<'de> Visitor<'de> for OrderedHeaders {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut headers = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.push((name, value));
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(OrderedHeaders)
    }
}
