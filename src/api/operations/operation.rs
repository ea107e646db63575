//! Core Operation types for Dataverse CRUD operations

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::batch::BatchSubRequest;
use crate::api::constants::{self, headers};
use crate::api::models::Method;

/// Represents a single CRUD operation that can be executed against Dataverse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Read one record
    Retrieve {
        /// Entity set name (e.g., "contacts", "accounts")
        entity: String,
        /// Record ID (GUID)
        id: String,
        /// Columns for `$select`; empty selects all
        select: Vec<String>,
    },
    /// Create a new record
    Create {
        entity: String,
        data: Value,
    },
    /// Create a new record with references to previous operations in a changeset
    /// Uses $<content-id> syntax to reference records created earlier in the same changeset
    CreateWithRefs {
        entity: String,
        data: Value,
        /// Map of field names to content-ID references
        /// e.g., {"parentcustomerid_account@odata.bind": "$1"}
        content_id_refs: HashMap<String, String>,
    },
    /// Update an existing record
    Update {
        entity: String,
        id: String,
        data: Value,
    },
    /// Delete a record
    Delete {
        entity: String,
        id: String,
    },
    /// Upsert operation (create or update based on an alternate key)
    Upsert {
        entity: String,
        key_field: String,
        key_value: String,
        data: Value,
    },
}

impl Operation {
    pub fn retrieve(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Retrieve {
            entity: entity.into(),
            id: id.into(),
            select: Vec::new(),
        }
    }

    pub fn create(entity: impl Into<String>, data: Value) -> Self {
        Self::Create {
            entity: entity.into(),
            data,
        }
    }

    pub fn create_with_refs(entity: impl Into<String>, data: Value, content_id_refs: HashMap<String, String>) -> Self {
        Self::CreateWithRefs {
            entity: entity.into(),
            data,
            content_id_refs,
        }
    }

    pub fn update(entity: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self::Update {
            entity: entity.into(),
            id: id.into(),
            data,
        }
    }

    pub fn delete(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Delete {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn upsert(
        entity: impl Into<String>,
        key_field: impl Into<String>,
        key_value: impl Into<String>,
        data: Value,
    ) -> Self {
        Self::Upsert {
            entity: entity.into(),
            key_field: key_field.into(),
            key_value: key_value.into(),
            data,
        }
    }

    /// Restrict a Retrieve to the given columns; other operations are unchanged
    pub fn with_select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Self::Retrieve { select, .. } = &mut self {
            *select = columns.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Get the entity name for this operation
    pub fn entity(&self) -> &str {
        match self {
            Self::Retrieve { entity, .. }
            | Self::Create { entity, .. }
            | Self::CreateWithRefs { entity, .. }
            | Self::Update { entity, .. }
            | Self::Delete { entity, .. }
            | Self::Upsert { entity, .. } => entity,
        }
    }

    pub fn http_method(&self) -> Method {
        match self {
            Self::Retrieve { .. } => Method::Get,
            Self::Create { .. } | Self::CreateWithRefs { .. } => Method::Post,
            Self::Update { .. } | Self::Upsert { .. } => Method::Patch,
            Self::Delete { .. } => Method::Delete,
        }
    }

    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Retrieve { .. } => "retrieve",
            Self::Create { .. } => "create",
            Self::CreateWithRefs { .. } => "create_with_refs",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Upsert { .. } => "upsert",
        }
    }

    /// Convert into a batch sub-request (no Content-ID assigned)
    pub fn to_sub_request(&self) -> BatchSubRequest {
        match self {
            Self::Retrieve { entity, id, select } => {
                let mut path = constants::entity_record_path(entity, id);
                if !select.is_empty() {
                    path.push_str("?$select=");
                    path.push_str(&select.join(","));
                }
                BatchSubRequest::get(path)
            }
            Self::Create { entity, data } => BatchSubRequest::post(constants::entity_path(entity), data.clone())
                .with_header(headers::PREFER, headers::PREFER_RETURN_REPRESENTATION),
            Self::CreateWithRefs { entity, data, content_id_refs } => {
                // Merge data with content-ID references
                let mut payload = data.clone();
                if let Value::Object(map) = &mut payload {
                    for (field, ref_value) in content_id_refs {
                        map.insert(field.clone(), Value::String(ref_value.clone()));
                    }
                }
                BatchSubRequest::post(constants::entity_path(entity), payload)
                    .with_header(headers::PREFER, headers::PREFER_RETURN_REPRESENTATION)
            }
            Self::Update { entity, id, data } => {
                BatchSubRequest::patch(constants::entity_record_path(entity, id), data.clone())
                    .with_header(headers::IF_MATCH, headers::IF_MATCH_ANY)
                    .with_header(headers::PREFER, headers::PREFER_RETURN_REPRESENTATION)
            }
            Self::Delete { entity, id } => BatchSubRequest::delete(constants::entity_record_path(entity, id)),
            Self::Upsert { entity, key_field, key_value, data } => {
                BatchSubRequest::patch(constants::upsert_path(entity, key_field, key_value), data.clone())
                    .with_header(headers::PREFER, headers::PREFER_RETURN_REPRESENTATION)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_sub_request() {
        let request = Operation::create("contacts", json!({"firstname": "John"})).to_sub_request();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/api/data/v9.2/contacts");
        assert_eq!(request.body, Some(json!({"firstname": "John"})));
        assert_eq!(
            request.headers,
            vec![("Prefer".to_string(), "return=representation".to_string())]
        );
        assert!(request.content_id.is_none());
    }

    #[test]
    fn test_create_with_refs_merges_bindings() {
        let mut refs = HashMap::new();
        refs.insert("parentcustomerid_account@odata.bind".to_string(), "$1".to_string());
        let request = Operation::create_with_refs("contacts", json!({"lastname": "Doe"}), refs).to_sub_request();

        assert_eq!(
            request.body,
            Some(json!({"lastname": "Doe", "parentcustomerid_account@odata.bind": "$1"}))
        );
    }

    #[test]
    fn test_update_and_upsert_paths() {
        let update = Operation::update("contacts", "123", json!({"a": 1})).to_sub_request();
        assert_eq!(update.method, Method::Patch);
        assert_eq!(update.path, "/api/data/v9.2/contacts(123)");
        assert!(update.headers.contains(&("If-Match".to_string(), "*".to_string())));

        let upsert = Operation::upsert("contacts", "emailaddress1", "test@example.com", json!({"firstname": "Jane"}))
            .to_sub_request();
        assert_eq!(upsert.path, "/api/data/v9.2/contacts(emailaddress1='test@example.com')");
        assert!(!upsert.headers.iter().any(|(k, _)| k == "If-Match"));
    }

    #[test]
    fn test_retrieve_with_select() {
        let request = Operation::retrieve("accounts", "42")
            .with_select(["name", "revenue"])
            .to_sub_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/api/data/v9.2/accounts(42)?$select=name,revenue");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_delete_has_no_body_or_headers() {
        let request = Operation::delete("contacts", "9").to_sub_request();
        assert_eq!(request.method, Method::Delete);
        assert!(request.body.is_none());
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_metadata_accessors() {
        let op = Operation::upsert("accounts", "k", "v", json!({}));
        assert_eq!(op.entity(), "accounts");
        assert_eq!(op.http_method(), Method::Patch);
        assert_eq!(op.operation_type(), "upsert");
    }
}
