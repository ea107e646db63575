//! API Constants and URL helpers for the Dataverse Web API

/// Dataverse Web API version
pub const API_VERSION: &str = "v9.2";

/// Base API path for Dataverse
pub const API_BASE_PATH: &str = "/api/data";

/// Full API path with version
pub fn api_path() -> String {
    format!("{}/{}", API_BASE_PATH, API_VERSION)
}

/// Batch endpoint for multi-operation requests
pub const BATCH_ENDPOINT: &str = "$batch";

/// Prefix of the outer multipart boundary
pub const BATCH_BOUNDARY_PREFIX: &str = "batch_";

/// Prefix of the changeset boundary nested inside a batch
pub const CHANGESET_BOUNDARY_PREFIX: &str = "changeset_";

/// Line terminator for multipart framing
pub const CRLF: &str = "\r\n";

/// Standard header names and values for Dataverse requests
pub mod headers {
    pub const AUTHORIZATION: &str = "Authorization";
    pub const ACCEPT: &str = "Accept";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const ODATA_MAX_VERSION: &str = "OData-MaxVersion";
    pub const ODATA_VERSION_HEADER: &str = "OData-Version";
    pub const IF_NONE_MATCH: &str = "If-None-Match";
    pub const IF_MATCH: &str = "If-Match";
    pub const PREFER: &str = "Prefer";

    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Content type for token endpoint requests
    pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

    /// OData version header value
    pub const ODATA_VERSION: &str = "4.0";

    /// Disables cached responses on the batch endpoint
    pub const IF_NONE_MATCH_NULL: &str = "null";

    /// If-Match header for updates (any version)
    pub const IF_MATCH_ANY: &str = "*";

    /// Prefer header for returning representation
    pub const PREFER_RETURN_REPRESENTATION: &str = "return=representation";

    /// Prefer header that keeps a batch running after a failed part
    pub const PREFER_CONTINUE_ON_ERROR: &str = "odata.continue-on-error";

    /// Response header carrying the server-side request id
    pub const SERVICE_REQUEST_ID: &str = "x-ms-service-request-id";

    /// Response header echoing the client request id
    pub const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";
}

/// Multipart part headers used inside a $batch body
pub mod multipart {
    pub const PART_CONTENT_TYPE: &str = "Content-Type: application/http";
    pub const PART_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding: binary";
    pub const ENTRY_CONTENT_TYPE: &str = "Content-Type: application/json; type=entry";
    pub const HTTP_VERSION: &str = "HTTP/1.1";
}

/// Trim a single trailing slash from a base URL
pub fn normalize_base_url(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

/// Ensure a path/query starts with exactly one slash
pub fn normalize_path(query: &str) -> String {
    format!("/{}", query.trim_start_matches('/'))
}

/// Join a base URL and a path/query into a request URL
pub fn join_url(base_url: &str, query: &str) -> String {
    format!("{}{}", normalize_base_url(base_url), normalize_path(query))
}

/// Relative entity set path, e.g. `/api/data/v9.2/accounts`
pub fn entity_path(entity: &str) -> String {
    format!("{}/{}", api_path(), entity)
}

/// Relative entity record path, e.g. `/api/data/v9.2/accounts(<id>)`
pub fn entity_record_path(entity: &str, id: &str) -> String {
    format!("{}/{}({})", api_path(), entity, id)
}

/// Relative upsert path addressed by an alternate key
pub fn upsert_path(entity: &str, key_field: &str, key_value: &str) -> String {
    format!(
        "{}/{}({}='{}')",
        api_path(),
        entity,
        key_field,
        key_value.replace('\'', "''")
    )
}

/// Build batch endpoint URL
pub fn batch_endpoint(base_url: &str) -> String {
    format!("{}{}/{}", normalize_base_url(base_url), api_path(), BATCH_ENDPOINT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_trims_one_slash() {
        assert_eq!(normalize_base_url("https://org.crm.dynamics.com/"), "https://org.crm.dynamics.com");
        assert_eq!(normalize_base_url("https://org.crm.dynamics.com"), "https://org.crm.dynamics.com");
        assert_eq!(normalize_base_url("https://org.crm.dynamics.com//"), "https://org.crm.dynamics.com/");
    }

    #[test]
    fn test_join_url_single_slash() {
        assert_eq!(
            join_url("https://org.crm.dynamics.com/", "api/data/v9.2/accounts"),
            "https://org.crm.dynamics.com/api/data/v9.2/accounts"
        );
        assert_eq!(
            join_url("https://org.crm.dynamics.com", "//api/data/v9.2/WhoAmI"),
            "https://org.crm.dynamics.com/api/data/v9.2/WhoAmI"
        );
    }

    #[test]
    fn test_entity_paths() {
        assert_eq!(entity_path("contacts"), "/api/data/v9.2/contacts");
        assert_eq!(entity_record_path("contacts", "123"), "/api/data/v9.2/contacts(123)");
        assert_eq!(
            upsert_path("contacts", "emailaddress1", "o'brien@example.com"),
            "/api/data/v9.2/contacts(emailaddress1='o''brien@example.com')"
        );
        assert_eq!(
            batch_endpoint("https://org.crm.dynamics.com/"),
            "https://org.crm.dynamics.com/api/data/v9.2/$batch"
        );
    }
}
