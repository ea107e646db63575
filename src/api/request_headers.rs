//! Request header composition
//!
//! Builds the ordered header list sent with every Dataverse call from a small
//! set of declarative options.

use super::constants::headers;

/// A single `Prefer` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferDirective {
    /// `return=representation`
    ReturnRepresentation,
    /// `odata.continue-on-error`
    ContinueOnError,
    /// `odata.include-annotations="<pattern>"`
    IncludeAnnotations(String),
    /// Any other directive, emitted verbatim
    Custom(String),
}

impl PreferDirective {
    pub fn as_header_value(&self) -> String {
        match self {
            Self::ReturnRepresentation => headers::PREFER_RETURN_REPRESENTATION.to_string(),
            Self::ContinueOnError => headers::PREFER_CONTINUE_ON_ERROR.to_string(),
            Self::IncludeAnnotations(pattern) => format!("odata.include-annotations=\"{}\"", pattern),
            Self::Custom(value) => value.clone(),
        }
    }
}

/// Declarative header options, rendered in insertion order by [`HeaderOptions::build`]
#[derive(Debug, Clone, Default)]
pub struct HeaderOptions {
    headers: Vec<(String, String)>,
    prefer: Vec<PreferDirective>,
}

impl HeaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Authorization: <token_type> <access_token>`
    pub fn authorization(self, token_type: &str, access_token: &str) -> Self {
        self.header(headers::AUTHORIZATION, format!("{} {}", token_type, access_token))
    }

    /// `Authorization: Bearer <access_token>`
    pub fn bearer(self, access_token: &str) -> Self {
        self.authorization("Bearer", access_token)
    }

    /// `OData-MaxVersion: 4.0` and `OData-Version: 4.0`
    pub fn odata(self) -> Self {
        self.header(headers::ODATA_MAX_VERSION, headers::ODATA_VERSION)
            .header(headers::ODATA_VERSION_HEADER, headers::ODATA_VERSION)
    }

    pub fn accept_json(self) -> Self {
        self.header(headers::ACCEPT, headers::CONTENT_TYPE_JSON)
    }

    pub fn if_none_match_null(self) -> Self {
        self.header(headers::IF_NONE_MATCH, headers::IF_NONE_MATCH_NULL)
    }

    pub fn content_type(self, value: impl Into<String>) -> Self {
        self.header(headers::CONTENT_TYPE, value)
    }

    pub fn prefer(mut self, directive: PreferDirective) -> Self {
        if !self.prefer.contains(&directive) {
            self.prefer.push(directive);
        }
        self
    }

    /// Set a header, replacing any existing header with the same (case-insensitive) name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn extend<I, K, V>(self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        extra
            .into_iter()
            .fold(self, |options, (name, value)| options.header(name, value))
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Render the header list; Prefer directives collapse into one trailing header
    pub fn build(self) -> Vec<(String, String)> {
        let mut rendered = self.headers;
        if !self.prefer.is_empty() {
            let explicit = rendered
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(headers::PREFER))
                .map(|(_, value)| value.clone());
            let value = explicit
                .into_iter()
                .chain(self.prefer.iter().map(PreferDirective::as_header_value))
                .collect::<Vec<_>>()
                .join(",");
            rendered.retain(|(name, _)| !name.eq_ignore_ascii_case(headers::PREFER));
            rendered.push((headers::PREFER.to_string(), value));
        }
        rendered
    }
}
