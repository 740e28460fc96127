//! Request options and fetched pages.

use serde::{Deserialize, Serialize};

/// Options for a single gateway request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Query string pairs appended to the URL
    pub query: Vec<(String, String)>,
    /// URL-encoded form body
    pub form: Vec<(String, String)>,
    /// Raw request body (ignored when `form` is set)
    pub body: Option<String>,
    /// Suppress failure logging
    pub silent: bool,
    /// Clear accumulated cookies before sending
    pub reset_session: bool,
}

impl RequestOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query pair.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a form field.
    #[must_use]
    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Set a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Do not log failures of this request.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Start a fresh cookie session before this request.
    #[must_use]
    pub fn reset_session(mut self) -> Self {
        self.reset_session = true;
        self
    }
}

/// A successfully fetched response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status of the original response
    pub status: u16,
    /// Response body as text
    pub body: String,
    /// Whether the body was served from the on-disk cache
    pub from_cache: bool,
}

impl FetchedPage {
    /// Response body.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = RequestOptions::new()
            .header("Accept", "text/html")
            .query("page", "2")
            .form("product_id", "42")
            .silent()
            .reset_session();

        assert_eq!(options.headers, vec![("Accept".to_string(), "text/html".to_string())]);
        assert_eq!(options.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(options.form.len(), 1);
        assert!(options.silent);
        assert!(options.reset_session);
        assert!(options.body.is_none());
    }
}
