//! Request and response types exchanged with the dashboard API

use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::resilience::parse_retry_after;

/// Longest body excerpt kept for diagnostics
const BODY_SNIPPET_LEN: usize = 300;

/// A single call against the dashboard API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, starting with `/`
    pub path: String,
    /// JSON body, if any
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    /// Create a POST request with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Create a PUT request with a JSON body
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
        }
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// What came back from one HTTP attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, or the raw text as a JSON string when it is not JSON
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Add a header (name is lower-cased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Server-requested wait, from the `Retry-After` header
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after").and_then(parse_retry_after)
    }

    /// Short, single-line excerpt of the body for logs and reports
    pub fn body_snippet(&self) -> String {
        let text = match &self.body {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() > BODY_SNIPPET_LEN {
            let cut: String = flat.chars().take(BODY_SNIPPET_LEN).collect();
            format!("{}…", cut)
        } else {
            flat
        }
    }
}
