//! reqwest-backed executor for the Meraki dashboard API

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

use super::request::{ApiRequest, ApiResponse};
use super::transport::{HttpExecutor, NetworkError};

pub const DEFAULT_BASE_URL: &str = "https://api.meraki.com/api/v1";
const API_KEY_HEADER: &str = "x-cisco-meraki-api-key";

/// Connection settings for [`MerakiClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub base_url: String,
    pub verify_tls: bool,
}

impl ClientSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            verify_tls: true,
        }
    }
}

/// Single-attempt HTTP executor; retries and pacing live in the transport
pub struct MerakiClient {
    http: reqwest::Client,
    base_url: String,
    insecure: bool,
}

impl MerakiClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            anyhow::bail!("Meraki API key is empty");
        }

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(settings.api_key.trim())
            .context("API key contains characters not allowed in an HTTP header")?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("meraki-sync/", env!("CARGO_PKG_VERSION"))),
        );

        let insecure = !settings.verify_tls;
        if insecure {
            warn!(
                "TLS certificate verification is DISABLED for {}; responses could be intercepted",
                settings.base_url
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(insecure)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            insecure,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl HttpExecutor for MerakiClient {
    async fn execute(
        &self,
        request: &ApiRequest,
        timeout: Duration,
    ) -> Result<ApiResponse, NetworkError> {
        let url = self.url(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| classify_error(e, timeout))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let text = response.text().await.map_err(|e| classify_error(e, timeout))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        debug!("{} {} -> HTTP {}", request.method, url, status);
        Ok(headers
            .into_iter()
            .fold(ApiResponse::new(status, body), |response, (name, value)| {
                response.with_header(&name, value)
            }))
    }

    fn insecure_tls(&self) -> bool {
        self.insecure
    }
}

fn classify_error(err: reqwest::Error, timeout: Duration) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout(timeout)
    } else if err.is_connect() {
        NetworkError::Connect(err.to_string())
    } else {
        NetworkError::Other(err.to_string())
    }
}
