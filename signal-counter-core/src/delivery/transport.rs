//! HTTP transport to the remote collector
//!
//! The collector takes a classic form POST. The request is made with an async
//! `reqwest` client driven to completion on a private current-thread runtime,
//! so callers stay fully synchronous.

use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};

use crate::error::{Error, Result};

/// Form POST capability
pub trait Transport: Send + Sync {
    /// POST `fields` as `application/x-www-form-urlencoded` to `url`.
    ///
    /// Returns the HTTP status of any response that arrived; only network and
    /// protocol failures are errors.
    fn post(&self, url: &str, fields: &[(&str, &str)]) -> Result<u16>;
}

/// Encode `fields` as a form body, percent-encoding every value.
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Blocking HTTP client for the collector
pub struct HttpTransport {
    http_client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Transport(format!("failed to create runtime: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            runtime,
        })
    }

    async fn post_async(&self, url: &str, body: String) -> Result<u16> {
        let response = self
            .http_client
            .post(url)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        // The collector's reply carries nothing we use.
        if let Err(e) = response.bytes().await {
            tracing::debug!(error = %e, "Failed to drain collector response body");
        }

        Ok(status.as_u16())
    }
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, fields: &[(&str, &str)]) -> Result<u16> {
        let body = encode_form(fields);
        tracing::debug!(url, bytes = body.len(), "Posting to collector");
        self.runtime.block_on(self.post_async(url, body))
    }
}
