//! Robust Links archive client.
//!
//! One GET per URI against the archiving endpoint:
//!
//! ```text
//! GET <endpoint>?url=<uri>&anchor_text=<uri>
//! Accept: application/json
//! ```
//!
//! Every outcome, including transport failures, is classified into a
//! [`RobustEntry`]. Nothing here returns an error to the caller; a failed
//! call is a failed entry.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::ArchiveConfig;
use crate::models::{RobustEntry, RobustFailure};

/// Anything that can robustify a single URI.
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn robustify(&self, uri: &str) -> RobustEntry;
}

/// Collapse an HTML snippet to one line.
fn minify(html: &str) -> String {
    html.replace(['\n', '\r'], "").trim().to_string()
}

/// Classify one archive response.
///
/// - `robust_links_html.{original_url_as_href, memento_url_as_href}` → success
/// - `"friendly error": "<message>"` → failure with the service's message
/// - any other JSON → unrecognized
/// - anything else → non-JSON
pub fn classify_response(uri: &str, status: u16, body: &[u8]) -> RobustEntry {
    let json: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => return RobustEntry::failed(uri, &RobustFailure::NonJson { status }),
    };

    let hrefs = json.get("robust_links_html").and_then(|html| {
        let original = html.get("original_url_as_href")?.as_str()?;
        let memento = html.get("memento_url_as_href")?.as_str()?;
        Some((original, memento))
    });
    if let Some((original, memento)) = hrefs {
        return RobustEntry::archived(uri, minify(original), minify(memento));
    }

    if let Some(message) = json.get("friendly error").and_then(Value::as_str) {
        return RobustEntry::failed(
            uri,
            &RobustFailure::Friendly {
                message: message.trim().to_string(),
                status,
            },
        );
    }

    RobustEntry::failed(uri, &RobustFailure::Unrecognized { status })
}

/// HTTP client for the Robust Links API.
#[derive(Debug, Clone)]
pub struct RobustLinksClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RobustLinksClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("pdf-links/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build archive HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, uri: &str) -> reqwest::Result<(u16, Vec<u8>)> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("url", uri), ("anchor_text", uri)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl Archiver for RobustLinksClient {
    async fn robustify(&self, uri: &str) -> RobustEntry {
        tracing::info!(uri, "submitting to archive");
        let entry = match self.fetch(uri).await {
            Ok((status, body)) => classify_response(uri, status, &body),
            Err(e) => {
                tracing::debug!(uri, error = %e, "archive transport error");
                RobustEntry::failed(uri, &RobustFailure::Transport)
            }
        };
        if entry.ok {
            tracing::info!(uri, "archived");
        } else {
            tracing::warn!(uri, error = entry.error.as_deref().unwrap_or(""), "archive failed");
        }
        entry
    }
}
