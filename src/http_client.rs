//! Shared HTTP client for provider APIs
//!
//! Features:
//! - Connection pooling with keep-alive across TTS, transcription and footage calls
//! - TLS via rustls
//! - Gzip-compressed JSON responses
//! - Long overall timeout, since synthesis and downloads move megabytes

use std::time::Duration;

use reqwest::{Client, Response};
use tracing::{debug, instrument};

use crate::error::{DownloadError, ProviderError};

const USER_AGENT: &str = concat!("reelsmith/", env!("CARGO_PKG_VERSION"));

/// Build the client every provider shares.
pub fn build_client(provider: &'static str) -> Result<Client, ProviderError> {
    Client::builder()
        .user_agent(USER_AGENT)
        // ═══════════════════════════════════════════════════════════════
        // CONNECTIONS
        // ═══════════════════════════════════════════════════════════════
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .gzip(true)
        // ═══════════════════════════════════════════════════════════════
        // TIMEOUTS
        // ═══════════════════════════════════════════════════════════════
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(180))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|source| ProviderError::Http { provider, source })
}

/// Turn a non-success response into [`ProviderError::Status`], keeping the body.
pub async fn check_status(provider: &'static str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(500).collect();
    Err(ProviderError::Status {
        provider,
        status: status.as_u16(),
        body,
    })
}

/// Download `url` fully into memory.
#[instrument(skip(client), fields(url = %url))]
pub async fn download(client: &Client, url: &str) -> Result<bytes::Bytes, DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| DownloadError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|source| DownloadError::Http {
        url: url.to_string(),
        source,
    })?;
    if body.is_empty() {
        return Err(DownloadError::Empty { url: url.to_string() });
    }

    debug!(bytes = body.len(), "Downloaded");
    Ok(body)
}
