//! Downstream replace protocol over HTTP
//!
//! A sync is two independent calls: `DELETE {base}{delete_path}` then
//! `POST {base}{insert_path}` with the full envelope set. There is no
//! compensation if the insert fails after the delete succeeded, so the
//! downstream collection stays empty until a later cycle gets through.

use async_trait::async_trait;
use pubsync_common::{types::Envelope, Result, SyncError};
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Client Constants
// ============================================================================

/// Header carrying the API key on insert requests
pub const API_KEY_HEADER: &str = "X-Custom-Header";

/// Default timeout for each downstream request in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// The two halves of the replace protocol
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Remove every record from the downstream service
    async fn delete_all(&self) -> Result<()>;

    /// Insert the full envelope set as one JSON array
    async fn insert_all(&self, envelopes: &[Envelope]) -> Result<()>;
}

/// Endpoint settings for the downstream service
#[derive(Debug, Clone)]
pub struct DownstreamSettings {
    pub base_url: String,
    pub delete_path: String,
    pub insert_path: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl DownstreamSettings {
    pub fn delete_url(&self) -> String {
        format!("{}{}", self.base_url, self.delete_path)
    }

    pub fn insert_url(&self) -> String {
        format!("{}{}", self.base_url, self.insert_path)
    }
}

/// reqwest-backed downstream client
///
/// Certificate validation is disabled to match the trust posture of the SFTP
/// side. Use plain HTTP or a private network if that is not acceptable.
pub struct HttpSyncClient {
    client: Client,
    delete_url: String,
    insert_url: String,
    api_key: String,
}

impl HttpSyncClient {
    pub fn new(settings: &DownstreamSettings) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SyncError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            delete_url: settings.delete_url(),
            insert_url: settings.insert_url(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl Downstream for HttpSyncClient {
    async fn delete_all(&self) -> Result<()> {
        debug!("Microservice {}", self.delete_url);

        let response = self
            .client
            .delete(&self.delete_url)
            .send()
            .await
            .map_err(|e| SyncError::DeleteAll(describe(&e)))?;

        check_response(response).await.map_err(SyncError::DeleteAll)
    }

    async fn insert_all(&self, envelopes: &[Envelope]) -> Result<()> {
        let body = insert_body(envelopes)?;
        debug!(
            "Posting {} envelopes ({} bytes) to {}",
            envelopes.len(),
            body.len(),
            self.insert_url
        );

        let response = self
            .client
            .post(&self.insert_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::InsertAll(describe(&e)))?;

        check_response(response).await.map_err(SyncError::InsertAll)
    }
}

/// Encode the insert payload. Runs after delete-all, so a failure here is an
/// insert failure and leaves downstream empty.
fn insert_body<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(payload)
        .map_err(|e| SyncError::InsertAll(format!("failed to encode request body: {}", e)))
}

/// Drain the body for the debug log and fail on any non-2xx status
async fn check_response(response: Response) -> std::result::Result<(), String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("HTTP {}: failed to read response body: {}", status, e))?;
    debug!("Response from server {}", body);

    if status.is_success() {
        Ok(())
    } else {
        Err(format!("HTTP {}: {}", status, body))
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}
