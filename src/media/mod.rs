//! Avatar uploads to the Cloudinary-compatible media host.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::config::MediaConfig;

/// What the media host reports back for a stored image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResult {
    pub public_id: Option<String>,
    pub version: Option<u64>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Media host request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Media host rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Stores `file` (a data URI or remote URL) under `public_id`.
    async fn upload(
        &self,
        file: &str,
        public_id: &str,
        overwrite: bool,
        invalidate: bool,
    ) -> Result<UploadResult, UploadError>;

    /// Public delivery URL for an uploaded image.
    fn image_url(&self, public_id: &str, version: Option<u64>) -> String;
}

#[derive(Clone)]
pub struct CloudinaryUploader {
    http: reqwest::Client,
    upload_url: String,
    delivery_root: String,
    api_key: String,
    api_secret: String,
    timeout: Duration,
}

impl CloudinaryUploader {
    pub fn new(config: &MediaConfig) -> Result<Self> {
        assert!(!config.cloud_name.is_empty(), "Cloud name must be provided");
        let timeout = config.request_timeout();

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build media HTTP client")?;

        let api_base = config.api_base_url.trim_end_matches('/');
        let delivery_base = config.delivery_base_url.trim_end_matches('/');

        Ok(Self {
            http,
            upload_url: format!("{api_base}/{}/image/upload", config.cloud_name),
            delivery_root: format!("{delivery_base}/{}/image/upload", config.cloud_name),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(
        &self,
        file: &str,
        public_id: &str,
        overwrite: bool,
        invalidate: bool,
    ) -> Result<UploadResult, UploadError> {
        assert!(!public_id.is_empty(), "Upload public id must be provided");

        let mut signed = BTreeMap::new();
        signed.insert("invalidate", invalidate.to_string());
        signed.insert("overwrite", overwrite.to_string());
        signed.insert("public_id", public_id.to_string());
        signed.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = sign_params(&signed, &self.api_secret);

        let mut form: Vec<(&str, String)> = signed.into_iter().collect();
        form.push(("file", file.to_string()));
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let response = self.http.post(&self.upload_url).form(&form).send().await?;
        let status = response.status();
        let body: UploadApiResponse = response.json().await?;

        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: body
                    .error
                    .map(|err| err.message)
                    .unwrap_or_else(|| "no error message".to_string()),
            });
        }

        debug!(
            "Uploaded {public_id} to media host (version {:?})",
            body.version
        );
        Ok(UploadResult {
            public_id: body.public_id,
            version: body.version,
        })
    }

    fn image_url(&self, public_id: &str, version: Option<u64>) -> String {
        match version {
            Some(version) => format!("{}/v{version}/{public_id}", self.delivery_root),
            None => format!("{}/{public_id}", self.delivery_root),
        }
    }
}

/// Hex SHA-256 over `k1=v1&k2=v2...` in key order with the secret appended.
fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct UploadApiResponse {
    #[serde(default)]
    public_id: Option<String>,
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    error: Option<UploadApiError>,
}

#[derive(Debug, Deserialize)]
struct UploadApiError {
    message: String,
}
