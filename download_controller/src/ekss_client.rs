//! Synchronous HTTP client for EKSS, the envelope/secret store (§4.3,
//! §6.3), built the way the teacher's control-plane client wraps a
//! `reqwest::Client` with a fixed base URL and per-call timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum EkssError {
    #[error("secret not found")]
    SecretNotFound,
    #[error("request to EKSS failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("EKSS responded with unexpected status {0}")]
    BadResponseCode(StatusCode),
}

#[async_trait]
pub trait EnvelopeClient: Send + Sync {
    async fn get_envelope(
        &self,
        secret_id: &str,
        receiver_public_key: &str,
    ) -> Result<String, EkssError>;

    async fn delete_secret(&self, secret_id: &str) -> Result<(), EkssError>;
}

pub struct EkssClient {
    http_client: reqwest::Client,
    base_url: url::Url,
}

impl EkssClient {
    pub fn new(base_url: url::Url, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
        })
    }
}

#[async_trait]
impl EnvelopeClient for EkssClient {
    async fn get_envelope(
        &self,
        secret_id: &str,
        receiver_public_key: &str,
    ) -> Result<String, EkssError> {
        let url = self
            .base_url
            .join(&format!("secrets/{secret_id}/envelopes/{receiver_public_key}"))
            .expect("failed to build envelope request url");

        let response = self.http_client.get(url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(EkssError::SecretNotFound),
            other => Err(EkssError::BadResponseCode(other)),
        }
    }

    async fn delete_secret(&self, secret_id: &str) -> Result<(), EkssError> {
        let url = self
            .base_url
            .join(&format!("secrets/{secret_id}"))
            .expect("failed to build secret delete url");

        let response = self.http_client.delete(url).send().await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => Err(EkssError::SecretNotFound),
            other => Err(EkssError::BadResponseCode(other)),
        }
    }
}
