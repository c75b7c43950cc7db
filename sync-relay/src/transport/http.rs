//! HTTP transports built on reqwest.

use super::{HubApi, LeafApi, TransportError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use sync_types::{ApiResponse, Configuration, PushPayload};

fn client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("confsync-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))
}

fn map_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::ConnectionFailed(err.to_string())
    }
}

/// Turn a status and body into the envelope payload or a classified error.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<T, TransportError> {
    if (200..300).contains(&status) {
        let envelope: ApiResponse<T> = serde_json::from_slice(body)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        return envelope
            .into_result()
            .map_err(|e| TransportError::Malformed(e.to_string()));
    }

    let error = serde_json::from_slice::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    Err(match error {
        Some(error) => TransportError::rejected(status, Some(&error.code), error.message),
        None => {
            let snippet: String = String::from_utf8_lossy(body).chars().take(200).collect();
            TransportError::rejected(status, None, snippet)
        }
    })
}

async fn read(response: reqwest::Response) -> Result<(u16, Vec<u8>), TransportError> {
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(map_reqwest)?;
    Ok((status, body.to_vec()))
}

/// Hub client speaking the relay-facing routes.
#[derive(Debug, Clone)]
pub struct HttpHub {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHub {
    /// Create a client for the hub at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl HubApi for HttpHub {
    async fn register(&self, registration_token: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .post(format!("{}/agent/register", self.base_url))
            .bearer_auth(registration_token)
            .send()
            .await
            .map_err(map_reqwest)?;
        let (status, body) = read(response).await?;
        decode_envelope(status, &body)
    }

    async fn fetch_config(&self, credential: &str) -> Result<Configuration, TransportError> {
        let response = self
            .client
            .get(format!("{}/config/agent", self.base_url))
            .bearer_auth(credential)
            .send()
            .await
            .map_err(map_reqwest)?;
        let (status, body) = read(response).await?;
        decode_envelope(status, &body)
    }
}

/// Leaf client carrying the shared push key.
#[derive(Clone)]
pub struct HttpLeaf {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl std::fmt::Debug for HttpLeaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLeaf")
            .field("base_url", &self.base_url)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl HttpLeaf {
    /// Create a client for the leaf at `base_url`.
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl LeafApi for HttpLeaf {
    async fn push_config(&self, payload: &PushPayload) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/config", self.base_url))
            .bearer_auth(&self.key)
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest)?;
        let (status, body) = read(response).await?;
        // Any 2xx is an acknowledgement; the body is informational.
        if (200..300).contains(&status) {
            return Ok(());
        }
        decode_envelope::<serde_json::Value>(status, &body).map(|_| ())
    }
}
