//! Remote API client used to replay queued operations.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::SyncConfig;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Sync not configured. Add sync.server_url to config.")]
    NotConfigured,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{method} {path} failed: {source}")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path} returned {status}")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
    },
}

/// Verb-shaped access to the authoritative server. Any non-2xx response or
/// transport failure is an error; response bodies are ignored.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn post(&self, path: &str, body: &Value) -> Result<(), RemoteError>;

    async fn patch(&self, path: &str, body: &Value) -> Result<(), RemoteError>;

    async fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

/// JSON-over-HTTP client with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpRemoteClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::Client)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, RemoteError> {
        let server_url = config
            .server_url
            .clone()
            .ok_or(RemoteError::NotConfigured)?;

        Self::new(
            server_url,
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<(), RemoteError> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|source| RemoteError::Transport {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                method,
                path: path.to_string(),
                status,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteClient {
    async fn post(&self, path: &str, body: &Value) -> Result<(), RemoteError> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<(), RemoteError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.send(Method::DELETE, path, None).await
    }
}

/// Stand-in used when no server is configured: every call fails, so writes
/// simply accumulate in the queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl RemoteApi for Unconfigured {
    async fn post(&self, _path: &str, _body: &Value) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn patch(&self, _path: &str, _body: &Value) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete(&self, _path: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotConfigured)
    }
}
