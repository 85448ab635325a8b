//! Typed HTTP client for the control-plane REST API.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::domain::types::{
    EventLog, HeartbeatAck, Link, Node, NodeDraft, ProvisionAck, TopologyData,
};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Transport-level failure. Carries enough to tell an outage from a bad answer.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{method} {url} timed out after {timeout_ms} ms")]
    Timeout {
        method: Method,
        url: String,
        timeout_ms: u64,
    },
    #[error("{method} {url} failed: {source}")]
    Unreachable {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("parsing response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("building HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub struct ControlPlaneClient {
    base_url: String,
    timeout_ms: u64,
    http: Client,
}

impl ControlPlaneClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn nodes(&self) -> Result<Vec<Node>, ClientError> {
        self.get("/nodes/").await
    }

    pub async fn node(&self, id: &str) -> Result<Node, ClientError> {
        self.get(&format!("/nodes/{}/", id)).await
    }

    pub async fn create_node(&self, draft: &NodeDraft) -> Result<Node, ClientError> {
        self.send(Method::POST, "/nodes/", Some(draft)).await
    }

    pub async fn provision_node(&self, id: &str) -> Result<ProvisionAck, ClientError> {
        self.post(&format!("/nodes/{}/provision/", id)).await
    }

    pub async fn heartbeat(&self, id: &str) -> Result<HeartbeatAck, ClientError> {
        self.post(&format!("/nodes/{}/heartbeat/", id)).await
    }

    pub async fn links(&self) -> Result<Vec<Link>, ClientError> {
        self.get("/links/").await
    }

    pub async fn topology(&self) -> Result<TopologyData, ClientError> {
        self.get("/topology/").await
    }

    pub async fn events(&self) -> Result<Vec<EventLog>, ClientError> {
        self.get("/events/").await
    }

    // ── Internal helpers ───────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<(), T>(Method::POST, path, None).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let correlation_id = Uuid::new_v4().to_string();
        debug!(%method, %url, correlation_id = %correlation_id, "sending request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CORRELATION_HEADER, &correlation_id);
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(|source| {
            if source.is_timeout() {
                ClientError::Timeout {
                    method: method.clone(),
                    url: url.clone(),
                    timeout_ms: self.timeout_ms,
                }
            } else {
                ClientError::Unreachable {
                    method: method.clone(),
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                method,
                url,
                status,
                body,
            });
        }

        resp.json().await.map_err(|source| {
            if source.is_timeout() {
                ClientError::Timeout {
                    method,
                    url,
                    timeout_ms: self.timeout_ms,
                }
            } else {
                ClientError::Decode { url, source }
            }
        })
    }
}
