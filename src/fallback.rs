//! Data access layer: the HTTP client wrapped by a mock-substitution policy.
//!
//! Every operation returns a [`Sourced`] value so callers can tell backend data
//! from the canned demo fleet.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{ClientError, ControlPlaneClient};
use crate::config::ApiConfig;
use crate::domain::mock;
use crate::domain::types::{
    EventLog, HeartbeatAck, Link, Node, NodeDraft, ProvisionAck, TopologyData,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Substitute canned data when a read fails.
    #[default]
    Mock,
    /// Propagate every failure (integration runs against a real backend).
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Live,
    Mock,
}

/// Payload tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub source: Source,
    pub data: T,
}

impl<T> Sourced<T> {
    pub fn live(data: T) -> Self {
        Self {
            source: Source::Live,
            data,
        }
    }

    pub fn mock(data: T) -> Self {
        Self {
            source: Source::Mock,
            data,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.source == Source::Mock
    }
}

pub struct DataAccess {
    client: ControlPlaneClient,
    policy: FallbackPolicy,
}

impl DataAccess {
    pub fn new(client: ControlPlaneClient, policy: FallbackPolicy) -> Self {
        Self { client, policy }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ClientError> {
        Ok(Self::new(ControlPlaneClient::new(config)?, config.fallback))
    }

    pub async fn nodes(&self) -> Result<Sourced<Vec<Node>>, ClientError> {
        let result = self.client.nodes().await;
        self.guard("nodes", result, |_| Some(mock::nodes()))
    }

    /// Falls back only when the id exists in the demo fleet.
    pub async fn node(&self, id: &str) -> Result<Sourced<Node>, ClientError> {
        let result = self.client.node(id).await;
        self.guard("node", result, |_| mock::node(id))
    }

    pub async fn links(&self) -> Result<Sourced<Vec<Link>>, ClientError> {
        let result = self.client.links().await;
        self.guard("links", result, |_| Some(Vec::new()))
    }

    pub async fn topology(&self) -> Result<Sourced<TopologyData>, ClientError> {
        let result = self.client.topology().await;
        self.guard("topology", result, |_| Some(mock::topology()))
    }

    pub async fn events(&self) -> Result<Sourced<Vec<EventLog>>, ClientError> {
        let result = self.client.events().await;
        self.guard("events", result, |_| Some(Vec::new()))
    }

    /// Soft-fails into a synthetic "queued" acknowledgement.
    pub async fn provision_node(&self, id: &str) -> Result<Sourced<ProvisionAck>, ClientError> {
        let result = self.client.provision_node(id).await;
        self.guard("provision_node", result, |_| Some(mock::queued_ack(id)))
    }

    pub async fn create_node(&self, draft: &NodeDraft) -> Result<Sourced<Node>, ClientError> {
        self.client.create_node(draft).await.map(Sourced::live)
    }

    pub async fn heartbeat(&self, id: &str) -> Result<Sourced<HeartbeatAck>, ClientError> {
        self.client.heartbeat(id).await.map(Sourced::live)
    }

    fn guard<T>(
        &self,
        operation: &'static str,
        result: Result<T, ClientError>,
        substitute: impl FnOnce(&ClientError) -> Option<T>,
    ) -> Result<Sourced<T>, ClientError> {
        match result {
            Ok(data) => Ok(Sourced::live(data)),
            Err(e) if self.policy == FallbackPolicy::Disabled => Err(e),
            Err(e) => match substitute(&e) {
                Some(data) => {
                    warn!(
                        operation,
                        base_url = %self.client.base_url(),
                        timeout = e.is_timeout(),
                        error = %e,
                        "backend unavailable, serving mock data"
                    );
                    Ok(Sourced::mock(data))
                }
                None => Err(e),
            },
        }
    }
}
