//! Fleet service: in-memory backend state behind `ncp serve-mock`.
//!
//! Seeded with the canned fleet. Provisioning runs as a background workflow
//! that walks the run through RUNNING → SUCCEEDED, logging an event per step.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::mock;
use super::types::{
    DraftError, EventLog, EventType, HeartbeatAck, Link, Node, NodeDraft, NodeStatus,
    TopologyData, WorkflowRun, WorkflowState, WorkflowType,
};

pub const DEFAULT_APPLIED_VERSION: &str = "v1.0.0";

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("node '{0}' not found")]
    NodeNotFound(String),
    #[error(transparent)]
    InvalidDraft(#[from] DraftError),
}

#[derive(Default)]
struct FleetState {
    nodes: Vec<Node>,
    links: Vec<Link>,
    runs: Vec<WorkflowRun>,
    events: Vec<EventLog>,
}

impl FleetState {
    fn node_mut(&mut self, id: &str) -> Result<&mut Node, FleetError> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| FleetError::NodeNotFound(id.to_string()))
    }

    fn log(
        &mut self,
        node: Option<&str>,
        run: Option<&WorkflowRun>,
        event_type: EventType,
        message: String,
    ) {
        self.events.push(EventLog {
            id: Uuid::new_v4().to_string(),
            node: node.map(str::to_string),
            workflow_run: run.map(|r| r.id.clone()),
            event_type,
            message,
            correlation_id: run.map(|r| r.correlation_id.clone()),
            created_at: Utc::now(),
        });
    }

    fn set_run_state(&mut self, run_id: &str, state: WorkflowState) -> Option<WorkflowRun> {
        let run = self.runs.iter_mut().find(|r| r.id == run_id)?;
        run.state = state;
        run.updated_at = Utc::now();
        Some(run.clone())
    }
}

pub struct FleetService {
    state: RwLock<FleetState>,
    step_delay: Duration,
}

impl FleetService {
    pub fn new(step_delay: Duration) -> Self {
        Self {
            state: RwLock::new(FleetState {
                nodes: mock::nodes(),
                links: mock::links(),
                ..FleetState::default()
            }),
            step_delay,
        }
    }

    pub async fn nodes(&self) -> Vec<Node> {
        self.state.read().await.nodes.clone()
    }

    pub async fn node(&self, id: &str) -> Option<Node> {
        self.state
            .read()
            .await
            .nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    /// Links with node details re-embedded from the current node set.
    pub async fn links(&self) -> Vec<Link> {
        let state = self.state.read().await;
        let lookup = |id: &str| state.nodes.iter().find(|n| n.id == id).cloned();
        state
            .links
            .iter()
            .map(|link| Link {
                from_node_details: lookup(&link.from_node),
                to_node_details: lookup(&link.to_node),
                ..link.clone()
            })
            .collect()
    }

    pub async fn topology(&self) -> TopologyData {
        let links = self.links().await;
        TopologyData {
            nodes: self.nodes().await,
            links,
        }
    }

    /// Newest first.
    pub async fn events(&self) -> Vec<EventLog> {
        let mut events = self.state.read().await.events.clone();
        events.reverse();
        events
    }

    pub async fn runs(&self) -> Vec<WorkflowRun> {
        self.state.read().await.runs.clone()
    }

    pub async fn create(&self, draft: NodeDraft) -> Result<Node, FleetError> {
        draft.validate()?;
        let now = Utc::now();
        let node = Node {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            node_type: draft.node_type,
            environment: draft.environment,
            mgmt_ip: draft.mgmt_ip.filter(|ip| !ip.trim().is_empty()),
            status: NodeStatus::Provisioning,
            last_heartbeat_at: None,
            desired_config_version: draft.desired_config_version,
            applied_config_version: None,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state.nodes.push(node.clone());
        state.log(
            Some(&node.id),
            None,
            EventType::Info,
            format!("Node {} registered ({})", node.name, node.node_type),
        );
        info!(node_id = %node.id, name = %node.name, "node created");
        Ok(node)
    }

    /// Start a provision workflow. Returns the run and whether it is new;
    /// an already queued or running provision run is returned as-is.
    pub async fn provision(
        self: &Arc<Self>,
        id: &str,
        requested_by: &str,
        correlation_id: Option<&str>,
    ) -> Result<(WorkflowRun, bool), FleetError> {
        let run = {
            let mut state = self.state.write().await;
            state.node_mut(id)?;

            if let Some(existing) = state.runs.iter().find(|r| {
                r.node == id && r.workflow_type == WorkflowType::Provision && r.state.is_active()
            }) {
                return Ok((existing.clone(), false));
            }

            let now = Utc::now();
            let run = WorkflowRun {
                id: Uuid::new_v4().to_string(),
                node: id.to_string(),
                workflow_type: WorkflowType::Provision,
                state: WorkflowState::Queued,
                requested_by: requested_by.to_string(),
                correlation_id: correlation_id
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                error_message: None,
                created_at: now,
                updated_at: now,
            };
            state.runs.push(run.clone());
            run
        };

        info!(node_id = %id, run_id = %run.id, correlation_id = %run.correlation_id, "provision queued");

        let service = Arc::clone(self);
        let run_id = run.id.clone();
        tokio::spawn(async move {
            service.run_provision(&run_id).await;
        });

        Ok((run, true))
    }

    async fn run_provision(&self, run_id: &str) {
        let Some(run) = self.start_run(run_id).await else {
            return;
        };

        tokio::time::sleep(self.step_delay).await;
        {
            let mut state = self.state.write().await;
            state.log(
                Some(&run.node),
                Some(&run),
                EventType::Info,
                "Hardware verification successful.".to_string(),
            );
        }

        tokio::time::sleep(self.step_delay).await;
        {
            let mut state = self.state.write().await;
            if let Ok(node) = state.node_mut(&run.node) {
                let ip = match node.mgmt_ip() {
                    Some(ip) => ip.to_string(),
                    None => {
                        let ip = allocate_ip(&node.id);
                        node.mgmt_ip = Some(ip.clone());
                        node.updated_at = Utc::now();
                        ip
                    }
                };
                state.log(
                    Some(&run.node),
                    Some(&run),
                    EventType::Info,
                    format!("IP Allocated: {ip}"),
                );
            }
        }

        tokio::time::sleep(self.step_delay).await;
        let mut state = self.state.write().await;
        match state.node_mut(&run.node) {
            Ok(node) => {
                node.status = NodeStatus::Healthy;
                node.applied_config_version = Some(
                    node.desired_config()
                        .unwrap_or(DEFAULT_APPLIED_VERSION)
                        .to_string(),
                );
                node.updated_at = Utc::now();
                let run = state
                    .set_run_state(run_id, WorkflowState::Succeeded)
                    .unwrap_or(run);
                state.log(
                    Some(&run.node),
                    Some(&run),
                    EventType::StateChange,
                    "Provisioning completed successfully. Node is HEALTHY.".to_string(),
                );
                info!(node_id = %run.node, run_id = %run.id, "provision succeeded");
            }
            Err(e) => {
                if let Some(failed) = state.runs.iter_mut().find(|r| r.id == run_id) {
                    failed.state = WorkflowState::Failed;
                    failed.error_message = Some(e.to_string());
                    failed.updated_at = Utc::now();
                }
                state.log(
                    None,
                    Some(&run),
                    EventType::Error,
                    format!("Provisioning failed: {e}"),
                );
            }
        }
    }

    async fn start_run(&self, run_id: &str) -> Option<WorkflowRun> {
        let mut state = self.state.write().await;
        let run = state.set_run_state(run_id, WorkflowState::Running)?;
        state.log(
            Some(&run.node),
            Some(&run),
            EventType::Info,
            "Starting provisioning process...".to_string(),
        );
        if let Ok(node) = state.node_mut(&run.node) {
            node.status = NodeStatus::Provisioning;
            node.updated_at = Utc::now();
        }
        Some(run)
    }

    /// Stamp a heartbeat; unreachable or failed nodes recover to healthy.
    pub async fn heartbeat(&self, id: &str) -> Result<HeartbeatAck, FleetError> {
        let mut state = self.state.write().await;
        let node = state.node_mut(id)?;
        let now = Utc::now();
        node.last_heartbeat_at = Some(now);
        node.updated_at = now;

        let recovered = matches!(node.status, NodeStatus::Unreachable | NodeStatus::Error);
        if recovered {
            node.status = NodeStatus::Healthy;
        }
        let current_status = node.status;

        if recovered {
            state.log(
                Some(id),
                None,
                EventType::Heartbeat,
                format!("Node recovered. Status: {current_status}"),
            );
        }

        Ok(HeartbeatAck {
            status: "heartbeat received".to_string(),
            current_status,
        })
    }
}

/// Deterministic management address in 10.0.0.0/24 derived from the node id.
fn allocate_ip(node_id: &str) -> String {
    let sum: u32 = node_id.bytes().map(u32::from).sum();
    format!("10.0.0.{}", sum % 254 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Environment, NodeType};

    fn service() -> Arc<FleetService> {
        Arc::new(FleetService::new(Duration::ZERO))
    }

    fn draft(name: &str) -> NodeDraft {
        NodeDraft {
            name: name.to_string(),
            node_type: NodeType::Ground,
            environment: Environment::Prod,
            mgmt_ip: Some(String::new()),
            desired_config_version: None,
        }
    }

    async fn wait_for_run(fleet: &FleetService, run_id: &str, state: WorkflowState) {
        for _ in 0..100 {
            if fleet.runs().await.iter().any(|r| r.id == run_id && r.state == state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} never reached {state}");
    }

    #[tokio::test]
    async fn seeded_with_demo_fleet() {
        let fleet = service();
        assert_eq!(fleet.nodes().await, mock::nodes());
        assert_eq!(fleet.topology().await.links.len(), 4);
        assert!(fleet.events().await.is_empty());
    }

    #[tokio::test]
    async fn create_assigns_identity_and_defaults() {
        let fleet = service();
        let node = fleet.create(draft("  GS-NYC-01 ")).await.unwrap();
        assert_eq!(node.name, "GS-NYC-01");
        assert_eq!(node.status, NodeStatus::Provisioning);
        assert!(node.mgmt_ip.is_none());
        assert!(Uuid::parse_str(&node.id).is_ok());
        assert_eq!(fleet.nodes().await.len(), 7);
        assert_eq!(fleet.events().await[0].event_type, EventType::Info);
    }

    #[tokio::test]
    async fn create_rejects_invalid_draft() {
        let fleet = service();
        let err = fleet.create(draft("")).await.unwrap_err();
        assert!(matches!(err, FleetError::InvalidDraft(DraftError::MissingName)));
        assert_eq!(fleet.nodes().await.len(), 6);
    }

    #[tokio::test]
    async fn provision_runs_to_healthy() {
        let fleet = service();
        let (run, created) = fleet.provision("5", "anonymous", Some("corr-1")).await.unwrap();
        assert!(created);
        assert_eq!(run.state, WorkflowState::Queued);
        assert_eq!(run.correlation_id, "corr-1");

        wait_for_run(&fleet, &run.id, WorkflowState::Succeeded).await;

        let node = fleet.node("5").await.unwrap();
        assert_eq!(node.status, NodeStatus::Healthy);
        assert_eq!(node.applied_config(), Some("v1.8.0"));
        assert!(node.mgmt_ip().is_some());

        let events = fleet.events().await;
        assert_eq!(events[0].event_type, EventType::StateChange);
        assert!(events
            .iter()
            .all(|e| e.correlation_id.as_deref() == Some("corr-1")));
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn provision_is_idempotent_while_active() {
        let fleet = Arc::new(FleetService::new(Duration::from_secs(60)));
        let (first, created) = fleet.provision("3", "anonymous", None).await.unwrap();
        assert!(created);
        let (second, created) = fleet.provision("3", "anonymous", None).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(fleet.runs().await.len(), 1);
    }

    #[tokio::test]
    async fn provision_unknown_node() {
        let fleet = service();
        let err = fleet.provision("nope", "anonymous", None).await.unwrap_err();
        assert!(matches!(err, FleetError::NodeNotFound(_)));
    }

    #[tokio::test]
    async fn heartbeat_recovers_unreachable_node() {
        let fleet = service();
        let ack = fleet.heartbeat("4").await.unwrap();
        assert_eq!(ack.current_status, NodeStatus::Healthy);
        assert!(fleet.node("4").await.unwrap().last_heartbeat_at.is_some());
        assert_eq!(fleet.events().await[0].event_type, EventType::Heartbeat);

        let ack = fleet.heartbeat("2").await.unwrap();
        assert_eq!(ack.current_status, NodeStatus::Degraded);
        assert_eq!(fleet.events().await.len(), 1);
    }

    #[test]
    fn allocated_ip_is_stable_and_in_range() {
        let ip = allocate_ip("5");
        assert_eq!(ip, allocate_ip("5"));
        let last: u32 = ip.rsplit('.').next().unwrap().parse().unwrap();
        assert!((1..=254).contains(&last));
    }
}
