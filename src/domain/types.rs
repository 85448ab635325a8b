//! Wire types mirrored from the control-plane backend.
//!
//! The backend owns every entity; the console only holds transient copies.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NAME_MAX_LEN: usize = 100;

// ── Enumerations ───────────────────────────────────────────

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Node category.
    #[derive(clap::ValueEnum)]
    NodeType {
        Ground => "GROUND",
        Sat => "SAT",
        Router => "ROUTER",
        Generic => "GENERIC",
    }
);

wire_enum!(
    #[derive(clap::ValueEnum)]
    Environment {
        Dev => "DEV",
        Stage => "STAGE",
        Prod => "PROD",
    }
);

wire_enum!(
    /// Lifecycle status reported by the backend.
    NodeStatus {
        Provisioning => "PROVISIONING",
        Healthy => "HEALTHY",
        Degraded => "DEGRADED",
        Unreachable => "UNREACHABLE",
        Error => "ERROR",
    }
);

wire_enum!(
    LinkType {
        Rf => "RF",
        Fiber => "FIBER",
        Vpn => "VPN",
        Generic => "GENERIC",
    }
);

wire_enum!(
    LinkStatus {
        Up => "UP",
        Down => "DOWN",
        Degraded => "DEGRADED",
    }
);

wire_enum!(
    WorkflowType {
        Provision => "PROVISION",
        ApplyConfig => "APPLY_CONFIG",
        RestartAgent => "RESTART_AGENT",
    }
);

wire_enum!(
    WorkflowState {
        Queued => "QUEUED",
        Running => "RUNNING",
        Succeeded => "SUCCEEDED",
        Failed => "FAILED",
    }
);

wire_enum!(
    EventType {
        Info => "INFO",
        Warn => "WARN",
        Error => "ERROR",
        StateChange => "STATE_CHANGE",
        Heartbeat => "HEARTBEAT",
    }
);

impl WorkflowState {
    /// Queued and running workflows block a second run of the same type.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

// ── Node ───────────────────────────────────────────────────

/// A managed network endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_ip: Option<String>,
    pub status: NodeStatus,
    /// Absent when the node has never reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_config_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_config_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn mgmt_ip(&self) -> Option<&str> {
        non_blank(&self.mgmt_ip)
    }

    pub fn desired_config(&self) -> Option<&str> {
        non_blank(&self.desired_config_version)
    }

    /// The backend sends blank strings for unset versions.
    pub fn applied_config(&self) -> Option<&str> {
        non_blank(&self.applied_config_version)
    }

    /// True when both versions are known and disagree.
    pub fn config_drift(&self) -> bool {
        match (self.desired_config(), self.applied_config()) {
            (Some(desired), Some(applied)) => desired != applied,
            _ => false,
        }
    }

    pub fn last_heartbeat_label(&self) -> String {
        match self.last_heartbeat_at {
            Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => "Never".to_string(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

// ── Link ───────────────────────────────────────────────────

/// A network path between two nodes. `from_node`/`to_node` are id references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub from_node: String,
    pub to_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_node_details: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_node_details: Option<Node>,
    pub link_type: LinkType,
    pub status: LinkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_loss: Option<f64>,
}

impl Link {
    pub fn from_label(&self) -> &str {
        self.from_node_details
            .as_ref()
            .map(|n| n.name.as_str())
            .unwrap_or(&self.from_node)
    }

    pub fn to_label(&self) -> &str {
        self.to_node_details
            .as_ref()
            .map(|n| n.name.as_str())
            .unwrap_or(&self.to_node)
    }
}

// ── Workflow + events ──────────────────────────────────────

/// A backend-tracked asynchronous operation against a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: String,
    pub node: String,
    pub workflow_type: WorkflowType,
    pub state: WorkflowState,
    #[serde(default)]
    pub requested_by: String,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit/telemetry record, optionally tied to a node or workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_run: Option<String>,
    pub event_type: EventType,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Full node and link set in one payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyData {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl TopologyData {
    pub fn nodes_of(&self, node_type: NodeType) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }
}

// ── Requests / acknowledgements ────────────────────────────

/// Create-node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    pub name: String,
    #[serde(default = "default_node_type")]
    pub node_type: NodeType,
    #[serde(default = "default_environment")]
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_config_version: Option<String>,
}

fn default_node_type() -> NodeType {
    NodeType::Generic
}

fn default_environment() -> Environment {
    Environment::Dev
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("node name is required")]
    MissingName,
    #[error("node name exceeds {} characters", NAME_MAX_LEN)]
    NameTooLong,
    #[error("'{0}' is not a valid IP address")]
    InvalidIp(String),
}

impl NodeDraft {
    pub fn validate(&self) -> Result<(), DraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DraftError::MissingName);
        }
        if name.chars().count() > NAME_MAX_LEN {
            return Err(DraftError::NameTooLong);
        }
        if let Some(ip) = non_blank(&self.mgmt_ip) {
            if ip.parse::<IpAddr>().is_err() {
                return Err(DraftError::InvalidIp(ip.to_string()));
            }
        }
        Ok(())
    }
}

/// Synthetic acknowledgement used when a provision request cannot reach the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAck {
    pub status: String,
    pub node: String,
    pub message: String,
}

/// Whatever the backend answered to a provision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvisionAck {
    Workflow(WorkflowRun),
    Queued(QueuedAck),
    Other(serde_json::Value),
}

impl ProvisionAck {
    pub const QUEUED: &'static str = "queued";

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(ack) if ack.status == Self::QUEUED)
    }
}

/// Body returned by the heartbeat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    pub status: String,
    pub current_status: NodeStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_json(extra: &str) -> String {
        format!(
            r#"{{
                "id": "0b8c",
                "name": "GS-TEST",
                "node_type": "GROUND",
                "environment": "PROD",
                "status": "HEALTHY",
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-01T10:00:00Z"{extra}
            }}"#
        )
    }

    #[test]
    fn node_decodes_backend_shape_with_blank_versions() {
        let json = node_json(
            r#", "mgmt_ip": null, "desired_config_version": "", "applied_config_version": """#,
        );
        let node: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(node.node_type, NodeType::Ground);
        assert_eq!(node.mgmt_ip(), None);
        assert_eq!(node.applied_config(), None);
        assert!(!node.config_drift());
        assert_eq!(node.last_heartbeat_label(), "Never");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let json = node_json("").replace("HEALTHY", "ON_FIRE");
        assert!(serde_json::from_str::<Node>(&json).is_err());
    }

    #[test]
    fn drift_requires_both_versions() {
        let json = node_json(
            r#", "desired_config_version": "v1.1.0", "applied_config_version": "v1.0.0""#,
        );
        let node: Node = serde_json::from_str(&json).unwrap();
        assert!(node.config_drift());
    }

    #[test]
    fn workflow_type_uses_wire_names() {
        let s = serde_json::to_string(&WorkflowType::ApplyConfig).unwrap();
        assert_eq!(s, "\"APPLY_CONFIG\"");
        assert_eq!(EventType::StateChange.to_string(), "STATE_CHANGE");
    }

    #[test]
    fn draft_validation() {
        let mut draft = NodeDraft {
            name: "  ".into(),
            node_type: NodeType::Ground,
            environment: Environment::Prod,
            mgmt_ip: None,
            desired_config_version: None,
        };
        assert_eq!(draft.validate(), Err(DraftError::MissingName));

        draft.name = "GS-NYC-01".into();
        draft.mgmt_ip = Some("10.0.0.300".into());
        assert_eq!(
            draft.validate(),
            Err(DraftError::InvalidIp("10.0.0.300".into()))
        );

        draft.mgmt_ip = Some("10.0.0.30".into());
        assert!(draft.validate().is_ok());

        draft.name = "x".repeat(101);
        assert_eq!(draft.validate(), Err(DraftError::NameTooLong));
    }

    #[test]
    fn provision_ack_distinguishes_workflow_from_queued() {
        let workflow = r#"{
            "id": "run-1", "node": "5", "workflow_type": "PROVISION",
            "state": "QUEUED", "requested_by": "anonymous",
            "correlation_id": "c-1",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }"#;
        let ack: ProvisionAck = serde_json::from_str(workflow).unwrap();
        assert!(matches!(ack, ProvisionAck::Workflow(_)));
        assert!(!ack.is_queued());

        let queued = r#"{"status": "queued", "node": "5", "message": "accepted offline"}"#;
        let ack: ProvisionAck = serde_json::from_str(queued).unwrap();
        assert!(ack.is_queued());

        let other: ProvisionAck = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(matches!(other, ProvisionAck::Other(_)));
    }

    #[test]
    fn link_labels_prefer_embedded_names() {
        let node: Node = serde_json::from_str(&node_json("")).unwrap();
        let link = Link {
            id: "l".into(),
            from_node: "0b8c".into(),
            to_node: "ffff".into(),
            from_node_details: Some(node),
            to_node_details: None,
            link_type: LinkType::Rf,
            status: LinkStatus::Up,
            latency_ms: None,
            packet_loss: None,
        };
        assert_eq!(link.from_label(), "GS-TEST");
        assert_eq!(link.to_label(), "ffff");
    }
}
