//! Canned fleet served when the backend cannot be reached.
//!
//! Everything here is deterministic: fixed ids, fixed timestamps, no clock reads.

use chrono::{DateTime, TimeZone, Utc};

use super::types::{
    Environment, Link, LinkStatus, LinkType, Node, NodeStatus, NodeType, ProvisionAck, QueuedAck,
    TopologyData,
};

fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, min, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

struct Seed {
    id: &'static str,
    name: &'static str,
    node_type: NodeType,
    environment: Environment,
    mgmt_ip: Option<&'static str>,
    status: NodeStatus,
    heartbeat: Option<(u32, u32, u32)>,
    desired: Option<&'static str>,
    applied: Option<&'static str>,
    created: (u32, u32, u32),
}

const FLEET: [Seed; 6] = [
    Seed {
        id: "1",
        name: "GS-HAWAII-01",
        node_type: NodeType::Ground,
        environment: Environment::Prod,
        mgmt_ip: Some("10.20.1.10"),
        status: NodeStatus::Healthy,
        heartbeat: Some((14, 11, 58)),
        desired: Some("v2.3.1"),
        applied: Some("v2.3.1"),
        created: (1, 8, 0),
    },
    Seed {
        id: "2",
        name: "GS-LUXEMBOURG-02",
        node_type: NodeType::Ground,
        environment: Environment::Prod,
        mgmt_ip: Some("10.20.1.11"),
        status: NodeStatus::Degraded,
        heartbeat: Some((14, 11, 41)),
        desired: Some("v2.3.1"),
        applied: Some("v2.2.0"),
        created: (1, 8, 5),
    },
    Seed {
        id: "3",
        name: "SAT-ARCTURUS-001",
        node_type: NodeType::Sat,
        environment: Environment::Prod,
        mgmt_ip: Some("10.30.2.21"),
        status: NodeStatus::Healthy,
        heartbeat: Some((14, 11, 59)),
        desired: Some("v1.8.0"),
        applied: Some("v1.8.0"),
        created: (2, 9, 30),
    },
    Seed {
        id: "4",
        name: "SAT-V1-045",
        node_type: NodeType::Sat,
        environment: Environment::Stage,
        mgmt_ip: Some("10.30.2.45"),
        status: NodeStatus::Unreachable,
        heartbeat: Some((13, 22, 14)),
        desired: Some("v1.8.0"),
        applied: Some("v1.7.2"),
        created: (3, 14, 0),
    },
    Seed {
        id: "5",
        name: "SAT-V1-046 [PROV]",
        node_type: NodeType::Sat,
        environment: Environment::Dev,
        mgmt_ip: None,
        status: NodeStatus::Provisioning,
        heartbeat: None,
        desired: Some("v1.8.0"),
        applied: None,
        created: (14, 10, 15),
    },
    Seed {
        id: "6",
        name: "RTR-CORE-01",
        node_type: NodeType::Router,
        environment: Environment::Prod,
        mgmt_ip: Some("10.0.0.1"),
        status: NodeStatus::Error,
        heartbeat: Some((14, 9, 3)),
        desired: Some("v4.0.2"),
        applied: Some("v4.0.2"),
        created: (1, 7, 45),
    },
];

fn build(seed: &Seed) -> Node {
    let created_at = at(seed.created.0, seed.created.1, seed.created.2);
    let last_heartbeat_at = seed.heartbeat.map(|(d, h, m)| at(d, h, m));
    Node {
        id: seed.id.to_string(),
        name: seed.name.to_string(),
        node_type: seed.node_type,
        environment: seed.environment,
        mgmt_ip: seed.mgmt_ip.map(str::to_string),
        status: seed.status,
        last_heartbeat_at,
        desired_config_version: seed.desired.map(str::to_string),
        applied_config_version: seed.applied.map(str::to_string),
        created_at,
        updated_at: last_heartbeat_at.unwrap_or(created_at),
    }
}

/// The six-node demo fleet.
pub fn nodes() -> Vec<Node> {
    FLEET.iter().map(build).collect()
}

pub fn node(id: &str) -> Option<Node> {
    FLEET.iter().find(|s| s.id == id).map(build)
}

/// Four representative links across the demo fleet, with embedded node copies.
pub fn links() -> Vec<Link> {
    [
        ("link-1", "1", "3", LinkType::Rf, LinkStatus::Up, Some(24), Some(0.1)),
        ("link-2", "2", "4", LinkType::Rf, LinkStatus::Degraded, Some(187), Some(4.5)),
        ("link-3", "6", "1", LinkType::Fiber, LinkStatus::Up, Some(3), Some(0.0)),
        ("link-4", "6", "2", LinkType::Vpn, LinkStatus::Down, None, None),
    ]
    .into_iter()
    .map(|(id, from, to, link_type, status, latency_ms, packet_loss)| Link {
        id: id.to_string(),
        from_node: from.to_string(),
        to_node: to.to_string(),
        from_node_details: node(from),
        to_node_details: node(to),
        link_type,
        status,
        latency_ms,
        packet_loss,
    })
    .collect()
}

pub fn topology() -> TopologyData {
    TopologyData {
        nodes: nodes(),
        links: links(),
    }
}

pub fn queued_ack(id: &str) -> ProvisionAck {
    ProvisionAck::Queued(QueuedAck {
        status: ProvisionAck::QUEUED.to_string(),
        node: id.to_string(),
        message: "provision request accepted offline; backend unreachable".to_string(),
    })
}
