//! `ncp topology`: grouped view of nodes and the links between them.

use std::io::{self, Write};

use anyhow::Result;
use colored::Colorize;

use super::{emit, heading, link_badge, section, Session};
use crate::domain::types::{Link, NodeType, TopologyData};

pub async fn run(session: &Session) -> Result<()> {
    let topology = session.access.topology().await?;
    emit(session.format, &topology, |data, out| render(data, out))
}

const GROUPS: [(NodeType, &str); 4] = [
    (NodeType::Ground, "Ground Stations"),
    (NodeType::Sat, "Satellites"),
    (NodeType::Router, "Routers"),
    (NodeType::Generic, "Generic"),
];

pub fn render(data: &TopologyData, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", heading("Network Topology"))?;
    if data.nodes.is_empty() {
        writeln!(out, "  {}", "No nodes found in topology.".dimmed())?;
        return Ok(());
    }

    for (node_type, title) in GROUPS {
        let members: Vec<_> = data.nodes_of(node_type).collect();
        // ground stations and satellites always get a column, even when empty
        if members.is_empty() && matches!(node_type, NodeType::Router | NodeType::Generic) {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "{}", section(title))?;
        for node in &members {
            writeln!(
                out,
                "  {} {}",
                format!("{:<24}", node.name).bold(),
                super::status_badge(node.status, 0)
            )?;
        }
        if members.is_empty() {
            writeln!(out, "  {}", "-".dimmed())?;
        }
    }

    writeln!(out)?;
    writeln!(out, "{}", section("Links"))?;
    if data.links.is_empty() {
        writeln!(out, "  {}", "No active links".dimmed().italic())?;
    }
    for link in &data.links {
        writeln!(out, "  {}", link_line(link))?;
    }
    Ok(())
}

pub(super) fn link_line(link: &Link) -> String {
    let latency = link
        .latency_ms
        .map(|ms| format!("{} ms", ms))
        .unwrap_or_else(|| "-".to_string());
    let loss = link
        .packet_loss
        .map(|pct| format!("{:.1}% loss", pct))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<20} ──── {:<20} {:<6} {} {:>7}  {}",
        link.from_label(),
        link.to_label(),
        link.link_type.as_str(),
        link_badge(link.status, 9),
        latency,
        loss
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock;

    fn rendered(data: &TopologyData) -> String {
        let mut buf = Vec::new();
        render(data, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn groups_nodes_and_names_link_ends() {
        let text = rendered(&mock::topology());
        assert!(text.contains("Ground Stations"));
        assert!(text.contains("Satellites"));
        assert!(text.contains("Routers"));
        assert!(!text.contains("Generic"));
        assert!(text.contains("GS-HAWAII-01"));
        assert!(text.contains("187 ms"));
        assert!(!text.contains("No active links"));
    }

    #[test]
    fn empty_topology() {
        let text = rendered(&TopologyData::default());
        assert!(text.contains("No nodes found in topology."));
    }

    #[test]
    fn nodes_without_links() {
        let data = TopologyData {
            nodes: mock::nodes(),
            links: Vec::new(),
        };
        assert!(rendered(&data).contains("No active links"));
    }

    #[test]
    fn link_falls_back_to_raw_ids() {
        let mut link = mock::links().remove(0);
        link.from_node_details = None;
        let line = link_line(&link);
        assert!(line.starts_with("1 "));
        assert!(line.contains("SAT-ARCTURUS-001"));
    }
}
