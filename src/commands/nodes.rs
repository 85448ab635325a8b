//! `ncp nodes`: list, inspect, register and provision nodes.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use super::{emit, emit_to, heading, render_source, section, status_badge, OutputFormat, Session};
use crate::client::ClientError;
use crate::domain::types::{
    Environment, Node, NodeDraft, NodeStatus, NodeType, ProvisionAck,
};
use crate::fallback::{DataAccess, Sourced};
use crate::view::{self, LatestOnly};

pub const CREATE_FAILED: &str = "Failed to create node. Check connection.";

#[derive(Subcommand)]
pub enum NodesCommands {
    /// List every node
    List {
        /// Keep refreshing at the configured interval until Ctrl+C
        #[arg(long)]
        watch: bool,
    },
    /// Show one node in detail
    Show {
        /// Node id
        id: String,
    },
    /// Register a new node with the control plane
    Register {
        /// Node name, e.g. GS-NYC-01
        #[arg(long)]
        name: String,

        #[arg(long = "type", value_enum, default_value_t = NodeType::Ground)]
        node_type: NodeType,

        #[arg(long = "env", value_enum, default_value_t = Environment::Prod)]
        environment: Environment,

        /// Management IP address
        #[arg(long)]
        mgmt_ip: Option<String>,

        /// Desired configuration version
        #[arg(long)]
        desired_config: Option<String>,
    },
    /// Trigger the provisioning workflow for a node
    Provision {
        /// Node id
        id: String,
    },
    /// Record an agent heartbeat for a node
    Heartbeat {
        /// Node id
        id: String,
    },
}

pub async fn run(session: &Session, command: &NodesCommands) -> Result<()> {
    match command {
        NodesCommands::List { watch: false } => {
            let nodes = session.access.nodes().await?;
            emit(session.format, &nodes, |nodes, out| {
                render_list(nodes, out).map(|_| ())
            })
        }
        NodesCommands::List { watch: true } => watch(session).await,
        NodesCommands::Show { id } => {
            let node = lookup(&session.access, id).await?;
            emit(session.format, &node, |node, out| render_detail(node, out))
        }
        NodesCommands::Register {
            name,
            node_type,
            environment,
            mgmt_ip,
            desired_config,
        } => {
            let draft = NodeDraft {
                name: name.clone(),
                node_type: *node_type,
                environment: *environment,
                mgmt_ip: mgmt_ip.clone(),
                desired_config_version: desired_config.clone(),
            };
            let node = register(&session.access, &draft).await?;
            emit(session.format, &node, |node, out| {
                writeln!(
                    out,
                    "{} Registered {} ({})",
                    "ok".green().bold(),
                    node.name.bold(),
                    node.id
                )
            })
        }
        NodesCommands::Provision { id } => {
            let refetch = Duration::from_millis(session.config.display.provision_refetch_ms);
            let outcome = provision(&session.access, id, refetch).await?;
            let stdout = io::stdout();
            write_provision(session.format, &outcome, &mut stdout.lock())
        }
        NodesCommands::Heartbeat { id } => {
            let ack = session.access.heartbeat(id).await?;
            emit(session.format, &ack, |ack, out| {
                writeln!(
                    out,
                    "{} {}: {}",
                    "ok".green().bold(),
                    ack.status,
                    status_badge(ack.current_status, 0)
                )
            })
        }
    }
}

/// Fetch a node, turning a failed lookup into a "not found" error.
pub async fn lookup(access: &DataAccess, id: &str) -> Result<Sourced<Node>> {
    access.node(id).await.map_err(|e: ClientError| {
        if !e.is_not_found() {
            warn!(id, error = %e, "node lookup failed without a backend answer");
        }
        anyhow::Error::new(e).context(format!("Node {} not found", id))
    })
}

pub async fn register(access: &DataAccess, draft: &NodeDraft) -> Result<Sourced<Node>> {
    draft.validate()?;
    match access.create_node(draft).await {
        Ok(node) => Ok(node),
        Err(e) => {
            warn!(error = %e, name = %draft.name, "node creation failed");
            Err(anyhow::Error::new(e).context(CREATE_FAILED))
        }
    }
}

/// Result of a provision request as seen by the operator.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProvisionOutcome {
    /// The backend accepted the request; `node` is the re-fetched record.
    Started {
        ack: Sourced<ProvisionAck>,
        node: Sourced<Node>,
    },
    /// The backend was unreachable; the node record is left exactly as it was.
    QueuedOffline {
        ack: Sourced<ProvisionAck>,
        node: Sourced<Node>,
    },
}

pub async fn provision(
    access: &DataAccess,
    id: &str,
    refetch_after: Duration,
) -> Result<ProvisionOutcome> {
    let before = lookup(access, id).await?;
    if before.data.status == NodeStatus::Provisioning {
        bail!("Node {} is already provisioning", before.data.name);
    }

    let ack = access
        .provision_node(id)
        .await
        .with_context(|| format!("provisioning node {}", id))?;

    if ack.is_mock() || ack.data.is_queued() {
        return Ok(ProvisionOutcome::QueuedOffline { ack, node: before });
    }

    tokio::time::sleep(refetch_after).await;
    let node = lookup(access, id).await?;
    Ok(ProvisionOutcome::Started { ack, node })
}

async fn watch(session: &Session) -> Result<()> {
    let access = Arc::new(DataAccess::from_config(&session.config.api)?);
    let period = Duration::from_secs(session.config.display.refresh_interval_secs.max(1));
    let format = session.format;

    view::refresh(
        Arc::new(LatestOnly::new()),
        period,
        move || {
            let access = access.clone();
            async move { access.nodes().await }
        },
        |nodes: &Sourced<Vec<Node>>| {
            let stdout = io::stdout();
            write_watch_frame(format, nodes, &mut stdout.lock())
        },
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await
}

// ── Rendering ──────────────────────────────────────────────

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// One `--watch` redraw. Only the table view clears the terminal.
pub fn write_watch_frame(
    format: OutputFormat,
    nodes: &Sourced<Vec<Node>>,
    out: &mut dyn Write,
) -> Result<()> {
    if format == OutputFormat::Table {
        write!(out, "{}", CLEAR_SCREEN)?;
    }
    emit_to(format, nodes, out, |nodes, out| {
        render_list(nodes, out).map(|_| ())
    })
}

/// Writes the node table and returns the number of rows rendered.
pub fn render_list(nodes: &[Node], out: &mut dyn Write) -> io::Result<usize> {
    writeln!(out, "{}", heading("Network Nodes"))?;
    writeln!(
        out,
        "{}",
        format!(
            "  {:<24} {:<16} {:<8} {:<6} {:<13} {:<24} {}",
            "NAME", "MGMT IP", "TYPE", "ENV", "STATUS", "LAST HEARTBEAT", "ID"
        )
        .dimmed()
    )?;
    for node in nodes {
        writeln!(
            out,
            "  {:<24} {:<16} {:<8} {:<6} {} {:<24} {}",
            node.name,
            node.mgmt_ip().unwrap_or("No IP"),
            node.node_type.as_str(),
            node.environment.as_str(),
            status_badge(node.status, 13),
            node.last_heartbeat_label(),
            node.id.dimmed()
        )?;
    }
    if nodes.is_empty() {
        writeln!(out, "  {}", "No nodes registered.".dimmed())?;
    }
    Ok(nodes.len())
}

pub fn render_detail(node: &Node, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", heading(&node.name))?;
    writeln!(out, "  Status:          {}", status_badge(node.status, 0))?;
    writeln!(out, "  ID:              {}", node.id)?;
    writeln!(out, "  Type:            {}", node.node_type)?;
    writeln!(out, "  Env:             {}", node.environment)?;
    writeln!(out)?;

    writeln!(out, "{}", section("System"))?;
    writeln!(
        out,
        "  Management IP:   {}",
        node.mgmt_ip().unwrap_or("Not Assigned")
    )?;
    let version = node.applied_config().unwrap_or("None");
    if node.config_drift() {
        writeln!(
            out,
            "  Config Version:  {} {}",
            version,
            format!("(desired {})", node.desired_config().unwrap_or("-")).yellow()
        )?;
    } else {
        writeln!(out, "  Config Version:  {}", version)?;
    }
    writeln!(out, "  Last Heartbeat:  {}", node.last_heartbeat_label())?;
    writeln!(
        out,
        "  Updated:         {}",
        node.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out)?;

    writeln!(out, "{}", section("Recent Activity"))?;
    writeln!(
        out,
        "  {} Node Registered  {}",
        "●".green(),
        node.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
    )?;
    if node.status == NodeStatus::Provisioning {
        writeln!(out, "  {} {}", "●".blue(), "Provisioning...".blue())?;
    }
    Ok(())
}

/// Table view for operators, or the whole outcome (ack plus re-fetched node)
/// for machine formats.
pub fn write_provision(
    format: OutputFormat,
    outcome: &ProvisionOutcome,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(outcome)?)?,
        OutputFormat::Yaml => write!(out, "{}", serde_yaml::to_string(outcome)?)?,
        OutputFormat::Table => render_provision(outcome, out)?,
    }
    Ok(())
}

pub fn render_provision(outcome: &ProvisionOutcome, out: &mut dyn Write) -> io::Result<()> {
    match outcome {
        ProvisionOutcome::QueuedOffline { ack, node } => {
            render_source(ack.source, out)?;
            writeln!(
                out,
                "{} Provision request for {} queued",
                "..".blue().bold(),
                node.data.name.bold()
            )?;
            writeln!(
                out,
                "   Status unchanged: {}",
                status_badge(node.data.status, 0)
            )?;
        }
        ProvisionOutcome::Started { ack, node } => {
            match &ack.data {
                ProvisionAck::Workflow(run) => writeln!(
                    out,
                    "{} Provisioning {} started (run {}, {}, correlation {})",
                    ">>".blue().bold(),
                    node.data.name.bold(),
                    run.id,
                    run.state,
                    run.correlation_id.dimmed()
                )?,
                other => writeln!(
                    out,
                    "{} Provisioning {} started: {}",
                    ">>".blue().bold(),
                    node.data.name.bold(),
                    serde_json::to_string(other).unwrap_or_default()
                )?,
            }
            render_source(node.source, out)?;
            writeln!(
                out,
                "   Current status: {}",
                status_badge(node.data.status, 0)
            )?;
        }
    }
    Ok(())
}
