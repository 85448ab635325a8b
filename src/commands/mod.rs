pub mod events;
pub mod links;
pub mod nodes;
pub mod serve;
pub mod settings;
pub mod topology;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::config::Config;
use crate::domain::types::{LinkStatus, NodeStatus};
use crate::fallback::{DataAccess, Source, Sourced};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Resolved configuration plus the data access layer built from it.
pub struct Session {
    pub config: Config,
    pub config_path: PathBuf,
    pub access: DataAccess,
    pub format: OutputFormat,
}

impl Session {
    pub fn new(config: Config, config_path: PathBuf, format: OutputFormat) -> Result<Self> {
        let access = DataAccess::from_config(&config.api).context("building API client")?;
        Ok(Self {
            config,
            config_path,
            access,
            format,
        })
    }
}

/// Render a sourced payload: table views get the demo-mode banner, machine
/// formats get the whole envelope so provenance stays visible.
pub fn emit<T, F>(format: OutputFormat, sourced: &Sourced<T>, table: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T, &mut dyn Write) -> io::Result<()>,
{
    let stdout = io::stdout();
    emit_to(format, sourced, &mut stdout.lock(), table)
}

pub fn emit_to<T, F>(
    format: OutputFormat,
    sourced: &Sourced<T>,
    out: &mut dyn Write,
    table: F,
) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T, &mut dyn Write) -> io::Result<()>,
{
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(sourced)?)?;
        }
        OutputFormat::Yaml => {
            write!(out, "{}", serde_yaml::to_string(sourced)?)?;
        }
        OutputFormat::Table => {
            render_source(sourced.source, out)?;
            table(&sourced.data, out)?;
        }
    }
    Ok(())
}

pub fn render_source(source: Source, out: &mut dyn Write) -> io::Result<()> {
    if source == Source::Mock {
        writeln!(
            out,
            "{} {}",
            "!! OFFLINE DEMO MODE".yellow().bold(),
            "backend unreachable, showing mock data".yellow()
        )?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn status_badge(status: NodeStatus, width: usize) -> ColoredString {
    let text = format!("{:<width$}", status.as_str());
    match status {
        NodeStatus::Healthy => text.green(),
        NodeStatus::Provisioning => text.blue(),
        NodeStatus::Error => text.red(),
        NodeStatus::Unreachable => text.yellow(),
        NodeStatus::Degraded => text.dimmed(),
    }
}

pub fn link_badge(status: LinkStatus, width: usize) -> ColoredString {
    let text = format!("{:<width$}", status.as_str());
    match status {
        LinkStatus::Up => text.green(),
        LinkStatus::Degraded => text.yellow(),
        LinkStatus::Down => text.red(),
    }
}

pub fn heading(title: &str) -> ColoredString {
    format!("═══ {} ═══", title).cyan().bold()
}

pub fn section(title: &str) -> ColoredString {
    format!("── {} ──", title).yellow()
}
