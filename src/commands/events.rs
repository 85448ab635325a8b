//! `ncp events`: audit log, newest first.

use std::io::{self, Write};

use anyhow::Result;
use colored::{ColoredString, Colorize};

use super::{emit, heading, Session};
use crate::domain::types::{EventLog, EventType};

pub async fn run(session: &Session, limit: usize) -> Result<()> {
    let mut events = session.access.events().await?;
    events.data.truncate(limit);
    emit(session.format, &events, |events, out| render(events, out))
}

fn event_badge(event_type: EventType) -> ColoredString {
    let text = format!("{:<12}", event_type.as_str());
    match event_type {
        EventType::Info => text.normal(),
        EventType::Warn => text.yellow(),
        EventType::Error => text.red(),
        EventType::StateChange => text.cyan(),
        EventType::Heartbeat => text.green(),
    }
}

pub fn render(events: &[EventLog], out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", heading("Event Log"))?;
    if events.is_empty() {
        writeln!(out, "  {}", "No events recorded.".dimmed())?;
        return Ok(());
    }
    for event in events {
        writeln!(
            out,
            "  {}  {} {:<38} {}",
            event.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            event_badge(event.event_type),
            event.node.as_deref().unwrap_or("-"),
            event.message
        )?;
    }
    Ok(())
}
