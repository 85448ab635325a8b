//! `ncp links`: every link the backend reports, with latency and loss.

use std::io::{self, Write};

use anyhow::Result;
use colored::Colorize;

use super::topology::link_line;
use super::{emit, heading, Session};
use crate::domain::types::Link;

pub async fn run(session: &Session) -> Result<()> {
    let links = session.access.links().await?;
    emit(session.format, &links, |links, out| render(links, out))
}

pub fn render(links: &[Link], out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", heading("Network Links"))?;
    if links.is_empty() {
        writeln!(out, "  {}", "No active links".dimmed().italic())?;
    }
    for link in links {
        writeln!(out, "  {}", link_line(link))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock;

    fn rendered(links: &[Link]) -> String {
        let mut buf = Vec::new();
        render(links, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn lists_each_link_with_its_ends() {
        let links = mock::links();
        let text = rendered(&links);
        for link in &links {
            assert!(text.contains(link.from_label()));
            assert!(text.contains(link.to_label()));
        }
        assert!(!text.contains("No active links"));
    }

    #[test]
    fn offline_fallback_renders_empty_state() {
        assert!(rendered(&[]).contains("No active links"));
    }
}
