//! `ncp settings`: effective configuration and where each value comes from.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::{heading, section, OutputFormat, Session};
use crate::config::{Config, ENV_API_URL};
use crate::fallback::FallbackPolicy;

pub fn run(session: &Session) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match session.format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&session.config)?)?,
        OutputFormat::Yaml => write!(out, "{}", serde_yaml::to_string(&session.config)?)?,
        OutputFormat::Table => render(&session.config, &session.config_path, &mut out)?,
    }
    Ok(())
}

pub fn render(config: &Config, path: &Path, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", heading("System Settings"))?;
    let file_state = if path.exists() {
        "loaded".green()
    } else {
        "not present, using defaults".dimmed()
    };
    writeln!(out, "  Config file:       {} ({})", path.display(), file_state)?;
    writeln!(out)?;

    writeln!(out, "{}", section("Network Configuration"))?;
    writeln!(out, "  API Endpoint:      {}", config.api.base_url.bold())?;
    writeln!(
        out,
        "    {}",
        format!("override: --base-url, {} or NCP_API__BASE_URL", ENV_API_URL).dimmed()
    )?;
    writeln!(out, "  Request Timeout:   {} ms", config.api.timeout_ms)?;
    let fallback = match config.api.fallback {
        FallbackPolicy::Mock => "mock data when backend is unreachable".yellow(),
        FallbackPolicy::Disabled => "disabled, errors are reported".normal(),
    };
    writeln!(out, "  Fallback:          {}", fallback)?;
    writeln!(
        out,
        "  Refresh Interval:  {} seconds",
        config.display.refresh_interval_secs
    )?;
    writeln!(
        out,
        "  Provision Refetch: {} ms",
        config.display.provision_refetch_ms
    )?;
    writeln!(out)?;

    writeln!(out, "{}", section("Mock Backend"))?;
    writeln!(out, "  Listen Address:    {}", config.mock_server.listen_addr)?;
    writeln!(out, "  Log Level:         {}", config.mock_server.log_level)?;
    writeln!(out, "  Step Delay:        {} ms", config.mock_server.step_delay_ms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shows_endpoint_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut buf = Vec::new();
        render(&Config::default(), &path, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("http://localhost:8000/api"));
        assert!(text.contains("not present"));
        assert!(text.contains("1000 ms"));
        assert!(text.contains("10 seconds"));
    }
}
