use anyhow::Result;

use crate::config::MockServerConfig;

pub async fn run(
    mut config: MockServerConfig,
    listen_addr: Option<String>,
    step_delay_ms: Option<u64>,
    log_level: Option<String>,
) -> Result<()> {
    // CLI flags override config values
    if let Some(addr) = listen_addr {
        config.listen_addr = addr;
    }
    if let Some(delay) = step_delay_ms {
        config.step_delay_ms = delay;
    }

    crate::logging::init_daemon(log_level.as_deref(), &config.log_level);
    crate::server::run(config).await
}
