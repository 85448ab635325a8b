mod api;
mod client;
mod commands;
mod config;
mod domain;
mod fallback;
mod logging;
mod server;
mod view;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{OutputFormat, Session};
use fallback::FallbackPolicy;

#[derive(Parser)]
#[command(name = "ncp", version, about = "Operations console for the network control plane")]
struct Cli {
    /// Backend base URL (overrides config and NCP_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Report backend failures instead of substituting mock data
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Path to config file (default: ~/.config/ncp/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides RUST_LOG; default warn, or the mock backend's config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Network nodes: list, show, register, provision
    Nodes {
        #[command(subcommand)]
        command: commands::nodes::NodesCommands,
    },

    /// Grouped view of nodes and links
    Topology,

    /// Links between nodes, with latency and loss
    Links,

    /// Audit event log
    Events {
        /// Maximum number of events to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show effective configuration
    Settings,

    /// Run an in-memory mock backend serving the demo fleet
    ServeMock {
        /// HTTP listen address (overrides config)
        #[arg(long)]
        listen: Option<String>,

        /// Delay between simulated provisioning steps, in milliseconds
        #[arg(long)]
        step_delay_ms: Option<u64>,
    },
}

const CLI_LOG_LEVEL: &str = "warn";

fn main() -> anyhow::Result<()> {
    let Cli {
        base_url,
        timeout_ms,
        no_fallback,
        format,
        config: config_file,
        log_level,
        command,
    } = Cli::parse();

    let (mut cfg, config_path) = config::load(config_file.as_deref())?;
    if let Some(url) = base_url {
        cfg.api.base_url = url;
    }
    if let Some(ms) = timeout_ms {
        cfg.api.timeout_ms = ms;
    }
    if no_fallback {
        cfg.api.fallback = FallbackPolicy::Disabled;
    }

    let console = || -> anyhow::Result<Session> {
        logging::init_cli(log_level.as_deref(), CLI_LOG_LEVEL);
        Session::new(cfg.clone(), config_path.clone(), format)
    };

    // Build tokio runtime explicitly (no #[tokio::main] on fn main)
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match command {
            Commands::Nodes { command } => commands::nodes::run(&console()?, &command).await,
            Commands::Topology => commands::topology::run(&console()?).await,
            Commands::Links => commands::links::run(&console()?).await,
            Commands::Events { limit } => commands::events::run(&console()?, limit).await,
            Commands::Settings => commands::settings::run(&console()?),
            Commands::ServeMock {
                listen,
                step_delay_ms,
            } => {
                commands::serve::run(
                    cfg.mock_server.clone(),
                    listen,
                    step_delay_ms,
                    log_level.clone(),
                )
                .await
            }
        }
    })
}
