use agent_relay::config::Config;
use agent_relay::transport;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "agent-relay")]
#[command(
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), env!("RELAY_VERSION_SUFFIX")),
    about = "Relay that discovers hosted agents and runs research -> analysis -> writing workflows",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config dir, agent-relay/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP relay
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Query every configured agent and print what answered
    Discover,

    /// Probe each agent's detail endpoint
    Probe,

    /// Send a single message to an agent by id (e.g. researchAgent)
    Send {
        agent_id: String,
        message: String,
    },

    /// Run the research -> analysis -> writing pipeline once
    Workflow {
        #[arg(short, long)]
        topic: String,

        /// Target audience for the analysis and writing stages
        #[arg(short, long)]
        audience: String,

        /// Skip the live-update streams after the pipeline finishes
        #[arg(long)]
        simple: bool,

        /// Pass the research output into the analysis prompt
        #[arg(long)]
        feed_forward: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "agent_relay=debug,tower_http=debug"
    } else {
        "agent_relay=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            tracing::info!(
                "Starting relay on {}:{}",
                config.server.host,
                config.server.port
            );
            transport::run_http_server(&config).await?;
        }
        Commands::Discover => {
            transport::cli::run_discover(&config).await?;
        }
        Commands::Probe => {
            transport::cli::run_communication_test(&config).await?;
        }
        Commands::Send { agent_id, message } => {
            transport::cli::run_send(&config, &agent_id, &message).await?;
        }
        Commands::Workflow {
            topic,
            audience,
            simple,
            feed_forward,
        } => {
            transport::cli::run_workflow(&config, topic, audience, simple, feed_forward).await?;
        }
    }

    Ok(())
}
