//! Catalyst CLI - thin operator entrypoint for the deployment orchestrator.
//!
//! Wires the library crates together: loads configuration, establishes the
//! database connection, runs migrations, and constructs the admission queue
//! feeding the deployment state machine. The HTTP/GraphQL façade a real
//! product would put in front of this is out of scope; this binary exists
//! for manual operation and smoke testing.

mod commands;

use clap::{Parser, Subcommand};
use commands::DeployCommand;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CATALYST_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "CATALYST_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a pending deployment row and drive it through the orchestrator
    Deploy(DeployCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Commands::Deploy(cmd) => cmd.execute().await,
        }
    })
}

fn init_tracing(log_level: &str, log_format: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env().expect("invalid RUST_LOG")
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "catalyst_cli={level},\
             catalyst_deployments={level},\
             catalyst_deployer={level},\
             catalyst_core={level},\
             catalyst_git={level},\
             catalyst_supervisor={level},\
             catalyst_proxy={level},\
             catalyst_queue={level},\
             catalyst_logs={level},\
             catalyst_entities={level},\
             catalyst_database={level},\
             catalyst_migrations={level},\
             sqlx=warn,\
             sea_orm=warn,\
             hyper=warn,\
             rustls=warn",
            level = log_level
        ))
    };

    let fmt_layer = match log_format {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).expect("failed to set global subscriber");
}
