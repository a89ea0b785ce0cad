use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use overseer_node::{logging, run_simulation, NodeConfig, Services, SimulationOptions};
use overseer_types::SystemClock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const DEFAULT_CONFIG: &str = "./overseer.toml";

#[derive(Parser)]
#[command(name = "overseer")]
#[command(about = "Overseer - contract supervision, consensus and lifecycle engine", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervisor until interrupted
    Start {
        /// Override the poll interval
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Write a default configuration file
    Init {
        /// Output directory for the configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Drive a local scenario and print the observer snapshot as JSON
    Simulate {
        /// Number of contracts to propose
        #[arg(short, long, default_value = "10")]
        contracts: usize,

        /// Number of simulated workers
        #[arg(short, long, default_value = "6")]
        workers: usize,

        /// Seed for worker behaviour
        #[arg(long, default_value = "7")]
        seed: u64,

        /// Share of attempts that crash
        #[arg(long, default_value = "0.15")]
        crash_rate: f64,

        /// Share of attempts whose result is rejected
        #[arg(long, default_value = "0.15")]
        reject_rate: f64,
    },
}

/// Config file (explicit path, then `./overseer.toml`, then defaults),
/// followed by environment overrides.
fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => NodeConfig::from_file(Path::new(DEFAULT_CONFIG))?,
        None => NodeConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    let is_simulation = matches!(cli.command, Commands::Simulate { .. });
    if config.logging.show_boot_banner && !is_simulation && cli.verbose == 0 {
        logging::display_boot_banner(&config.node.name, env!("CARGO_PKG_VERSION"));
    }
    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Start { poll_interval_ms } => {
            if let Some(ms) = poll_interval_ms {
                config.supervisor.poll_interval_ms = ms;
            }
            start(config).await
        }

        Commands::Init { output, force } => {
            std::fs::create_dir_all(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let path = output.join("overseer.toml");
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            NodeConfig::default().save_to_file(&path)?;
            info!(path = %path.display(), "⚙️ Default configuration written");
            Ok(())
        }

        Commands::Simulate {
            contracts,
            workers,
            seed,
            crash_rate,
            reject_rate,
        } => {
            let options = SimulationOptions {
                contracts,
                workers,
                seed,
                crash_rate,
                reject_rate,
                ..Default::default()
            };
            let report = run_simulation(&config, options).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serializing simulation report")?
            );
            Ok(())
        }
    }
}

async fn start(config: NodeConfig) -> Result<()> {
    info!(
        node = %config.node.name,
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.supervisor.mode,
        poll_interval_ms = config.supervisor.poll_interval_ms,
        "🚀 Starting overseer"
    );

    let (services, mut events) = Services::build(&config, Arc::new(SystemClock))?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let supervisor = services.supervisor.clone();
    let supervisor_handle = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

    let events_handle = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(
                contract_id = %event.contract_id,
                from = %event.from_state,
                to = %event.to_state,
                event = %event.event_type,
                "Lifecycle event"
            );
        }
    });

    let mut status = tokio::time::interval(Duration::from_secs(config.node.status_interval_secs.max(1)));
    status.tick().await;

    info!("✅ Overseer ready");
    loop {
        tokio::select! {
            _ = status.tick() => {
                let health = services.observer.health();
                let active = services.supervisor.active_count().await;
                if health.healthy {
                    info!(active, sample = health.sample, "📊 Status");
                } else {
                    warn!(active, breaches = ?health.breaches, safe_mode = health.safe_mode, "📊 Status: unhealthy");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                break;
            }
        }
    }

    info!("🛑 Shutting down gracefully");
    let _ = shutdown_tx.send(true);
    supervisor_handle.await.context("joining supervisor task")?;
    events_handle.abort();
    Ok(())
}
