use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::time::{Duration, Instant, sleep};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use aerjob_core::app::{Context, Controller, ControllerStatus, HandlerRegistry, controller_status};
use aerjob_core::config::ControllerConfig;
use aerjob_core::domain::{AerJob, AerJobSpec, AerJobStatus};
use aerjob_core::impls::{
    InMemoryExecutionClient, InMemoryJobStore, SimulatedBackend, TracingEventSink,
};
use aerjob_core::ports::JobStore;

#[derive(Parser)]
#[command(name = "aerjob")]
#[command(version, about = "Reconciliation controller for quantum execution jobs")]
struct Cli {
    /// Log filter, e.g. "info" or "aerjob_core=debug"
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Path to a TOML controller config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller against in-memory resources until every job settles
    Simulate {
        /// JSON file holding an array of job manifests (a built-in set if omitted)
        #[arg(long)]
        jobs: Option<PathBuf>,

        /// Override the configured worker count
        #[arg(long)]
        workers: Option<usize>,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "60")]
        deadline_secs: u64,

        /// Polls the simulated backend reports `Running` before finishing
        #[arg(long, default_value = "2")]
        backend_polls: u32,

        /// Simulated round-trip time of every backend call, in milliseconds
        #[arg(long, default_value = "0")]
        backend_latency_ms: u64,
    },
    /// Validate a config file and print the effective settings
    CheckConfig,
}

#[derive(Serialize)]
struct Report {
    controller: ControllerStatus,
    jobs: Vec<JobReport>,
}

#[derive(Serialize)]
struct JobReport {
    key: String,
    status: AerJobStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Simulate {
            jobs,
            workers,
            deadline_secs,
            backend_polls,
            backend_latency_ms,
        } => {
            let mut config = config;
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.validate().context("invalid settings")?;
            let manifests = match jobs {
                Some(path) => read_jobs(&path)?,
                None => demo_jobs(),
            };
            simulate(
                config,
                manifests,
                Duration::from_secs(deadline_secs),
                SimulatedBackend::new(backend_polls)
                    .with_latency(Duration::from_millis(backend_latency_ms)),
            )
            .await
        }
        Commands::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    match path {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ControllerConfig::default()),
    }
}

fn read_jobs(path: &Path) -> Result<Vec<AerJob>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let jobs: Vec<AerJob> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse job manifests in {}", path.display()))?;
    if jobs.is_empty() {
        bail!("{} contains no jobs", path.display());
    }
    Ok(jobs)
}

fn demo_jobs() -> Vec<AerJob> {
    vec![
        AerJob::new("quantum", "bell", AerJobSpec::new("UVFQAAAA")),
        AerJob::new("quantum", "ghz", AerJobSpec::new("UVFQAAAB").with_shots(4096)),
        AerJob::new("quantum", "empty", AerJobSpec::new("")),
    ]
}

async fn simulate(
    config: ControllerConfig,
    manifests: Vec<AerJob>,
    deadline: Duration,
    backend: SimulatedBackend,
) -> Result<()> {
    let cluster = Arc::new(InMemoryExecutionClient::new());
    let store = Arc::new(InMemoryJobStore::new().with_garbage_collection(cluster.clone()));
    let backend = Arc::new(backend);
    let ctx = Arc::new(Context::new(
        store.clone(),
        cluster,
        backend,
        Arc::new(TracingEventSink),
        config,
    ));

    let handle = Controller::new(ctx, Arc::new(HandlerRegistry::standard()))
        .start()
        .await?;

    for manifest in manifests {
        let key = manifest.key();
        store
            .create(manifest)
            .await
            .with_context(|| format!("failed to submit {key}"))?;
    }

    let give_up = Instant::now()
        .checked_add(deadline)
        .context("--deadline-secs is too large")?;
    let controller = loop {
        let status = controller_status(store.as_ref(), handle.queue()).await?;
        let phases = &status.phases;
        if phases.unsettled() == 0 {
            info!(completed = phases.completed, failed = phases.failed, "all jobs settled");
            break status;
        }
        if Instant::now() >= give_up {
            warn!(
                unsettled = phases.unsettled(),
                processing = status.queue.processing,
                backing_off = status.queue.backing_off,
                "deadline reached"
            );
            break status;
        }
        debug!(
            unsettled = phases.unsettled(),
            queued = status.queue.queued,
            scheduled = status.queue.scheduled,
            "waiting for jobs to settle"
        );
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                break controller_status(store.as_ref(), handle.queue()).await?;
            }
            _ = sleep(Duration::from_millis(200)) => {}
        }
    };
    handle.shutdown_and_join().await;

    let report = Report {
        controller,
        jobs: store
            .list()
            .await?
            .into_iter()
            .map(|job| JobReport {
                key: job.key().to_string(),
                status: job.status,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
