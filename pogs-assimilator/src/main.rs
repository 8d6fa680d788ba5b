//! pogs-assimilator - command-line entry point
//!
//! `assimilate` loads the canonical output of one or more completed tasks
//! (described by TOML manifests) into the result store. `init-db` creates the
//! result tables and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pogs_common::config::{BootstrapConfig, ConfigOverrides};
use pogs_common::db::init_database;
use pogs_assimilator::{Orchestrator, TaskManifest, TaskSource};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Command-line arguments for pogs-assimilator
#[derive(Parser, Debug)]
#[command(name = "pogs-assimilator")]
#[command(about = "Assimilate POGS fit reports into the result store")]
#[command(version)]
struct Args {
    /// Bootstrap config file (default: POGS_CONFIG or the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database holding assimilated results
    #[arg(long, env = "POGS_DATABASE")]
    database: Option<PathBuf>,

    /// Folder that relative output file names are resolved against
    #[arg(long, env = "POGS_UPLOAD_ROOT")]
    upload_root: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Upper bound on tasks assimilated at once
    #[arg(long)]
    max_concurrent: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assimilate the tasks described by the given manifests
    Assimilate {
        /// Task manifest (TOML); may be repeated
        #[arg(short, long = "task", required = true)]
        tasks: Vec<PathBuf>,

        /// Print one JSON report per task on stdout
        #[arg(long)]
        json: bool,
    },

    /// Create the database and result tables, then exit
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        database_path: args.database.clone(),
        upload_root: args.upload_root.clone(),
        max_concurrent_tasks: args.max_concurrent,
        log_level: args.log_level.clone(),
    };
    let config = BootstrapConfig::resolve(&overrides, args.config.as_deref())
        .context("Failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting pogs-assimilator v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config.log_source();
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    match args.command {
        Command::InitDb => {
            info!("Result tables ready");
            pool.close().await;
            Ok(())
        }
        Command::Assimilate { tasks, json } => {
            let mut sources: Vec<Arc<dyn TaskSource>> = Vec::with_capacity(tasks.len());
            for path in &tasks {
                let manifest = TaskManifest::load(path)
                    .with_context(|| format!("Failed to load task manifest {}", path.display()))?;
                sources.push(Arc::new(manifest));
            }

            let cancel = CancellationToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing running tasks");
                    ctrl_c_token.cancel();
                }
            });

            let orchestrator = Orchestrator::new(pool.clone(), config.upload_root.clone());
            info!(
                "Upload root: {} ({} task(s), up to {} at once)",
                orchestrator.upload_root().display(),
                sources.len(),
                config.max_concurrent_tasks
            );

            let outcomes = orchestrator
                .assimilate_batch(sources, config.max_concurrent_tasks, &cancel)
                .await;
            pool.close().await;

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(report) => {
                        if json {
                            println!(
                                "{}",
                                serde_json::to_string(report)
                                    .context("Failed to serialize assimilation report")?
                            );
                        }
                    }
                    Err(_) => failed += 1,
                }
            }

            info!(
                "Assimilation finished: {} succeeded, {} failed",
                outcomes.len() - failed,
                failed
            );
            if failed > 0 {
                error!("{} task(s) failed", failed);
                anyhow::bail!("{} of {} task(s) failed", failed, outcomes.len());
            }
            Ok(())
        }
    }
}
