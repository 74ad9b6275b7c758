//! Sandbox Uploadr - model upload and endpoint readiness CLI

use clap::{Parser, Subcommand};
use sandbox_uploadr::config::Config;
use sandbox_uploadr::platform::DeploymentResponse;
use sandbox_uploadr::probe::ReadinessProber;
use sandbox_uploadr::upload::ModelFileUploader;
use sandbox_uploadr::walk::walk_directory;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Sandbox Uploadr - push model directories and wait for sandbox endpoints
#[derive(Parser, Debug)]
#[command(name = "sandbox-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a model directory to the targets in a platform response
    Upload {
        /// Model directory
        dir: PathBuf,

        /// JSON platform response holding the upload target map
        #[arg(short, long)]
        targets: PathBuf,

        /// Print Prometheus metrics after the upload
        #[arg(long)]
        print_metrics: bool,
    },

    /// Wait until a sandbox hostname answers
    WaitReady {
        hostname: String,

        /// Request path (defaults to probe.path from the config)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Print the files a directory upload would send
    List {
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Sandbox Uploadr v{}", sandbox_uploadr::VERSION);

    match args.command {
        Command::List { dir } => {
            let files = walk_directory(&dir)?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        Command::Upload {
            dir,
            targets,
            print_metrics,
        } => {
            let config = Config::load(&args.config)?;
            info!("Loaded configuration from {:?}", args.config);

            let response = DeploymentResponse::from_json(&std::fs::read_to_string(&targets)?)?;
            let uploader = ModelFileUploader::from_config(&config)?;
            let summary = uploader
                .upload_directory(&dir, &response.upload_targets)
                .await?;

            println!(
                "uploaded {} files ({} bytes), skipped {}",
                summary.uploaded, summary.bytes, summary.skipped
            );

            if print_metrics {
                print!("{}", sandbox_uploadr::metrics::render());
            }
        }
        Command::WaitReady { hostname, path } => {
            let config = Config::load(&args.config)?;
            info!("Loaded configuration from {:?}", args.config);

            let path = path.unwrap_or_else(|| config.probe.path.clone());
            let prober = ReadinessProber::from_config(&config.probe)?;
            let outcome = prober.wait_until_ready(&hostname, &path).await?;

            println!(
                "{} ready after {} attempts (HTTP {})",
                hostname, outcome.attempts, outcome.status
            );
        }
    }

    Ok(())
}
