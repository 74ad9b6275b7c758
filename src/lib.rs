//! Sandbox Uploadr Library
//!
//! Client-side plumbing for a serverless sandbox platform: pushes local model
//! directories to object storage through presigned URLs and waits for freshly
//! provisioned execution endpoints to come up.
//!
//! # Features
//!
//! - **Multipart Uploads**: Fixed-size parts, bounded per-file concurrency,
//!   ordered finalize
//! - **Directory Upload**: Walks a model folder and maps each file to its
//!   platform-allocated target
//! - **Readiness Probe**: Resolves against authoritative nameservers and
//!   connects by IP with the hostname as Host/SNI, skipping DNS propagation
//!
//! # Example
//!
//! ```no_run
//! use sandbox_uploadr::config::Config;
//! use sandbox_uploadr::platform::DeploymentResponse;
//! use sandbox_uploadr::probe::ReadinessProber;
//! use sandbox_uploadr::upload::ModelFileUploader;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let response = DeploymentResponse::from_json(&std::fs::read_to_string("create.json")?)?;
//!
//!     let uploader = ModelFileUploader::from_config(&config)?;
//!     uploader
//!         .upload_directory(Path::new("./llama-3-8b"), &response.upload_targets)
//!         .await?;
//!
//!     let prober = ReadinessProber::from_config(&config.probe)?;
//!     prober.wait_until_ready("abc123.sandbox.example.com", "/").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dns;
pub mod error;
pub mod metrics;
pub mod platform;
pub mod probe;
pub mod upload;
pub mod walk;

// Re-export commonly used types
pub use config::Config;
pub use error::{ClientError, ErrorKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
