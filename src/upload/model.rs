//! Model directory upload
//!
//! Uploads every described file to the target the platform allocated for its
//! relative path. Files without a target are skipped. Files are uploaded
//! concurrently; `max_concurrent_files` caps how many run at once and is
//! unlimited by default. A failed file fails the whole call once every other
//! file has settled; files that already landed are left in place.

use super::chunked::{ChunkedUpload, ChunkedUploader};
use super::transport::{HttpTransport, ObjectTransport};
use super::{UploadMode, UploadTarget};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::metrics;
use crate::walk::{walk_directory, FileDescriptor};
use bytes::Bytes;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Totals for one model upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Uploads a set of model files against platform-allocated targets
pub struct ModelFileUploader<T> {
    transport: Arc<T>,
    chunked: ChunkedUploader<T>,
    part_size: usize,
    max_concurrent_files: Option<usize>,
}

impl ModelFileUploader<HttpTransport> {
    /// Build the production uploader from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::from_config(config)?);
        Ok(Self::new(transport, &config.upload.bucket_name, config.upload.part_size)
            .with_part_concurrency(config.upload.part_concurrency)
            .with_max_concurrent_files(config.upload.max_concurrent_files))
    }
}

impl<T: ObjectTransport> ModelFileUploader<T> {
    pub fn new(transport: Arc<T>, bucket_name: &str, part_size: usize) -> Self {
        Self {
            chunked: ChunkedUploader::new(Arc::clone(&transport), bucket_name),
            transport,
            part_size,
            max_concurrent_files: None,
        }
    }

    pub fn with_part_concurrency(mut self, fan_out: usize) -> Self {
        self.chunked = self.chunked.with_fan_out(fan_out);
        self
    }

    /// Cap the number of files uploaded at once; `None` means unlimited
    pub fn with_max_concurrent_files(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_files = limit.map(|limit| std::cmp::max(limit, 1));
        self
    }

    /// Walk `root` and upload everything that has a target
    pub async fn upload_directory(
        &self,
        root: &Path,
        targets: &HashMap<String, UploadTarget>,
    ) -> Result<UploadSummary> {
        let root = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || walk_directory(&root))
            .await
            .map_err(|e| ClientError::Io(std::io::Error::other(e)))??;

        self.upload_files(&files, targets).await
    }

    /// Upload `files` to their targets
    #[tracing::instrument(
        name = "upload.model_files",
        skip(self, files, targets),
        fields(files = files.len(), targets = targets.len()),
        err
    )]
    pub async fn upload_files(
        &self,
        files: &[FileDescriptor],
        targets: &HashMap<String, UploadTarget>,
    ) -> Result<UploadSummary> {
        let mut summary = UploadSummary::default();
        let mut dispatched = Vec::new();

        for file in files {
            match targets.get(&file.relative_path) {
                Some(target) => dispatched.push((file, target)),
                None => {
                    tracing::warn!(
                        path = %file.relative_path,
                        "No upload target allocated, skipping file"
                    );
                    metrics::record_file_skipped();
                    summary.skipped += 1;
                }
            }
        }

        let uploads = dispatched
            .into_iter()
            .map(|(file, target)| self.upload_file(file, target));

        let results: Vec<Result<u64>> = match self.max_concurrent_files {
            Some(limit) => stream::iter(uploads).buffer_unordered(limit).collect().await,
            None => join_all(uploads).await,
        };

        let mut first_error = None;
        for result in results {
            match result {
                Ok(bytes) => {
                    summary.uploaded += 1;
                    summary.bytes += bytes;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            bytes = summary.bytes,
            "Model upload completed"
        );

        Ok(summary)
    }

    #[tracing::instrument(
        name = "upload.file",
        skip(self, file, target),
        fields(file.path = %file.relative_path, file.size = file.size),
        err
    )]
    async fn upload_file(&self, file: &FileDescriptor, target: &UploadTarget) -> Result<u64> {
        let mode = target.mode()?;
        let started = Instant::now();
        let content = Bytes::from(tokio::fs::read(&file.local_path).await?);
        let bytes = content.len() as u64;

        let (label, result) = match mode {
            UploadMode::Single { url } => {
                ("single", self.transport.put(url, content).await.map(|_| ()))
            }
            UploadMode::Multipart { urls, upload_id } => {
                let job = ChunkedUpload {
                    content,
                    urls,
                    part_size: self.part_size,
                    part_count: target.expected_parts(),
                    upload_id,
                    remote_object_path: target
                        .remote_object_path
                        .as_deref()
                        .unwrap_or(&file.relative_path),
                    file_name: &file.name,
                };
                ("multipart", self.chunked.upload(job).await.map(|_| ()))
            }
        };

        let duration = started.elapsed();
        metrics::record_file_upload(label, result.is_ok(), bytes, duration.as_secs_f64());

        match result {
            Ok(()) => {
                tracing::info!(
                    path = %file.relative_path,
                    mode = label,
                    bytes = bytes,
                    duration_ms = duration.as_millis(),
                    "File uploaded"
                );
                Ok(bytes)
            }
            Err(e) => {
                tracing::error!(
                    path = %file.relative_path,
                    mode = label,
                    error = %e,
                    "File upload failed"
                );
                Err(e)
            }
        }
    }
}
