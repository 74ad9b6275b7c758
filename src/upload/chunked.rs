//! Chunked multipart upload
//!
//! Splits an in-memory file into fixed-size parts and PUTs each part to its
//! own presigned URL. Parts are sent in batches of `fan_out`: every part in a
//! batch is in flight at once, and the next batch starts only after the whole
//! batch has resolved. Any failed part, including a response without an ETag,
//! aborts the upload before the finalize call.

use super::transport::{redact_url, CompleteMultipartRequest, ObjectTransport};
use super::{assemble_parts, PartResult, DEFAULT_PART_CONCURRENCY};
use crate::error::{ClientError, Result};
use crate::metrics;
use bytes::Bytes;
use futures::future::try_join_all;
use std::ops::Range;
use std::sync::Arc;

/// Byte ranges of `len` bytes cut into `part_size` pieces; the last may be short
pub fn part_ranges(len: usize, part_size: usize) -> Result<Vec<Range<usize>>> {
    if part_size == 0 {
        return Err(ClientError::Validation("part size must be non-zero".into()));
    }

    Ok((0..len)
        .step_by(part_size)
        .map(|start| start..std::cmp::min(start + part_size, len))
        .collect())
}

/// One multipart upload job
#[derive(Debug, Clone)]
pub struct ChunkedUpload<'a> {
    pub content: Bytes,
    /// Presigned URL per part, in part order
    pub urls: &'a [String],
    pub part_size: usize,
    pub part_count: u32,
    pub upload_id: &'a str,
    pub remote_object_path: &'a str,
    pub file_name: &'a str,
}

/// Multipart uploader with bounded per-file concurrency
pub struct ChunkedUploader<T> {
    transport: Arc<T>,
    fan_out: usize,
    bucket_name: String,
}

impl<T: ObjectTransport> ChunkedUploader<T> {
    pub fn new(transport: Arc<T>, bucket_name: impl Into<String>) -> Self {
        Self {
            transport,
            fan_out: DEFAULT_PART_CONCURRENCY,
            bucket_name: bucket_name.into(),
        }
    }

    /// Set the number of parts in flight per batch (minimum 1)
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = std::cmp::max(fan_out, 1);
        self
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Upload all parts and finalize; returns the parts as submitted
    #[tracing::instrument(
        name = "upload.multipart",
        skip(self, job),
        fields(
            upload_id = %job.upload_id,
            file.name = %job.file_name,
            upload.bytes = job.content.len(),
            parts_count = job.part_count,
            fan_out = self.fan_out
        ),
        err
    )]
    pub async fn upload(&self, job: ChunkedUpload<'_>) -> Result<Vec<PartResult>> {
        let ranges = part_ranges(job.content.len(), job.part_size)?;

        if ranges.is_empty() {
            return Err(ClientError::Validation(format!(
                "{} is empty and cannot be uploaded in parts",
                job.file_name
            )));
        }

        if ranges.len() != job.part_count as usize {
            return Err(ClientError::Validation(format!(
                "{} bytes in {}-byte parts gives {} parts, platform expects {}",
                job.content.len(),
                job.part_size,
                ranges.len(),
                job.part_count
            )));
        }

        if job.urls.len() < ranges.len() {
            return Err(ClientError::Validation(format!(
                "{} parts but only {} destination URLs",
                ranges.len(),
                job.urls.len()
            )));
        }

        let pending: Vec<(u32, &str, Bytes)> = ranges
            .into_iter()
            .zip(job.urls)
            .enumerate()
            .map(|(index, (range, url))| (index as u32 + 1, url.as_str(), job.content.slice(range)))
            .collect();

        let mut completed = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.fan_out) {
            let uploads = batch
                .iter()
                .map(|(part_number, url, body)| self.upload_part(*part_number, url, body.clone()));
            completed.extend(try_join_all(uploads).await?);
        }

        let parts = assemble_parts(completed, job.part_count)?;

        let request = CompleteMultipartRequest {
            bucket_name: self.bucket_name.clone(),
            upload_id: job.upload_id.to_string(),
            parts,
            s3_file_path: job.remote_object_path.to_string(),
            file_name: job.file_name.to_string(),
        };
        self.transport.complete_multipart(&request).await?;

        tracing::info!(
            upload_id = %job.upload_id,
            parts = request.parts.len(),
            "Multipart upload finalized"
        );

        Ok(request.parts)
    }

    async fn upload_part(&self, part_number: u32, url: &str, body: Bytes) -> Result<PartResult> {
        let size = body.len();
        let response = self.transport.put(url, body).await?;

        let etag = response
            .etag
            .map(|etag| etag.trim_matches('"').to_string())
            .filter(|etag| !etag.is_empty())
            .ok_or(ClientError::MissingEtag { part_number })?;

        metrics::record_part_uploaded();
        tracing::debug!(
            part_number = part_number,
            size = size,
            url = %redact_url(url),
            "Uploaded part"
        );

        Ok(PartResult { part_number, etag })
    }
}
