//! Upload module
//!
//! Pushes local model files to object storage through presigned URLs. A file
//! whose target carries one URL is sent with a single PUT; a file with several
//! URLs is split into parts, uploaded in bounded batches and finalized by the
//! platform.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};

pub mod chunked;
pub mod model;
pub mod transport;

pub use chunked::{part_ranges, ChunkedUpload, ChunkedUploader};
pub use model::{ModelFileUploader, UploadSummary};
pub use transport::{CompleteMultipartRequest, HttpTransport, ObjectTransport, PutResponse};

/// Content type sent with every object and part body
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Default number of parts in flight per file
pub const DEFAULT_PART_CONCURRENCY: usize = 5;

/// Where one file goes, as allocated by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// Presigned URLs, one per part (a single entry for single-shot uploads)
    pub destination_urls: Vec<String>,
    #[serde(default)]
    pub upload_session_id: Option<String>,
    #[serde(default)]
    pub part_count: Option<u32>,
    #[serde(default)]
    pub remote_object_path: Option<String>,
}

/// How a target expects to receive its file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode<'a> {
    Single { url: &'a str },
    Multipart { urls: &'a [String], upload_id: &'a str },
}

impl UploadTarget {
    /// Target for a single-shot PUT
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            destination_urls: vec![url.into()],
            upload_session_id: None,
            part_count: None,
            remote_object_path: None,
        }
    }

    /// Target for a multipart upload
    pub fn multipart(urls: Vec<String>, upload_id: impl Into<String>) -> Self {
        Self {
            part_count: Some(urls.len() as u32),
            destination_urls: urls,
            upload_session_id: Some(upload_id.into()),
            remote_object_path: None,
        }
    }

    pub fn with_remote_object_path(mut self, path: impl Into<String>) -> Self {
        self.remote_object_path = Some(path.into());
        self
    }

    /// Resolve the upload mode, checking the URL/session invariant
    pub fn mode(&self) -> Result<UploadMode<'_>> {
        match self.destination_urls.as_slice() {
            [] => Err(ClientError::Validation(
                "upload target has no destination URLs".into(),
            )),
            [url] => Ok(UploadMode::Single { url: url.as_str() }),
            urls => match self.upload_session_id.as_deref() {
                Some(upload_id) if !upload_id.is_empty() => {
                    Ok(UploadMode::Multipart { urls, upload_id })
                }
                _ => Err(ClientError::Validation(format!(
                    "multipart target with {} URLs has no upload session id",
                    urls.len()
                ))),
            },
        }
    }

    /// Parts expected by the platform
    pub fn expected_parts(&self) -> u32 {
        self.part_count
            .unwrap_or(self.destination_urls.len() as u32)
    }
}

/// Acknowledgement for one uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Sort acknowledgements by part number and check every index in
/// `1..=part_count` appears exactly once
pub fn assemble_parts(mut parts: Vec<PartResult>, part_count: u32) -> Result<Vec<PartResult>> {
    parts.sort_by_key(|part| part.part_number);

    if parts.len() != part_count as usize {
        return Err(ClientError::Validation(format!(
            "expected {} part acknowledgements, got {}",
            part_count,
            parts.len()
        )));
    }

    for (index, part) in parts.iter().enumerate() {
        let expected = index as u32 + 1;
        if part.part_number != expected {
            return Err(ClientError::Validation(format!(
                "part {} missing or duplicated (found part {})",
                expected, part.part_number
            )));
        }
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn part(n: u32) -> PartResult {
        PartResult {
            part_number: n,
            etag: format!("etag-{n}"),
        }
    }

    #[test]
    fn test_mode_single() {
        let target = UploadTarget::single("https://bucket/obj?sig=1");
        assert_eq!(
            target.mode().unwrap(),
            UploadMode::Single {
                url: "https://bucket/obj?sig=1"
            }
        );
    }

    #[test]
    fn test_mode_multipart_requires_session() {
        let mut target = UploadTarget::multipart(vec!["u1".into(), "u2".into()], "up-1");
        assert!(matches!(
            target.mode().unwrap(),
            UploadMode::Multipart { upload_id: "up-1", .. }
        ));

        target.upload_session_id = None;
        assert_eq!(target.mode().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_mode_empty_urls() {
        let target = UploadTarget {
            destination_urls: vec![],
            upload_session_id: None,
            part_count: None,
            remote_object_path: None,
        };
        assert!(target.mode().is_err());
    }

    #[test]
    fn test_assemble_sorts() {
        let parts = assemble_parts(vec![part(3), part(1), part(2)], 3).unwrap();
        let numbers: Vec<_> = parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_assemble_rejects_duplicate_and_missing() {
        assert!(assemble_parts(vec![part(1), part(1), part(3)], 3).is_err());
        assert!(assemble_parts(vec![part(1), part(3)], 3).is_err());
        assert!(assemble_parts(vec![part(1), part(2), part(3)], 2).is_err());
    }

    #[test]
    fn test_part_result_wire_names() {
        let json = serde_json::to_value(part(7)).unwrap();
        assert_eq!(json["PartNumber"], 7);
        assert_eq!(json["ETag"], "etag-7");
    }
}
