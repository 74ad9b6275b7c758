//! Platform response decoding
//!
//! The platform's create/build responses have not kept a single shape: the
//! site id has appeared as `siteId`, `data.siteId` and `id`, and the upload
//! target map as `uploadUrls` or `data.uploadUrls`. Responses are decoded from
//! an untyped JSON value, looking in each known location in turn.

use crate::error::{ClientError, Result};
use crate::upload::UploadTarget;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Upload target entry as it appears on the wire
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawUploadTarget {
    Multipart {
        urls: Vec<String>,
        #[serde(rename = "uploadId")]
        upload_id: String,
        #[serde(rename = "partCount", default)]
        part_count: Option<u32>,
        #[serde(rename = "s3FilePath", default)]
        s3_file_path: Option<String>,
    },
    Single {
        url: String,
        #[serde(rename = "s3FilePath", default)]
        s3_file_path: Option<String>,
    },
}

impl TryFrom<RawUploadTarget> for UploadTarget {
    type Error = ClientError;

    fn try_from(raw: RawUploadTarget) -> Result<Self> {
        let target = match raw {
            RawUploadTarget::Multipart {
                urls,
                upload_id,
                part_count,
                s3_file_path,
            } => UploadTarget {
                destination_urls: urls,
                upload_session_id: Some(upload_id),
                part_count,
                remote_object_path: s3_file_path,
            },
            RawUploadTarget::Single { url, s3_file_path } => UploadTarget {
                destination_urls: vec![url],
                upload_session_id: None,
                part_count: None,
                remote_object_path: s3_file_path,
            },
        };

        target.mode()?;
        Ok(target)
    }
}

/// Decoded create/build response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentResponse {
    pub site_id: Option<String>,
    pub upload_targets: HashMap<String, UploadTarget>,
}

impl DeploymentResponse {
    /// Decode from a JSON value of any known shape
    pub fn from_value(value: &Value) -> Result<Self> {
        let site_id = lookup(value, &[&["siteId"], &["data", "siteId"], &["id"]])
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let upload_targets = match lookup(value, &[&["uploadUrls"], &["data", "uploadUrls"]]) {
            Some(map) => decode_targets(map)?,
            None => HashMap::new(),
        };

        Ok(Self {
            site_id,
            upload_targets,
        })
    }

    /// Decode from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ClientError::Validation(format!("invalid response JSON: {e}")))?;
        Self::from_value(&value)
    }
}

fn lookup<'v>(value: &'v Value, paths: &[&[&str]]) -> Option<&'v Value> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(value, |current, key| current.get(key))
            .filter(|found| !found.is_null())
    })
}

fn decode_targets(map: &Value) -> Result<HashMap<String, UploadTarget>> {
    let entries = map.as_object().ok_or_else(|| {
        ClientError::Validation("upload target map is not a JSON object".into())
    })?;

    entries
        .iter()
        .map(|(path, entry)| {
            let raw: RawUploadTarget = serde_json::from_value(entry.clone()).map_err(|e| {
                ClientError::Validation(format!("malformed upload target for {path}: {e}"))
            })?;
            Ok((path.clone(), UploadTarget::try_from(raw)?))
        })
        .collect()
}
