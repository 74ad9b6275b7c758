//! HTTP transport for presigned uploads
//!
//! [`ObjectTransport`] is the seam between the uploaders and the network:
//! raw PUTs to presigned URLs and the platform's multipart finalize call.

use super::{PartResult, OCTET_STREAM};
use crate::config::Config;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG};
use serde::Serialize;

/// Outcome of a successful PUT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    pub status: u16,
    /// Raw `ETag` header, quotes included, when the server sent one
    pub etag: Option<String>,
}

/// Body of the multipart finalize call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartRequest {
    pub bucket_name: String,
    pub upload_id: String,
    /// Ascending by part number
    pub parts: Vec<PartResult>,
    #[serde(rename = "s3FilePath")]
    pub s3_file_path: String,
    pub file_name: String,
}

/// Network operations needed by the uploaders
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    /// PUT `body` to a presigned URL
    async fn put(&self, url: &str, body: Bytes) -> Result<PutResponse>;

    /// Ask the platform to assemble uploaded parts
    async fn complete_multipart(&self, request: &CompleteMultipartRequest) -> Result<()>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    finalize_url: String,
    api_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport posting finalize calls to `finalize_url`
    pub fn new(finalize_url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            finalize_url: finalize_url.into(),
            api_token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.platform.endpoint(&config.upload.finalize_path),
            config.platform.api_token.clone(),
        )
    }

    pub fn finalize_url(&self) -> &str {
        &self.finalize_url
    }
}

/// Drop the query string so presigned signatures never reach logs or errors
pub fn redact_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[async_trait]
impl ObjectTransport for HttpTransport {
    #[tracing::instrument(
        name = "transport.put",
        skip(self, url, body),
        fields(
            http.url = %redact_url(url),
            http.method = "PUT",
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn put(&self, url: &str, body: Bytes) -> Result<PutResponse> {
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                url: redact_url(url).to_string(),
                body,
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(PutResponse {
            status: status.as_u16(),
            etag,
        })
    }

    #[tracing::instrument(
        name = "transport.complete_multipart",
        skip(self, request),
        fields(
            upload_id = %request.upload_id,
            parts_count = request.parts.len(),
            http.method = "POST",
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn complete_multipart(&self, request: &CompleteMultipartRequest) -> Result<()> {
        let mut builder = self.client.post(&self.finalize_url).json(request);
        if let Some(ref token) = self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %body,
                "Multipart finalize rejected"
            );
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                url: self.finalize_url.clone(),
                body,
            });
        }

        Ok(())
    }
}
