//! Shared test doubles for upload tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use sandbox_uploadr::error::{ClientError, Result};
use sandbox_uploadr::upload::{CompleteMultipartRequest, ObjectTransport, PutResponse};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Start or end of one PUT, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

/// In-memory transport that records every call and tracks concurrency
#[derive(Default)]
pub struct RecordingTransport {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    pub events: Mutex<Vec<Event>>,
    pub bodies: Mutex<HashMap<String, Bytes>>,
    pub finalized: Mutex<Vec<CompleteMultipartRequest>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    missing_etag: HashSet<String>,
    failing: HashSet<String>,
    finalize_fails: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn without_etag(mut self, url: &str) -> Self {
        self.missing_etag.insert(url.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn with_failing_finalize(mut self) -> Self {
        self.finalize_fails = true;
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    pub fn finalize_count(&self) -> usize {
        self.finalized.lock().unwrap().len()
    }

    pub fn completion_order(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::End(url) => Some(url.clone()),
                Event::Start(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ObjectTransport for RecordingTransport {
    async fn put(&self, url: &str, body: Bytes) -> Result<PutResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Start(url.to_string()));

        let delay = self.delays.get(url).copied().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::End(url.to_string()));

        if self.failing.contains(url) {
            return Err(ClientError::HttpStatus {
                status: 500,
                url: url.to_string(),
                body: "internal error".into(),
            });
        }

        self.bodies.lock().unwrap().insert(url.to_string(), body);

        let etag = if self.missing_etag.contains(url) {
            None
        } else {
            Some(format!("\"etag-{}\"", url.rsplit('/').next().unwrap_or(url)))
        };

        Ok(PutResponse { status: 200, etag })
    }

    async fn complete_multipart(&self, request: &CompleteMultipartRequest) -> Result<()> {
        if self.finalize_fails {
            return Err(ClientError::HttpStatus {
                status: 400,
                url: "finalize".into(),
                body: "{\"error\":\"InvalidPart\"}".into(),
            });
        }
        self.finalized.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Presigned-looking URL for part `n`
pub fn part_url(n: usize) -> String {
    format!("https://store.test/upload/part/{n}")
}

pub fn part_urls(count: usize) -> Vec<String> {
    (1..=count).map(part_url).collect()
}

/// Deterministic, non-repeating test content
pub fn content(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}
