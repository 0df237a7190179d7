//! Size-gated request body collection.
//!
//! # Responsibilities
//! - Reject a declared `Content-Length` above the site limit before reading
//! - Stream body frames, aborting as soon as the running total passes the limit
//! - Hand the complete submission to the staging store
//!
//! # Design Decisions
//! - Frames are awaited, never blocked on: collection is the pipeline's only
//!   suspension point on network input
//! - Partial data is dropped on overflow; nothing touches the filesystem here

use axum::body::{Body, Bytes};
use axum::http::{header::CONTENT_LENGTH, HeaderMap};
use futures_util::StreamExt;
use thiserror::Error;

/// Error type for body collection.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Declared or received size exceeds the site limit.
    #[error("payload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: u64, limit: usize },

    /// The request carried no configuration.
    #[error("request body is empty")]
    Empty,

    /// The transport failed mid-body.
    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),
}

/// One complete configuration submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    bytes: Bytes,
}

impl Submission {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Accumulates a request body up to a fixed limit.
#[derive(Debug, Clone, Copy)]
pub struct BodyCollector {
    limit: usize,
}

impl BodyCollector {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Check the declared length, if any, before any byte is read.
    ///
    /// Returns the declared length. A missing or unparsable header is not an
    /// error; the streaming check still applies.
    pub fn admit(&self, headers: &HeaderMap) -> Result<Option<u64>, CollectError> {
        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(size) = declared {
            if size > self.limit as u64 {
                return Err(CollectError::PayloadTooLarge {
                    size,
                    limit: self.limit,
                });
            }
        }

        Ok(declared)
    }

    /// Read the body to completion.
    pub async fn collect(&self, body: Body) -> Result<Submission, CollectError> {
        let mut stream = body.into_data_stream();
        let mut buf: Vec<u8> = Vec::new();

        while let Some(frame) = stream.next().await {
            let chunk = frame.map_err(CollectError::Read)?;
            let total = buf.len() + chunk.len();
            if total > self.limit {
                return Err(CollectError::PayloadTooLarge {
                    size: total as u64,
                    limit: self.limit,
                });
            }
            buf.extend_from_slice(&chunk);
        }

        if buf.is_empty() {
            return Err(CollectError::Empty);
        }

        Ok(Submission::new(buf))
    }
}
