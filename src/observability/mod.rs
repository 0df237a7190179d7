//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Reload pipeline produces:
//!     → logging.rs (structured log events, one span per attempt)
//!     → metrics.rs (attempt counters, durations, in-flight gauge)
//!
//! Consumers:
//!     → stdout log collection
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Attempt and request IDs flow through every log line of an attempt
//! - Operational detail (paths, OS errors) goes to logs, never to HTTP clients

pub mod logging;
pub mod metrics;
