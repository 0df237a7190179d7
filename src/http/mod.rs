//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, outer timeout)
//!     → [allow-list check for restricted sites]
//!     → reload_handler (one per site, carries that site's ReloadPolicy)
//!     → reload::ReloadOrchestrator
//!     → empty-bodied status response
//! ```

pub mod server;

pub use server::{HttpServer, ServerError, SiteState};
