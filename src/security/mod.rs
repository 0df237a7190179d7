//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request on a reload site:
//!     → allow_list.rs (peer address vs. site allow-list, 403 on miss)
//!     → Pass to reload orchestrator
//! ```
//!
//! # Design Decisions
//! - Filtering only: credentials and identity are left to a fronting layer
//! - Fail closed: a configured list rejects any peer it does not name
//! - Allow-lists are parsed once at startup, never per request

pub mod allow_list;

pub use allow_list::{allow_list_middleware, AllowList, AllowListError};
