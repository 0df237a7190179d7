//! Hot configuration reload over HTTP.
//!
//! An operator POSTs a candidate server configuration; it is staged to a
//! private temp file, checked by an external validator, and on success the
//! running server is signalled to reload.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod reload;
pub mod security;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use reload::ReloadOrchestrator;
