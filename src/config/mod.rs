//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → resolved_sites(): [reload] defaults merged into each [[sites]] entry
//!     → ReloadPolicy per endpoint, shared read-only with its handler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the service itself is restarted to change it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ReloadDefaults;
pub use schema::ReloadPolicy;
pub use schema::ServiceConfig;
pub use schema::SiteConfig;
pub use schema::StagingConfig;
pub use schema::TargetConfig;
pub use schema::ValidatorConfig;
