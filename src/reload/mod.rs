//! Configuration reload pipeline.
//!
//! # Data Flow
//! ```text
//! POST body
//!     → collector.rs (declared + streamed size gate)
//!     → staging.rs (unique owner-only temp file, length verified)
//!     → validator.rs (external checker, exit status decides)
//!     → applier.rs (reload signal to the target process)
//!     → orchestrator.rs (sequencing, status mapping, cleanup)
//! ```
//!
//! # Design Decisions
//! - Validator and applier are traits so the orchestrator can run against doubles
//! - The signal target is configuration, not process-wide state
//! - No retries and no cross-attempt serialisation; each request runs once, alone

pub mod applier;
pub mod collector;
pub mod error;
pub mod orchestrator;
pub mod staging;
pub mod validator;

pub use applier::{Apply, ApplyError, ApplyOutcome, ProcessIdentity, SignalApplier, TargetProcess};
pub use collector::{BodyCollector, CollectError, Submission};
pub use error::{ErrorClass, ReloadError};
pub use orchestrator::{ReloadAccepted, ReloadOrchestrator, ReloadState};
pub use staging::{StageError, StagedArtifact, StagingStore};
pub use validator::{CommandValidator, Validate, ValidationOutcome};
