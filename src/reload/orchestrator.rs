//! Reload attempt sequencing.
//!
//! ```text
//! Admitted ──(not POST)──────────────────────────────▶ Responded(405)
//!    │      ──(declared size > limit)─────────────────▶ Responded(413)
//!    ▼
//! CollectingBody ──(overflow / empty / read error)────▶ Responded(413/400)
//!    ▼
//! Staged ──(I/O error)────────────────────────────────▶ Responded(500)
//!    ▼
//! Validating ──(rejected)─────────────────────────────▶ Responded(400)
//!    │        ──(checker unavailable)─────────────────▶ Responded(500)
//!    ▼
//! Applying ──(target unresolved / signal failed)──────▶ Responded(500)
//!    └──(signal delivered)────────────────────────────▶ Responded(200)
//! ```
//!
//! Every path that created a staged artifact releases it exactly once before
//! the response is produced. If the attempt future is dropped mid-flight the
//! artifact's destructor removes the file instead.

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ReloadPolicy;
use crate::reload::applier::{Apply, ApplyOutcome, ProcessIdentity, TargetProcess};
use crate::reload::collector::BodyCollector;
use crate::reload::error::{ErrorClass, ReloadError};
use crate::reload::staging::{StagedArtifact, StagingStore};
use crate::reload::validator::{Validate, ValidationOutcome};

/// Pipeline position of one attempt, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Admitted,
    CollectingBody,
    Staged,
    Validating,
    Applying,
    Responded,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admitted => "admitted",
            Self::CollectingBody => "collecting_body",
            Self::Staged => "staged",
            Self::Validating => "validating",
            Self::Applying => "applying",
            Self::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Successful attempt: the reload signal was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadAccepted {
    pub bytes: u64,
    pub target: ProcessIdentity,
}

impl IntoResponse for ReloadAccepted {
    fn into_response(self) -> Response {
        let mut response = StatusCode::OK.into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        response
    }
}

/// Runs reload attempts. Holds no per-attempt state, so one instance serves
/// any number of concurrent requests.
pub struct ReloadOrchestrator {
    staging: StagingStore,
    validator: Arc<dyn Validate>,
    applier: Arc<dyn Apply>,
    target: TargetProcess,
}

impl ReloadOrchestrator {
    pub fn new(
        staging: StagingStore,
        validator: Arc<dyn Validate>,
        applier: Arc<dyn Apply>,
        target: TargetProcess,
    ) -> Self {
        Self {
            staging,
            validator,
            applier,
            target,
        }
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    /// Drive one request through the pipeline to its terminal outcome.
    pub async fn handle(
        &self,
        policy: &ReloadPolicy,
        request: Request<Body>,
    ) -> Result<ReloadAccepted, ReloadError> {
        let attempt_id = Uuid::new_v4();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let span = tracing::info_span!(
            "reload",
            %attempt_id,
            request_id = %request_id,
            site = %policy.path
        );

        async move {
            let result = self.run(policy, request).await;
            transition(ReloadState::Responded);
            log_outcome(&result);
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        policy: &ReloadPolicy,
        request: Request<Body>,
    ) -> Result<ReloadAccepted, ReloadError> {
        transition(ReloadState::Admitted);
        if request.method() != Method::POST {
            return Err(ReloadError::MethodNotAllowed(request.method().clone()));
        }

        let collector = BodyCollector::new(policy.max_body_size);
        let declared = collector.admit(request.headers())?;

        transition(ReloadState::CollectingBody);
        tracing::debug!(declared = ?declared, limit = collector.limit(), "Collecting body");
        let submission = collector.collect(request.into_body()).await?;

        let mut artifact = self.staging.stage(submission.into_bytes()).await?;
        transition(ReloadState::Staged);

        let result = self.validate_and_apply(&artifact).await;

        if let Err(e) = artifact.release() {
            tracing::warn!(error = %e, "Failed to remove staged configuration");
        }
        result
    }

    async fn validate_and_apply(
        &self,
        artifact: &StagedArtifact,
    ) -> Result<ReloadAccepted, ReloadError> {
        transition(ReloadState::Validating);
        match self.validator.validate(artifact.path()).await {
            ValidationOutcome::Accepted => {}
            ValidationOutcome::Rejected { diagnostics } => {
                return Err(ReloadError::Rejected { diagnostics })
            }
            ValidationOutcome::Unavailable { reason } => {
                return Err(ReloadError::ValidatorUnavailable { reason })
            }
        }

        transition(ReloadState::Applying);
        let target = self.target.resolve()?;
        match self.applier.apply(target) {
            ApplyOutcome::Applied => Ok(ReloadAccepted {
                bytes: artifact.len(),
                target,
            }),
            ApplyOutcome::Failed { diagnostic } => {
                Err(ReloadError::ApplyFailed { target, diagnostic })
            }
        }
    }
}

fn transition(state: ReloadState) {
    tracing::debug!(state = %state, "Reload state");
}

fn log_outcome(result: &Result<ReloadAccepted, ReloadError>) {
    match result {
        Ok(accepted) => tracing::info!(
            bytes = accepted.bytes,
            target = %accepted.target,
            "Configuration validated and reload signalled"
        ),
        Err(e) => match e.class() {
            ErrorClass::Client => tracing::warn!(
                status = e.status().as_u16(),
                error = %e,
                "Reload request refused"
            ),
            ErrorClass::Operational => tracing::error!(
                status = e.status().as_u16(),
                error = %e,
                "Reload attempt failed"
            ),
        },
    }
}
