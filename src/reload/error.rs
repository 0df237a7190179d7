//! Pipeline-level failure taxonomy and its HTTP mapping.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::reload::applier::{ApplyError, ProcessIdentity};
use crate::reload::collector::CollectError;
use crate::reload::staging::StageError;

/// Who owns the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request was unacceptable; the client decides whether to resubmit.
    Client,
    /// The service failed to carry out an acceptable request.
    Operational,
}

/// Terminal failure of one reload attempt.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("configuration rejected: {diagnostics}")]
    Rejected { diagnostics: String },

    #[error("validator unavailable: {reason}")]
    ValidatorUnavailable { reason: String },

    #[error("reload target unresolved: {0}")]
    Target(#[from] ApplyError),

    #[error("reload signal to {target} failed: {diagnostic}")]
    ApplyFailed {
        target: ProcessIdentity,
        diagnostic: String,
    },
}

impl ReloadError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MethodNotAllowed(_) | Self::Collect(_) | Self::Rejected { .. } => {
                ErrorClass::Client
            }
            Self::Stage(_)
            | Self::ValidatorUnavailable { .. }
            | Self::Target(_)
            | Self::ApplyFailed { .. } => ErrorClass::Operational,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Collect(CollectError::PayloadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Collect(_) | Self::Rejected { .. } => StatusCode::BAD_REQUEST,
            Self::Stage(_)
            | Self::ValidatorUnavailable { .. }
            | Self::Target(_)
            | Self::ApplyFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status only. Diagnostics stay in the service logs.
impl IntoResponse for ReloadError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        if let Self::MethodNotAllowed(_) = self {
            headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}
