//! External configuration checking.
//!
//! # Responsibilities
//! - Run the configured checker (e.g. `nginx -t -c <file>`) against a staged file
//! - Map exit status zero to accepted, nonzero to rejected
//! - Distinguish "checker could not run" from "configuration is invalid"
//!
//! # Design Decisions
//! - The checker is awaited as a child process, so a slow checker does not
//!   occupy a runtime worker
//! - No timeout unless one is configured; a configured timeout kills the child

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::schema::{ValidatorConfig, CONFIG_PLACEHOLDER};
use crate::observability::metrics;

/// Upper bound on diagnostic text carried into logs.
const MAX_DIAGNOSTIC_LEN: usize = 4096;

/// Result of checking one staged configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The checker accepted the configuration.
    Accepted,
    /// The checker ran and rejected the configuration.
    Rejected { diagnostics: String },
    /// The checker could not be run to completion.
    Unavailable { reason: String },
}

impl ValidationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Checks a configuration file on disk.
#[async_trait]
pub trait Validate: Send + Sync {
    async fn validate(&self, path: &Path) -> ValidationOutcome;
}

/// Validator backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandValidator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        let validator = Self::new(config.program.clone(), config.args.clone());
        match config.timeout_secs {
            0 => validator,
            secs => validator.with_timeout(Duration::from_secs(secs)),
        }
    }

    /// Arguments with the placeholder replaced by `path`.
    pub fn args_for(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(CONFIG_PLACEHOLDER, &path))
            .collect()
    }

    async fn run(&self, path: &Path) -> ValidationOutcome {
        let child = Command::new(&self.program)
            .args(self.args_for(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                return ValidationOutcome::Unavailable {
                    reason: format!("failed to spawn '{}': {e}", self.program),
                }
            }
        };

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    return ValidationOutcome::Unavailable {
                        reason: format!("'{}' timed out after {limit:?}", self.program),
                    }
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                return ValidationOutcome::Unavailable {
                    reason: format!("failed to wait for '{}': {e}", self.program),
                }
            }
        };

        if output.status.success() {
            return ValidationOutcome::Accepted;
        }

        match output.status.code() {
            Some(code) => {
                let text = if output.stderr.is_empty() {
                    &output.stdout
                } else {
                    &output.stderr
                };
                ValidationOutcome::Rejected {
                    diagnostics: format!("exit status {code}: {}", diagnostic_text(text)),
                }
            }
            None => ValidationOutcome::Unavailable {
                reason: format!("'{}' terminated by signal", self.program),
            },
        }
    }
}

#[async_trait]
impl Validate for CommandValidator {
    async fn validate(&self, path: &Path) -> ValidationOutcome {
        let start = Instant::now();
        let outcome = self.run(path).await;
        metrics::record_validation(outcome.label(), start);
        outcome
    }
}

fn diagnostic_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.len() <= MAX_DIAGNOSTIC_LEN {
        return text.to_string();
    }
    let mut end = MAX_DIAGNOSTIC_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
