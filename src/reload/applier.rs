//! Reload signalling.
//!
//! "Applied" means the signal was delivered. The target re-reads its
//! configuration on its own schedule and nothing here waits for it.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use thiserror::Error;

use crate::config::TargetConfig;

/// Error type for resolving the reload target.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("no reload target configured")]
    NoTarget,

    #[error("failed to read pid file {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pid file {path} does not hold a process id: {contents:?}")]
    PidFileContents { path: PathBuf, contents: String },

    #[error("unknown signal {0:?}")]
    UnknownSignal(String),
}

/// Identifier of the process that receives the reload signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessIdentity(i32);

impl ProcessIdentity {
    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the process identity comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetProcess {
    Pid(ProcessIdentity),
    /// Re-read on every attempt so a restarted server is still found.
    PidFile(PathBuf),
}

impl TargetProcess {
    pub fn from_config(config: &TargetConfig) -> Result<Self, ApplyError> {
        match (config.pid, &config.pid_file) {
            (Some(pid), _) => Ok(Self::Pid(ProcessIdentity::new(pid))),
            (None, Some(path)) => Ok(Self::PidFile(path.clone())),
            (None, None) => Err(ApplyError::NoTarget),
        }
    }

    pub fn resolve(&self) -> Result<ProcessIdentity, ApplyError> {
        match self {
            Self::Pid(identity) => Ok(*identity),
            Self::PidFile(path) => {
                let contents = fs::read_to_string(path).map_err(|source| ApplyError::PidFile {
                    path: path.clone(),
                    source,
                })?;
                contents
                    .trim()
                    .parse::<i32>()
                    .map(ProcessIdentity::new)
                    .map_err(|_| ApplyError::PidFileContents {
                        path: path.clone(),
                        contents: contents.trim().to_string(),
                    })
            }
        }
    }
}

/// Result of one reload signal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Failed { diagnostic: String },
}

/// Instructs a running process to reload.
pub trait Apply: Send + Sync {
    fn apply(&self, target: ProcessIdentity) -> ApplyOutcome;
}

/// Delivers an OS signal (SIGHUP by default) to the target.
#[derive(Debug, Clone, Copy)]
pub struct SignalApplier {
    signal: Signal,
}

impl SignalApplier {
    pub fn new(signal: Signal) -> Self {
        Self { signal }
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self, ApplyError> {
        parse_signal(&config.signal).map(Self::new)
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }
}

impl Default for SignalApplier {
    fn default() -> Self {
        Self::new(Signal::SIGHUP)
    }
}

impl Apply for SignalApplier {
    fn apply(&self, target: ProcessIdentity) -> ApplyOutcome {
        // kill(2) treats 0 and negative ids as process groups.
        if target.raw() <= 0 {
            return ApplyOutcome::Failed {
                diagnostic: format!("invalid process id {target}"),
            };
        }

        match kill(Pid::from_raw(target.raw()), self.signal) {
            Ok(()) => ApplyOutcome::Applied,
            Err(errno) => ApplyOutcome::Failed {
                diagnostic: format!("failed to send {} to {target}: {errno}", self.signal),
            },
        }
    }
}

/// Parse a signal name, with or without the `SIG` prefix.
pub fn parse_signal(name: &str) -> Result<Signal, ApplyError> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&full).map_err(|_| ApplyError::UnknownSignal(name.to_string()))
}
