//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limits > 0, addresses parse)
//! - Detect conflicting or malformed site paths
//! - Check the validator command and reload target are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{has_route_pattern, ServiceConfig, CONFIG_PLACEHOLDER};
use crate::reload::applier::parse_signal;
use crate::security::allow_list::AllowList;

/// A single semantic problem in a [`ServiceConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("site path {0:?} must start with '/'")]
    RelativePath(String),

    #[error("site path {0:?} contains a route pattern character ('{{', '}}' or '*')")]
    PathPattern(String),

    #[error("site path {0:?} is declared more than once")]
    DuplicatePath(String),

    #[error("max_body_size for {0:?} must be greater than zero")]
    ZeroBodyLimit(String),

    #[error("allowed_ips for {site:?}: {reason}")]
    AllowList { site: String, reason: String },

    #[error("validator.program must not be empty")]
    EmptyValidatorProgram,

    #[error("validator.args must contain the {{config}} placeholder")]
    MissingPlaceholder,

    #[error("either target.pid or target.pid_file must be set")]
    NoTarget,

    #[error("target.signal: {0}")]
    Signal(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for policy in config.resolved_sites() {
        if !policy.path.starts_with('/') {
            errors.push(ValidationError::RelativePath(policy.path.clone()));
        }
        if has_route_pattern(&policy.path) {
            errors.push(ValidationError::PathPattern(policy.path.clone()));
        }
        if !seen.insert(policy.path.clone()) {
            errors.push(ValidationError::DuplicatePath(policy.path.clone()));
        }
        if policy.max_body_size == 0 {
            errors.push(ValidationError::ZeroBodyLimit(policy.path.clone()));
        }
        if let Err(e) = AllowList::parse(&policy.allowed_ips) {
            errors.push(ValidationError::AllowList {
                site: policy.path.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.validator.program.trim().is_empty() {
        errors.push(ValidationError::EmptyValidatorProgram);
    }
    if !config
        .validator
        .args
        .iter()
        .any(|arg| arg.contains(CONFIG_PLACEHOLDER))
    {
        errors.push(ValidationError::MissingPlaceholder);
    }

    if config.target.pid.is_none() && config.target.pid_file.is_none() {
        errors.push(ValidationError::NoTarget);
    }
    if let Err(e) = parse_signal(&config.target.signal) {
        errors.push(ValidationError::Signal(e.to_string()));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SiteConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServiceConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.validator.program = " ".into();
        config.validator.args = vec!["-t".into()];
        config.target.pid_file = None;
        config.target.signal = "SIGNOPE".into();
        config.sites = vec![
            SiteConfig {
                path: "reload".into(),
                max_body_size: Some(0),
                allowed_ips: Some("300.1.1.1".into()),
            },
            SiteConfig::default(),
            SiteConfig::default(),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::RelativePath("reload".into())));
        assert!(errors.contains(&ValidationError::ZeroBodyLimit("reload".into())));
        assert!(errors.contains(&ValidationError::DuplicatePath("/update-config".into())));
        assert!(errors.contains(&ValidationError::EmptyValidatorProgram));
        assert!(errors.contains(&ValidationError::MissingPlaceholder));
        assert!(errors.contains(&ValidationError::NoTarget));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::AllowList { site, .. } if site == "reload")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Signal(_))));
    }

    #[test]
    fn test_route_patterns_are_rejected() {
        let mut config = ServiceConfig::default();
        config.sites = ["/{a}", "/{b}", "/files/*rest", "/open{"]
            .into_iter()
            .map(|path| SiteConfig {
                path: path.into(),
                ..SiteConfig::default()
            })
            .collect();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::PathPattern("/{b}".into())));
        assert!(errors.contains(&ValidationError::PathPattern("/open{".into())));
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = ServiceConfig::default();
        config.observability.metrics_address = "bad".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MetricsAddress("bad".into())]);
    }
}
