//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the reload
//! service. All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Built-in ceiling for a submitted configuration (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576;

/// Path served when no `[[sites]]` are configured.
pub const DEFAULT_SITE_PATH: &str = "/update-config";

/// Placeholder in validator arguments replaced by the staged file path.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

/// Site paths are matched literally; these would be read as route captures.
const ROUTE_PATTERN_CHARS: &[char] = &['{', '}', '*'];

pub fn has_route_pattern(path: &str) -> bool {
    path.contains(ROUTE_PATTERN_CHARS)
}

/// Root configuration for the reload service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, outer timeout).
    pub listener: ListenerConfig,

    /// Defaults inherited by every reload site.
    pub reload: ReloadDefaults,

    /// Reload endpoints. An empty list means a single default site.
    pub sites: Vec<SiteConfig>,

    /// Where candidate configurations are staged.
    pub staging: StagingConfig,

    /// External checker invoked against each staged file.
    pub validator: ValidatorConfig,

    /// Process that receives the reload signal.
    pub target: TargetConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// Resolve every site against the inherited defaults.
    ///
    /// When no sites are configured a single site at [`DEFAULT_SITE_PATH`]
    /// is produced from the defaults alone.
    pub fn resolved_sites(&self) -> Vec<ReloadPolicy> {
        if self.sites.is_empty() {
            return vec![SiteConfig::default().resolve(&self.reload)];
        }
        self.sites.iter().map(|site| site.resolve(&self.reload)).collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Upper bound on a whole request in seconds. Zero disables it.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Parent-scope values a site inherits when it does not set its own.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadDefaults {
    /// Maximum submission size in bytes.
    pub max_body_size: usize,

    /// Address allow-list. Empty allows every peer.
    pub allowed_ips: String,
}

impl Default for ReloadDefaults {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allowed_ips: String::new(),
        }
    }
}

/// One reload endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Request path the endpoint is mounted on.
    #[serde(default = "default_site_path")]
    pub path: String,

    /// Overrides [`ReloadDefaults::max_body_size`].
    #[serde(default)]
    pub max_body_size: Option<usize>,

    /// Overrides [`ReloadDefaults::allowed_ips`].
    #[serde(default)]
    pub allowed_ips: Option<String>,
}

fn default_site_path() -> String {
    DEFAULT_SITE_PATH.to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            path: default_site_path(),
            max_body_size: None,
            allowed_ips: None,
        }
    }
}

impl SiteConfig {
    /// Merge this site with its parent scope. Set values win, unset values inherit.
    pub fn resolve(&self, parent: &ReloadDefaults) -> ReloadPolicy {
        ReloadPolicy {
            path: self.path.clone(),
            max_body_size: self.max_body_size.unwrap_or(parent.max_body_size),
            allowed_ips: self
                .allowed_ips
                .clone()
                .unwrap_or_else(|| parent.allowed_ips.clone()),
        }
    }
}

/// Effective, read-only limits for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadPolicy {
    pub path: String,
    pub max_body_size: usize,
    pub allowed_ips: String,
}

impl Default for ReloadPolicy {
    fn default() -> Self {
        SiteConfig::default().resolve(&ReloadDefaults::default())
    }
}

/// Staging location for candidate configurations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory holding staged files. Defaults to the system temp dir.
    pub dir: Option<PathBuf>,

    /// File name prefix for staged files.
    pub prefix: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "nginx_temp_config_".to_string(),
        }
    }
}

impl StagingConfig {
    /// Directory actually used for staging.
    pub fn effective_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// External validator command.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Program to run (looked up on `PATH` when not absolute).
    pub program: String,

    /// Arguments; [`CONFIG_PLACEHOLDER`] is replaced by the staged path.
    pub args: Vec<String>,

    /// Kill the checker after this many seconds. Zero waits forever.
    pub timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            program: "nginx".to_string(),
            args: vec!["-t".into(), "-c".into(), CONFIG_PLACEHOLDER.into()],
            timeout_secs: 0,
        }
    }
}

/// Reload signal target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Fixed process identifier.
    pub pid: Option<i32>,

    /// File holding the identifier, re-read on every attempt.
    pub pid_file: Option<PathBuf>,

    /// Signal name, e.g. "SIGHUP".
    pub signal: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            pid: None,
            pid_file: Some(PathBuf::from("/run/nginx.pid")),
            signal: "SIGHUP".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_inherits_unset_values() {
        let parent = ReloadDefaults {
            max_body_size: 4096,
            allowed_ips: "127.0.0.1".into(),
        };
        let site = SiteConfig {
            path: "/a".into(),
            max_body_size: None,
            allowed_ips: None,
        };

        let policy = site.resolve(&parent);
        assert_eq!(policy.max_body_size, 4096);
        assert_eq!(policy.allowed_ips, "127.0.0.1");
    }

    #[test]
    fn test_site_overrides_parent() {
        let parent = ReloadDefaults::default();
        let site = SiteConfig {
            path: "/b".into(),
            max_body_size: Some(10),
            allowed_ips: Some(String::new()),
        };

        let policy = site.resolve(&parent);
        assert_eq!(policy.max_body_size, 10);
        assert_eq!(policy.allowed_ips, "");
    }

    #[test]
    fn test_route_pattern_detection() {
        assert!(has_route_pattern("/{site}"));
        assert!(has_route_pattern("/reload}"));
        assert!(has_route_pattern("/files/*rest"));
        assert!(!has_route_pattern("/update-config"));
    }

    #[test]
    fn test_default_site_synthesised() {
        let config = ServiceConfig::default();
        let sites = config.resolved_sites();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].path, DEFAULT_SITE_PATH);
        assert_eq!(sites[0].max_body_size, DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [reload]
            max_body_size = 2048

            [[sites]]
            path = "/reload"

            [target]
            pid = 42
            "#,
        )
        .unwrap();

        let sites = config.resolved_sites();
        assert_eq!(sites[0].path, "/reload");
        assert_eq!(sites[0].max_body_size, 2048);
        assert_eq!(config.target.pid, Some(42));
        // Unmentioned fields keep their defaults.
        assert_eq!(config.target.signal, "SIGHUP");
        assert_eq!(config.validator.program, "nginx");
    }
}
