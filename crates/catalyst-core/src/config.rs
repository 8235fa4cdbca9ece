//! Environment-driven orchestrator configuration.
//!
//! Loaded once at process start by the CLI binary and threaded through as
//! a typed value; nothing in the orchestrator reads `std::env` directly
//! after this module has run.

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_DEPLOYMENTS, DEFAULT_PORT_RANGE_END, DEFAULT_PORT_RANGE_START,
};
use std::path::PathBuf;

/// Top-level configuration for the deployment orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// `YOUR_PLATFORM_URL`. `None` (unset or empty) means development mode:
    /// the proxy configurator and URL minter are not engaged.
    pub platform_domain: Option<String>,

    /// `MAX_CONCURRENT_DEPLOYMENTS`, the admission queue's concurrency ceiling.
    pub max_concurrent_deployments: usize,

    /// `DEPLOYMENT_PORT_RANGE_START`..=`DEPLOYMENT_PORT_RANGE_END`.
    pub port_range: (u16, u16),

    /// `DATABASE_URL`.
    pub database_url: String,

    /// `DEPLOYMENTS_ROOT`, the root directory under which each deployment
    /// gets its own working directory.
    pub deployments_root: PathBuf,
}

impl OrchestratorConfig {
    /// Load configuration from the process environment, applying the
    /// defaults documented in the specification for anything unset.
    pub fn from_env() -> Self {
        let platform_domain = std::env::var("YOUR_PLATFORM_URL")
            .ok()
            .filter(|v| !v.is_empty());

        let max_concurrent_deployments = std::env::var("MAX_CONCURRENT_DEPLOYMENTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENT_DEPLOYMENTS);

        let port_start = std::env::var("DEPLOYMENT_PORT_RANGE_START")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT_RANGE_START);

        let port_end = std::env::var("DEPLOYMENT_PORT_RANGE_END")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT_RANGE_END);

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite::memory:".to_string());

        let deployments_root = std::env::var("DEPLOYMENTS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_deployments_root());

        Self {
            platform_domain,
            max_concurrent_deployments,
            port_range: (port_start, port_end),
            database_url,
            deployments_root,
        }
    }

    /// Whether the orchestrator should run the proxy configurator and URL
    /// minter, per the production-mode rule in the specification.
    pub fn is_production(&self) -> bool {
        self.platform_domain.is_some()
    }
}

fn default_deployments_root() -> PathBuf {
    std::env::temp_dir().join("code-catalyst-deployments")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_range_matches_spec() {
        std::env::remove_var("DEPLOYMENT_PORT_RANGE_START");
        std::env::remove_var("DEPLOYMENT_PORT_RANGE_END");
        let cfg = OrchestratorConfig {
            platform_domain: None,
            max_concurrent_deployments: DEFAULT_MAX_CONCURRENT_DEPLOYMENTS,
            port_range: (DEFAULT_PORT_RANGE_START, DEFAULT_PORT_RANGE_END),
            database_url: "sqlite::memory:".to_string(),
            deployments_root: default_deployments_root(),
        };
        assert_eq!(cfg.port_range, (4001, 4999));
    }

    #[test]
    fn empty_platform_url_is_development_mode() {
        let cfg = OrchestratorConfig {
            platform_domain: None,
            max_concurrent_deployments: 1,
            port_range: (4001, 4999),
            database_url: "sqlite::memory:".to_string(),
            deployments_root: default_deployments_root(),
        };
        assert!(!cfg.is_production());
    }

    #[test]
    fn platform_domain_set_is_production_mode() {
        let cfg = OrchestratorConfig {
            platform_domain: Some("example.app".to_string()),
            max_concurrent_deployments: 1,
            port_range: (4001, 4999),
            database_url: "sqlite::memory:".to_string(),
            deployments_root: default_deployments_root(),
        };
        assert!(cfg.is_production());
    }
}
