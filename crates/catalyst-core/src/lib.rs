//! Core types and utilities shared across the orchestrator crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod privileged;
pub mod tee;
pub mod types;

pub use config::OrchestratorConfig;
pub use constants::*;
pub use error::{truncate_error_message, ServiceError, ServiceResult};
pub use privileged::{PrivilegedOpError, PrivilegedOps, ShellPrivilegedOps};
pub use tee::OutputRing;
pub use types::UtcDateTime;

// Re-export for downstream crates that build on our public types without
// needing to depend on these crates directly at matching versions.
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use thiserror;
pub use tokio;
pub use tracing;
