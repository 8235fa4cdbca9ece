//! Shared scalar types used across orchestrator crates.

use chrono::{DateTime, Utc};

/// Canonical timestamp type for all persisted and in-memory records.
///
/// Every crate in the workspace uses this alias instead of reaching for
/// `chrono::DateTime<Utc>` directly, so a future change of timestamp
/// representation only touches this module.
pub type UtcDateTime = DateTime<Utc>;
