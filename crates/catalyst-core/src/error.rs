//! Common error types shared across the orchestrator crates.

use thiserror::Error;

/// Common service-level error type for components that talk to the store
/// or to generic external collaborators.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Truncate an error message to a bounded length, keeping the head and
/// marking the cut with an ellipsis, as persisted into `Deployment.errorMessage`.
///
/// Error messages are end-trimmed rather than head-trimmed: the most useful
/// context (what failed, and why) is usually at the start of a message, and
/// long stderr tails are already truncated before they get here.
pub fn truncate_error_message(message: &str, max_len: usize) -> String {
    if message.chars().count() <= max_len {
        return message.to_string();
    }
    let truncated: String = message.chars().take(max_len.saturating_sub(1)).collect();
    format!("{truncated}\u{2026}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_error_message_passes_short_messages_through() {
        assert_eq!(truncate_error_message("short", 100), "short");
    }

    #[test]
    fn truncate_error_message_trims_long_messages() {
        let long = "a".repeat(200);
        let truncated = truncate_error_message(&long, 50);
        assert_eq!(truncated.chars().count(), 50);
        assert!(truncated.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_error_message_handles_exact_boundary() {
        let exact = "a".repeat(50);
        assert_eq!(truncate_error_message(&exact, 50), exact);
    }
}
