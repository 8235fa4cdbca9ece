//! The `Deployment.status` enum.
//!
//! Transitions form a DAG: `Pending -> Deploying -> (Success | Failed)`.
//! No other transition is valid; [`DeploymentStatus::can_transition_to`]
//! is the single source of truth callers should consult before writing a
//! new status.

use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "deploying")]
    Deploying,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl DeploymentStatus {
    /// Whether moving from `self` to `next` is a legal transition under
    /// the status DAG.
    pub fn can_transition_to(self, next: DeploymentStatus) -> bool {
        matches!(
            (self, next),
            (DeploymentStatus::Pending, DeploymentStatus::Deploying)
                | (DeploymentStatus::Deploying, DeploymentStatus::Success)
                | (DeploymentStatus::Deploying, DeploymentStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    /// `true` for the statuses a `Deployment.deploymentUrl` must stay
    /// unique across, per invariant 3.
    pub fn holds_an_active_url(self) -> bool {
        matches!(self, DeploymentStatus::Deploying | DeploymentStatus::Success)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_only_advance_to_deploying() {
        assert!(DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Deploying));
        assert!(!DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Success));
        assert!(!DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Failed));
        assert!(!DeploymentStatus::Pending.can_transition_to(DeploymentStatus::Pending));
    }

    #[test]
    fn deploying_can_advance_to_either_terminal_state() {
        assert!(DeploymentStatus::Deploying.can_transition_to(DeploymentStatus::Success));
        assert!(DeploymentStatus::Deploying.can_transition_to(DeploymentStatus::Failed));
        assert!(!DeploymentStatus::Deploying.can_transition_to(DeploymentStatus::Pending));
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for terminal in [DeploymentStatus::Success, DeploymentStatus::Failed] {
            for next in [
                DeploymentStatus::Pending,
                DeploymentStatus::Deploying,
                DeploymentStatus::Success,
                DeploymentStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn only_deploying_and_success_hold_active_urls() {
        assert!(DeploymentStatus::Deploying.holds_an_active_url());
        assert!(DeploymentStatus::Success.holds_an_active_url());
        assert!(!DeploymentStatus::Pending.holds_an_active_url());
        assert!(!DeploymentStatus::Failed.holds_an_active_url());
    }
}
