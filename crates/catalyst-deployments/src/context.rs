//! Typed context threaded through the state machine, replacing a loosely
//! typed map of collaborators.

use std::sync::Arc;

use catalyst_core::{OrchestratorConfig, PrivilegedOps};
use catalyst_deployer::ImageBuilder;
use catalyst_supervisor::AppSupervisorClient;
use sea_orm::DatabaseConnection;

/// Everything the state machine needs to drive one deployment, independent
/// of which deployment it is. Built once at process start and shared
/// across every worker.
pub struct OrchestratorContext {
    pub db: Arc<DatabaseConnection>,
    pub config: OrchestratorConfig,
    pub image_builder: Arc<dyn ImageBuilder>,
    pub app_supervisor: Arc<dyn AppSupervisorClient>,
    pub privileged: Arc<dyn PrivilegedOps>,
}

/// Per-deployment input the admission queue hands to the state machine.
#[derive(Debug, Clone)]
pub struct DeploymentTask {
    pub deployment_id: i32,
    pub project_id: i32,
    pub repo_url: String,
    pub user_id: i32,
    pub provider: String,
}
