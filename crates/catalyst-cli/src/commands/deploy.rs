//! `catalyst deploy`: inserts a pending [`catalyst_entities::deployments::Model`]
//! row for a project and drives it through the orchestrator via the
//! admission queue.

use std::sync::Arc;
use std::time::Duration;

use catalyst_core::{OrchestratorConfig, PrivilegedOps, ShellPrivilegedOps};
use catalyst_deployer::{CliImageBuilder, ImageBuilder};
use catalyst_deployments::{DeploymentTask, OrchestratorContext};
use catalyst_entities::{deployments, projects, DeploymentStatus};
use catalyst_queue::AdmissionQueue;
use catalyst_supervisor::{AppSupervisorClient, CliAppSupervisor};
use clap::Args;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use tracing::info;

#[derive(Args)]
pub struct DeployCommand {
    /// Id of an existing project to deploy
    #[arg(long)]
    project_id: i32,

    /// Id of the user whose Git account credentials should be used
    #[arg(long)]
    user_id: i32,

    /// Git provider the access token was issued by (e.g. "github")
    #[arg(long)]
    provider: String,

    /// Block until the deployment reaches a terminal status, polling every
    /// --poll-interval-secs
    #[arg(long, default_value = "true")]
    wait: bool,

    #[arg(long, default_value = "2")]
    poll_interval_secs: u64,
}

impl DeployCommand {
    pub async fn execute(self) -> anyhow::Result<()> {
        let config = OrchestratorConfig::from_env();
        let db = catalyst_database::establish_connection(&config.database_url).await?;

        let project = projects::Entity::find_by_id(self.project_id)
            .one(db.as_ref())
            .await?
            .ok_or_else(|| anyhow::anyhow!("project {} not found", self.project_id))?;

        let deployment = deployments::ActiveModel {
            project_id: Set(project.id),
            status: Set(DeploymentStatus::Pending),
            ..Default::default()
        }
        .insert(db.as_ref())
        .await?;

        info!(deployment_id = deployment.id, project_id = project.id, "deployment queued");

        let reload_command = std::env::var("PROXY_RELOAD_COMMAND")
            .map(|v| v.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_else(|_| vec!["nginx".to_string(), "-s".to_string(), "reload".to_string()]);

        let ctx = Arc::new(OrchestratorContext {
            db: Arc::clone(&db),
            config: config.clone(),
            image_builder: Arc::new(CliImageBuilder::default()) as Arc<dyn ImageBuilder>,
            app_supervisor: Arc::new(CliAppSupervisor::default()) as Arc<dyn AppSupervisorClient>,
            privileged: Arc::new(ShellPrivilegedOps::new(reload_command)) as Arc<dyn PrivilegedOps>,
        });

        let queue = AdmissionQueue::start(config.max_concurrent_deployments, move |task: DeploymentTask| {
            let ctx = Arc::clone(&ctx);
            async move {
                catalyst_deployments::run(&ctx, task).await;
            }
        });

        queue.enqueue(DeploymentTask {
            deployment_id: deployment.id,
            project_id: project.id,
            repo_url: project.git_repo_url.clone(),
            user_id: self.user_id,
            provider: self.provider.clone(),
        })?;

        if !self.wait {
            return Ok(());
        }

        let interval = Duration::from_secs(self.poll_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            let row = deployments::Entity::find_by_id(deployment.id)
                .one(db.as_ref())
                .await?
                .ok_or_else(|| anyhow::anyhow!("deployment {} disappeared", deployment.id))?;

            if row.status.is_terminal() {
                info!(deployment_id = deployment.id, status = %row.status, "deployment finished");
                if row.status == DeploymentStatus::Success {
                    if let Some(url) = &row.deployment_url {
                        println!("{url}");
                    }
                    return Ok(());
                }
                let message = row.error_message.unwrap_or_else(|| "deployment failed".to_string());
                anyhow::bail!(message);
            }
        }
    }
}
