//! Deployment State Machine (C10): drives a single deployment through
//! C3-C9, persisting status transitions and running compensating cleanup
//! on failure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use catalyst_core::{truncate_error_message, OutputRing, MAX_ERROR_MESSAGE_LEN, MIN_CLONE_TIMEOUT_SECS};
use catalyst_deployer::{extract, plan, DefaultDockerfiles, ExtractOptions};
use catalyst_entities::{deployments, projects, DeploymentStatus};
use catalyst_logs::LogSink;
use catalyst_supervisor::{start as supervise_start, PortAllocator, SuperviseOptions};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use tracing::{error, info, warn};

use crate::cleanup::{compensate, Progress, Workspace};
use crate::context::{DeploymentTask, OrchestratorContext};
use crate::error::OrchestratorError;
use crate::url_minter;

const SUPERVISE_RETRY_ATTEMPTS: u32 = 2;

/// Runs one deployment to completion. Never returns an error to the
/// caller: every failure is mapped to a terminal `failed` row and logged.
/// The admission queue only needs to know the attempt finished.
pub async fn run(ctx: &OrchestratorContext, task: DeploymentTask) {
    if let Err(err) = run_inner(ctx, &task).await {
        error!(deployment_id = task.deployment_id, %err, "deployment attempt failed");
    }
}

async fn run_inner(ctx: &OrchestratorContext, task: &DeploymentTask) -> Result<(), OrchestratorError> {
    let deployment_id = task.deployment_id;

    if already_terminal(ctx, deployment_id).await? {
        info!(deployment_id, "deployment already terminal, skipping");
        return Ok(());
    }

    let deployment_dir = ctx.config.deployments_root.join(deployment_id.to_string());
    let build_output_dir = deployment_dir.join("build-output");
    let log_file_path = deployment_dir.join(format!("deployment-{deployment_id}.log"));

    transition_to_deploying(ctx, deployment_id, &log_file_path).await?;
    let sink = LogSink::open(log_file_path.clone()).await;

    let mut workspace = Workspace {
        clone_dir: None,
        build_output_dir: build_output_dir.clone(),
    };

    match drive_pipeline(ctx, task, &build_output_dir, &sink, &mut workspace).await {
        Ok(outcome) => {
            persist_success(ctx, deployment_id, outcome).await?;
            Ok(())
        }
        Err((progress, err)) => {
            let message = truncate_error_message(&err.to_string(), MAX_ERROR_MESSAGE_LEN);
            sink.section_failed("Deployment", &message).await;
            persist_failure(ctx, deployment_id, &message).await?;
            compensate(progress, &workspace).await;
            Err(err)
        }
    }
}

struct SuccessOutcome {
    deployment_url: String,
    internal_port: u16,
    build_output_path: PathBuf,
    dockerfile_used: catalyst_entities::DockerfileSource,
}

async fn drive_pipeline(
    ctx: &OrchestratorContext,
    task: &DeploymentTask,
    build_output_dir: &PathBuf,
    sink: &LogSink,
    workspace: &mut Workspace,
) -> Result<SuccessOutcome, (Progress, OrchestratorError)> {
    sink.run_phase("Workspace", || async {
        tokio::fs::create_dir_all(build_output_dir)
            .await
            .map_err(|e| e.to_string())?;
        ctx.privileged
            .chown(build_output_dir, CONTAINER_RUNTIME_UID)
            .await
            .map_err(|e| e.to_string())?;
        Ok::<(), String>(())
    })
    .await
    .map_err(|err| (Progress::NothingYet, OrchestratorError::State(sea_orm::DbErr::Custom(err))))?;

    let mut clone_ring = OutputRing::new(catalyst_core::STDERR_TAIL_LEN * 4);
    let clone_timeout = Duration::from_secs(MIN_CLONE_TIMEOUT_SECS);
    let fetched = sink
        .run_phase("Clone", || {
            catalyst_git::fetch(
                ctx.db.as_ref(),
                &task.repo_url,
                task.deployment_id,
                task.user_id,
                &task.provider,
                clone_timeout,
                &mut clone_ring,
            )
        })
        .await
        .map_err(|err| (Progress::NothingYet, OrchestratorError::from(err)))?;
    workspace.clone_dir = Some(fetched.local_path.clone());

    let defaults = DefaultDockerfiles {
        dir: ctx.config.deployments_root.join("default-dockerfiles"),
    };
    let build_plan = plan(&fetched.local_path, &defaults)
        .map_err(|err| (Progress::Cloned, OrchestratorError::from(err)))?;

    let tag = format!("code-catalyst/deploy-{}", task.deployment_id);
    let mut build_ring = OutputRing::new(catalyst_core::STDERR_TAIL_LEN * 4);
    sink.run_phase("Build", || {
        ctx.image_builder.build(
            &fetched.local_path,
            &build_plan.dockerfile_path,
            &tag,
            &HashMap::new(),
            sink,
            &mut build_ring,
        )
    })
    .await
    .map_err(|err| (Progress::Cloned, OrchestratorError::from(err)))?;

    let mut extract_ring = OutputRing::new(catalyst_core::STDERR_TAIL_LEN * 4);
    let extract_options = ExtractOptions {
        mount_owner_uid: Some(CONTAINER_RUNTIME_UID),
        ..ExtractOptions::default()
    };
    sink.run_phase("Extract", || {
        extract(
            &tag,
            build_output_dir,
            &extract_options,
            ctx.privileged.as_ref(),
            sink,
            &mut extract_ring,
        )
    })
    .await
    .map_err(|err| (Progress::Built, OrchestratorError::from(err)))?;

    remove_clone_dir(&fetched.local_path).await;
    workspace.clone_dir = None;

    let build_type = build_plan.source.build_type();

    let internal_port = supervise(ctx, task.deployment_id, build_output_dir, build_type)
        .await
        .map_err(|err| (Progress::Extracted, err))?;

    let (deployment_url, use_https) = if ctx.config.is_production() {
        let platform_domain = ctx
            .config
            .platform_domain
            .as_deref()
            .expect("is_production implies platform_domain is set");
        let project_name = project_name(ctx, task.project_id)
            .await
            .map_err(|err| (Progress::Started, OrchestratorError::State(err)))?;
        let minted = url_minter::mint(ctx.db.as_ref(), &project_name, platform_domain, task.deployment_id)
            .await
            .map_err(|err| (Progress::Started, OrchestratorError::from(err)))?;
        (format!("https://{minted}"), true)
    } else {
        (format!("http://localhost:{internal_port}"), false)
    };

    if use_https {
        configure_proxy(ctx, task.deployment_id, &deployment_url, internal_port, build_output_dir)
            .await
            .map_err(|err| (Progress::Proxied, OrchestratorError::from(err)))?;
    }

    Ok(SuccessOutcome {
        deployment_url,
        internal_port,
        build_output_path: build_output_dir.clone(),
        dockerfile_used: build_plan.source,
    })
}

/// UID the container runtime's in-image user runs as; the mount target
/// must be writable by it for the extraction copy to succeed.
const CONTAINER_RUNTIME_UID: u32 = 1000;

async fn supervise(
    ctx: &OrchestratorContext,
    deployment_id: i32,
    build_output_dir: &std::path::Path,
    build_type: catalyst_entities::BuildType,
) -> Result<u16, OrchestratorError> {
    supervise_with_options(ctx, deployment_id, build_output_dir, build_type, &SuperviseOptions::default()).await
}

async fn supervise_with_options(
    ctx: &OrchestratorContext,
    deployment_id: i32,
    build_output_dir: &std::path::Path,
    build_type: catalyst_entities::BuildType,
    options: &SuperviseOptions,
) -> Result<u16, OrchestratorError> {
    let mut last_err = None;

    for attempt in 0..=SUPERVISE_RETRY_ATTEMPTS {
        let allocator = PortAllocator::new(
            ctx.config.port_range.0,
            ctx.config.port_range.1,
            Duration::from_millis(catalyst_core::MIN_PORT_PROBE_TIMEOUT_MS),
        );
        let port = allocator.allocate().await.map_err(OrchestratorError::Port)?;

        match supervise_start(
            ctx.app_supervisor.as_ref(),
            deployment_id,
            build_output_dir,
            build_type,
            port,
            options,
        )
        .await
        {
            Ok(()) => return Ok(port),
            Err(err) => {
                warn!(deployment_id, attempt, %err, "app supervisor start attempt failed, retrying with a fresh port");
                last_err = Some(err);
            }
        }
    }

    Err(OrchestratorError::Supervise(last_err.expect("at least one attempt runs")))
}

async fn configure_proxy(
    ctx: &OrchestratorContext,
    deployment_id: i32,
    deployment_url: &str,
    internal_port: u16,
    build_output_dir: &std::path::Path,
) -> Result<(), catalyst_proxy::ProxyError> {
    let hostname = deployment_url
        .strip_prefix("https://")
        .unwrap_or(deployment_url);
    let paths = catalyst_proxy::ProxyPaths {
        sites_available: PathBuf::from("/etc/nginx/sites-available"),
        sites_enabled: PathBuf::from("/etc/nginx/sites-enabled"),
    };
    let request = catalyst_proxy::ConfigureRequest {
        deployment_id,
        hostname,
        port: internal_port,
        build_output_path: build_output_dir,
        use_https: true,
    };
    catalyst_proxy::configure(&request, &paths, ctx.privileged.as_ref()).await
}

async fn remove_clone_dir(path: &std::path::Path) {
    if let Err(err) = tokio::fs::remove_dir_all(path).await {
        warn!(path = %path.display(), %err, "failed to remove clone directory after extraction");
    }
}

async fn project_name(ctx: &OrchestratorContext, project_id: i32) -> Result<String, sea_orm::DbErr> {
    let project = projects::Entity::find_by_id(project_id)
        .one(ctx.db.as_ref())
        .await?
        .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("project {project_id}")))?;
    Ok(project.name)
}

async fn already_terminal(ctx: &OrchestratorContext, deployment_id: i32) -> Result<bool, OrchestratorError> {
    let deployment = deployments::Entity::find_by_id(deployment_id)
        .one(ctx.db.as_ref())
        .await
        .map_err(OrchestratorError::State)?;
    Ok(deployment.map(|d| d.status.is_terminal()).unwrap_or(false))
}

async fn transition_to_deploying(
    ctx: &OrchestratorContext,
    deployment_id: i32,
    log_file_path: &std::path::Path,
) -> Result<(), OrchestratorError> {
    let deployment = deployments::Entity::find_by_id(deployment_id)
        .one(ctx.db.as_ref())
        .await
        .map_err(OrchestratorError::State)?
        .ok_or_else(|| OrchestratorError::State(sea_orm::DbErr::RecordNotFound(format!("deployment {deployment_id}"))))?;

    if !deployment.status.can_transition_to(DeploymentStatus::Deploying) {
        return Err(OrchestratorError::State(sea_orm::DbErr::Custom(format!(
            "deployment {deployment_id} cannot transition from {} to deploying",
            deployment.status
        ))));
    }

    let mut active: deployments::ActiveModel = deployment.into();
    active.status = Set(DeploymentStatus::Deploying);
    active.log_file_path = Set(Some(log_file_path.display().to_string()));
    active.update(ctx.db.as_ref()).await.map_err(OrchestratorError::State)?;
    Ok(())
}

async fn persist_success(
    ctx: &OrchestratorContext,
    deployment_id: i32,
    outcome: SuccessOutcome,
) -> Result<(), OrchestratorError> {
    let deployment = deployments::Entity::find_by_id(deployment_id)
        .one(ctx.db.as_ref())
        .await
        .map_err(OrchestratorError::State)?
        .ok_or_else(|| OrchestratorError::State(sea_orm::DbErr::RecordNotFound(format!("deployment {deployment_id}"))))?;

    let mut active: deployments::ActiveModel = deployment.into();
    active.status = Set(DeploymentStatus::Success);
    active.deployment_url = Set(Some(outcome.deployment_url));
    active.internal_port = Set(Some(i32::from(outcome.internal_port)));
    active.build_output_path = Set(Some(outcome.build_output_path.display().to_string()));
    active.dockerfile_used = Set(outcome.dockerfile_used);
    match active.update(ctx.db.as_ref()).await {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(deployment_id, %err, "FATAL: failed to persist success status");
            Err(OrchestratorError::State(err))
        }
    }
}

async fn persist_failure(
    ctx: &OrchestratorContext,
    deployment_id: i32,
    error_message: &str,
) -> Result<(), OrchestratorError> {
    let Some(deployment) = deployments::Entity::find_by_id(deployment_id)
        .one(ctx.db.as_ref())
        .await
        .map_err(OrchestratorError::State)?
    else {
        return Ok(());
    };

    let mut active: deployments::ActiveModel = deployment.into();
    active.status = Set(DeploymentStatus::Failed);
    active.error_message = Set(Some(error_message.to_string()));
    match active.update(ctx.db.as_ref()).await {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(deployment_id, %err, "FATAL: failed to persist failed status, row left inconsistent");
            Err(OrchestratorError::State(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalyst_core::privileged::fake::FakePrivilegedOps;
    use catalyst_core::{OrchestratorConfig, OutputRing, PrivilegedOps};
    use catalyst_deployer::{BuildError, ImageBuilder};
    use catalyst_entities::BuildType;
    use catalyst_logs::LogSink;
    use catalyst_migrations::Migrator;
    use catalyst_migrations::MigratorTrait;
    use catalyst_supervisor::fake::FakeAppSupervisor;
    use sea_orm::{ActiveModelTrait, ActiveValue::Set, Database, DatabaseConnection};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NeverCalledImageBuilder;

    #[async_trait]
    impl ImageBuilder for NeverCalledImageBuilder {
        async fn build(
            &self,
            _context_dir: &std::path::Path,
            _dockerfile_path: &std::path::Path,
            _tag: &str,
            _build_args: &HashMap<String, String>,
            _sink: &LogSink,
            _ring: &mut OutputRing,
        ) -> Result<(), BuildError> {
            panic!("image builder should not be invoked by these tests");
        }
    }

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn test_context(db: DatabaseConnection) -> OrchestratorContext {
        OrchestratorContext {
            db: Arc::new(db),
            config: OrchestratorConfig {
                platform_domain: None,
                max_concurrent_deployments: 1,
                port_range: (19000, 19010),
                database_url: "sqlite::memory:".to_string(),
                deployments_root: std::env::temp_dir().join("catalyst-state-machine-tests"),
            },
            image_builder: Arc::new(NeverCalledImageBuilder),
            app_supervisor: Arc::new(FakeAppSupervisor::default()),
            privileged: Arc::new(FakePrivilegedOps::default()),
        }
    }

    async fn seed_project_and_deployment(db: &DatabaseConnection, status: DeploymentStatus) -> (i32, i32) {
        let user = catalyst_entities::users::ActiveModel {
            name: Set("alice".to_string()),
            email: Set("alice@example.com".to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        let project = projects::ActiveModel {
            owner_id: Set(user.id),
            name: Set("widgets".to_string()),
            git_repo_url: Set("https://github.com/acme/widgets.git".to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        let deployment = deployments::ActiveModel {
            project_id: Set(project.id),
            status: Set(status),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        (project.id, deployment.id)
    }

    #[tokio::test]
    async fn already_terminal_is_false_for_a_pending_deployment() {
        let db = test_db().await;
        let (_project_id, deployment_id) = seed_project_and_deployment(&db, DeploymentStatus::Pending).await;
        let ctx = test_context(db);

        assert!(!already_terminal(&ctx, deployment_id).await.unwrap());
    }

    #[tokio::test]
    async fn already_terminal_is_true_for_a_success_deployment() {
        let db = test_db().await;
        let (_project_id, deployment_id) = seed_project_and_deployment(&db, DeploymentStatus::Success).await;
        let ctx = test_context(db);

        assert!(already_terminal(&ctx, deployment_id).await.unwrap());
    }

    #[tokio::test]
    async fn transition_to_deploying_sets_status_and_log_path() {
        let db = test_db().await;
        let (_project_id, deployment_id) = seed_project_and_deployment(&db, DeploymentStatus::Pending).await;
        let ctx = test_context(db);
        let log_path = std::path::Path::new("/deployments/1/deployment-1.log");

        transition_to_deploying(&ctx, deployment_id, log_path).await.unwrap();

        let row = deployments::Entity::find_by_id(deployment_id)
            .one(ctx.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeploymentStatus::Deploying);
        assert_eq!(row.log_file_path.as_deref(), Some("/deployments/1/deployment-1.log"));
    }

    #[tokio::test]
    async fn transition_to_deploying_rejects_a_terminal_row() {
        let db = test_db().await;
        let (_project_id, deployment_id) = seed_project_and_deployment(&db, DeploymentStatus::Success).await;
        let ctx = test_context(db);
        let log_path = std::path::Path::new("/deployments/1/deployment-1.log");

        let result = transition_to_deploying(&ctx, deployment_id, log_path).await;
        assert!(matches!(result, Err(OrchestratorError::State(_))));
    }

    #[tokio::test]
    async fn persist_success_sets_every_success_field() {
        let db = test_db().await;
        let (_project_id, deployment_id) = seed_project_and_deployment(&db, DeploymentStatus::Deploying).await;
        let ctx = test_context(db);

        let outcome = SuccessOutcome {
            deployment_url: "http://localhost:4001".to_string(),
            internal_port: 4001,
            build_output_path: PathBuf::from("/deployments/1/build-output"),
            dockerfile_used: catalyst_entities::DockerfileSource::DefaultStandalone,
        };
        persist_success(&ctx, deployment_id, outcome).await.unwrap();

        let row = deployments::Entity::find_by_id(deployment_id)
            .one(ctx.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeploymentStatus::Success);
        assert_eq!(row.deployment_url.as_deref(), Some("http://localhost:4001"));
        assert_eq!(row.internal_port, Some(4001));
        assert_eq!(row.dockerfile_used, catalyst_entities::DockerfileSource::DefaultStandalone);
    }

    #[tokio::test]
    async fn persist_failure_sets_status_and_error_message() {
        let db = test_db().await;
        let (_project_id, deployment_id) = seed_project_and_deployment(&db, DeploymentStatus::Deploying).await;
        let ctx = test_context(db);

        persist_failure(&ctx, deployment_id, "No Dockerfile found").await.unwrap();

        let row = deployments::Entity::find_by_id(deployment_id)
            .one(ctx.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, DeploymentStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("No Dockerfile found"));
    }

    /// A zero readiness timeout guarantees exactly one `status()` poll per
    /// attempt (the deadline is already past by the time it's checked),
    /// making the number of retries deterministic from the queued statuses.
    fn immediate_timeout_options() -> SuperviseOptions {
        SuperviseOptions {
            readiness_timeout: Duration::from_millis(0),
            poll_tick: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn supervise_retries_with_a_fresh_port_after_failed_attempts() {
        let db = test_db().await;
        let ctx = test_context(db);
        let supervisor = FakeAppSupervisor::default();
        supervisor.queue_statuses(
            "deploy-1",
            vec!["errored".to_string(), "errored".to_string(), "online".to_string()],
        );
        let ctx = OrchestratorContext {
            app_supervisor: Arc::new(supervisor),
            ..ctx
        };

        let build_output = TempDir::new().unwrap();
        let result = supervise_with_options(
            &ctx,
            1,
            build_output.path(),
            BuildType::Standalone,
            &immediate_timeout_options(),
        )
        .await;
        let port = result.unwrap();
        assert!((19000..=19010).contains(&port));
    }

    #[tokio::test]
    async fn supervise_exhausts_retries_and_surfaces_the_last_error() {
        let db = test_db().await;
        let ctx = test_context(db);
        let supervisor = FakeAppSupervisor::default();
        supervisor.queue_statuses("deploy-2", vec!["errored".to_string()]);
        let ctx = OrchestratorContext {
            app_supervisor: Arc::new(supervisor),
            ..ctx
        };

        let build_output = TempDir::new().unwrap();
        let result = supervise_with_options(
            &ctx,
            2,
            build_output.path(),
            BuildType::Standalone,
            &immediate_timeout_options(),
        )
        .await;
        assert!(matches!(
            result,
            Err(OrchestratorError::Supervise(catalyst_supervisor::SuperviseError::NotOnline { .. }))
        ));
    }

    #[tokio::test]
    async fn supervise_surfaces_port_exhaustion_as_a_distinct_error() {
        let db = test_db().await;
        let mut ctx = test_context(db);
        ctx.config.port_range = (19500, 19499);

        let build_output = TempDir::new().unwrap();
        let result = supervise_with_options(
            &ctx,
            3,
            build_output.path(),
            BuildType::Standalone,
            &immediate_timeout_options(),
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Port(catalyst_supervisor::PortAllocatorError::NoFreePort { .. })
        ));
        assert!(err.to_string().contains("No free ports"));
    }
}
