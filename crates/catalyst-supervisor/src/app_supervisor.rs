//! App Supervisor (C7): registers the extracted artifact with an external
//! process supervisor, assigning it a port and production environment.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use catalyst_entities::BuildType;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SuperviseError {
    #[error("supervisor rejected registration for {name}: {message}")]
    RegistrationFailed { name: String, message: String },

    #[error("supervisor did not report 'online' for {name} within {timeout:?}; last status was {last_status}")]
    NotOnline {
        name: String,
        timeout: Duration,
        last_status: String,
    },

    #[error("failed to query supervisor status for {name}: {message}")]
    StatusQueryFailed { name: String, message: String },
}

/// External contract an app supervisor (PM2-shaped) exposes: start, delete,
/// and poll status by process name.
#[async_trait]
pub trait AppSupervisorClient: Send + Sync {
    async fn start(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
        env: &HashMap<String, String>,
    ) -> Result<(), SuperviseError>;

    /// Deleting a process that doesn't exist is treated as success.
    async fn delete(&self, name: &str) -> Result<(), SuperviseError>;

    async fn status(&self, name: &str) -> Result<String, SuperviseError>;
}

pub struct SuperviseOptions {
    pub readiness_timeout: Duration,
    pub poll_tick: Duration,
}

impl Default for SuperviseOptions {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(catalyst_core::MIN_SUPERVISE_TIMEOUT_SECS),
            poll_tick: Duration::from_millis(catalyst_core::SUPERVISE_POLL_TICK_MS),
        }
    }
}

/// Launch command for a given build strategy, per the planner's
/// classification (§4.7): standalone runs the pre-verified server bundle,
/// classic shells out to the project's local framework CLI.
fn launch_command(build_type: BuildType, build_output_path: &Path) -> Vec<String> {
    match build_type {
        BuildType::Standalone => vec![
            "node".to_string(),
            build_output_path.join("server.js").display().to_string(),
        ],
        BuildType::Classic => vec![
            build_output_path
                .join("node_modules/.bin/next")
                .display()
                .to_string(),
            "start".to_string(),
        ],
    }
}

pub async fn start(
    client: &dyn AppSupervisorClient,
    deployment_id: i32,
    build_output_path: &Path,
    build_type: BuildType,
    port: u16,
    options: &SuperviseOptions,
) -> Result<(), SuperviseError> {
    let name = process_name(deployment_id);
    let command = launch_command(build_type, build_output_path);

    match client.delete(&name).await {
        Ok(()) => debug!(name, "deleted prior supervisor registration"),
        Err(err) => warn!(name, %err, "delete-before-register reported an error; continuing"),
    }

    let mut env = HashMap::new();
    env.insert("PORT".to_string(), port.to_string());
    env.insert("NODE_ENV".to_string(), "production".to_string());

    info!(name, port, ?build_type, "registering process with supervisor");
    client.start(&name, build_output_path, &command, &env).await?;

    wait_until_online(client, &name, options).await
}

async fn wait_until_online(
    client: &dyn AppSupervisorClient,
    name: &str,
    options: &SuperviseOptions,
) -> Result<(), SuperviseError> {
    let deadline = tokio::time::Instant::now() + options.readiness_timeout;
    let mut last_status = String::new();

    loop {
        last_status = client.status(name).await?;
        if last_status == "online" {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(SuperviseError::NotOnline {
                name: name.to_string(),
                timeout: options.readiness_timeout,
                last_status,
            });
        }
        sleep(options.poll_tick).await;
    }
}

pub fn process_name(deployment_id: i32) -> String {
    format!("deploy-{deployment_id}")
}

/// Shells out to a `pm2`-shaped CLI binary (overridable via `SUPERVISOR_BIN`).
pub struct CliAppSupervisor {
    binary: std::path::PathBuf,
}

impl Default for CliAppSupervisor {
    fn default() -> Self {
        let binary = std::env::var("SUPERVISOR_BIN")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| std::path::PathBuf::from("pm2"));
        Self { binary }
    }
}

#[async_trait]
impl AppSupervisorClient for CliAppSupervisor {
    async fn start(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
        env: &HashMap<String, String>,
    ) -> Result<(), SuperviseError> {
        let (program, args) = command.split_first().ok_or_else(|| SuperviseError::RegistrationFailed {
            name: name.to_string(),
            message: "empty launch command".to_string(),
        })?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("start")
            .arg(program)
            .arg("--name")
            .arg(name)
            .arg("--cwd")
            .arg(working_dir);
        for (key, value) in env {
            cmd.env(key, value);
        }
        if !args.is_empty() {
            cmd.arg("--").args(args);
        }

        let output = cmd.output().await.map_err(|err| SuperviseError::RegistrationFailed {
            name: name.to_string(),
            message: err.to_string(),
        })?;
        if !output.status.success() {
            return Err(SuperviseError::RegistrationFailed {
                name: name.to_string(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SuperviseError> {
        let output = Command::new(&self.binary)
            .arg("delete")
            .arg(name)
            .output()
            .await
            .map_err(|err| SuperviseError::RegistrationFailed {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        // A "not found" response from the supervisor is treated as success.
        let _ = output;
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<String, SuperviseError> {
        let output = Command::new(&self.binary)
            .arg("jlist")
            .output()
            .await
            .map_err(|err| SuperviseError::StatusQueryFailed {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let processes: serde_json::Value = serde_json::from_str(&stdout).unwrap_or(serde_json::Value::Null);
        let status = processes
            .as_array()
            .and_then(|list| list.iter().find(|p| p.get("name").and_then(|n| n.as_str()) == Some(name)))
            .and_then(|p| p.pointer("/pm2_env/status"))
            .and_then(|s| s.as_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(status)
    }
}

/// In-memory fake for tests outside this crate; not cfg(test)-gated so
/// downstream crates' own test modules can depend on it.
pub mod fake {
    use super::*;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeAppSupervisor {
        pub registrations: Mutex<Map<String, Vec<String>>>,
        pub statuses: Mutex<Map<String, Vec<String>>>,
    }

    impl FakeAppSupervisor {
        /// Queues the sequence of statuses `status()` returns for `name`,
        /// one per call, repeating the last value once exhausted.
        pub fn queue_statuses(&self, name: &str, statuses: Vec<String>) {
            self.statuses.lock().unwrap().insert(name.to_string(), statuses);
        }
    }

    #[async_trait]
    impl AppSupervisorClient for FakeAppSupervisor {
        async fn start(
            &self,
            name: &str,
            _working_dir: &Path,
            command: &[String],
            _env: &Map<String, String>,
        ) -> Result<(), SuperviseError> {
            self.registrations
                .lock()
                .unwrap()
                .insert(name.to_string(), command.to_vec());
            Ok(())
        }

        async fn delete(&self, name: &str) -> Result<(), SuperviseError> {
            self.registrations.lock().unwrap().remove(name);
            Ok(())
        }

        async fn status(&self, name: &str) -> Result<String, SuperviseError> {
            let mut statuses = self.statuses.lock().unwrap();
            let queue = statuses.entry(name.to_string()).or_insert_with(|| vec!["online".to_string()]);
            if queue.len() > 1 {
                Ok(queue.remove(0))
            } else {
                Ok(queue[0].clone())
            }
        }
    }
}
