//! Artifact Extractor (C6): runs the just-built image once, bind-mounting a
//! host directory, and copies `/app` out of the container onto it.

use std::path::{Path, PathBuf};

use catalyst_core::{OutputRing, PrivilegedOps};
use catalyst_logs::LogSink;
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

/// Emitted by the last successful branch of the in-container copy script;
/// its absence in captured stdout means the extraction may be incomplete
/// but is not treated as fatal.
const SUCCESS_SENTINEL: &str = "CATALYST_EXTRACT_OK";

const COPY_SCRIPT: &str = concat!(
    "cp -av /app/. /mnt/out/ 2>/dev/null && echo CATALYST_EXTRACT_OK && exit 0; ",
    "cp -a /app/. /mnt/out/ 2>/dev/null && echo CATALYST_EXTRACT_OK && exit 0; ",
    "cp -r /app/. /mnt/out/ 2>/dev/null && echo CATALYST_EXTRACT_OK && exit 0; ",
    "exit 0"
);

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to create build output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to chown build output directory: {0}")]
    Chown(#[from] catalyst_core::PrivilegedOpError),

    #[error("failed to spawn container runtime: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("artifact extraction run exited with status {0}")]
    NonZeroExit(String),
}

/// Set when the environment requires the mount target to be owned by a
/// specific UID before the container can write into it.
pub struct ExtractOptions {
    pub mount_owner_uid: Option<u32>,
    pub docker_binary: PathBuf,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            mount_owner_uid: None,
            docker_binary: std::env::var("DOCKER_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("docker")),
        }
    }
}

pub async fn extract(
    tag: &str,
    build_output_path: &Path,
    options: &ExtractOptions,
    privileged: &dyn PrivilegedOps,
    sink: &LogSink,
    ring: &mut OutputRing,
) -> Result<(), ExtractError> {
    tokio::fs::create_dir_all(build_output_path)
        .await
        .map_err(|source| ExtractError::CreateDir {
            path: build_output_path.to_path_buf(),
            source,
        })?;

    if let Some(uid) = options.mount_owner_uid {
        privileged.chown(build_output_path, uid).await?;
    }

    let mount = format!("{}:/mnt/out", build_output_path.display());
    let output = Command::new(&options.docker_binary)
        .arg("run")
        .arg("--rm")
        .arg("-v")
        .arg(&mount)
        .arg(tag)
        .arg("sh")
        .arg("-c")
        .arg(COPY_SCRIPT)
        .output()
        .await
        .map_err(ExtractError::Spawn)?;

    sink.tee_chunk(&output.stdout, ring).await;
    sink.tee_chunk(&output.stderr, ring).await;

    if !output.status.success() {
        return Err(ExtractError::NonZeroExit(output.status.to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains(SUCCESS_SENTINEL) {
        warn!(tag, "extraction completed without the success sentinel; artifacts may be incomplete");
    }

    Ok(())
}
