//! Image Builder (C5): invokes the container runtime's `build` verb,
//! tee-ing stdout/stderr to the Log Sink and a bounded error buffer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use catalyst_core::OutputRing;
use catalyst_logs::LogSink;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to spawn container runtime: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("image build exited with status {status}; stderr tail: {stderr_tail}")]
    NonZeroExit { status: String, stderr_tail: String },
}

#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(
        &self,
        context_dir: &Path,
        dockerfile_path: &Path,
        tag: &str,
        build_args: &HashMap<String, String>,
        sink: &LogSink,
        ring: &mut OutputRing,
    ) -> Result<(), BuildError>;
}

/// Shells out to the `docker` binary (or whatever `DOCKER_BIN` points at).
pub struct CliImageBuilder {
    binary: PathBuf,
}

impl Default for CliImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CliImageBuilder {
    pub fn new() -> Self {
        let binary = std::env::var("DOCKER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("docker"));
        Self { binary }
    }
}

#[async_trait]
impl ImageBuilder for CliImageBuilder {
    async fn build(
        &self,
        context_dir: &Path,
        dockerfile_path: &Path,
        tag: &str,
        build_args: &HashMap<String, String>,
        sink: &LogSink,
        ring: &mut OutputRing,
    ) -> Result<(), BuildError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("build")
            .arg("-t")
            .arg(tag)
            .arg("-f")
            .arg(dockerfile_path);
        for (key, value) in build_args {
            cmd.arg("--build-arg").arg(format!("{key}={value}"));
        }
        cmd.arg(context_dir);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        info!(tag, dockerfile = %dockerfile_path.display(), "starting image build");

        let mut child = cmd.spawn().map_err(BuildError::Spawn)?;
        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        // Drained concurrently so neither pipe's OS buffer can fill and
        // block the child while we wait on the other; each side tees into
        // its own ring, merged into the caller's ring afterward.
        let mut stdout_ring = OutputRing::new(64 * 1024);
        let mut stderr_ring = OutputRing::new(64 * 1024);
        let (stdout_result, stderr_result) = tokio::join!(
            drain_lines(stdout, sink, &mut stdout_ring),
            drain_lines(stderr, sink, &mut stderr_ring),
        );
        stdout_result?;
        stderr_result?;
        ring.push(stdout_ring.as_string().as_bytes());
        ring.push(stderr_ring.as_string().as_bytes());

        let status = child.wait().await.map_err(BuildError::Spawn)?;
        if !status.success() {
            return Err(BuildError::NonZeroExit {
                status: status.to_string(),
                stderr_tail: ring.tail(catalyst_core::STDERR_TAIL_LEN),
            });
        }

        info!(tag, "image build finished");
        Ok(())
    }
}

async fn drain_lines<R>(reader: R, sink: &LogSink, ring: &mut OutputRing) -> Result<(), BuildError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                sink.line(&line).await;
                ring.push(line.as_bytes());
                ring.push(b"\n");
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "failed reading build output");
                break;
            }
        }
    }
    Ok(())
}
