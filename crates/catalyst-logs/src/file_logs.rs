//! Per-deployment append-only log file with section markers.
//!
//! A [`LogSink`] is scoped to one deployment's `logFilePath`. Every phase of
//! the state machine (clone, build, extract, supervise, proxy) opens a
//! section, writes lines to it, and closes it with a Finished or Failed
//! marker. A failure to open the file degrades to `tracing` output rather
//! than aborting the deployment.

use catalyst_core::OutputRing;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;

pub struct LogSink {
    log_file_path: PathBuf,
}

impl LogSink {
    /// Ensures the parent directory of `log_file_path` exists. Per the
    /// sink's own resilience contract, directory-creation failure is not
    /// reported to the caller; it degrades the same way a failed open does.
    pub async fn open(log_file_path: impl Into<PathBuf>) -> Self {
        let log_file_path = log_file_path.into();
        if let Some(parent) = log_file_path.parent() {
            if let Err(e) = create_dir_all(parent).await {
                tracing::warn!(path = %parent.display(), error = %e, "failed to create log directory");
            }
        }
        Self { log_file_path }
    }

    pub fn path(&self) -> &Path {
        &self.log_file_path
    }

    async fn append(&self, text: &str) {
        match OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_file_path)
            .await
        {
            Ok(mut file) => {
                if let Err(e) = file.write_all(text.as_bytes()).await {
                    tracing::error!(path = %self.log_file_path.display(), error = %e, "failed to append to log sink");
                }
            }
            Err(e) => {
                tracing::error!(path = %self.log_file_path.display(), error = %e, "failed to open log sink, degrading to stderr");
                tracing::info!(target: "deployment_log", "{}", text.trim_end());
            }
        }
    }

    pub async fn section_started(&self, section: &str) {
        self.append(&format!(
            "--- {section} Started: {} ---\n",
            Utc::now().to_rfc3339()
        ))
        .await;
    }

    pub async fn line(&self, text: &str) {
        self.append(&format!("{text}\n")).await;
    }

    pub async fn section_finished(&self, section: &str) {
        self.append(&format!(
            "--- {section} Finished: {} ---\n",
            Utc::now().to_rfc3339()
        ))
        .await;
    }

    pub async fn section_failed(&self, section: &str, error: &str) {
        self.append(&format!("{error}\n")).await;
        self.append(&format!(
            "--- {section} Failed: {} ---\n",
            Utc::now().to_rfc3339()
        ))
        .await;
    }

    /// Runs a phase bracketed by Started/Finished or Started/Failed markers,
    /// tee-ing the phase's stdout/stderr chunks (if any) into `ring` as well
    /// as the sink, and returns whatever the phase itself returns.
    pub async fn run_phase<T, E, F, Fut>(&self, section: &str, phase: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.section_started(section).await;
        match phase().await {
            Ok(value) => {
                self.section_finished(section).await;
                Ok(value)
            }
            Err(err) => {
                self.section_failed(section, &err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Tee a chunk of child-process output to both the sink and a ring
    /// buffer, one line at a time so a partial UTF-8 boundary in `chunk`
    /// never corrupts the written log.
    pub async fn tee_chunk(&self, chunk: &[u8], ring: &mut OutputRing) {
        ring.push(chunk);
        let text = String::from_utf8_lossy(chunk);
        self.append(&text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("nested").join("deployment-1.log");
        let _sink = LogSink::open(log_path.clone()).await;
        assert!(log_path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn section_lifecycle_frames_content_with_markers() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("deployment-1.log");
        let sink = LogSink::open(log_path.clone()).await;

        sink.section_started("Clone").await;
        sink.line("cloning https://example.com/repo.git").await;
        sink.section_finished("Clone").await;

        let content = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert!(content.contains("--- Clone Started:"));
        assert!(content.contains("cloning https://example.com/repo.git"));
        assert!(content.contains("--- Clone Finished:"));
    }

    #[tokio::test]
    async fn failed_section_writes_error_before_failed_marker() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("deployment-1.log");
        let sink = LogSink::open(log_path.clone()).await;

        sink.section_started("Build").await;
        sink.section_failed("Build", "exit code 1").await;

        let content = tokio::fs::read_to_string(&log_path).await.unwrap();
        let error_pos = content.find("exit code 1").unwrap();
        let failed_pos = content.find("--- Build Failed:").unwrap();
        assert!(error_pos < failed_pos);
    }

    #[tokio::test]
    async fn run_phase_frames_success_with_finished_marker() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("deployment-1.log");
        let sink = LogSink::open(log_path.clone()).await;

        let result: Result<u32, String> = sink.run_phase("Extract", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);

        let content = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert!(content.contains("--- Extract Started:"));
        assert!(content.contains("--- Extract Finished:"));
    }

    #[tokio::test]
    async fn run_phase_frames_failure_with_failed_marker_and_propagates_error() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("deployment-1.log");
        let sink = LogSink::open(log_path.clone()).await;

        let result: Result<u32, String> = sink
            .run_phase("Build", || async { Err("boom".to_string()) })
            .await;
        assert_eq!(result.unwrap_err(), "boom");

        let content = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert!(content.contains("--- Build Failed:"));
        assert!(content.contains("boom"));
    }

    #[tokio::test]
    async fn tee_chunk_writes_to_both_sink_and_ring() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("deployment-1.log");
        let sink = LogSink::open(log_path.clone()).await;
        let mut ring = OutputRing::new(1024);

        sink.tee_chunk(b"building layer 1/5\n", &mut ring).await;

        let content = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert!(content.contains("building layer 1/5"));
        assert!(ring.as_string().contains("building layer 1/5"));
    }

    #[tokio::test]
    async fn opening_sink_in_unwritable_location_does_not_panic() {
        // A path under a file (not a directory) can't have children created.
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("file.txt");
        tokio::fs::write(&not_a_dir, b"x").await.unwrap();
        let log_path = not_a_dir.join("deployment-1.log");

        let sink = LogSink::open(log_path).await;
        // append() degrades to tracing output instead of panicking.
        sink.line("this should not crash").await;
    }
}
