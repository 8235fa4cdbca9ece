//! Progress-so-far tracking for a single deployment attempt, driving
//! compensating cleanup in reverse when the attempt fails.

use std::path::PathBuf;

use tracing::{debug, warn};

/// How far a deployment attempt got before failing. Image and supervisor
/// cleanup are not modeled here; per the design notes they are explicit
/// TODOs left to a later garbage-collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    NothingYet,
    Cloned,
    Built,
    Extracted,
    Started,
    Proxied,
}

pub struct Workspace {
    pub clone_dir: Option<PathBuf>,
    pub build_output_dir: PathBuf,
}

/// Removes whatever working directories a failed attempt created, in
/// reverse order of creation. Best-effort: failures are logged, never
/// propagated, since the deployment has already failed for another reason.
pub async fn compensate(progress: Progress, workspace: &Workspace) {
    debug!(?progress, "running compensating cleanup for failed deployment");
    remove_dir(&workspace.build_output_dir).await;
    if let Some(clone_dir) = &workspace.clone_dir {
        remove_dir(clone_dir).await;
    }
}

async fn remove_dir(path: &std::path::Path) {
    if let Err(err) = tokio::fs::remove_dir_all(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), %err, "failed to clean up working directory after failed deployment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn compensate_removes_build_output_and_clone_dir() {
        let root = TempDir::new().unwrap();
        let build_output = root.path().join("build-output");
        let clone = root.path().join("clone");
        tokio::fs::create_dir_all(&build_output).await.unwrap();
        tokio::fs::create_dir_all(&clone).await.unwrap();

        let workspace = Workspace {
            clone_dir: Some(clone.clone()),
            build_output_dir: build_output.clone(),
        };
        compensate(Progress::Extracted, &workspace).await;

        assert!(!build_output.exists());
        assert!(!clone.exists());
    }

    #[tokio::test]
    async fn compensate_before_any_progress_does_not_touch_clone_dir() {
        let root = TempDir::new().unwrap();
        let build_output = root.path().join("build-output");
        tokio::fs::create_dir_all(&build_output).await.unwrap();

        let workspace = Workspace {
            clone_dir: None,
            build_output_dir: build_output.clone(),
        };
        compensate(Progress::NothingYet, &workspace).await;
        assert!(!build_output.exists());
    }

    #[tokio::test]
    async fn compensate_on_a_missing_directory_does_not_panic() {
        let workspace = Workspace {
            clone_dir: Some(PathBuf::from("/nonexistent/clone/dir")),
            build_output_dir: PathBuf::from("/nonexistent/build-output"),
        };
        compensate(Progress::Built, &workspace).await;
    }
}
