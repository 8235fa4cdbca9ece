//! Privileged host operations needed by the orchestrator: writing proxy
//! config, managing the sites-enabled symlink, reloading the proxy, and
//! chown-ing bind-mount targets to the container runtime's UID.
//!
//! Kept behind a trait so the pipeline stays pure and testable: production
//! code shells out to the host, tests bind an in-memory fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum PrivilegedOpError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to symlink {target} -> {link}: {source}")]
    Symlink {
        target: PathBuf,
        link: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chown of {path} failed: {message}")]
    Chown { path: PathBuf, message: String },

    #[error("proxy reload failed: {message}")]
    Reload { message: String },
}

#[async_trait]
pub trait PrivilegedOps: Send + Sync {
    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), PrivilegedOpError>;
    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), PrivilegedOpError>;
    async fn chown(&self, path: &Path, uid: u32) -> Result<(), PrivilegedOpError>;
    async fn reload_proxy(&self) -> Result<(), PrivilegedOpError>;
}

/// Shells out to the host: plain filesystem writes, `ln -sf`, `chown`, and
/// an operator-configured reload command. Assumes the process already runs
/// with whatever elevation the operator granted it.
pub struct ShellPrivilegedOps {
    reload_command: Vec<String>,
}

impl ShellPrivilegedOps {
    pub fn new(reload_command: Vec<String>) -> Self {
        Self { reload_command }
    }
}

#[async_trait]
impl PrivilegedOps for ShellPrivilegedOps {
    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), PrivilegedOpError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| PrivilegedOpError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(|source| PrivilegedOpError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), PrivilegedOpError> {
        if tokio::fs::symlink_metadata(link).await.is_ok() {
            tokio::fs::remove_file(link)
                .await
                .map_err(|source| PrivilegedOpError::Symlink {
                    target: target.to_path_buf(),
                    link: link.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::symlink(target, link)
            .await
            .map_err(|source| PrivilegedOpError::Symlink {
                target: target.to_path_buf(),
                link: link.to_path_buf(),
                source,
            })
    }

    async fn chown(&self, path: &Path, uid: u32) -> Result<(), PrivilegedOpError> {
        let output = Command::new("chown")
            .arg(uid.to_string())
            .arg(path)
            .output()
            .await
            .map_err(|err| PrivilegedOpError::Chown {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(PrivilegedOpError::Chown {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    async fn reload_proxy(&self) -> Result<(), PrivilegedOpError> {
        let (program, args) = self
            .reload_command
            .split_first()
            .ok_or_else(|| PrivilegedOpError::Reload {
                message: "reload command is empty".to_string(),
            })?;
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|err| PrivilegedOpError::Reload {
                message: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(PrivilegedOpError::Reload {
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// In-memory stand-in used by tests across the workspace.
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakePrivilegedOps {
        pub files: Mutex<HashMap<PathBuf, String>>,
        pub symlinks: Mutex<HashMap<PathBuf, PathBuf>>,
        pub chowns: Mutex<Vec<(PathBuf, u32)>>,
        pub reload_count: Mutex<usize>,
        pub fail_reload: bool,
    }

    #[async_trait]
    impl PrivilegedOps for FakePrivilegedOps {
        async fn write_file(&self, path: &Path, contents: &str) -> Result<(), PrivilegedOpError> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        async fn symlink(&self, target: &Path, link: &Path) -> Result<(), PrivilegedOpError> {
            self.symlinks
                .lock()
                .unwrap()
                .insert(link.to_path_buf(), target.to_path_buf());
            Ok(())
        }

        async fn chown(&self, path: &Path, uid: u32) -> Result<(), PrivilegedOpError> {
            self.chowns.lock().unwrap().push((path.to_path_buf(), uid));
            Ok(())
        }

        async fn reload_proxy(&self) -> Result<(), PrivilegedOpError> {
            *self.reload_count.lock().unwrap() += 1;
            if self.fail_reload {
                return Err(PrivilegedOpError::Reload {
                    message: "forced failure".to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakePrivilegedOps;
    use super::*;

    #[tokio::test]
    async fn fake_records_writes() {
        let ops = FakePrivilegedOps::default();
        ops.write_file(Path::new("/sites-available/deploy-1.conf"), "server {}")
            .await
            .unwrap();
        assert_eq!(
            ops.files
                .lock()
                .unwrap()
                .get(Path::new("/sites-available/deploy-1.conf"))
                .unwrap(),
            "server {}"
        );
    }

    #[tokio::test]
    async fn fake_symlink_is_overwrite_safe() {
        let ops = FakePrivilegedOps::default();
        ops.symlink(Path::new("/a/deploy-1.conf"), Path::new("/b/deploy-1.conf"))
            .await
            .unwrap();
        ops.symlink(Path::new("/a2/deploy-1.conf"), Path::new("/b/deploy-1.conf"))
            .await
            .unwrap();
        assert_eq!(
            ops.symlinks
                .lock()
                .unwrap()
                .get(Path::new("/b/deploy-1.conf"))
                .unwrap(),
            Path::new("/a2/deploy-1.conf")
        );
    }

    #[tokio::test]
    async fn fake_reload_can_be_forced_to_fail() {
        let mut ops = FakePrivilegedOps::default();
        ops.fail_reload = true;
        assert!(ops.reload_proxy().await.is_err());
        assert_eq!(*ops.reload_count.lock().unwrap(), 1);
    }
}
