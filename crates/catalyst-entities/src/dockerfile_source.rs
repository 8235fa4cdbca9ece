//! The `Deployment.dockerfileUsed` enum produced by the Build Planner.

use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DockerfileSource {
    /// No build has completed yet; never persisted on a `success` row.
    #[default]
    #[sea_orm(string_value = "unknown")]
    Unknown,
    /// Repo-provided `Dockerfile`, framework config declares standalone output.
    #[sea_orm(string_value = "user")]
    User,
    /// Repo-provided `Dockerfile`, framework detected but standalone output
    /// not declared (or no framework config at all).
    #[sea_orm(string_value = "user_classic_assumed")]
    UserClassicAssumed,
    /// Platform-provided Dockerfile for a Next.js app with standalone output.
    #[sea_orm(string_value = "default_standalone")]
    DefaultStandalone,
    /// Platform-provided Dockerfile for a Next.js app without standalone output.
    #[sea_orm(string_value = "default_classic")]
    DefaultClassic,
}

impl DockerfileSource {
    /// Per design note 4.10.4: which runtime start strategy the App
    /// Supervisor should use for a given planner decision.
    pub fn build_type(self) -> BuildType {
        match self {
            DockerfileSource::DefaultClassic | DockerfileSource::UserClassicAssumed => {
                BuildType::Classic
            }
            DockerfileSource::User
            | DockerfileSource::DefaultStandalone
            | DockerfileSource::Unknown => BuildType::Standalone,
        }
    }
}

/// How the App Supervisor should launch the extracted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    /// Run the pre-built `server.js` entrypoint directly.
    Standalone,
    /// Run the project's local framework CLI against `node_modules`.
    Classic,
}

impl std::fmt::Display for DockerfileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DockerfileSource::Unknown => "unknown",
            DockerfileSource::User => "user",
            DockerfileSource::UserClassicAssumed => "user_classic_assumed",
            DockerfileSource::DefaultStandalone => "default_standalone",
            DockerfileSource::DefaultClassic => "default_classic",
        };
        write!(f, "{s}")
    }
}
