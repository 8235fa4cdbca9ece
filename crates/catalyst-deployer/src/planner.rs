//! Build Planner (C4): chooses which Dockerfile backs the image build and
//! rejects project shapes that can't be built at all.

use std::path::{Path, PathBuf};

use catalyst_entities::DockerfileSource;
use thiserror::Error;
use tracing::debug;

const NEXT_CONFIG_CANDIDATES: [&str; 3] = ["next.config.js", "next.config.mjs", "next.config.ts"];
const DEFAULT_STANDALONE_DOCKERFILE: &str = "Dockerfile.default-standalone";
const DEFAULT_CLASSIC_DOCKERFILE: &str = "Dockerfile.default-classic";

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("No Dockerfile found and no supported framework detected; add a Dockerfile")]
    NoDockerfileNoFramework,

    #[error("framework {framework} requires default Dockerfile {path}, which is missing from the orchestrator's install")]
    MissingDefaultDockerfile { framework: String, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub dockerfile_path: PathBuf,
    pub source: DockerfileSource,
}

/// Directory holding the orchestrator's bundled default Dockerfiles, kept
/// separate from any single deployment's clone directory.
pub struct DefaultDockerfiles {
    pub dir: PathBuf,
}

pub fn plan(repo_dir: &Path, defaults: &DefaultDockerfiles) -> Result<BuildPlan, PlanError> {
    let user_dockerfile = repo_dir.join("Dockerfile");
    let framework = detect_next_js(repo_dir)?;

    if user_dockerfile.exists() {
        let source = match &framework {
            Some(NextJsConfig { declares_standalone: true, .. }) => DockerfileSource::User,
            _ => DockerfileSource::UserClassicAssumed,
        };
        debug!(?source, "using repository-provided Dockerfile");
        return Ok(BuildPlan {
            dockerfile_path: user_dockerfile,
            source,
        });
    }

    let Some(framework) = framework else {
        return Err(PlanError::NoDockerfileNoFramework);
    };

    let (source, default_name) = if framework.declares_standalone {
        (DockerfileSource::DefaultStandalone, DEFAULT_STANDALONE_DOCKERFILE)
    } else {
        (DockerfileSource::DefaultClassic, DEFAULT_CLASSIC_DOCKERFILE)
    };

    let dockerfile_path = defaults.dir.join(default_name);
    if !dockerfile_path.exists() {
        return Err(PlanError::MissingDefaultDockerfile {
            framework: "next.js".to_string(),
            path: dockerfile_path,
        });
    }

    Ok(BuildPlan {
        dockerfile_path,
        source,
    })
}

struct NextJsConfig {
    declares_standalone: bool,
}

fn detect_next_js(repo_dir: &Path) -> Result<Option<NextJsConfig>, PlanError> {
    for candidate in NEXT_CONFIG_CANDIDATES {
        let path = repo_dir.join(candidate);
        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| PlanError::Io {
                path: path.clone(),
                source,
            })?;
            return Ok(Some(NextJsConfig {
                declares_standalone: declares_standalone_output(&contents),
            }));
        }
    }

    let package_json = repo_dir.join("package.json");
    if package_json.exists() {
        let contents = std::fs::read_to_string(&package_json).map_err(|source| PlanError::Io {
            path: package_json.clone(),
            source,
        })?;
        if package_json_declares_next(&contents) {
            return Ok(Some(NextJsConfig {
                declares_standalone: false,
            }));
        }
    }

    Ok(None)
}

fn package_json_declares_next(contents: &str) -> bool {
    let parsed: serde_json::Value = match serde_json::from_str(contents) {
        Ok(value) => value,
        Err(_) => return false,
    };
    ["dependencies", "devDependencies"]
        .iter()
        .any(|key| parsed.get(key).and_then(|deps| deps.get("next")).is_some())
}

/// Case-insensitive search for `output:` adjacent to a `standalone` literal
/// in any of the three quoting styles Next.js config files use.
fn declares_standalone_output(contents: &str) -> bool {
    let lower = contents.to_lowercase();
    ["\"standalone\"", "'standalone'", "`standalone`"]
        .iter()
        .any(|quoted| {
            lower
                .find(quoted)
                .map(|idx| {
                    let window_start = idx.saturating_sub(40);
                    lower[window_start..idx].contains("output")
                })
                .unwrap_or(false)
        })
}
