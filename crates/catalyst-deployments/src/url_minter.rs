//! URL Minter (C9): produces a unique public hostname for a deployment,
//! retrying on collision before falling back to a deterministic name.

use catalyst_entities::{deployments, DeploymentStatus};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use thiserror::Error;

const MAX_NAME_LEN: usize = 20;
const SUFFIX_LEN: usize = 5;
const MAX_ATTEMPTS: u32 = 5;

#[derive(Error, Debug)]
pub enum MintError {
    #[error("database error checking URL uniqueness: {0}")]
    Database(#[from] DbErr),

    #[error("exhausted {attempts} collision retries and the deterministic fallback also collided")]
    Exhausted { attempts: u32 },
}

/// Produces `<sanitized-project-name>-<rand5>.<platform_domain>`, retrying
/// on collision against active (`deploying`/`success`) deployments, then
/// falling back to `deploy-<id>.<platform_domain>`.
pub async fn mint(
    db: &DatabaseConnection,
    project_name: &str,
    platform_domain: &str,
    deployment_id: i32,
) -> Result<String, MintError> {
    let sanitized = sanitize(project_name);

    if !sanitized.is_empty() {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = format!("{sanitized}-{}.{platform_domain}", random_suffix());
            if !url_in_use(db, &candidate).await? {
                return Ok(candidate);
            }
        }
    }

    let fallback = format!("deploy-{deployment_id}.{platform_domain}");
    if url_in_use(db, &fallback).await? {
        return Err(MintError::Exhausted {
            attempts: MAX_ATTEMPTS,
        });
    }
    Ok(fallback)
}

async fn url_in_use(db: &DatabaseConnection, url: &str) -> Result<bool, DbErr> {
    let count = deployments::Entity::find()
        .filter(deployments::Column::DeploymentUrl.eq(url))
        .filter(deployments::Column::Status.is_in([DeploymentStatus::Deploying, DeploymentStatus::Success]))
        .count(db)
        .await?;
    Ok(count > 0)
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Lowercase, whitespace to `-`, strip anything outside `[a-z0-9-]`,
/// collapse runs of `-`, trim leading/trailing `-`, truncate to 20 chars.
fn sanitize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    let mut previous_dash = false;
    for c in replaced.chars() {
        if c == '-' {
            if !previous_dash {
                collapsed.push(c);
            }
            previous_dash = true;
        } else {
            collapsed.push(c);
            previous_dash = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_lowercases_and_replaces_whitespace() {
        assert_eq!(sanitize("My Cool App"), "my-cool-app");
    }

    #[test]
    fn sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize("widgets!!!"), "widgets");
    }

    #[test]
    fn sanitize_collapses_dash_runs_and_trims_edges() {
        assert_eq!(sanitize("  -- widgets -- "), "widgets");
    }

    #[test]
    fn sanitize_truncates_to_twenty_characters() {
        let long_name = "a".repeat(40);
        assert_eq!(sanitize(&long_name).len(), MAX_NAME_LEN);
    }

    #[test]
    fn sanitize_of_a_single_character_name_is_still_valid() {
        assert_eq!(sanitize("x"), "x");
    }

    #[test]
    fn sanitize_of_only_disallowed_characters_yields_empty_string() {
        assert_eq!(sanitize("!!!"), "");
    }

    #[tokio::test]
    async fn mint_falls_back_cleanly_when_the_name_sanitizes_to_empty() {
        use catalyst_migrations::{Migrator, MigratorTrait};
        use sea_orm::Database;

        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let minted = mint(&db, "!!!", "example.app", 7).await.unwrap();
        assert_eq!(minted, "deploy-7.example.app");
    }
}
