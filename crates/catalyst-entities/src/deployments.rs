//! One attempt to produce and expose a running instance of a [`super::projects::Model`].
//!
//! `status` only ever advances along the DAG enforced by
//! [`crate::deployment_status::DeploymentStatus::can_transition_to`]; the
//! state machine (C10) is the only writer of this table.

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

use crate::deployment_status::DeploymentStatus;
use crate::dockerfile_source::DockerfileSource;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deployments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub project_id: i32,
    pub status: DeploymentStatus,
    /// Commit identifier captured at clone time; `"TBD"` until C3 succeeds.
    pub version: String,
    pub deployment_url: Option<String>,
    pub internal_port: Option<i32>,
    pub build_output_path: Option<String>,
    pub dockerfile_used: DockerfileSource,
    /// Only set when `status = failed`.
    pub error_message: Option<String>,
    pub log_file_path: Option<String>,
    pub created_at: catalyst_core::UtcDateTime,
    pub updated_at: catalyst_core::UtcDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id"
    )]
    Project,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
            if self.version.is_not_set() {
                self.version = Set("TBD".to_string());
            }
        } else {
            self.updated_at = Set(now);
        }
        Ok(self)
    }
}
