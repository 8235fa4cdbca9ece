//! Schema migrations for the orchestrator's own tables.
//!
//! Scoped to the four tables the orchestrator reads or writes (§3); schema
//! migrations for the rest of the product surface are an external concern.

pub use sea_orm_migration::prelude::*;

mod migration;

pub use migration::Migrator;
