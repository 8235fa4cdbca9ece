//! Build Planner (C4), Image Builder (C5), and Artifact Extractor (C6):
//! turns a cloned repository into extracted runtime artifacts on disk.

pub mod builder;
pub mod extractor;
pub mod planner;

pub use builder::{BuildError, CliImageBuilder, ImageBuilder};
pub use extractor::{extract, ExtractError, ExtractOptions};
pub use planner::{plan, BuildPlan, DefaultDockerfiles, PlanError};
