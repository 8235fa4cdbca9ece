//! Deployment State Machine (C10) and URL Minter (C9): drives a single
//! deployment through every other component and records its outcome.

pub mod cleanup;
pub mod context;
pub mod error;
pub mod state_machine;
pub mod url_minter;

pub use context::{DeploymentTask, OrchestratorContext};
pub use error::OrchestratorError;
pub use state_machine::run;
pub use url_minter::{mint, MintError};
