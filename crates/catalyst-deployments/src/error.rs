//! Top-level error type composing every component's typed failure.

use catalyst_deployer::{BuildError, ExtractError, PlanError};
use catalyst_git::FetchError;
use catalyst_proxy::ProxyError;
use catalyst_supervisor::{PortAllocatorError, SuperviseError};
use thiserror::Error;

use crate::url_minter::MintError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("build planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("git fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("image build failed: {0}")]
    Build(#[from] BuildError),

    #[error("artifact extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("port allocation failed: {0}")]
    Port(#[from] PortAllocatorError),

    #[error("app supervisor failed: {0}")]
    Supervise(#[from] SuperviseError),

    #[error("proxy configuration failed: {0}")]
    Proxy(#[from] ProxyError),

    #[error("URL minting failed: {0}")]
    Mint(#[from] MintError),

    /// A database write at a terminal transition failed. The deployment
    /// row is left in an inconsistent state; logged with a FATAL marker
    /// by the caller.
    #[error("failed to persist terminal deployment status: {0}")]
    State(#[source] sea_orm::DbErr),
}
