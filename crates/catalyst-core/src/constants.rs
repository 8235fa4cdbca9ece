//! Defaults referenced by more than one crate.
//!
//! Single values used by exactly one crate live next to their use site
//! instead of here.

/// Default lower bound of the internal port range probed by the port allocator.
pub const DEFAULT_PORT_RANGE_START: u16 = 4001;

/// Default upper bound (inclusive) of the internal port range.
pub const DEFAULT_PORT_RANGE_END: u16 = 4999;

/// Default admission ceiling when `MAX_CONCURRENT_DEPLOYMENTS` is unset.
pub const DEFAULT_MAX_CONCURRENT_DEPLOYMENTS: usize = 1;

/// Minimum per-probe timeout for the port allocator, per the concurrency model.
pub const MIN_PORT_PROBE_TIMEOUT_MS: u64 = 250;

/// Minimum clone timeout for the git fetcher.
pub const MIN_CLONE_TIMEOUT_SECS: u64 = 60;

/// Minimum readiness-polling window for the app supervisor.
pub const MIN_SUPERVISE_TIMEOUT_SECS: u64 = 30;

/// Tick interval while polling supervisor readiness.
pub const SUPERVISE_POLL_TICK_MS: u64 = 1000;

/// Bound applied to `Deployment.errorMessage` before it is persisted.
pub const MAX_ERROR_MESSAGE_LEN: usize = 2000;

/// Number of characters kept from stderr tails surfaced in build/clone errors.
pub const STDERR_TAIL_LEN: usize = 4000;
