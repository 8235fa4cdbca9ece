//! Git Fetcher (C3): clones the source for a deployment using the owning
//! user's Git provider credentials.

pub mod fetcher;

pub use fetcher::{fetch, FetchError, FetchedRepository};
