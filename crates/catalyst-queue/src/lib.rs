//! The process-wide Admission Queue (C11): a bounded worker pool draining
//! an unbounded backlog of deployment tasks.

pub mod queue;

pub use queue::{AdmissionQueue, QueueError};
