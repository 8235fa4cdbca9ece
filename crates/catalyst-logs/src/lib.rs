//! The per-deployment Log Sink (C1): a section-framed append-only file,
//! independent of the operator-facing `tracing` output the rest of the
//! orchestrator emits.

pub mod file_logs;

pub use file_logs::LogSink;
