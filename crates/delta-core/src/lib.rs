//! # delta-core
//!
//! Core crate for the delta exchange supervisor, providing:
//!
//! - **Types** (`types`) - venue tags, per-exchange config, credentials
//! - **Configuration** (`config`) - JSON file + `.env` + environment overrides
//! - **Error types** (`error`) - domain-specific `DeltaError` via thiserror
//! - **Deadlines** (`deadline`) - absolute deadlines shared by lifecycle calls
//! - **Telemetry** (`telemetry`) - injected reporting capability with event export
//! - **Logging** (`logging`) - tracing-based structured logging

pub mod config;
pub mod deadline;
pub mod error;
pub mod logging;
pub mod telemetry;
pub mod types;

// Re-export types at crate root for convenience.
pub use deadline::Deadline;
pub use types::*;
