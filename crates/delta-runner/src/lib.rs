//! # delta-runner
//!
//! Process shell for the delta exchange supervisor:
//!
//! - [`http`] - axum health surface (`/health`, `/readyz`)
//! - [`process`] - top-level control loop, signal handling, exit status

pub mod http;
pub mod process;
