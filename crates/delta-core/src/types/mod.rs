//! Core data types shared by every crate in the workspace.

pub mod enums;
pub mod exchange;

pub use enums::*;
pub use exchange::*;
