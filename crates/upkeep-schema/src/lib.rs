//! Shared types for upkeep.
//!
//! Everything here is plain data: release metadata published by providers,
//! per-architecture install instructions, and what the detection layer saw
//! on the machine. No I/O happens in this crate.

pub mod arch;
pub mod detected;
pub mod hash;
pub mod types;

// Re-exports
pub use arch::*;
pub use detected::DetectedSoftware;
pub use hash::*;
pub use types::*;
