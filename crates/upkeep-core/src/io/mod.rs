pub mod blockers;
pub mod download;
pub mod process;
