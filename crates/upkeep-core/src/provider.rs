//! The capability every catalog entry implements.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use upkeep_schema::{DetectedSoftware, ReleaseInfo};

use crate::io::process::InstallCommand;

/// A program that has to run before the installer, e.g. an uninstaller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreUpdateStep {
    pub program: PathBuf,
    pub args: String,
}

impl PreUpdateStep {
    pub fn new(program: impl Into<PathBuf>, args: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: args.into(),
        }
    }

    pub fn command(&self) -> InstallCommand {
        InstallCommand::new(self.program.clone(), self.args.clone())
    }
}

/// One vendor's product: release metadata plus update quirks.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifiers, lowercase, first one canonical.
    fn ids(&self) -> Vec<String>;

    /// Built-in release information.
    fn known_info(&self) -> ReleaseInfo;

    /// Whether [`Provider::search_for_newer`] does anything useful.
    fn implements_search_for_newer(&self) -> bool;

    /// Ask the vendor for release information newer than the built-in data.
    async fn search_for_newer(&self, client: &Client) -> anyhow::Result<ReleaseInfo>;

    /// Names of processes that must not run while the installer does.
    fn blocker_processes(&self, _detected: &DetectedSoftware) -> Vec<String> {
        Vec::new()
    }

    fn needs_pre_update(&self, _detected: &DetectedSoftware) -> bool {
        false
    }

    fn pre_update_steps(&self, _detected: &DetectedSoftware) -> Vec<PreUpdateStep> {
        Vec::new()
    }

    /// Whether `detected` is older than `info.newest_version`.
    fn needs_update(&self, detected: &DetectedSoftware, info: &ReleaseInfo) -> bool {
        version_is_older(detected.display_version.as_deref(), &info.newest_version)
    }
}

/// Case-insensitive lexicographic comparison: true iff `detected` sorts
/// strictly before `newest`.
///
/// This is a string comparison, not a numeric one: `"1.2"` sorts after
/// `"1.10"`. A missing version sorts before everything.
pub fn version_is_older(detected: Option<&str>, newest: &str) -> bool {
    detected.unwrap_or_default().to_lowercase() < newest.to_lowercase()
}
