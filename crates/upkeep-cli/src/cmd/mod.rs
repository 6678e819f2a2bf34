//! Subcommands and the options they share.

pub mod check;
pub mod completions;
pub mod detect;
pub mod id;
pub mod update;

use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Client;
use upkeep_core::config::{ConfigError, ExclusionList, Settings};
use upkeep_core::detect::{Detector, RegistryDetector, SnapshotDetector};
use upkeep_core::orchestrator::DEFAULT_TIMEOUT;
use upkeep_core::{QueryEntry, catalog, paths};
use upkeep_schema::DetectedSoftware;

use crate::Cli;

/// Smallest timeout accepted on the command line.
pub const MIN_CLI_TIMEOUT: u64 = 120;

/// Settings file, environment and flags merged into one view.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub timeout: u64,
    pub auto_get_newer: bool,
    pub excluded: ExclusionList,
    pub detected: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

impl RunOptions {
    /// Merge defaults, the settings file and the command line.
    ///
    /// An explicitly named settings file must exist; the default one is optional.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let settings = match &cli.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load_or_default(paths::config_path().as_deref())?,
        };

        let timeout = match cli.timeout {
            Some(t) if t < MIN_CLI_TIMEOUT => {
                tracing::warn!(
                    "Timeout of {t} seconds is less than {MIN_CLI_TIMEOUT} seconds, using {DEFAULT_TIMEOUT} seconds instead"
                );
                DEFAULT_TIMEOUT
            }
            Some(t) => t,
            None => settings.timeout,
        };

        let excluded = ExclusionList::parse(settings.exclude.iter().chain(&cli.exclude))?;

        Ok(Self {
            timeout,
            auto_get_newer: settings.auto_get_newer && !cli.no_newer,
            excluded,
            detected: cli.detected.clone(),
            cache_dir: settings.cache_dir,
        })
    }

    /// Snapshot file if one was given, the registry otherwise.
    pub fn detector(&self) -> Box<dyn Detector> {
        match &self.detected {
            Some(path) => Box::new(SnapshotDetector::new(path)),
            None => Box::new(RegistryDetector),
        }
    }

    pub fn detect(&self) -> Result<Vec<DetectedSoftware>> {
        self.detector()
            .detect()
            .context("Failed to detect installed software")
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(paths::cache_dir)
            .context("Could not determine a directory for downloads")
    }

    /// Detect installed software and match it against the catalog.
    pub async fn plan(&self, client: &Client) -> Result<Vec<QueryEntry>> {
        let detected = self.detect()?;
        tracing::debug!("Detected {} application(s)", detected.len());
        let catalog = catalog::all(client, self.auto_get_newer, &self.excluded);
        upkeep_core::query(&catalog, &detected)
            .await
            .context("Failed to match installed software against the catalog")
    }
}

pub fn http_client() -> Result<Client> {
    upkeep_core::http_client().context("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("upkeep").chain(args.iter().copied()))
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("upkeep.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_short_timeout_is_raised() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "");
        let config = config.to_str().unwrap();

        let options = RunOptions::resolve(&cli(&["--config", config, "-t", "30", "check"])).unwrap();
        assert_eq!(options.timeout, DEFAULT_TIMEOUT);

        let options = RunOptions::resolve(&cli(&["--config", config, "-t", "600", "check"])).unwrap();
        assert_eq!(options.timeout, 600);
    }

    #[test]
    fn test_flags_override_settings() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "timeout = 300\nexclude = [\"git\"]\n");
        let config = config.to_str().unwrap();

        let options = RunOptions::resolve(&cli(&["--config", config, "check"])).unwrap();
        assert_eq!(options.timeout, 300);
        assert!(options.auto_get_newer);
        assert!(options.excluded.contains("git"));

        let options =
            RunOptions::resolve(&cli(&["--config", config, "--no-newer", "-e", "PuTTY", "-t", "200", "check"]))
                .unwrap();
        assert_eq!(options.timeout, 200);
        assert!(!options.auto_get_newer);
        assert!(options.excluded.contains("git"));
        assert!(options.excluded.contains("putty"));
    }

    #[test]
    fn test_duplicate_exclusion_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "");
        let config = config.to_str().unwrap();

        let result = RunOptions::resolve(&cli(&["--config", config, "-e", "git", "-e", "GIT", "check"]));
        assert!(matches!(result, Err(ConfigError::DuplicateExclusion(id)) if id == "git"));

        let result = RunOptions::resolve(&cli(&["--config", config, "-e", " ", "check"]));
        assert!(matches!(result, Err(ConfigError::BlankExclusion)));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let result = RunOptions::resolve(&cli(&["--config", missing.to_str().unwrap(), "check"]));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
