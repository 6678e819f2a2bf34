//! Executes an update plan: download, verify, install, clean up.
//!
//! Entries are processed strictly one after another. Integrity and
//! precondition failures abort the whole run; an installer that fails or
//! has to be killed only costs its own entry.

use std::fmt;
use std::io;
use std::path::Path;

use thiserror::Error;
use upkeep_schema::{AppType, DetectedSoftware, HashAlgorithm, InstallInfo, InstallerKind, Signature};

use crate::checksum::{self, ChecksumError};
use crate::io::blockers::{ProcessProbe, SystemProbe};
use crate::io::download::{DownloadError, Downloader};
use crate::io::process::{self, InstallCommand, Launcher, ProcessOutcome, SystemLauncher};
use crate::planner::QueryEntry;
use crate::trust::{SignatureCheck, TrustVerifier};

/// Installer timeout used when none (or a too short one) is given.
pub const DEFAULT_TIMEOUT: u64 = 120;

/// Timeouts at or below this many seconds are replaced by [`DEFAULT_TIMEOUT`].
pub const MIN_TIMEOUT: u64 = 10;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("there is nothing to update")]
    EmptyPlan,

    #[error("no install information for {name} ({app_type})")]
    MissingInstallInfo { name: String, app_type: AppType },

    #[error("refusing to install {name}: no checksum to verify the download against")]
    MissingChecksum { name: String },

    #[error("no download URL for {name}")]
    MissingDownloadUrl { name: String },

    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("could not compute checksum: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("signature of {name} rejected: {reason}")]
    SignatureRejected { name: String, reason: String },
}

impl UpdateError {
    /// Errors that mean the downloaded code must not be trusted.
    pub fn is_trust_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingChecksum { .. }
                | Self::ChecksumMismatch { .. }
                | Self::SignatureRejected { .. }
        )
    }
}

/// A run that stopped early, with the number of updates completed before.
#[derive(Error, Debug)]
#[error("update run aborted after {updated} successful update(s): {reason}")]
pub struct RunAborted {
    pub updated: usize,
    #[source]
    pub reason: UpdateError,
}

impl RunAborted {
    /// `-1 - updated`, so the partial count survives in a single integer.
    pub fn code(&self) -> i64 {
        -1 - self.updated as i64
    }
}

/// Encode a run result as a signed integer: the success count, or
/// `-1 - successes` if the run was aborted.
pub fn encode_result(result: &Result<usize, RunAborted>) -> i64 {
    match result {
        Ok(updated) => *updated as i64,
        Err(aborted) => aborted.code(),
    }
}

/// Substitute the default for timeouts that are too short.
pub fn effective_timeout(timeout_secs: u64) -> u64 {
    if timeout_secs <= MIN_TIMEOUT {
        DEFAULT_TIMEOUT
    } else {
        timeout_secs
    }
}

/// Command line that runs `file` according to `install`.
pub fn install_command(install: &InstallInfo, file: &Path, detected: &DetectedSoftware) -> InstallCommand {
    match install.kind {
        InstallerKind::Exe => InstallCommand::new(file, install.silent_switches.clone()),
        InstallerKind::Msi => InstallCommand::new(
            "msiexec.exe",
            format!("/i \"{}\" {}", file.display(), install.silent_switches)
                .trim_end()
                .to_string(),
        ),
        InstallerKind::ExeTargetDir => {
            let mut args = install.silent_switches.clone();
            if let Some(dir) = detected
                .install_path
                .as_deref()
                .map(|p| p.trim().trim_end_matches('\\'))
                .filter(|p| !p.is_empty())
            {
                args.push_str(" /D ");
                args.push_str(dir);
            }
            InstallCommand::new(file, args)
        }
    }
}

/// Computes the hex digest of a downloaded file.
pub type Hasher = fn(&Path, HashAlgorithm) -> Result<String, ChecksumError>;

/// Per-entry result that does not abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Updated,
    Skipped,
    Failed,
}

pub struct Updater {
    downloader: Downloader,
    trust: TrustVerifier,
    launcher: Box<dyn Launcher>,
    probe: Box<dyn ProcessProbe>,
    hasher: Hasher,
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("downloader", &self.downloader)
            .field("trust", &self.trust)
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Updater using real processes, the local process table and Authenticode.
    pub fn new(downloader: Downloader) -> Self {
        Self {
            downloader,
            trust: TrustVerifier::default(),
            launcher: Box::new(SystemLauncher),
            probe: Box::new(SystemProbe),
            hasher: checksum::calculate,
        }
    }

    pub fn with_launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    pub fn with_probe(mut self, probe: impl ProcessProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_trust(mut self, trust: TrustVerifier) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Update every entry of `plan` that needs it.
    ///
    /// Returns the number of successful updates, or [`RunAborted`] carrying
    /// the number completed before a fatal error.
    pub async fn run(&self, plan: &[QueryEntry], timeout_secs: u64) -> Result<usize, RunAborted> {
        if plan.is_empty() {
            return Err(RunAborted {
                updated: 0,
                reason: UpdateError::EmptyPlan,
            });
        }
        let timeout = effective_timeout(timeout_secs);

        let mut updated = 0;
        for entry in plan.iter().filter(|e| e.needs_update) {
            match self.update_entry(entry, timeout).await {
                Ok(EntryOutcome::Updated) => updated += 1,
                Ok(EntryOutcome::Skipped | EntryOutcome::Failed) => {}
                Err(reason) => {
                    tracing::error!("Aborting update run: {reason}");
                    return Err(RunAborted { updated, reason });
                }
            }
        }

        tracing::info!("{updated} application(s) updated");
        Ok(updated)
    }

    async fn update_entry(&self, entry: &QueryEntry, timeout: u64) -> Result<EntryOutcome, UpdateError> {
        let info = entry.software.info().await;
        let name = info.name.as_str();

        if entry.app_type == AppType::Unknown {
            tracing::warn!("Unknown architecture for {}, skipping it", entry.detected);
            return Ok(EntryOutcome::Skipped);
        }
        let install = info
            .install_info(entry.app_type)
            .ok_or_else(|| UpdateError::MissingInstallInfo {
                name: name.to_string(),
                app_type: entry.app_type,
            })?;

        if !install.has_checksum() {
            return Err(UpdateError::MissingChecksum {
                name: name.to_string(),
            });
        }
        if !install.has_download_url() {
            return Err(UpdateError::MissingDownloadUrl {
                name: name.to_string(),
            });
        }

        let running = self
            .probe
            .running(&entry.software.blocker_processes(&entry.detected));
        if !running.is_empty() {
            tracing::warn!("Skipping {name}: close {} first", running.join(", "));
            return Ok(EntryOutcome::Skipped);
        }

        tracing::info!(
            "Updating {name} from {} to {}",
            entry.detected.display_version.as_deref().unwrap_or("?"),
            info.newest_version
        );
        let file = self
            .downloader
            .download(&install.download_url, install.kind.extension())
            .await
            .map_err(|source| UpdateError::Download {
                url: install.download_url.clone(),
                source,
            })?;

        let result = self.install_downloaded(entry, name, install, &file, timeout).await;

        if let Err(e) = tokio::fs::remove_file(&file).await {
            tracing::warn!("Could not delete downloaded file {}: {e}", file.display());
        }
        result
    }

    async fn install_downloaded(
        &self,
        entry: &QueryEntry,
        name: &str,
        install: &InstallInfo,
        file: &Path,
        timeout: u64,
    ) -> Result<EntryOutcome, UpdateError> {
        let expected = install.checksum.clone().unwrap_or_default();
        let path = file.to_path_buf();
        let algorithm = install.algorithm;
        let hasher = self.hasher;
        let actual = tokio::task::spawn_blocking(move || hasher(&path, algorithm))
            .await
            .map_err(|e| ChecksumError::Io {
                path: file.to_path_buf(),
                source: io::Error::other(e),
            })??;
        if !checksum::are_equal(&actual, &expected) {
            return Err(UpdateError::ChecksumMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        tracing::debug!("Checksum of {} verified", file.display());

        if let Some(signature) = &install.signature {
            self.check_signature(name, file, signature)?;
        }

        if entry.software.needs_pre_update(&entry.detected) {
            for step in entry.software.pre_update_steps(&entry.detected) {
                let command = step.command();
                tracing::info!("Running pre-update step: {command}");
                match self.supervise(&command, timeout).await {
                    Ok(outcome) if outcome.is_success() => {}
                    Ok(outcome) => {
                        tracing::warn!("Pre-update step for {name} failed ({outcome:?}), skipping update");
                        return Ok(EntryOutcome::Failed);
                    }
                    Err(e) => {
                        tracing::warn!("Could not run pre-update step for {name}: {e}");
                        return Ok(EntryOutcome::Failed);
                    }
                }
            }
        }

        let command = install_command(install, file, &entry.detected);
        tracing::debug!("Starting installer: {command}");
        match self.supervise(&command, timeout).await {
            Ok(ProcessOutcome::Exited { code: 0 }) => {
                tracing::info!("Updated {name}");
                Ok(EntryOutcome::Updated)
            }
            Ok(ProcessOutcome::Exited { code }) => {
                tracing::warn!("Installer of {name} exited with code {code}");
                Ok(EntryOutcome::Failed)
            }
            Ok(ProcessOutcome::TimedOut) => {
                tracing::warn!("Installer of {name} did not finish within {timeout}s and was terminated");
                Ok(EntryOutcome::Failed)
            }
            Err(e) => {
                tracing::warn!("Could not start installer of {name}: {e}");
                Ok(EntryOutcome::Failed)
            }
        }
    }

    fn check_signature(&self, name: &str, file: &Path, signature: &Signature) -> Result<(), UpdateError> {
        let rejected = |reason: String| UpdateError::SignatureRejected {
            name: name.to_string(),
            reason,
        };
        match self.trust.check(file, signature) {
            SignatureCheck::Verified => {
                tracing::debug!("Signature of {name} verified");
                Ok(())
            }
            SignatureCheck::Expired => {
                tracing::debug!("Expected signature of {name} has expired, not checking it");
                Ok(())
            }
            SignatureCheck::Unavailable(reason) => {
                tracing::warn!("Cannot check signature of {name}: {reason}");
                Ok(())
            }
            SignatureCheck::Invalid => Err(rejected("signature is missing or invalid".to_string())),
            SignatureCheck::SubjectMismatch { actual } => Err(rejected(format!(
                "signed by {}, expected {}",
                actual.as_deref().unwrap_or("nobody"),
                signature.publisher
            ))),
        }
    }

    async fn supervise(&self, command: &InstallCommand, timeout: u64) -> io::Result<ProcessOutcome> {
        let mut child = self.launcher.launch(command)?;
        tokio::task::spawn_blocking(move || process::supervise(child.as_mut(), timeout))
            .await
            .map_err(io::Error::other)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::process::RunningProcess;
    use crate::io::process::tests::{ScriptedLauncher, ScriptedProcess};
    use crate::provider::PreUpdateStep;
    use crate::resolver::ReleaseInfoResolver;
    use crate::resolver::tests::{FakeProvider, release};
    use crate::trust::{SignaturePrimitive, SignerInfo, TrustError};
    use mockito::Server;
    use reqwest::{Client, Url};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;
    use upkeep_schema::{HashAlgorithm, ReleaseInfo};

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn cache(&self) -> PathBuf {
            self.dir.path().join("cache")
        }

        fn cached_files(&self) -> usize {
            std::fs::read_dir(self.cache()).map_or(0, Iterator::count)
        }

        /// Write an installer next to the cache and return release info pointing at it.
        fn release(&self, name: &str, version: &str) -> ReleaseInfo {
            let source = self.dir.path().join(format!("{name}-{version}.exe"));
            std::fs::write(&source, format!("{name} {version} installer")).unwrap();
            let sha256 = checksum::calculate(&source, HashAlgorithm::Sha256).unwrap();
            let url = Url::from_file_path(&source).unwrap().to_string();

            let mut info = release(name, version);
            for install in info.installers_mut() {
                install.download_url = url.clone();
                install.checksum = Some(sha256.to_uppercase());
            }
            info
        }

        fn updater(&self, launcher: ScriptedLauncher) -> Updater {
            Updater::new(Downloader::new(Client::new(), self.cache()))
                .with_launcher(launcher)
                .with_probe(NothingRunning)
        }
    }

    struct NothingRunning;

    impl ProcessProbe for NothingRunning {
        fn running(&self, _names: &[String]) -> Vec<String> {
            Vec::new()
        }
    }

    struct Running(&'static str);

    impl ProcessProbe for Running {
        fn running(&self, names: &[String]) -> Vec<String> {
            names.iter().filter(|n| n.as_str() == self.0).cloned().collect()
        }
    }

    struct SignedBy(&'static str);

    impl SignaturePrimitive for SignedBy {
        fn inspect(&self, _path: &Path) -> Result<SignerInfo, TrustError> {
            Ok(SignerInfo {
                valid: true,
                subject: Some(self.0.to_string()),
            })
        }
    }

    fn entry(provider: FakeProvider, app_type: AppType) -> QueryEntry {
        let name = provider.info.name.clone();
        QueryEntry {
            software: Arc::new(ReleaseInfoResolver::new(Box::new(provider), Client::new(), false)),
            detected: DetectedSoftware::new(name, "0.1", Some("C:\\Program Files\\Tool\\".to_string())),
            app_type,
            needs_update: true,
        }
    }

    #[tokio::test]
    async fn test_single_successful_update() {
        let fx = Fixture::new();
        let launcher = ScriptedLauncher::new(vec![Some((5, 0))]);
        let launched = Arc::clone(&launcher.launched);
        let plan = vec![entry(FakeProvider::new(fx.release("Tool", "2.0")), AppType::Bit32)];

        let result = fx.updater(launcher).run(&plan, 120).await;

        assert_eq!(encode_result(&result), 1);
        let launched = launched.lock().unwrap();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].args, "/S");
        assert!(launched[0].program.starts_with(fx.cache()));
        assert_eq!(fx.cached_files(), 0);
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let fx = Fixture::new();
        let result = fx.updater(ScriptedLauncher::default()).run(&[], 120).await;
        assert!(matches!(
            result,
            Err(RunAborted {
                updated: 0,
                reason: UpdateError::EmptyPlan
            })
        ));
        assert_eq!(encode_result(&result), -1);
    }

    #[tokio::test]
    async fn test_missing_checksum_aborts_before_download() {
        let fx = Fixture::new();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/setup.exe")
            .expect(0)
            .create_async()
            .await;

        let mut info = release("Tool", "2.0");
        for install in info.installers_mut() {
            install.download_url = format!("{}/setup.exe", server.url());
            install.clear_checksum();
        }
        let launcher = ScriptedLauncher::new(vec![Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);
        let plan = vec![entry(FakeProvider::new(info), AppType::Bit64)];

        let result = fx.updater(launcher).run(&plan, 120).await;

        assert_eq!(encode_result(&result), -1);
        let aborted = result.unwrap_err();
        assert!(aborted.reason.is_trust_violation());
        mock.assert_async().await;
        assert!(launched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_stops_run() {
        let fx = Fixture::new();
        let mut tampered = fx.release("First", "2.0");
        for install in tampered.installers_mut() {
            install.checksum = Some("ff".repeat(32));
        }
        let launcher = ScriptedLauncher::new(vec![Some((1, 0)), Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);
        let plan = vec![
            entry(FakeProvider::new(tampered), AppType::Bit32),
            entry(FakeProvider::new(fx.release("Second", "1.0")), AppType::Bit32),
        ];

        let result = fx.updater(launcher).run(&plan, 120).await;

        assert_eq!(encode_result(&result), -1);
        assert!(matches!(
            result.unwrap_err().reason,
            UpdateError::ChecksumMismatch { .. }
        ));
        assert!(launched.lock().unwrap().is_empty());
        assert_eq!(fx.cached_files(), 0);
    }

    #[tokio::test]
    async fn test_prior_successes_are_encoded() {
        let fx = Fixture::new();
        let mut unverifiable = fx.release("Second", "1.0");
        unverifiable.install_32.as_mut().unwrap().algorithm = HashAlgorithm::Unknown;
        let plan = vec![
            entry(FakeProvider::new(fx.release("First", "2.0")), AppType::Bit32),
            entry(FakeProvider::new(unverifiable), AppType::Bit32),
        ];

        let result = fx
            .updater(ScriptedLauncher::new(vec![Some((1, 0))]))
            .run(&plan, 120)
            .await;

        let aborted = result.as_ref().unwrap_err();
        assert_eq!(aborted.updated, 1);
        assert_eq!(encode_result(&result), -2);
    }

    #[tokio::test]
    async fn test_timeout_kill_is_not_fatal() {
        let fx = Fixture::new();
        let launcher = ScriptedLauncher::new(vec![None, Some((3, 0))]);
        let killed = Arc::clone(&launcher.killed);
        let plan = vec![
            entry(FakeProvider::new(fx.release("Hangs", "2.0")), AppType::Bit32),
            entry(FakeProvider::new(fx.release("Works", "2.0")), AppType::Bit64),
        ];

        let result = fx.updater(launcher).run(&plan, 30).await;

        assert_eq!(encode_result(&result), 1);
        assert!(killed.load(Ordering::SeqCst));
        assert_eq!(fx.cached_files(), 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_and_launch_failure_continue() {
        let fx = Fixture::new();
        // Third installer has no script entry, so launching it fails.
        let launcher = ScriptedLauncher::new(vec![Some((2, 1603)), Some((1, 0))]);
        let plan = vec![
            entry(FakeProvider::new(fx.release("Fails", "2.0")), AppType::Bit32),
            entry(FakeProvider::new(fx.release("Works", "2.0")), AppType::Bit32),
            entry(FakeProvider::new(fx.release("Missing", "2.0")), AppType::Bit32),
        ];

        let result = fx.updater(launcher).run(&plan, 120).await;
        assert_eq!(encode_result(&result), 1);
        assert_eq!(fx.cached_files(), 0);
    }

    #[tokio::test]
    async fn test_skips_without_aborting() {
        let fx = Fixture::new();
        let mut up_to_date = entry(FakeProvider::new(fx.release("Current", "1.0")), AppType::Bit32);
        up_to_date.needs_update = false;
        let unknown = entry(FakeProvider::new(fx.release("Odd", "1.0")), AppType::Unknown);
        let launcher = ScriptedLauncher::new(vec![Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);

        let result = fx.updater(launcher).run(&[up_to_date, unknown], 120).await;

        assert_eq!(encode_result(&result), 0);
        assert!(launched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_install_info_aborts() {
        let fx = Fixture::new();
        let mut info = fx.release("Tool", "2.0");
        info.install_64 = None;
        let plan = vec![entry(FakeProvider::new(info), AppType::Bit64)];

        let result = fx.updater(ScriptedLauncher::default()).run(&plan, 120).await;
        assert!(matches!(
            result.unwrap_err().reason,
            UpdateError::MissingInstallInfo {
                app_type: AppType::Bit64,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_url_aborts() {
        let fx = Fixture::new();
        let mut info = fx.release("Tool", "2.0");
        info.install_32.as_mut().unwrap().download_url = "  ".to_string();
        let plan = vec![entry(FakeProvider::new(info), AppType::Bit32)];

        let result = fx.updater(ScriptedLauncher::default()).run(&plan, 120).await;
        assert!(matches!(
            result.unwrap_err().reason,
            UpdateError::MissingDownloadUrl { .. }
        ));
    }

    #[tokio::test]
    async fn test_download_failure_aborts() {
        let fx = Fixture::new();
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/gone.exe")
            .with_status(404)
            .create_async()
            .await;
        let mut info = release("Tool", "2.0");
        info.install_32.as_mut().unwrap().download_url = format!("{}/gone.exe", server.url());
        let plan = vec![entry(FakeProvider::new(info), AppType::Bit32)];

        let result = fx.updater(ScriptedLauncher::default()).run(&plan, 120).await;
        assert!(matches!(
            result.unwrap_err().reason,
            UpdateError::Download { .. }
        ));
    }

    #[tokio::test]
    async fn test_running_blocker_skips_entry() {
        let fx = Fixture::new();
        let mut provider = FakeProvider::new(fx.release("Tool", "2.0"));
        provider.blockers = vec!["tool".to_string()];
        let launcher = ScriptedLauncher::new(vec![Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);

        let updater = fx.updater(launcher).with_probe(Running("tool"));
        let result = updater.run(&[entry(provider, AppType::Bit32)], 120).await;

        assert_eq!(encode_result(&result), 0);
        assert!(launched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pre_update_steps_run_first() {
        let fx = Fixture::new();
        let mut provider = FakeProvider::new(fx.release("Tool", "2.0"));
        provider.pre_update = vec![PreUpdateStep::new("C:\\Tool\\uninstall.exe", "/S")];
        let launcher = ScriptedLauncher::new(vec![Some((1, 0)), Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);

        let result = fx.updater(launcher).run(&[entry(provider, AppType::Bit32)], 120).await;

        assert_eq!(encode_result(&result), 1);
        let launched = launched.lock().unwrap();
        assert_eq!(launched.len(), 2);
        assert_eq!(launched[0].program, PathBuf::from("C:\\Tool\\uninstall.exe"));
    }

    #[tokio::test]
    async fn test_failed_pre_update_skips_installer() {
        let fx = Fixture::new();
        let mut provider = FakeProvider::new(fx.release("Tool", "2.0"));
        provider.pre_update = vec![PreUpdateStep::new("uninstall.exe", "/S")];
        let launcher = ScriptedLauncher::new(vec![Some((1, 2)), Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);

        let result = fx.updater(launcher).run(&[entry(provider, AppType::Bit32)], 120).await;

        assert_eq!(encode_result(&result), 0);
        assert_eq!(launched.lock().unwrap().len(), 1);
        assert_eq!(fx.cached_files(), 0);
    }

    #[tokio::test]
    async fn test_signature_from_wrong_publisher_aborts() {
        let fx = Fixture::new();
        let mut info = fx.release("Tool", "2.0");
        info.install_32.as_mut().unwrap().signature =
            Some(Signature::never_expires("CN=Tool Vendor"));
        let plan = vec![entry(FakeProvider::new(info), AppType::Bit32)];

        let updater = fx
            .updater(ScriptedLauncher::new(vec![Some((1, 0))]))
            .with_trust(TrustVerifier::new(SignedBy("CN=Mallory")));
        let result = updater.run(&plan, 120).await;

        let aborted = result.unwrap_err();
        assert!(matches!(aborted.reason, UpdateError::SignatureRejected { .. }));
        assert!(aborted.reason.is_trust_violation());
        assert_eq!(fx.cached_files(), 0);
    }

    #[tokio::test]
    async fn test_matching_signature_installs() {
        let fx = Fixture::new();
        let mut info = fx.release("Tool", "2.0");
        info.install_32.as_mut().unwrap().signature =
            Some(Signature::never_expires("CN=Tool Vendor"));
        let plan = vec![entry(FakeProvider::new(info), AppType::Bit32)];

        let updater = fx
            .updater(ScriptedLauncher::new(vec![Some((1, 0))]))
            .with_trust(TrustVerifier::new(SignedBy("CN=Tool Vendor")));
        assert_eq!(encode_result(&updater.run(&plan, 120).await), 1);
    }

    #[test]
    fn test_effective_timeout() {
        assert_eq!(effective_timeout(0), DEFAULT_TIMEOUT);
        assert_eq!(effective_timeout(10), DEFAULT_TIMEOUT);
        assert_eq!(effective_timeout(11), 11);
        assert_eq!(effective_timeout(600), 600);
    }

    #[test]
    fn test_install_commands() {
        let detected = DetectedSoftware::new("Pidgin", "2.14.1", Some("C:\\Program Files (x86)\\Pidgin\\".to_string()));
        let file = Path::new("C:\\cache\\abc.exe");

        let mut install = InstallInfo::new(InstallerKind::ExeTargetDir, "u", HashAlgorithm::Sha256, "00", "/DS=1 /SMS=1 /S");
        let command = install_command(&install, file, &detected);
        assert_eq!(command.args, "/DS=1 /SMS=1 /S /D C:\\Program Files (x86)\\Pidgin");

        let no_path = DetectedSoftware::new("Pidgin", "2.14.1", None);
        assert_eq!(install_command(&install, file, &no_path).args, "/DS=1 /SMS=1 /S");

        install.kind = InstallerKind::Msi;
        install.silent_switches = "/qn /norestart".to_string();
        let command = install_command(&install, Path::new("C:\\cache\\abc.msi"), &detected);
        assert_eq!(command.program, PathBuf::from("msiexec.exe"));
        assert_eq!(command.args, "/i \"C:\\cache\\abc.msi\" /qn /norestart");

        install.kind = InstallerKind::Exe;
        install.silent_switches = "/S".to_string();
        let command = install_command(&install, file, &detected);
        assert_eq!(command.program, file);
        assert_eq!(command.args, "/S");
    }

    fn unreadable(path: &Path, _algorithm: HashAlgorithm) -> Result<String, ChecksumError> {
        Err(ChecksumError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
        })
    }

    #[tokio::test]
    async fn test_hash_failure_aborts_and_cleans_up() {
        let fx = Fixture::new();
        let launcher = ScriptedLauncher::new(vec![Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);
        let plan = vec![entry(FakeProvider::new(fx.release("Tool", "2.0")), AppType::Bit32)];

        let result = fx.updater(launcher).with_hasher(unreadable).run(&plan, 120).await;

        assert_eq!(encode_result(&result), -1);
        assert!(matches!(
            result.unwrap_err().reason,
            UpdateError::Checksum(ChecksumError::Io { .. })
        ));
        assert!(launched.lock().unwrap().is_empty());
        assert_eq!(fx.cached_files(), 0);
    }

    /// Installer that removes its own file before exiting cleanly.
    struct SelfDeletingInstaller;

    impl Launcher for SelfDeletingInstaller {
        fn launch(&self, command: &InstallCommand) -> io::Result<Box<dyn RunningProcess>> {
            std::fs::remove_file(&command.program)?;
            Ok(Box::new(ScriptedProcess {
                exit_after: Some((1, 0)),
                elapsed: 0,
                killed: Arc::default(),
            }))
        }
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_success() {
        let fx = Fixture::new();
        let plan = vec![entry(FakeProvider::new(fx.release("Tool", "2.0")), AppType::Bit32)];
        let updater = Updater::new(Downloader::new(Client::new(), fx.cache()))
            .with_launcher(SelfDeletingInstaller)
            .with_probe(NothingRunning);

        let result = updater.run(&plan, 120).await;

        assert_eq!(encode_result(&result), 1);
        assert_eq!(fx.cached_files(), 0);
    }

    #[tokio::test]
    async fn test_installer_already_in_cache_is_kept() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.cache()).unwrap();
        let source = fx.cache().join("vendor-setup.exe");
        std::fs::write(&source, b"vendor installer").unwrap();
        let sha256 = checksum::calculate(&source, HashAlgorithm::Sha256).unwrap();

        let mut info = release("Tool", "2.0");
        for install in info.installers_mut() {
            install.download_url = Url::from_file_path(&source).unwrap().to_string();
            install.checksum = Some(sha256.clone());
        }
        let launcher = ScriptedLauncher::new(vec![Some((1, 0))]);
        let launched = Arc::clone(&launcher.launched);
        let plan = vec![entry(FakeProvider::new(info), AppType::Bit32)];

        let result = fx.updater(launcher).run(&plan, 120).await;

        assert!(matches!(
            result.unwrap_err().reason,
            UpdateError::Download {
                source: DownloadError::SourceInCache(_),
                ..
            }
        ));
        assert!(launched.lock().unwrap().is_empty());
        assert_eq!(std::fs::read(&source).unwrap(), b"vendor installer");
    }
}
