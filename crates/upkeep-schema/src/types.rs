//! Release metadata and install instructions.

use crate::{AppType, HashAlgorithm};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expected publisher signature of an installer.
///
/// `expires` is an application-level cut-off, distinct from the validity of
/// the certificate itself: vendors sometimes sign with short-lived
/// certificates, and a signature past its declared expiration is no longer
/// checked. `None` means the signature never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Expected subject of the signer's leaf certificate, e.g. `CN=Example, O=Example, C=US`.
    pub publisher: String,
    /// Instant after which the signature is no longer trusted.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl Signature {
    /// Signature that stops being checked at `expires`.
    pub fn new(publisher: impl Into<String>, expires: DateTime<Utc>) -> Self {
        Self {
            publisher: publisher.into(),
            expires: Some(expires),
        }
    }

    /// Signature without an expiration date.
    pub fn never_expires(publisher: impl Into<String>) -> Self {
        Self {
            publisher: publisher.into(),
            expires: None,
        }
    }

    /// Whether the declared expiration has passed at `now`.
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Whether the declared expiration has passed.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }
}

/// How a downloaded installer is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InstallerKind {
    /// Executable installer, run with the silent switches.
    #[default]
    Exe,
    /// Windows Installer package, run through `msiexec /i`.
    Msi,
    /// NSIS executable that accepts `/D <dir>` to reinstall into the detected location.
    ExeTargetDir,
}

impl InstallerKind {
    /// File extension used for downloads of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Exe | Self::ExeTargetDir => "exe",
            Self::Msi => "msi",
        }
    }
}

/// Everything needed to fetch, verify and silently run one installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallInfo {
    /// Where the installer is downloaded from. `file://` URLs are copied.
    pub download_url: String,
    /// Expected digest in hex. Case and separators are ignored when comparing.
    #[serde(default)]
    pub checksum: Option<String>,
    /// Algorithm of `checksum`.
    #[serde(default)]
    pub algorithm: HashAlgorithm,
    /// Expected publisher signature, if the vendor signs its installers.
    #[serde(default)]
    pub signature: Option<Signature>,
    /// Arguments for an unattended installation.
    #[serde(default)]
    pub silent_switches: String,
    /// Directories the software usually lands in. Informational.
    #[serde(default)]
    pub install_dirs: Vec<String>,
    /// How the installer is launched.
    #[serde(default)]
    pub kind: InstallerKind,
}

impl InstallInfo {
    /// Create install instructions for a checksummed download.
    pub fn new(
        kind: InstallerKind,
        download_url: impl Into<String>,
        algorithm: HashAlgorithm,
        checksum: impl Into<String>,
        silent_switches: impl Into<String>,
    ) -> Self {
        Self {
            download_url: download_url.into(),
            checksum: Some(checksum.into()),
            algorithm,
            signature: None,
            silent_switches: silent_switches.into(),
            install_dirs: Vec::new(),
            kind,
        }
    }

    /// Attach an expected publisher signature.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Attach the usual install directories.
    pub fn with_install_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// True if a non-blank checksum is present and its algorithm is usable.
    pub fn has_checksum(&self) -> bool {
        self.algorithm != HashAlgorithm::Unknown
            && self
                .checksum
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty())
    }

    /// True if the download URL is not blank.
    pub fn has_download_url(&self) -> bool {
        !self.download_url.trim().is_empty()
    }

    /// Drop the checksum, e.g. when a vendor publishes none for a new release.
    pub fn clear_checksum(&mut self) {
        self.checksum = None;
        self.algorithm = HashAlgorithm::Unknown;
    }
}

/// Best known description of the newest release of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Human readable product name.
    pub name: String,
    /// Newest version, compared lexicographically against detected versions.
    pub newest_version: String,
    /// Pattern recognizing the display name of a 32 bit installation.
    #[serde(default)]
    pub match_32: Option<String>,
    /// Pattern recognizing the display name of a 64 bit installation.
    #[serde(default)]
    pub match_64: Option<String>,
    /// Installer for 32 bit installations.
    #[serde(default)]
    pub install_32: Option<InstallInfo>,
    /// Installer for 64 bit installations.
    #[serde(default)]
    pub install_64: Option<InstallInfo>,
}

impl ReleaseInfo {
    /// Install instructions for the given classification.
    ///
    /// Returns `None` for [`AppType::Unknown`] and for architectures the
    /// product ships no installer for.
    pub fn install_info(&self, app_type: AppType) -> Option<&InstallInfo> {
        match app_type {
            AppType::Bit32 => self.install_32.as_ref(),
            AppType::Bit64 => self.install_64.as_ref(),
            AppType::Unknown => None,
        }
    }

    /// Both install infos that are present.
    pub fn installers_mut(&mut self) -> impl Iterator<Item = &mut InstallInfo> {
        self.install_32
            .iter_mut()
            .chain(self.install_64.iter_mut())
    }

    /// Move to `version`, rewriting the old version inside every download URL.
    ///
    /// Checksums are left alone; callers replace or clear them.
    pub fn replace_version(&mut self, version: &str) {
        let old = std::mem::replace(&mut self.newest_version, version.to_string());
        if old.is_empty() {
            return;
        }
        for install in self.installers_mut() {
            install.download_url = install.download_url.replace(&old, version);
        }
    }
}
