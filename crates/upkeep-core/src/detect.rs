//! Sources of [`DetectedSoftware`].

use std::path::{Path, PathBuf};

use thiserror::Error;
use upkeep_schema::DetectedSoftware;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("software detection is only supported on Windows")]
    Unsupported,

    #[error("registry access failed: {0}")]
    Registry(#[source] std::io::Error),

    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Lists installed software.
pub trait Detector {
    fn detect(&self) -> Result<Vec<DetectedSoftware>, DetectError>;
}

/// Reads the `Uninstall` keys of the Windows registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryDetector;

#[cfg(windows)]
const UNINSTALL_KEYS: [&str; 2] = [
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
    "SOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
];

impl Detector for RegistryDetector {
    #[cfg(windows)]
    fn detect(&self) -> Result<Vec<DetectedSoftware>, DetectError> {
        use winreg::RegKey;
        use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ};

        let mut found = Vec::new();
        let roots = [
            (RegKey::predef(HKEY_LOCAL_MACHINE), &UNINSTALL_KEYS[..]),
            (RegKey::predef(HKEY_CURRENT_USER), &UNINSTALL_KEYS[..1]),
        ];
        for (root, paths) in &roots {
            for path in *paths {
                let uninstall = match root.open_subkey_with_flags(path, KEY_READ) {
                    Ok(key) => key,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(DetectError::Registry(e)),
                };
                for name in uninstall.enum_keys() {
                    let name = name.map_err(DetectError::Registry)?;
                    let Ok(entry) = uninstall.open_subkey_with_flags(&name, KEY_READ) else {
                        tracing::debug!("Skipping unreadable uninstall key {name}");
                        continue;
                    };
                    let read = |value: &str| {
                        entry
                            .get_value::<String, _>(value)
                            .ok()
                            .map(|v| v.trim().to_string())
                            .filter(|v| !v.is_empty())
                    };
                    let detected = DetectedSoftware {
                        display_name: read("DisplayName"),
                        display_version: read("DisplayVersion"),
                        install_path: read("InstallLocation"),
                    };
                    if detected.contains_information() {
                        found.push(detected);
                    }
                }
            }
        }
        found.sort();
        found.dedup();
        tracing::debug!("Detected {} installed applications", found.len());
        Ok(found)
    }

    #[cfg(not(windows))]
    fn detect(&self) -> Result<Vec<DetectedSoftware>, DetectError> {
        Err(DetectError::Unsupported)
    }
}

/// Reads a JSON array of detected software, as written by `upkeep detect --json`.
#[derive(Debug, Clone)]
pub struct SnapshotDetector {
    path: PathBuf,
}

impl SnapshotDetector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Detector for SnapshotDetector {
    fn detect(&self) -> Result<Vec<DetectedSoftware>, DetectError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| DetectError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut found: Vec<DetectedSoftware> =
            serde_json::from_str(&content).map_err(|source| DetectError::Snapshot {
                path: self.path.clone(),
                source,
            })?;
        found.retain(DetectedSoftware::contains_information);
        found.sort();
        Ok(found)
    }
}
