//! Checksum algorithms.

use serde::{Deserialize, Serialize};

/// Digest algorithm used to verify a downloaded installer.
///
/// `Unknown` is a sentinel meaning "no verification possible". An
/// [`InstallInfo`](crate::InstallInfo) carrying it never counts as having a
/// checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// No usable algorithm.
    #[default]
    Unknown,
    /// MD5 (128 bit).
    Md5,
    /// SHA-1 (160 bit).
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Lowercase name, as used in config files and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex encoded digest, or `None` for [`HashAlgorithm::Unknown`].
    pub fn hex_len(&self) -> Option<usize> {
        match self {
            Self::Unknown => None,
            Self::Md5 => Some(32),
            Self::Sha1 => Some(40),
            Self::Sha256 => Some(64),
            Self::Sha384 => Some(96),
            Self::Sha512 => Some(128),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            "unknown" | "none" => Ok(Self::Unknown),
            _ => Err(format!("Unknown hash algorithm: {s}")),
        }
    }
}
