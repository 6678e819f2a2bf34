//! Architecture classification.

/// Architecture classification of a detected installation.
///
/// The planner derives it from which of a provider's match patterns
/// recognized the display name. It decides which
/// [`InstallInfo`](crate::InstallInfo) of a [`ReleaseInfo`](crate::ReleaseInfo)
/// applies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    /// 32 bit (x86) installation.
    Bit32,
    /// 64 bit (x64) installation.
    Bit64,
    /// Could not be determined; entries with this classification are skipped.
    #[default]
    Unknown,
}

impl AppType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bit32 => "32-bit",
            Self::Bit64 => "64-bit",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AppType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AppType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "32" | "32-bit" | "x86" | "bit32" => Ok(Self::Bit32),
            "64" | "64-bit" | "x64" | "amd64" | "bit64" => Ok(Self::Bit64),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown application type: {s}")),
        }
    }
}
