//! Installed software as reported by detection.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An installed application as observed on the target machine.
///
/// Sorted by name, then version, then path; missing values sort last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct DetectedSoftware {
    /// Display name as registered by the installer, e.g. `7-Zip 18.01 (x64)`.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Display version as registered by the installer.
    #[serde(default)]
    pub display_version: Option<String>,
    /// Installation directory, if the installer recorded one.
    #[serde(default)]
    pub install_path: Option<String>,
}

impl DetectedSoftware {
    /// Create a fully populated entry.
    pub fn new(
        display_name: impl Into<String>,
        display_version: impl Into<String>,
        install_path: Option<String>,
    ) -> Self {
        Self {
            display_name: Some(display_name.into()),
            display_version: Some(display_version.into()),
            install_path,
        }
    }

    /// True if at least one field carries a non-blank value.
    pub fn contains_information(&self) -> bool {
        [&self.display_name, &self.display_version, &self.install_path]
            .into_iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

fn cmp_nulls_last(a: Option<&String>, b: Option<&String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for DetectedSoftware {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_nulls_last(self.display_name.as_ref(), other.display_name.as_ref())
            .then_with(|| {
                cmp_nulls_last(self.display_version.as_ref(), other.display_version.as_ref())
            })
            .then_with(|| cmp_nulls_last(self.install_path.as_ref(), other.install_path.as_ref()))
    }
}

impl PartialOrd for DetectedSoftware {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for DetectedSoftware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.display_name.as_deref().unwrap_or("<unnamed>"),
            self.display_version.as_deref().unwrap_or("<no version>")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_name_version_path() {
        let a = DetectedSoftware::new("Alpha", "1.0", None);
        let b = DetectedSoftware::new("Alpha", "2.0", None);
        let c = DetectedSoftware::new("Beta", "0.1", Some("C:\\Beta".to_string()));
        let mut list = vec![c.clone(), b.clone(), a.clone()];
        list.sort();
        assert_eq!(list, vec![a, b, c]);
    }

    #[test]
    fn test_missing_values_sort_last() {
        let named = DetectedSoftware::new("Zeta", "1.0", None);
        let unnamed = DetectedSoftware {
            display_name: None,
            display_version: Some("1.0".to_string()),
            install_path: None,
        };
        assert!(named < unnamed);

        let with_path = DetectedSoftware::new("Zeta", "1.0", Some("D:\\".to_string()));
        assert!(with_path < named);
    }

    #[test]
    fn test_contains_information() {
        assert!(!DetectedSoftware::default().contains_information());
        let blank = DetectedSoftware {
            display_name: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!blank.contains_information());
        assert!(DetectedSoftware::new("Git version 2.31.1", "2.31.1", None).contains_information());
    }
}
