use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use upkeep_schema::{DetectedSoftware, HashAlgorithm, InstallInfo, InstallerKind, ReleaseInfo};

use super::capture;
use crate::io::download::fetch_text;
use crate::provider::{PreUpdateStep, Provider, version_is_older};

const KNOWN_VERSION: &str = "0.92.4";
const VERSION_PATTERN: &str = r"[0-9]\.[0-9]+(\.[0-9]+)?";
/// Product code shared by the 0.91 and 0.92 MSI builds.
const LEGACY_MSI_GUID: &str = "{81922150-317E-4BB0-A31D-FF1C14F707C5}";

/// Inkscape vector graphics editor.
#[derive(Debug, Clone)]
pub struct Inkscape {
    base_url: String,
}

impl Default for Inkscape {
    fn default() -> Self {
        Self::with_base_url("https://inkscape.org")
    }
}

impl Inkscape {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Download URL and MD5 for one architecture of `version`.
    async fn search_installer(
        &self,
        client: &Client,
        version: &str,
        bits: &str,
        arch: &str,
    ) -> anyhow::Result<(String, String)> {
        let page = fetch_text(
            client,
            &format!(
                "{}/release/inkscape-{version}/windows/{bits}-bit/msi/dl/",
                self.base_url
            ),
        )
        .await?;
        let escaped = regex::escape(version);

        let location = capture(
            &format!(r#"<a href="([a-zA-Z0-9/]+)/inkscape-{escaped}-{arch}\.msi">"#),
            &page,
            1,
        )?;
        let url = format!("{}{location}/inkscape-{version}-{arch}.msi", self.base_url);

        let md5_url = capture(
            &format!(r#"<a href="(https?://[^"]+/inkscape-{escaped}-{arch}\.msi_[A-Za-z0-9]+\.md5)">"#),
            &page,
            1,
        )?;
        let md5_file = fetch_text(client, &md5_url).await?;
        let md5 = capture(
            &format!(r"([0-9a-f]{{32}}) \*inkscape-{escaped}-{arch}\.msi"),
            &md5_file,
            1,
        )?;
        Ok((url, md5))
    }
}

fn msi(url: &str, md5: &str) -> InstallInfo {
    InstallInfo::new(InstallerKind::Msi, url, HashAlgorithm::Md5, md5, "/qn /norestart")
}

#[async_trait]
impl Provider for Inkscape {
    fn ids(&self) -> Vec<String> {
        vec!["inkscape".into()]
    }

    fn known_info(&self) -> ReleaseInfo {
        ReleaseInfo {
            name: "Inkscape".to_string(),
            newest_version: KNOWN_VERSION.to_string(),
            match_32: Some(format!("^Inkscape {VERSION_PATTERN}$")),
            match_64: Some(format!("^Inkscape {VERSION_PATTERN}$")),
            install_32: Some(msi(
                "https://media.inkscape.org/dl/resources/file/inkscape-0.92.4-x86.msi",
                "2c8016038f63398bafd3474737d21d09",
            )),
            install_64: Some(msi(
                "https://media.inkscape.org/dl/resources/file/inkscape-0.92.4-x64.msi",
                "8a867a3ebaac8c17c3294e3aea0b61c5",
            )),
        }
    }

    fn implements_search_for_newer(&self) -> bool {
        true
    }

    async fn search_for_newer(&self, client: &Client) -> anyhow::Result<ReleaseInfo> {
        let html = fetch_text(client, &format!("{}/release/", self.base_url)).await?;
        let version = capture(r"/release/([0-9]\.[0-9]+(?:\.[0-9]+)?)/windows/", &html, 1)?;

        let mut info = self.known_info();
        if version == info.newest_version {
            return Ok(info);
        }
        info.newest_version.clone_from(&version);

        let (url32, md5_32) = self.search_installer(client, &version, "32", "x86").await?;
        let (url64, md5_64) = self.search_installer(client, &version, "64", "x64").await?;
        info.install_32 = Some(msi(&url32, &md5_32));
        info.install_64 = Some(msi(&url64, &md5_64));
        Ok(info)
    }

    fn needs_pre_update(&self, _detected: &DetectedSoftware) -> bool {
        true
    }

    /// Remove every older installation first: the exe-based releases before
    /// 0.91 cannot be upgraded by the MSI packages.
    fn pre_update_steps(&self, detected: &DetectedSoftware) -> Vec<PreUpdateStep> {
        // Without a detected version there is no known install to remove.
        if detected
            .display_version
            .as_deref()
            .is_none_or(|v| v.trim().is_empty())
        {
            return Vec::new();
        }
        let candidates = [
            detected
                .install_path
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .map(|p| Path::new(p).join("uninstall.exe"))
                .unwrap_or_else(|| PathBuf::from(r"C:\Program Files (x86)\Inkscape\uninstall.exe")),
            PathBuf::from(r"C:\Program Files\Inkscape\uninstall.exe"),
        ];
        match candidates.into_iter().find(|p| p.is_file()) {
            Some(uninstaller) => vec![PreUpdateStep::new(uninstaller, "/S")],
            None => vec![PreUpdateStep::new(
                "msiexec.exe",
                format!("/qn /x{LEGACY_MSI_GUID}"),
            )],
        }
    }

    /// Prefer the version in the display name: the registry often lists
    /// 0.92.1 as plain 0.92.
    fn needs_update(&self, detected: &DetectedSoftware, info: &ReleaseInfo) -> bool {
        let from_name = detected.display_name.as_deref().and_then(|name| {
            Regex::new(VERSION_PATTERN)
                .ok()
                .and_then(|re| re.find(name).map(|m| m.as_str().to_string()))
        });
        match from_name {
            Some(version) => version_is_older(Some(&version), &info.newest_version),
            None => version_is_older(detected.display_version.as_deref(), &info.newest_version),
        }
    }
}
