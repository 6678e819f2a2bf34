use async_trait::async_trait;
use reqwest::Client;
use upkeep_schema::{
    DetectedSoftware, HashAlgorithm, InstallInfo, InstallerKind, ReleaseInfo, Signature,
};

use super::{capture, signature_until};
use crate::io::download::fetch_text;
use crate::provider::Provider;

const KNOWN_VERSION: &str = "2.14.3";
const PUBLISHER: &str = "CN=Gary Kramlich, O=Gary Kramlich, STREET=2653 N 54TH ST, L=MILWAUKEE, S=Wisconsin, PostalCode=53210, C=US";

/// Pidgin instant messenger. Only ships a 32 bit installer.
#[derive(Debug, Clone)]
pub struct Pidgin {
    base_url: String,
}

impl Default for Pidgin {
    fn default() -> Self {
        Self::with_base_url("https://pidgin.im")
    }
}

impl Pidgin {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Provider for Pidgin {
    fn ids(&self) -> Vec<String> {
        vec!["pidgin".into()]
    }

    fn known_info(&self) -> ReleaseInfo {
        let mut install = InstallInfo::new(
            InstallerKind::ExeTargetDir,
            "https://netcologne.dl.sourceforge.net/project/pidgin/Pidgin/2.14.3/pidgin-2.14.3-offline.exe",
            HashAlgorithm::Sha256,
            "e9cf873c7c0f772f682425a2f52e60d8a6d928ee06f770ad06905b3f2d736ffe",
            "/DS=1 /SMS=1 /S",
        );
        // The signing certificate is short-lived.
        install.signature = signature_until(PUBLISHER, 2024, 3, 22, 1);
        ReleaseInfo {
            name: "Pidgin".to_string(),
            newest_version: KNOWN_VERSION.to_string(),
            match_32: Some("^Pidgin$".to_string()),
            match_64: None,
            install_32: Some(install),
            install_64: None,
        }
    }

    fn implements_search_for_newer(&self) -> bool {
        true
    }

    async fn search_for_newer(&self, client: &Client) -> anyhow::Result<ReleaseInfo> {
        let html = fetch_text(client, &format!("{}/install/", self.base_url)).await?;
        let pattern = r#"href="https://sourceforge\.net/projects/pidgin/files/Pidgin/([0-9]+\.[0-9]+\.[0-9]+)/pidgin-([0-9]+\.[0-9]+\.[0-9]+)\.exe""#;
        let directory = capture(pattern, &html, 1)?;
        let version = capture(pattern, &html, 2)?;
        anyhow::ensure!(
            directory == version,
            "download link of Pidgin names two versions: {directory} and {version}"
        );

        let mut info = self.known_info();
        if version == info.newest_version {
            return Ok(info);
        }
        info.replace_version(&version);
        if let Some(install) = info.install_32.as_mut() {
            // Only the signature is published for new releases.
            install.clear_checksum();
            install.signature = Some(Signature::never_expires(PUBLISHER));
        }
        Ok(info)
    }

    fn blocker_processes(&self, _detected: &DetectedSoftware) -> Vec<String> {
        vec!["pidgin".to_string()]
    }
}
