use async_trait::async_trait;
use reqwest::Client;
use upkeep_schema::{HashAlgorithm, InstallInfo, InstallerKind, ReleaseInfo};

use super::capture;
use crate::io::download::fetch_text;
use crate::provider::Provider;

const KNOWN_VERSION: &str = "18.01";

/// 7-Zip file archiver.
#[derive(Debug, Clone)]
pub struct SevenZip {
    base_url: String,
}

impl Default for SevenZip {
    fn default() -> Self {
        Self::with_base_url("https://www.7-zip.org")
    }
}

impl SevenZip {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn download_urls(&self, version: &str) -> (String, String) {
        let compact = version.replace('.', "");
        (
            format!("{}/a/7z{compact}.exe", self.base_url),
            format!("{}/a/7z{compact}-x64.exe", self.base_url),
        )
    }
}

#[async_trait]
impl Provider for SevenZip {
    fn ids(&self) -> Vec<String> {
        vec!["7zip".into(), "7-zip".into(), "sevenzip".into()]
    }

    fn known_info(&self) -> ReleaseInfo {
        let (url32, url64) = self.download_urls(KNOWN_VERSION);
        ReleaseInfo {
            name: "7-Zip".to_string(),
            newest_version: KNOWN_VERSION.to_string(),
            match_32: Some(r"^7\-Zip [0-9]+\.[0-9]{2}$".to_string()),
            match_64: Some(r"^7\-Zip [0-9]+\.[0-9]{2} \(x64\)$".to_string()),
            install_32: Some(
                InstallInfo::new(
                    InstallerKind::Exe,
                    url32,
                    HashAlgorithm::Sha256,
                    "c55c60a674114be26ce470f43109d405a5adcd2bd38e346d4a35c98727174eb0",
                    "/S",
                )
                .with_install_dirs(["C:\\Program Files\\7-Zip", "C:\\Program Files (x86)\\7-Zip"]),
            ),
            install_64: Some(
                InstallInfo::new(
                    InstallerKind::Exe,
                    url64,
                    HashAlgorithm::Sha256,
                    "86670d63429281a4a65c36919ca0f3099e3f803e3096c3a9722d61b3d31e4a9f",
                    "/S",
                )
                .with_install_dirs(["C:\\Program Files\\7-Zip"]),
            ),
        }
    }

    fn implements_search_for_newer(&self) -> bool {
        true
    }

    async fn search_for_newer(&self, client: &Client) -> anyhow::Result<ReleaseInfo> {
        let html = fetch_text(client, &format!("{}/", self.base_url)).await?;
        let version = capture(
            r"Download 7\-Zip ([0-9]+\.[0-9]{2}) \([0-9]{4}\-[0-9]{2}\-[0-9]{2}\) for Windows",
            &html,
            1,
        )?;

        let mut info = self.known_info();
        if version == info.newest_version {
            return Ok(info);
        }
        info.newest_version.clone_from(&version);
        let (url32, url64) = self.download_urls(&version);
        for (install, url) in [(&mut info.install_32, url32), (&mut info.install_64, url64)] {
            if let Some(install) = install {
                install.download_url = url;
                // 7-zip.org publishes no checksums.
                install.clear_checksum();
            }
        }
        Ok(info)
    }
}
