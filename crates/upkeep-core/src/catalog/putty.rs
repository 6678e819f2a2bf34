use async_trait::async_trait;
use reqwest::Client;
use upkeep_schema::{HashAlgorithm, InstallInfo, InstallerKind, ReleaseInfo};

use super::{capture, redirect_location};
use crate::io::download::fetch_text;
use crate::provider::Provider;

const KNOWN_VERSION: &str = "0.68";

/// PuTTY SSH and telnet client.
#[derive(Debug, Clone)]
pub struct Putty {
    base_url: String,
}

impl Default for Putty {
    fn default() -> Self {
        Self::with_base_url("https://the.earth.li/~sgtatham/putty")
    }
}

impl Putty {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Provider for Putty {
    fn ids(&self) -> Vec<String> {
        vec!["putty".into()]
    }

    fn known_info(&self) -> ReleaseInfo {
        let v = KNOWN_VERSION;
        ReleaseInfo {
            name: "PuTTY".to_string(),
            newest_version: v.to_string(),
            match_32: Some(r"^PuTTY release [0-9]\.[0-9]+$".to_string()),
            match_64: Some(r"^PuTTY release [0-9]\.[0-9]+ \(64\-bit\)$".to_string()),
            install_32: Some(
                InstallInfo::new(
                    InstallerKind::Msi,
                    format!("{}/{v}/w32/putty-{v}-installer.msi", self.base_url),
                    HashAlgorithm::Sha512,
                    "2b6b1acc51fc9cfe8a08e17afc4ac7d962af4575d55806456aa1a42c563f14457cc81d7e625191fd856b4be9a0e885cef78da4018d542010eba18718bb73fecd",
                    "/qn /norestart",
                )
                .with_install_dirs(["C:\\Program Files\\PuTTY", "C:\\Program Files (x86)\\PuTTY"]),
            ),
            install_64: Some(
                InstallInfo::new(
                    InstallerKind::Msi,
                    format!("{}/{v}/w64/putty-64bit-{v}-installer.msi", self.base_url),
                    HashAlgorithm::Sha512,
                    "8262c133e3569dcc188e5ac2360ebd3cc09d9edd2f78d6eaaf0e2762fba511de07ce614ba4fedf5f62fe64dd17d5a626dc63a579ee1fc1ef90f45e9e1f0c3d06",
                    "/qn /norestart",
                )
                .with_install_dirs(["C:\\Program Files\\PuTTY"]),
            ),
        }
    }

    fn implements_search_for_newer(&self) -> bool {
        true
    }

    async fn search_for_newer(&self, client: &Client) -> anyhow::Result<ReleaseInfo> {
        // "latest/" redirects to the directory of the current release.
        let location = redirect_location(&format!("{}/latest/", self.base_url)).await?;
        let version = capture(r"/([0-9]+\.[0-9]+)/", &location, 1)?;

        let sums = fetch_text(client, &format!("{}/{version}/sha512sums", self.base_url)).await?;
        let escaped = regex::escape(&version);
        let sha32 = capture(
            &format!(r"([0-9a-f]{{128}})  w32/putty-{escaped}-installer\.msi"),
            &sums,
            1,
        )?;
        let sha64 = capture(
            &format!(r"([0-9a-f]{{128}})  w64/putty-64bit-{escaped}-installer\.msi"),
            &sums,
            1,
        )?;

        let mut info = self.known_info();
        info.replace_version(&version);
        for (install, sha) in [(&mut info.install_32, sha32), (&mut info.install_64, sha64)] {
            if let Some(install) = install {
                install.checksum = Some(sha);
            }
        }
        Ok(info)
    }
}
