use async_trait::async_trait;
use reqwest::Client;
use upkeep_schema::{DetectedSoftware, HashAlgorithm, InstallInfo, InstallerKind, ReleaseInfo};

use super::{capture, signature_until};
use crate::io::download::fetch_text;
use crate::provider::Provider;

const KNOWN_VERSION: &str = "2.31.1";
const KNOWN_TAG: &str = "v2.31.1.windows.1";
const PUBLISHER: &str = "CN=Johannes Schindelin, O=Johannes Schindelin, STREET=Raderberger Str. 178, L=Köln, S=North Rhine-Westphalia, PostalCode=50968, C=DE";

/// Git for Windows.
#[derive(Debug, Clone)]
pub struct Git {
    base_url: String,
}

impl Default for Git {
    fn default() -> Self {
        Self::with_base_url("https://github.com")
    }
}

impl Git {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn download_url(&self, tag: &str, version: &str, bits: &str) -> String {
        format!(
            "{}/git-for-windows/git/releases/download/{tag}/Git-{version}-{bits}-bit.exe",
            self.base_url
        )
    }

    fn installer(&self, tag: &str, version: &str, bits: &str, sha256: &str) -> InstallInfo {
        let install = InstallInfo::new(
            InstallerKind::Exe,
            self.download_url(tag, version, bits),
            HashAlgorithm::Sha256,
            sha256,
            "/VERYSILENT /NORESTART",
        );
        match signature_until(PUBLISHER, 2021, 5, 20, 0) {
            Some(signature) => install.with_signature(signature),
            None => install,
        }
    }
}

#[async_trait]
impl Provider for Git {
    fn ids(&self) -> Vec<String> {
        vec!["git".into(), "git-for-windows".into()]
    }

    fn known_info(&self) -> ReleaseInfo {
        ReleaseInfo {
            name: "Git".to_string(),
            newest_version: KNOWN_VERSION.to_string(),
            match_32: Some(r"^Git version [0-9]+\.[0-9]+\.[0-9]+$".to_string()),
            match_64: Some(r"^Git version [0-9]+\.[0-9]+\.[0-9]+$".to_string()),
            install_32: Some(self.installer(
                KNOWN_TAG,
                KNOWN_VERSION,
                "32",
                "6abc8c83945ee8046c7337d2376c4dcb1e4d63ed9614e161b42a30a5fe9dc6ec",
            )),
            install_64: Some(self.installer(
                KNOWN_TAG,
                KNOWN_VERSION,
                "64",
                "c43611eb73ad1f17f5c8cc82ae51c3041a2e7279e0197ccf5f739e9129ce426e",
            )),
        }
    }

    fn implements_search_for_newer(&self) -> bool {
        true
    }

    async fn search_for_newer(&self, client: &Client) -> anyhow::Result<ReleaseInfo> {
        // The "latest" release may be a release candidate, so scan the list instead.
        let releases = fetch_text(
            client,
            &format!("{}/git-for-windows/git/releases", self.base_url),
        )
        .await?;
        let tag = capture(
            r#"git/releases/tag/(v[0-9]+\.[0-9]+\.[0-9]+\.windows\.[0-9]+)""#,
            &releases,
            1,
        )?;
        let version = capture(r"^v([0-9]+\.[0-9]+\.[0-9]+)\.windows", &tag, 1)?;

        let page = fetch_text(
            client,
            &format!("{}/git-for-windows/git/releases/tag/{tag}", self.base_url),
        )
        .await?;
        let escaped = regex::escape(&version);
        let hash = |bits: &str| {
            capture(
                &format!(r"<td>Git-{escaped}-{bits}-bit\.exe</td>\r?\n<td>([a-f0-9]{{64}})</td>"),
                &page,
                1,
            )
        };
        let sha32 = hash("32")?;
        let sha64 = hash("64")?;

        let mut info = self.known_info();
        info.newest_version = version.clone();
        info.install_32 = Some(self.installer(&tag, &version, "32", &sha32));
        info.install_64 = Some(self.installer(&tag, &version, "64", &sha64));
        Ok(info)
    }

    fn blocker_processes(&self, _detected: &DetectedSoftware) -> Vec<String> {
        // Git itself and Git Bash.
        vec!["git".to_string(), "bash".to_string()]
    }
}
