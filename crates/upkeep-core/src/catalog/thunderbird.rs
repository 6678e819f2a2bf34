use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use upkeep_schema::{
    DetectedSoftware, HashAlgorithm, InstallInfo, InstallerKind, ReleaseInfo, Signature,
};

use super::{capture, redirect_location};
use crate::io::download::fetch_text;
use crate::provider::{PreUpdateStep, Provider};

const KNOWN_VERSION: &str = "52.5.2";
const PUBLISHER: &str =
    "CN=Mozilla Corporation, O=Mozilla Corporation, L=Mountain View, S=California, C=US";

/// SHA-512 of the known 32 bit installer, per language.
const KNOWN_CHECKSUMS: &[(&str, &str)] = &[
    (
        "de",
        "60b3beb5291459b5356e2a0eda5f40ac81e40cece91636245d8d51b57012507d1bb186faacc897ab1b06919f473ff47bd22dafa2ede4bd49012874b98322b270",
    ),
    (
        "en-GB",
        "f4c82bfc68f34c53a8877d29772b4683bf6272a02f171838a4c3144816412dddc1219e3f133c9cc766471031f76f7a30da188d3e172a08875bb45852e9d2ffb0",
    ),
    (
        "en-US",
        "9f2109cbaa44ece56672289401eea97d60a15f6e167c30b9151f1d1e70c5dbc594304fc0132ce910a295a89d0898f2cda4ea9ee5eb01650ad2bdf49976c83d93",
    ),
    (
        "fr",
        "ffcde3ac70d667badd1dafbc52187a51347c88d59da7f3b9a99ae6135d79c381060a5f3fab129f1f3c8c0d1def4cc08dae0cd8f0c372c72362a8260d87a816f3",
    ),
];

/// Mozilla Thunderbird in one language. 32 bit only.
#[derive(Debug, Clone)]
pub struct Thunderbird {
    language: &'static str,
    checksum: &'static str,
    redirect_base: String,
    releases_base: String,
}

impl Thunderbird {
    /// Thunderbird in `language`, one of [`Thunderbird::languages`].
    ///
    /// Unknown languages get an empty checksum and thus cannot be installed
    /// until a lookup finds one.
    pub fn new(language: &'static str) -> Self {
        Self::with_base_urls(
            language,
            "https://download.mozilla.org",
            "https://ftp.mozilla.org/pub/thunderbird/releases",
        )
    }

    pub fn with_base_urls(
        language: &'static str,
        redirect_base: impl Into<String>,
        releases_base: impl Into<String>,
    ) -> Self {
        let checksum = KNOWN_CHECKSUMS
            .iter()
            .find(|(lang, _)| *lang == language)
            .map_or("", |(_, sum)| *sum);
        Self {
            language,
            checksum,
            redirect_base: redirect_base.into(),
            releases_base: releases_base.into(),
        }
    }

    /// Languages with built-in release information.
    pub fn languages() -> impl Iterator<Item = &'static str> {
        KNOWN_CHECKSUMS.iter().map(|(lang, _)| *lang)
    }

    fn download_url(&self, version: &str) -> String {
        format!(
            "{}/{version}/win32/{}/Thunderbird%20Setup%20{version}.exe",
            self.releases_base, self.language
        )
    }
}

#[async_trait]
impl Provider for Thunderbird {
    fn ids(&self) -> Vec<String> {
        vec![
            format!("thunderbird-{}", self.language.to_lowercase()),
            "thunderbird".into(),
        ]
    }

    fn known_info(&self) -> ReleaseInfo {
        ReleaseInfo {
            name: format!("Mozilla Thunderbird ({})", self.language),
            newest_version: KNOWN_VERSION.to_string(),
            match_32: Some(format!(
                r"^Mozilla Thunderbird [0-9]{{2}}\.[0-9]\.[0-9] \(x86 {}\)$",
                regex::escape(self.language)
            )),
            match_64: None,
            install_32: Some(
                InstallInfo::new(
                    InstallerKind::Exe,
                    self.download_url(KNOWN_VERSION),
                    HashAlgorithm::Sha512,
                    self.checksum,
                    "-ms -ma",
                )
                .with_signature(Signature::never_expires(PUBLISHER))
                .with_install_dirs([
                    "C:\\Program Files\\Mozilla Thunderbird",
                    "C:\\Program Files (x86)\\Mozilla Thunderbird",
                ]),
            ),
            install_64: None,
        }
    }

    fn implements_search_for_newer(&self) -> bool {
        true
    }

    async fn search_for_newer(&self, client: &Client) -> anyhow::Result<ReleaseInfo> {
        let location = redirect_location(&format!(
            "{}/?product=thunderbird-latest&os=win&lang={}",
            self.redirect_base, self.language
        ))
        .await?;
        let version = capture(r"[0-9]{2}\.[0-9]\.[0-9]", &location, 0)?;

        let mut info = self.known_info();
        if version == info.newest_version {
            return Ok(info);
        }

        let sums = fetch_text(client, &format!("{}/{version}/SHA512SUMS", self.releases_base)).await?;
        let checksum = capture(
            &format!(
                r"([0-9a-f]{{128}})  win32/{}/Thunderbird Setup {}\.exe",
                regex::escape(self.language),
                regex::escape(&version)
            ),
            &sums,
            1,
        )?;
        info.replace_version(&version);
        if let Some(install) = info.install_32.as_mut() {
            install.checksum = Some(checksum);
        }
        Ok(info)
    }

    fn blocker_processes(&self, _detected: &DetectedSoftware) -> Vec<String> {
        vec!["thunderbird".to_string()]
    }

    fn needs_pre_update(&self, _detected: &DetectedSoftware) -> bool {
        true
    }

    /// Uninstall the old version so the control panel does not list two entries.
    fn pre_update_steps(&self, detected: &DetectedSoftware) -> Vec<PreUpdateStep> {
        match detected.install_path.as_deref() {
            Some(path) if !path.trim().is_empty() => vec![PreUpdateStep::new(
                Path::new(path).join("uninstall").join("helper.exe"),
                "/SILENT",
            )],
            _ => Vec::new(),
        }
    }
}
