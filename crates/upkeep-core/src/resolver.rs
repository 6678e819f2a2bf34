//! Memoized release information per provider.

use std::fmt;

use reqwest::Client;
use tokio::sync::Mutex;
use upkeep_schema::{DetectedSoftware, ReleaseInfo};

use crate::provider::{PreUpdateStep, Provider};

/// State of the single fresh lookup a resolver may perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    NotAttempted,
    Failed,
    Succeeded(ReleaseInfo),
}

/// Wraps a [`Provider`] and answers with the best release information
/// currently known for it.
///
/// With fresh lookups enabled, the first call to [`info`](Self::info) asks
/// the vendor once. The outcome sticks for the lifetime of the resolver:
/// a success is cached, a failure falls back to the built-in data forever.
pub struct ReleaseInfoResolver {
    provider: Box<dyn Provider>,
    client: Client,
    auto_get_newer: bool,
    lookup: Mutex<Lookup>,
}

impl fmt::Debug for ReleaseInfoResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseInfoResolver")
            .field("ids", &self.provider.ids())
            .field("auto_get_newer", &self.auto_get_newer)
            .finish_non_exhaustive()
    }
}

impl ReleaseInfoResolver {
    pub fn new(provider: Box<dyn Provider>, client: Client, auto_get_newer: bool) -> Self {
        Self {
            provider,
            client,
            auto_get_newer,
            lookup: Mutex::new(Lookup::NotAttempted),
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.provider.ids()
    }

    pub fn known_info(&self) -> ReleaseInfo {
        self.provider.known_info()
    }

    /// Best currently known release information.
    pub async fn info(&self) -> ReleaseInfo {
        if !self.auto_get_newer {
            return self.provider.known_info();
        }

        let mut lookup = self.lookup.lock().await;
        match &*lookup {
            Lookup::Succeeded(info) => return info.clone(),
            Lookup::Failed => return self.provider.known_info(),
            Lookup::NotAttempted => {}
        }
        if !self.provider.implements_search_for_newer() {
            return self.provider.known_info();
        }

        let ids = self.provider.ids();
        let id = ids.first().map_or("?", String::as_str);
        tracing::debug!(provider = id, "Searching for newer release information");
        match self.provider.search_for_newer(&self.client).await {
            Ok(info) => {
                tracing::debug!(provider = id, version = %info.newest_version, "Found release information");
                *lookup = Lookup::Succeeded(info.clone());
                info
            }
            Err(e) => {
                tracing::warn!(provider = id, "Could not retrieve newer release information: {e:#}");
                *lookup = Lookup::Failed;
                self.provider.known_info()
            }
        }
    }

    /// Snapshot of the lookup state.
    pub async fn lookup(&self) -> Lookup {
        self.lookup.lock().await.clone()
    }

    pub async fn needs_update(&self, detected: &DetectedSoftware) -> bool {
        let info = self.info().await;
        self.provider.needs_update(detected, &info)
    }

    pub fn blocker_processes(&self, detected: &DetectedSoftware) -> Vec<String> {
        self.provider.blocker_processes(detected)
    }

    pub fn needs_pre_update(&self, detected: &DetectedSoftware) -> bool {
        self.provider.needs_pre_update(detected)
    }

    pub fn pre_update_steps(&self, detected: &DetectedSoftware) -> Vec<PreUpdateStep> {
        self.provider.pre_update_steps(detected)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use upkeep_schema::{HashAlgorithm, InstallInfo, InstallerKind};

    /// Provider with scripted lookups, shared with other test modules.
    pub(crate) struct FakeProvider {
        pub(crate) info: ReleaseInfo,
        pub(crate) newer: Option<ReleaseInfo>,
        pub(crate) searchable: bool,
        pub(crate) searches: Arc<AtomicUsize>,
        pub(crate) blockers: Vec<String>,
        pub(crate) pre_update: Vec<PreUpdateStep>,
    }

    impl FakeProvider {
        pub(crate) fn new(info: ReleaseInfo) -> Self {
            Self {
                info,
                newer: None,
                searchable: false,
                searches: Arc::new(AtomicUsize::new(0)),
                blockers: Vec::new(),
                pre_update: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn ids(&self) -> Vec<String> {
            vec![self.info.name.to_lowercase()]
        }

        fn known_info(&self) -> ReleaseInfo {
            self.info.clone()
        }

        fn implements_search_for_newer(&self) -> bool {
            self.searchable
        }

        async fn search_for_newer(&self, _client: &Client) -> anyhow::Result<ReleaseInfo> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            self.newer
                .clone()
                .ok_or_else(|| anyhow::anyhow!("vendor site unreachable"))
        }

        fn blocker_processes(&self, _detected: &DetectedSoftware) -> Vec<String> {
            self.blockers.clone()
        }

        fn needs_pre_update(&self, _detected: &DetectedSoftware) -> bool {
            !self.pre_update.is_empty()
        }

        fn pre_update_steps(&self, _detected: &DetectedSoftware) -> Vec<PreUpdateStep> {
            self.pre_update.clone()
        }
    }

    pub(crate) fn release(name: &str, version: &str) -> ReleaseInfo {
        ReleaseInfo {
            name: name.to_string(),
            newest_version: version.to_string(),
            match_32: Some(format!("^{name}$")),
            match_64: Some(format!("^{name} \\(x64\\)$")),
            install_32: Some(InstallInfo::new(
                InstallerKind::Exe,
                format!("https://example.com/{name}-{version}.exe"),
                HashAlgorithm::Sha256,
                "00".repeat(32),
                "/S",
            )),
            install_64: Some(InstallInfo::new(
                InstallerKind::Exe,
                format!("https://example.com/{name}-{version}-x64.exe"),
                HashAlgorithm::Sha256,
                "00".repeat(32),
                "/S",
            )),
        }
    }

    fn resolver(provider: FakeProvider, auto_get_newer: bool) -> ReleaseInfoResolver {
        ReleaseInfoResolver::new(Box::new(provider), Client::new(), auto_get_newer)
    }

    #[tokio::test]
    async fn test_known_info_when_not_seeking_newer() {
        let mut provider = FakeProvider::new(release("Tool", "1.0"));
        provider.searchable = true;
        provider.newer = Some(release("Tool", "2.0"));
        let searches = Arc::clone(&provider.searches);
        let resolver = resolver(provider, false);

        assert_eq!(resolver.info().await.newest_version, "1.0");
        assert_eq!(searches.load(Ordering::SeqCst), 0);
        assert_eq!(resolver.lookup().await, Lookup::NotAttempted);
    }

    #[tokio::test]
    async fn test_success_is_cached() {
        let mut provider = FakeProvider::new(release("Tool", "1.0"));
        provider.searchable = true;
        provider.newer = Some(release("Tool", "2.0"));
        let searches = Arc::clone(&provider.searches);
        let resolver = resolver(provider, true);

        assert_eq!(resolver.info().await.newest_version, "2.0");
        assert_eq!(resolver.info().await.newest_version, "2.0");
        assert_eq!(searches.load(Ordering::SeqCst), 1);
        assert!(matches!(resolver.lookup().await, Lookup::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_failure_is_never_retried() {
        let mut provider = FakeProvider::new(release("Tool", "1.0"));
        provider.searchable = true;
        let searches = Arc::clone(&provider.searches);
        let resolver = resolver(provider, true);

        for _ in 0..3 {
            assert_eq!(resolver.info().await, release("Tool", "1.0"));
        }
        assert_eq!(searches.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.lookup().await, Lookup::Failed);
    }

    #[tokio::test]
    async fn test_unsupported_lookup_never_called() {
        let provider = FakeProvider::new(release("Tool", "1.0"));
        let searches = Arc::clone(&provider.searches);
        let resolver = resolver(provider, true);

        resolver.info().await;
        resolver.info().await;
        assert_eq!(searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_needs_update_uses_resolved_version() {
        let mut provider = FakeProvider::new(release("Tool", "1.0"));
        provider.searchable = true;
        provider.newer = Some(release("Tool", "1.5"));
        let resolver = resolver(provider, true);

        assert!(resolver.needs_update(&DetectedSoftware::new("Tool", "1.2", None)).await);
        assert!(!resolver.needs_update(&DetectedSoftware::new("Tool", "1.5", None)).await);
    }
}
