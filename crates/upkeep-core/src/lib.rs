pub mod catalog;
pub mod checksum;
pub mod config;
pub mod detect;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod planner;
pub mod provider;
pub mod resolver;
pub mod trust;

pub use orchestrator::{RunAborted, UpdateError, Updater, encode_result};
pub use paths::*;
pub use planner::{QueryEntry, query};
pub use provider::{PreUpdateStep, Provider};
pub use resolver::ReleaseInfoResolver;

/// User Agent string for all HTTP requests
pub const USER_AGENT: &str = concat!("upkeep/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout for metadata lookups and downloads.
pub const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Build the HTTP client shared by providers and the downloader.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
}
