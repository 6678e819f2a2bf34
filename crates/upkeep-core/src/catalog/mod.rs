//! Built-in providers, one per vendor product.

mod git;
mod inkscape;
mod pidgin;
mod putty;
mod seven_zip;
mod thunderbird;

pub use git::Git;
pub use inkscape::Inkscape;
pub use pidgin::Pidgin;
pub use putty::Putty;
pub use seven_zip::SevenZip;
pub use thunderbird::Thunderbird;

use std::sync::{Arc, OnceLock};

use anyhow::{Context, bail};
use chrono::{TimeZone, Utc};
use regex::Regex;
use reqwest::Client;
use upkeep_schema::Signature;

use crate::config::ExclusionList;
use crate::provider::Provider;
use crate::resolver::ReleaseInfoResolver;

/// Every built-in provider.
pub fn providers() -> Vec<Box<dyn Provider>> {
    let mut list: Vec<Box<dyn Provider>> = vec![
        Box::new(SevenZip::default()),
        Box::new(Git::default()),
        Box::new(Inkscape::default()),
        Box::new(Pidgin::default()),
        Box::new(Putty::default()),
    ];
    list.extend(
        Thunderbird::languages()
            .map(|lang| Box::new(Thunderbird::new(lang)) as Box<dyn Provider>),
    );
    list
}

/// The active catalog: every provider not excluded, wrapped in a resolver.
pub fn all(
    client: &Client,
    auto_get_newer: bool,
    excluded: &ExclusionList,
) -> Vec<Arc<ReleaseInfoResolver>> {
    providers()
        .into_iter()
        .filter(|provider| {
            let ids = provider.ids();
            let keep = !excluded.excludes_any(&ids);
            if !keep {
                tracing::debug!("Excluding {ids:?}");
            }
            keep
        })
        .map(|provider| Arc::new(ReleaseInfoResolver::new(provider, client.clone(), auto_get_newer)))
        .collect()
}

/// First match of capture `group` of `pattern` in `text`.
fn capture(pattern: &str, text: &str, group: usize) -> anyhow::Result<String> {
    let re = Regex::new(pattern)?;
    re.captures(text)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str().to_string())
        .with_context(|| format!("pattern {pattern:?} not found"))
}

static NO_REDIRECT_CLIENT: OnceLock<Client> = OnceLock::new();

/// Shared client that reports redirects instead of following them.
fn no_redirect_client() -> anyhow::Result<&'static Client> {
    if let Some(client) = NO_REDIRECT_CLIENT.get() {
        return Ok(client);
    }
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(crate::USER_AGENT)
        .timeout(crate::HTTP_TIMEOUT)
        .build()?;
    Ok(NO_REDIRECT_CLIENT.get_or_init(|| client))
}

/// Send a HEAD request without following redirects and return the target.
async fn redirect_location(url: &str) -> anyhow::Result<String> {
    let client = no_redirect_client()?;
    let response = client.head(url).send().await?;
    let status = response.status();
    if !status.is_redirection() {
        bail!("expected a redirect from {url}, got {status}");
    }
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .with_context(|| format!("redirect from {url} has no location"))?
        .to_str()?;
    Ok(location.to_string())
}

/// Signature that stops being checked at the given UTC instant.
fn signature_until(publisher: &str, year: i32, month: u32, day: u32, hour: u32) -> Option<Signature> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .map(|expires| Signature::new(publisher, expires))
}
