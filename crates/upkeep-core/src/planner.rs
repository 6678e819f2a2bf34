//! Joins detected software with the provider catalog.

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use upkeep_schema::{AppType, DetectedSoftware};

use crate::resolver::ReleaseInfoResolver;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("invalid match pattern {pattern:?} of {name}: {source}")]
    Pattern {
        name: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One detected installation, the provider that recognized it, and the verdict.
#[derive(Debug, Clone)]
pub struct QueryEntry {
    pub software: Arc<ReleaseInfoResolver>,
    pub detected: DetectedSoftware,
    pub app_type: AppType,
    pub needs_update: bool,
}

struct Matcher {
    software: Arc<ReleaseInfoResolver>,
    re32: Option<Regex>,
    re64: Option<Regex>,
}

impl Matcher {
    fn classify(&self, display_name: &str) -> Option<AppType> {
        if self.re32.as_ref().is_some_and(|re| re.is_match(display_name)) {
            Some(AppType::Bit32)
        } else if self.re64.as_ref().is_some_and(|re| re.is_match(display_name)) {
            Some(AppType::Bit64)
        } else {
            None
        }
    }
}

fn compile(name: &str, pattern: Option<&str>) -> Result<Option<Regex>, PlanError> {
    let Some(pattern) = pattern.filter(|p| !p.trim().is_empty()) else {
        return Ok(None);
    };
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| PlanError::Pattern {
            name: name.to_string(),
            pattern: pattern.to_string(),
            source,
        })
}

/// Match every detected entry against `catalog`, in sorted order.
///
/// The first provider whose 32 bit or 64 bit pattern matches the display
/// name claims the entry; entries nobody recognizes are left out.
pub async fn query(
    catalog: &[Arc<ReleaseInfoResolver>],
    detected: &[DetectedSoftware],
) -> Result<Vec<QueryEntry>, PlanError> {
    let mut matchers = Vec::with_capacity(catalog.len());
    for software in catalog {
        let info = software.info().await;
        matchers.push(Matcher {
            software: Arc::clone(software),
            re32: compile(&info.name, info.match_32.as_deref())?,
            re64: compile(&info.name, info.match_64.as_deref())?,
        });
    }

    let mut sorted = detected.to_vec();
    sorted.sort();

    let mut entries = Vec::new();
    for item in sorted {
        let Some(name) = item.display_name.as_deref() else {
            continue;
        };
        let Some((matcher, app_type)) = matchers
            .iter()
            .find_map(|m| m.classify(name).map(|app_type| (m, app_type)))
        else {
            continue;
        };

        let needs_update = matcher.software.needs_update(&item).await;
        tracing::debug!(
            "{item} matched {:?} as {app_type}, needs update: {needs_update}",
            matcher.software.ids()
        );
        entries.push(QueryEntry {
            software: Arc::clone(&matcher.software),
            detected: item,
            app_type,
            needs_update,
        });
    }
    Ok(entries)
}
