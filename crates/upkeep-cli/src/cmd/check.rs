//! Report which installed applications have updates.

use std::process::ExitCode;

use anyhow::Result;
use crossterm::style::Stylize;

use super::{RunOptions, http_client};

pub async fn check(options: &RunOptions) -> Result<ExitCode> {
    let client = http_client()?;
    let plan = options.plan(&client).await?;

    if plan.is_empty() {
        println!("{}", "No known software was found".dark_grey());
        return Ok(ExitCode::SUCCESS);
    }

    let name_width = 36;
    let version_width = 16;
    println!();
    let header = format!("{:<name_width$}{:<version_width$}{:<version_width$}", "Software", "Installed", "Newest");
    println!("{}", header.dark_grey());

    let mut outdated = 0;
    for entry in &plan {
        let info = entry.software.info().await;
        let installed = entry.detected.display_version.as_deref().unwrap_or("unknown");
        let name = format!("{} ({})", info.name, entry.app_type);
        if entry.needs_update {
            outdated += 1;
            println!(
                "{name:<name_width$}{installed:<version_width$}{:<version_width$}{}",
                info.newest_version,
                "update available".yellow()
            );
        } else {
            println!(
                "{name:<name_width$}{installed:<version_width$}{:<version_width$}{}",
                info.newest_version,
                "up to date".green()
            );
        }
    }

    println!();
    if outdated == 0 {
        println!("{}", "Everything is up to date".dark_grey());
    } else {
        println!("{}", format!("{outdated} update(s) available").dark_grey());
    }
    Ok(ExitCode::SUCCESS)
}
