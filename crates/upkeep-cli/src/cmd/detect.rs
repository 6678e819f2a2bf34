//! List installed software.

use std::process::ExitCode;

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use super::RunOptions;

pub fn detect(options: &RunOptions, json: bool) -> Result<ExitCode> {
    let detected = options.detect()?;

    if json {
        let out = serde_json::to_string_pretty(&detected).context("Failed to serialize software list")?;
        println!("{out}");
        return Ok(ExitCode::SUCCESS);
    }

    for sw in &detected {
        let name = sw.display_name.as_deref().unwrap_or("<unnamed>");
        let version = sw.display_version.as_deref().unwrap_or("");
        match sw.install_path.as_deref() {
            Some(path) => println!("{name} {version} {}", path.dark_grey()),
            None => println!("{name} {version}"),
        }
    }
    println!();
    println!("{}", format!("{} application(s)", detected.len()).dark_grey());
    Ok(ExitCode::SUCCESS)
}
