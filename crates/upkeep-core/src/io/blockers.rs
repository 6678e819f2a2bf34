//! Detection of processes that block an installation.

use std::collections::HashSet;

use sysinfo::{ProcessesToUpdate, System};

/// Answers which of a set of process names are currently running.
pub trait ProcessProbe: Send + Sync {
    fn running(&self, names: &[String]) -> Vec<String>;
}

/// Process table of the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn running(&self, names: &[String]) -> Vec<String> {
        if names.is_empty() {
            return Vec::new();
        }
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let active: HashSet<String> = system
            .processes()
            .values()
            .map(|process| normalize_process_name(&process.name().to_string_lossy()))
            .collect();
        matching(names, &active)
    }
}

/// Lowercase and strip a trailing `.exe`.
pub fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

fn matching(names: &[String], active: &HashSet<String>) -> Vec<String> {
    names
        .iter()
        .filter(|name| active.contains(&normalize_process_name(name)))
        .cloned()
        .collect()
}
