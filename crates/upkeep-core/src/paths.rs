use std::path::PathBuf;

/// Name of the installer cache below the data root.
pub const CACHE_DIR_NAME: &str = ".upkeepCache";

/// Returns the data root, or None if no candidate directory can be resolved.
///
/// `UPKEEP_HOME` wins. Otherwise the per-user roaming application data
/// directory is used, falling back to the local one and finally to the
/// machine-wide `%ProgramData%`.
pub fn try_data_root() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("UPKEEP_HOME") {
        return Some(PathBuf::from(val));
    }
    dirs::config_dir()
        .or_else(dirs::data_local_dir)
        .or_else(|| std::env::var_os("ProgramData").map(PathBuf::from))
}

/// Installer cache: <data root>/.upkeepCache
pub fn cache_dir() -> Option<PathBuf> {
    try_data_root().map(|root| root.join(CACHE_DIR_NAME))
}

/// Config file: <data root>/upkeep/upkeep.toml
pub fn config_path() -> Option<PathBuf> {
    try_data_root().map(|root| root.join("upkeep").join("upkeep.toml"))
}
