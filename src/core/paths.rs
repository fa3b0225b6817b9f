use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "REDEPLOY_CONFIG";

/// Base redeploy config directory (universal ~/.config/redeploy/ on all platforms)
pub fn redeploy() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected("APPDATA environment variable not set on Windows".to_string())
        })?;
        Ok(PathBuf::from(appdata).join("redeploy"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("redeploy"))
    }
}

/// Global redeploy.json config file path
pub fn global_config() -> Result<PathBuf> {
    Ok(redeploy()?.join("redeploy.json"))
}

/// Config files looked up when no path is given, in priority order.
pub fn search_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            candidates.push(PathBuf::from(shellexpand::tilde(&path).to_string()));
        }
    }
    candidates.push(PathBuf::from("redeploy.json"));
    candidates.push(PathBuf::from("redeploy.toml"));
    if let Ok(global) = global_config() {
        candidates.push(global);
    }
    candidates
}
