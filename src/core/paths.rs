use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base stagehand config directory (~/.config/stagehand/ on Unix-like systems)
pub fn stagehand() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("stagehand"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("stagehand"))
    }
}

/// Global stagehand.json config file path
pub fn stagehand_json() -> Result<PathBuf> {
    Ok(stagehand()?.join("stagehand.json"))
}

/// Local clone of the deployment tracking repository
pub fn tracking_checkout() -> Result<PathBuf> {
    Ok(stagehand()?.join("tracking"))
}
