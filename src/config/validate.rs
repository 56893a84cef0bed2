// src/config/validate.rs

use std::path::PathBuf;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let paths = raw.paths.iter().map(PathBuf::from).collect();
        Ok(ConfigFile::new_unchecked(raw.watcher, paths))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watcher_section(cfg)?;
    validate_paths(cfg)?;
    Ok(())
}

fn validate_watcher_section(cfg: &RawConfigFile) -> Result<()> {
    let watcher = &cfg.watcher;

    if watcher.callback_threads == 0 {
        return Err(WatchError::ConfigError(
            "[watcher].callback_threads must be >= 1 (got 0)".to_string(),
        ));
    }
    if watcher.shutdown_timeout_secs == 0 {
        return Err(WatchError::ConfigError(
            "[watcher].shutdown_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if watcher.poll_interval_ms == 0 {
        return Err(WatchError::ConfigError(
            "[watcher].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    if let Some(idx) = cfg.paths.iter().position(|p| p.trim().is_empty()) {
        return Err(WatchError::ConfigError(format!(
            "paths[{idx}] is empty"
        )));
    }
    Ok(())
}
