//! Runtime tuning knobs, loadable from a TOML file in the platform config
//! directory. Every value has a sensible default so a missing or invalid
//! file falls back silently.

use crate::errors::{NavError, NavResult};
use crate::screen::Viewport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Tolerance radius (tiles) at which a move is declared complete
    pub finish_distance: i32,
    /// Randomized window between walk commands, mimicking human cadence
    pub walk_cadence_min_ms: u64,
    pub walk_cadence_max_ms: u64,
    /// Interval between the heavier stuck/validity re-checks
    pub recheck_interval_ms: u64,
    /// Suggested host busy-loop sleep between `run` calls
    pub tick_interval_ms: u64,
    /// Hard ceiling on a single move operation
    pub move_timeout_secs: u64,
    /// Size of the game render area
    pub viewport: Viewport,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            finish_distance: 4,
            walk_cadence_min_ms: 700,
            walk_cadence_max_ms: 1100,
            recheck_interval_ms: 200,
            tick_interval_ms: 50,
            move_timeout_secs: 30,
            viewport: Viewport::default(),
        }
    }
}

impl BotConfig {
    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.recheck_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.move_timeout_secs)
    }
}

pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().and_then(|mut path| {
        path.push("wayfarer");
        fs::create_dir_all(&path).ok()?;
        path.push("config.toml");
        Some(path)
    })
}

pub fn load_config() -> BotConfig {
    if let Some(config_path) = get_config_path() {
        if let Ok(contents) = fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<BotConfig>(&contents) {
                return config;
            }
        }
    }
    BotConfig::default()
}

pub fn save_config(config: &BotConfig) -> NavResult<()> {
    let config_path = get_config_path().ok_or(NavError::ConfigDirNotFound)?;
    let contents = toml::to_string_pretty(config)?;
    fs::write(config_path, contents)?;
    Ok(())
}
