// SPDX-License-Identifier: MPL-2.0
//! Player configuration, loaded from and saved to a `player.toml` file.
//!
//! # Examples
//!
//! ```no_run
//! use vdec_player::config::{self, PlayerConfig};
//! use std::path::PathBuf;
//!
//! // Load existing configuration
//! let mut config = config::load().unwrap_or_default();
//!
//! // Modify a setting
//! config.decoder_threads = 2;
//!
//! // Save the modified configuration
//! config::save(&config).expect("Failed to save config");
//!
//! // To load/save from a specific path (e.g., for testing)
//! let temp_dir = PathBuf::from("./temp_config_dir");
//! std::fs::create_dir_all(&temp_dir).unwrap();
//! let temp_file = temp_dir.join("test_player.toml");
//! config::save_to_path(&config, &temp_file).expect("Failed to save to path");
//! let loaded = config::load_from_path(&temp_file).expect("Failed to load from path");
//! assert_eq!(loaded.decoder_threads, 2);
//! std::fs::remove_dir_all(&temp_dir).unwrap();
//! ```

pub mod defaults;

use crate::error::Result;
use defaults::{
    DEFAULT_DECODER_THREADS, DEFAULT_FALLBACK_PACE_INTERVAL_MICROS,
    DEFAULT_MAX_CONSECUTIVE_READ_ERRORS, DEFAULT_SEEK_TOLERANCE_MS, MAX_DECODER_THREADS,
    MAX_SEEK_TOLERANCE_MS, MIN_PACE_INTERVAL_MICROS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "player.toml";
const APP_NAME: &str = "VdecPlayer";

/// Tunables of the playback engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Worker threads requested from the codec when a source is opened.
    pub decoder_threads: usize,
    /// Pace interval used when the stream has no usable frame rate.
    pub fallback_pace_interval_micros: u64,
    /// Frames earlier than `target - tolerance` are discarded while seeking.
    pub seek_tolerance_ms: u32,
    /// Consecutive packet read errors tolerated before retrieval gives up.
    pub max_consecutive_read_errors: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            decoder_threads: DEFAULT_DECODER_THREADS,
            fallback_pace_interval_micros: DEFAULT_FALLBACK_PACE_INTERVAL_MICROS,
            seek_tolerance_ms: DEFAULT_SEEK_TOLERANCE_MS,
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

impl PlayerConfig {
    /// Returns a copy with every field forced into its valid range.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.decoder_threads = self.decoder_threads.clamp(1, MAX_DECODER_THREADS);
        self.fallback_pace_interval_micros = self
            .fallback_pace_interval_micros
            .max(MIN_PACE_INTERVAL_MICROS);
        self.seek_tolerance_ms = self.seek_tolerance_ms.min(MAX_SEEK_TOLERANCE_MS);
        self.max_consecutive_read_errors = self.max_consecutive_read_errors.max(1);
        self
    }

    pub fn fallback_pace_interval(&self) -> Duration {
        Duration::from_micros(
            self.fallback_pace_interval_micros
                .max(MIN_PACE_INTERVAL_MICROS),
        )
    }

    pub fn seek_tolerance_secs(&self) -> f64 {
        f64::from(self.seek_tolerance_ms) / 1000.0
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<PlayerConfig> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(PlayerConfig::default())
}

pub fn save(config: &PlayerConfig) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

/// Reads a config file; unparsable content yields the defaults.
pub fn load_from_path(path: &Path) -> Result<PlayerConfig> {
    let content = fs::read_to_string(path)?;
    let config = match toml::from_str::<PlayerConfig>(&content) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring invalid config {}: {}", path.display(), e);
            PlayerConfig::default()
        }
    };
    Ok(config.validated())
}

pub fn save_to_path(config: &PlayerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip_preserves_fields() {
        let config = PlayerConfig {
            decoder_threads: 2,
            fallback_pace_interval_micros: 10_000,
            seek_tolerance_ms: 20,
            max_consecutive_read_errors: 8,
        };
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("player.toml");

        save_to_path(&config, &config_path).expect("failed to save config");
        let loaded = load_from_path(&config_path).expect("failed to load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn load_from_path_returns_default_on_invalid_toml() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("player.toml");
        fs::write(&config_path, "not = valid = toml").expect("failed to write invalid toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert_eq!(loaded, PlayerConfig::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("player.toml");
        fs::write(&config_path, "decoder_threads = 8\n").expect("failed to write toml");

        let loaded = load_from_path(&config_path).expect("load should not error");
        assert_eq!(loaded.decoder_threads, 8);
        assert_eq!(loaded.seek_tolerance_ms, DEFAULT_SEEK_TOLERANCE_MS);
    }

    #[test]
    fn validated_clamps_out_of_range_values() {
        let config = PlayerConfig {
            decoder_threads: 0,
            fallback_pace_interval_micros: 0,
            seek_tolerance_ms: 60_000,
            max_consecutive_read_errors: 0,
        }
        .validated();

        assert_eq!(config.decoder_threads, 1);
        assert_eq!(config.fallback_pace_interval_micros, MIN_PACE_INTERVAL_MICROS);
        assert_eq!(config.seek_tolerance_ms, MAX_SEEK_TOLERANCE_MS);
        assert_eq!(config.max_consecutive_read_errors, 1);
    }

    #[test]
    fn default_fallback_interval_is_four_millis() {
        let config = PlayerConfig::default();
        assert_eq!(config.fallback_pace_interval(), Duration::from_millis(4));
        assert!((config.seek_tolerance_secs() - 0.05).abs() < 1e-12);
    }
}
