use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::highlight::{OptimizerConfig, ScaleValue};

pub const CURRENT_VERSION: u32 = 1;
/// Upper bound for every configured delay
pub const MAX_DELAY_MS: u64 = 60_000;
const SETTINGS_FILENAME: &str = "highlighter.yaml";
const APP_NAME: &str = "pdf-highlighter";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlighterSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Quiet time before a text selection is finalized
    #[serde(default = "default_debounce_ms")]
    pub selection_debounce_ms: u64,

    /// Quiet time before a window resize re-evaluates page scale
    #[serde(default = "default_debounce_ms")]
    pub resize_debounce_ms: u64,

    /// How long scroll notifications are ignored after a programmatic scroll
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    /// Pixels left above a highlight scrolled into view
    #[serde(default = "default_scroll_margin")]
    pub scroll_margin: f64,

    #[serde(default = "default_line_overlap_ratio")]
    pub line_overlap_ratio: f64,

    #[serde(default = "default_adjacency_epsilon")]
    pub adjacency_epsilon: f64,

    #[serde(default)]
    pub scale_value: ScaleValue,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_scroll_settle_ms() -> u64 {
    100
}

fn default_scroll_margin() -> f64 {
    10.0
}

fn default_line_overlap_ratio() -> f64 {
    OptimizerConfig::default().line_overlap_ratio
}

fn default_adjacency_epsilon() -> f64 {
    OptimizerConfig::default().adjacency_epsilon
}

impl Default for HighlighterSettings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            selection_debounce_ms: default_debounce_ms(),
            resize_debounce_ms: default_debounce_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            scroll_margin: default_scroll_margin(),
            line_overlap_ratio: default_line_overlap_ratio(),
            adjacency_epsilon: default_adjacency_epsilon(),
            scale_value: ScaleValue::default(),
        }
    }
}

impl HighlighterSettings {
    pub fn selection_debounce(&self) -> Duration {
        delay(self.selection_debounce_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        delay(self.resize_debounce_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        delay(self.scroll_settle_ms)
    }

    /// Clamp out-of-range delays, warning about each one
    fn clamp_delays(&mut self) {
        for (name, value) in [
            ("selection_debounce_ms", &mut self.selection_debounce_ms),
            ("resize_debounce_ms", &mut self.resize_debounce_ms),
            ("scroll_settle_ms", &mut self.scroll_settle_ms),
        ] {
            if *value > MAX_DELAY_MS {
                warn!("{name} of {value}ms is too large, using {MAX_DELAY_MS}ms");
                *value = MAX_DELAY_MS;
            }
        }
    }

    pub fn optimizer(&self) -> OptimizerConfig {
        OptimizerConfig {
            line_overlap_ratio: self.line_overlap_ratio,
            adjacency_epsilon: self.adjacency_epsilon,
        }
    }
}

fn delay(ms: u64) -> Duration {
    Duration::from_millis(ms.min(MAX_DELAY_MS))
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load from the default location, falling back to defaults on any problem
pub fn load_settings() -> HighlighterSettings {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return HighlighterSettings::default();
    };
    if !path.exists() {
        info!("Settings file not found at {path:?}, using defaults");
        return HighlighterSettings::default();
    }
    load_settings_from_path(&path).unwrap_or_else(|e| {
        warn!("Falling back to default settings: {e:#}");
        HighlighterSettings::default()
    })
}

pub fn load_settings_from_path(path: &Path) -> Result<HighlighterSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {path:?}"))?;
    let mut settings: HighlighterSettings = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse settings file {path:?}"))?;
    debug!("Loaded settings from {path:?}");
    settings.clamp_delays();

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        save_settings_to_path(&settings, path)?;
    }
    Ok(settings)
}

fn migrate_settings(settings: &mut HighlighterSettings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_path(settings: &HighlighterSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
    }

    let content = serde_yaml::to_string(settings).context("Failed to serialize settings")?;
    fs::write(path, content).with_context(|| format!("Failed to save settings to {path:?}"))?;
    debug!("Saved settings to {path:?}");
    Ok(())
}
