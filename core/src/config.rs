//! Reader configuration loaded from the platform config directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANISATION: &str = "MangaReader";
pub(crate) const APP_NAME: &str = "manga-reader";

const CONFIG_FILE: &str = "config.json";

/// Top-level configuration. Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub preload: PreloadConfig,
    pub catalog: CatalogConfig,
    pub timing: TimingConfig,
    pub zoom: ZoomConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Total load attempts per page before falling back to the placeholder.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Pages loaded beyond the current one.
    pub look_ahead: u32,
    pub placeholder_url: String,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1_000,
            look_ahead: 3,
            placeholder_url: "/placeholder.png".to_string(),
        }
    }
}

impl PreloadConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub chapter_limit: u32,
    pub search_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { chapter_limit: 100, search_limit: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub page_transition_ms: u64,
    pub autoplay_delay_ms: u64,
    pub controls_hide_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { page_transition_ms: 300, autoplay_delay_ms: 5_000, controls_hide_ms: 3_000 }
    }
}

impl TimingConfig {
    pub fn page_transition(&self) -> Duration {
        Duration::from_millis(self.page_transition_ms)
    }

    pub fn autoplay_delay(&self) -> Duration {
        Duration::from_millis(self.autoplay_delay_ms)
    }

    pub fn controls_hide(&self) -> Duration {
        Duration::from_millis(self.controls_hide_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self { min: 0.5, max: 3.0, step: 0.25 }
    }
}

impl ZoomConfig {
    pub fn clamp(&self, zoom: f32) -> f32 {
        if zoom.is_finite() { zoom.clamp(self.min, self.max) } else { 1.0 }
    }
}

impl ReaderConfig {
    /// Load `config.json` from the platform config directory, falling back to defaults.
    pub fn load_default() -> crate::Result<Self> {
        let path = default_config_path()?;
        Self::load(&path)
    }

    /// Load the configuration at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let config = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice::<ReaderConfig>(&bytes)
                .with_context(|| format!("parsing reader config at {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "config", path = %path.display(), "no config file, using defaults");
                ReaderConfig::default()
            }
            Err(err) => {
                return Err(anyhow::Error::from(err)
                    .context(format!("reading reader config at {}", path.display())));
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.preload.max_attempts == 0 {
            return Err(ReaderError::Config("preload.max_attempts must be at least 1".into()));
        }
        if self.catalog.chapter_limit == 0 {
            return Err(ReaderError::Config("catalog.chapter_limit must be at least 1".into()));
        }
        if !(self.zoom.min > 0.0 && self.zoom.min <= self.zoom.max) {
            return Err(ReaderError::Config(format!(
                "zoom bounds are invalid: min {} max {}",
                self.zoom.min, self.zoom.max
            )));
        }
        Ok(())
    }
}

pub fn default_config_path() -> crate::Result<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .ok_or_else(|| anyhow!("unable to resolve application config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ReaderConfig::load(&temp.path().join("absent.json")).expect("defaults");
        assert_eq!(config, ReaderConfig::default());
        assert_eq!(config.preload.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "preload": { "look_ahead": 5 }, "timing": { "autoplay_delay_ms": 800 } }"#)
            .unwrap();

        let config = ReaderConfig::load(&path).expect("parse");
        assert_eq!(config.preload.look_ahead, 5);
        assert_eq!(config.preload.max_attempts, 3);
        assert_eq!(config.timing.autoplay_delay(), Duration::from_millis(800));
        assert_eq!(config.catalog.chapter_limit, 100);
    }

    #[test]
    fn rejects_zero_attempts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "preload": { "max_attempts": 0 } }"#).unwrap();

        let err = ReaderConfig::load(&path).expect_err("zero attempts");
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn zoom_clamp_rejects_nan() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.clamp(10.0), 3.0);
        assert_eq!(zoom.clamp(f32::NAN), 1.0);
    }
}
