//! Editor tuning configuration.
//!
//! All timings are stored in milliseconds so the config round-trips cleanly
//! through JSON and the CLI's KDL overrides. None of the defaults are
//! load-bearing for correctness; they were tuned for perceived smoothness.

use serde::{Deserialize, Serialize};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default marker appended to the view while text is streaming in.
pub const DEFAULT_CURSOR_MARKER: &str = "<span class=\"typing-cursor\">\u{258C}</span>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub render: RenderConfig,
    pub autosave: AutoSaveConfig,
    /// Quiet period before a media library search fires.
    pub media_search_debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            autosave: AutoSaveConfig::default(),
            media_search_debounce_ms: 500,
        }
    }
}

/// Timings for the incremental render coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Length of the dimmed phase when streamed text grows.
    pub fade_ms: u64,
    /// Idle time after the last delivery before the cursor marker is removed.
    pub cursor_idle_ms: u64,
    /// Trailing debounce for committed-change notifications.
    pub commit_debounce_ms: u64,
    /// Distance from the bottom of the view, in pixels, within which
    /// auto-scroll is allowed.
    pub near_bottom_px: f64,
    /// Opacity applied during the fade phase.
    pub fade_opacity: f32,
    pub cursor_marker: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fade_ms: 100,
            cursor_idle_ms: 1000,
            commit_debounce_ms: 500,
            near_bottom_px: 300.0,
            fade_opacity: 0.7,
            cursor_marker: DEFAULT_CURSOR_MARKER.to_owned(),
        }
    }
}

impl RenderConfig {
    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }

    pub fn cursor_idle(&self) -> Duration {
        Duration::from_millis(self.cursor_idle_ms)
    }

    pub fn commit_debounce(&self) -> Duration {
        Duration::from_millis(self.commit_debounce_ms)
    }
}

/// Debounce windows for the auto-save coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Quiet window for the original article body.
    pub content_debounce_ms: u64,
    /// Quiet window for translation bodies.
    pub translation_debounce_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            content_debounce_ms: 2000,
            translation_debounce_ms: 3000,
        }
    }
}

impl AutoSaveConfig {
    pub fn content_debounce(&self) -> Duration {
        Duration::from_millis(self.content_debounce_ms)
    }

    pub fn translation_debounce(&self) -> Duration {
        Duration::from_millis(self.translation_debounce_ms)
    }
}

impl EditorConfig {
    pub fn media_search_debounce(&self) -> Duration {
        Duration::from_millis(self.media_search_debounce_ms)
    }

    /// Reject settings that would make the coordinators misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.cursor_marker.is_empty() {
            return Err(ConfigError::Invalid {
                key: "render.cursor_marker",
                message: "must not be empty".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.render.fade_opacity) {
            return Err(ConfigError::Invalid {
                key: "render.fade_opacity",
                message: format!("{} is outside 0.0..=1.0", self.render.fade_opacity),
            });
        }
        if !self.render.near_bottom_px.is_finite() || self.render.near_bottom_px < 0.0 {
            return Err(ConfigError::Invalid {
                key: "render.near_bottom_px",
                message: "must be a non-negative number".into(),
            });
        }
        if self.render.cursor_idle_ms < self.render.fade_ms {
            return Err(ConfigError::Invalid {
                key: "render.cursor_idle_ms",
                message: "cursor would disappear before the fade finishes".into(),
            });
        }
        Ok(())
    }

    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self, ConfigError> {
        let config = loader.load().await?;
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "rejecting editor config");
            return Err(e);
        }
        tracing::debug!(
            commit_debounce_ms = config.render.commit_debounce_ms,
            content_debounce_ms = config.autosave.content_debounce_ms,
            "editor config loaded"
        );
        Ok(config)
    }

    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<(), ConfigError> {
        saver.save(self).await
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    fn load(&self) -> impl Future<Output = Result<EditorConfig, ConfigError>> + Send;
}

/// The trait for saving configuration data.
pub trait Saver {
    fn save(&self, config: &EditorConfig) -> impl Future<Output = Result<(), ConfigError>> + Send;
}

/// An implementation of [`Loader`] and [`Saver`] backed by a JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn check_format(&self) -> Result<(), ConfigError> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(()),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_owned(),
            )),
        }
    }
}

impl Loader for FileStore {
    async fn load(&self) -> Result<EditorConfig, ConfigError> {
        self.check_format()?;
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Saver for FileStore {
    async fn save(&self, config: &EditorConfig) -> Result<(), ConfigError> {
        self.check_format()?;
        std::fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }
}
