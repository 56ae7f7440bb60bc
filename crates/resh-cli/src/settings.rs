//! Loading editor timings for the CLI.
//!
//! JSON files go through the shared config loader. KDL files are a flat list
//! of overrides on top of the defaults:
//!
//! ```kdl
//! commit-debounce-ms 750
//! cursor-idle-ms 1200
//! near-bottom-px 240.5
//! cursor-marker "|"
//! ```

use std::path::Path;

use kdl::{KdlDocument, KdlValue};
use miette::{IntoDiagnostic, Result};
use resh_common::EditorConfig;
use resh_common::config::FileStore;

pub async fn load(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("kdl") => {
            let content = tokio::fs::read_to_string(path).await.into_diagnostic()?;
            let config = from_kdl(&content)?;
            config.validate()?;
            config
        }
        _ => EditorConfig::load(&FileStore::new(path)).await?,
    };
    tracing::debug!(path = %path.display(), "loaded editor config");
    Ok(config)
}

/// Apply the overrides in `content` to the default config.
pub fn from_kdl(content: &str) -> Result<EditorConfig> {
    let doc: KdlDocument = content.parse()?;
    let mut config = EditorConfig::default();

    for node in doc.nodes() {
        let name = node.name().value();
        let value = node
            .entries()
            .first()
            .map(|entry| entry.value())
            .ok_or_else(|| miette::miette!("`{name}` needs a value"))?;

        match name {
            "fade-ms" => config.render.fade_ms = millis(name, value)?,
            "cursor-idle-ms" => config.render.cursor_idle_ms = millis(name, value)?,
            "commit-debounce-ms" => config.render.commit_debounce_ms = millis(name, value)?,
            "near-bottom-px" => config.render.near_bottom_px = number(name, value)?,
            "fade-opacity" => config.render.fade_opacity = number(name, value)? as f32,
            "cursor-marker" => {
                config.render.cursor_marker = value
                    .as_string()
                    .ok_or_else(|| miette::miette!("`{name}` must be a string"))?
                    .to_owned()
            }
            "content-debounce-ms" => config.autosave.content_debounce_ms = millis(name, value)?,
            "translation-debounce-ms" => {
                config.autosave.translation_debounce_ms = millis(name, value)?
            }
            "media-search-debounce-ms" => config.media_search_debounce_ms = millis(name, value)?,
            other => tracing::warn!(setting = other, "ignoring unknown setting"),
        }
    }

    Ok(config)
}

fn millis(name: &str, value: &KdlValue) -> Result<u64> {
    value
        .as_i64()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| miette::miette!("`{name}` must be a non-negative integer, got {value}"))
}

fn number(name: &str, value: &KdlValue) -> Result<f64> {
    value
        .as_f64()
        .or_else(|| value.as_i64().map(|n| n as f64))
        .ok_or_else(|| miette::miette!("`{name}` must be a number, got {value}"))
}
