use eframe::egui;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::layout::Metrics;

/// Editing behaviour knobs. Every field has a default so partial files load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Largest anchor-to-connection distance that still snaps.
    pub max_snap_distance: f32,
    /// Pointer travel needed before a press turns into a drag.
    pub min_drag_distance: f32,
    /// Where a block pushed out of an input lands, relative to the input.
    pub displaced_offset: [f32; 2],
    pub undo_limit: usize,
    pub metrics: Metrics,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_snap_distance: 20.0,
            min_drag_distance: 3.0,
            displaced_offset: [20.0, 20.0],
            undo_limit: 200,
            metrics: Metrics::default(),
        }
    }
}

impl EditorConfig {
    pub fn displaced_offset(&self) -> egui::Vec2 {
        egui::vec2(self.displaced_offset[0], self.displaced_offset[1])
    }

    /// Parses TOML or JSON, trying the format the extension suggests first.
    pub fn parse(text: &str, prefer_toml: bool) -> Result<Self> {
        if prefer_toml {
            match toml::from_str::<Self>(text) {
                Ok(config) => Ok(config),
                Err(toml_err) => serde_json::from_str(text).map_err(|_| Error::TomlDe(toml_err)),
            }
        } else {
            match serde_json::from_str::<Self>(text) {
                Ok(config) => Ok(config),
                Err(json_err) => toml::from_str(text).map_err(|_| Error::Json(json_err)),
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        Self::parse(&text, is_toml(path))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, text)?;
        Ok(())
    }
}

pub(crate) fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EditorConfig::parse("max_snap_distance = 12.0\n", true).unwrap();
        assert_eq!(config.max_snap_distance, 12.0);
        assert_eq!(config.min_drag_distance, 3.0);
        assert_eq!(config.undo_limit, 200);
        assert_eq!(config.metrics, Metrics::default());
    }

    #[test]
    fn json_is_accepted_where_toml_was_expected() {
        let config = EditorConfig::parse(r#"{"undo_limit": 5}"#, true).unwrap();
        assert_eq!(config.undo_limit, 5);
    }

    #[test]
    fn nested_metrics_override() {
        let text = "[metrics]\nnotch_left = 20.0\n";
        let config = EditorConfig::parse(text, true).unwrap();
        assert_eq!(config.metrics.notch_left, 20.0);
        assert_eq!(config.metrics.branch_width, Metrics::default().branch_width);
    }

    #[test]
    fn garbage_reports_the_preferred_format() {
        let err = EditorConfig::parse("not [ valid", false).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn save_and_load_through_both_formats() {
        let dir = std::env::temp_dir().join(format!("notchkit-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = EditorConfig::default();
        config.max_snap_distance = 33.0;
        for name in ["editor.toml", "editor.json"] {
            let path = dir.join(name);
            config.save(&path).unwrap();
            assert_eq!(EditorConfig::load(&path).unwrap(), config);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
