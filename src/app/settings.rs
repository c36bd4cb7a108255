use notchkit::{Direction, EditorConfig, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct AppSettings {
    pub document_path: String,
    pub svg_path: String,
    pub language: String,
    /// Overrides the direction of the loaded translations when set.
    pub direction: Option<Direction>,
    pub text_size: f32,
    pub registry_path: Option<String>,
    pub translations_path: Option<String>,
    pub editor: EditorConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            document_path: "program.json".to_string(),
            svg_path: "program.svg".to_string(),
            language: "en".to_string(),
            direction: None,
            text_size: 12.0,
            registry_path: None,
            translations_path: None,
            editor: EditorConfig::default(),
        }
    }
}

pub(super) fn load_settings(path: &str) -> Option<AppSettings> {
    let s = std::fs::read_to_string(path).ok()?;
    if path.ends_with(".toml") {
        toml::from_str::<AppSettings>(&s)
            .ok()
            .or_else(|| serde_json::from_str::<AppSettings>(&s).ok())
    } else {
        serde_json::from_str::<AppSettings>(&s)
            .ok()
            .or_else(|| toml::from_str::<AppSettings>(&s).ok())
    }
}

pub(super) fn save_settings(path: &str, settings: &AppSettings) -> Result<()> {
    let text = if path.ends_with(".toml") {
        toml::to_string_pretty(settings)?
    } else {
        serde_json::to_string_pretty(settings)?
    };
    std::fs::write(path, text)?;
    Ok(())
}
