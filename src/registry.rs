//! Block-type registry and translation tables, both loaded from TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::Direction;
use crate::input::{InputKind, Value};

const BUILTIN_BLOCKS: &str = include_str!("../assets/blocks.toml");
const BUILTIN_EN: &str = include_str!("../assets/lang/en.toml");
const BUILTIN_HE: &str = include_str!("../assets/lang/he.toml");

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    #[default]
    Command,
    Reporter,
    Boolean,
    Undefined,
}

impl BlockType {
    /// Command-like blocks chain in stacks; value blocks travel alone.
    pub fn is_stackable(self) -> bool {
        matches!(self, BlockType::Command | BlockType::Undefined)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentType {
    String,
    Number,
    Angle,
    Boolean,
    Branch,
}

impl ArgumentType {
    pub fn input_kind(self) -> Option<InputKind> {
        match self {
            ArgumentType::String => Some(InputKind::String),
            ArgumentType::Number => Some(InputKind::Number),
            ArgumentType::Angle => Some(InputKind::Angle),
            ArgumentType::Boolean => Some(InputKind::Boolean),
            ArgumentType::Branch => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    #[serde(rename = "type")]
    pub arg_type: ArgumentType,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub menu: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub opcode: String,
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    /// Fallback label template when no translation exists.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub hat: bool,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub args: BTreeMap<String, ArgSpec>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default, rename = "category")]
    pub categories: Vec<Category>,
}

/// Splits `category.opcode` at the first dot.
pub fn split_opcode(full: &str) -> (&str, &str) {
    match full.split_once('.') {
        Some((category, opcode)) => (category, opcode),
        None => ("", full),
    }
}

impl Registry {
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_BLOCKS)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Adds a category, or merges its blocks into an existing one with the
    /// same id. Later specs win over earlier ones with the same opcode.
    pub fn add_category(&mut self, category: Category) {
        match self.categories.iter_mut().find(|c| c.id == category.id) {
            Some(existing) => {
                debug!(category = %category.id, blocks = category.blocks.len(), "merging category");
                if !category.color.is_empty() {
                    existing.color = category.color;
                }
                for spec in category.blocks {
                    match existing.blocks.iter_mut().find(|b| b.opcode == spec.opcode) {
                        Some(slot) => *slot = spec,
                        None => existing.blocks.push(spec),
                    }
                }
            }
            None => {
                debug!(category = %category.id, blocks = category.blocks.len(), "adding category");
                self.categories.push(category);
            }
        }
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn resolve(&self, full: &str) -> Option<(&Category, &BlockSpec)> {
        let (category, opcode) = split_opcode(full);
        let category = self.category(category)?;
        let spec = category.blocks.iter().find(|b| b.opcode == opcode)?;
        Some((category, spec))
    }

    pub fn alternatives(&self, full: &str) -> &[String] {
        self.resolve(full)
            .map(|(_, spec)| spec.alternatives.as_slice())
            .unwrap_or(&[])
    }

    /// Every known opcode in palette order.
    pub fn opcodes(&self) -> impl Iterator<Item = String> + '_ {
        self.categories
            .iter()
            .flat_map(|c| c.blocks.iter().map(move |b| format!("{}.{}", c.id, b.opcode)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Translations {
    pub language: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub strings: BTreeMap<String, String>,
}

impl Default for Translations {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            direction: Direction::Ltr,
            strings: BTreeMap::new(),
        }
    }
}

impl Translations {
    pub const BUILTIN: &'static [&'static str] = &["en", "he"];

    pub fn builtin(language: &str) -> Result<Self> {
        let text = match language {
            "en" => BUILTIN_EN,
            "he" => BUILTIN_HE,
            other => {
                return Err(Error::UnknownLanguage {
                    language: other.to_string(),
                });
            }
        };
        Self::from_toml_str(text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    /// Display text for a category id, falling back to the id itself.
    pub fn category_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).unwrap_or(id)
    }
}

/// Registry and translations travel together wherever blocks are built.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub registry: Registry,
    pub translations: Translations,
}

impl Catalog {
    pub fn new(registry: Registry, translations: Translations) -> Self {
        Self {
            registry,
            translations,
        }
    }

    pub fn builtin(language: &str) -> Result<Self> {
        Ok(Self::new(Registry::builtin()?, Translations::builtin(language)?))
    }

    /// Label template for an opcode: the translation when there is one,
    /// otherwise the registry's own text.
    pub fn template(&self, full: &str) -> Option<String> {
        let (_, spec) = self.registry.resolve(full)?;
        Some(
            self.translations
                .get(full)
                .map(str::to_string)
                .unwrap_or_else(|| spec.text.clone()),
        )
    }

    pub fn color(&self, category: &str) -> Option<&str> {
        self.registry
            .category(category)
            .map(|c| c.color.as_str())
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_motion_move() {
        let registry = Registry::builtin().unwrap();
        let (category, spec) = registry.resolve("motion.move").unwrap();
        assert_eq!(category.id, "motion");
        assert_eq!(spec.block_type, BlockType::Command);
        assert!(!spec.hat && !spec.terminal);
        assert_eq!(spec.args["STEPS"].arg_type, ArgumentType::Number);
        assert_eq!(spec.args["STEPS"].default, Some(Value::Number(10.0)));
    }

    #[test]
    fn unknown_category_or_opcode_is_unresolved() {
        let registry = Registry::builtin().unwrap();
        assert!(registry.resolve("nowhere.move").is_none());
        assert!(registry.resolve("motion.fly").is_none());
        assert!(registry.resolve("move").is_none());
    }

    #[test]
    fn opcode_splits_at_the_first_dot() {
        assert_eq!(split_opcode("looks.say.loud"), ("looks", "say.loud"));
        assert_eq!(split_opcode("bare"), ("", "bare"));
    }

    #[test]
    fn adding_to_an_existing_category_merges() {
        let mut registry = Registry::builtin().unwrap();
        let before = registry.category("motion").map(|c| c.blocks.len()).unwrap();
        registry.add_category(Category {
            id: "motion".to_string(),
            color: String::new(),
            blocks: vec![BlockSpec {
                opcode: "glide".to_string(),
                block_type: BlockType::Command,
                text: "glide".to_string(),
                hat: false,
                terminal: false,
                args: BTreeMap::new(),
                alternatives: Vec::new(),
            }],
        });
        assert_eq!(registry.category("motion").map(|c| c.blocks.len()), Some(before + 1));
        assert!(registry.resolve("motion.glide").is_some());
        assert!(!registry.category("motion").unwrap().color.is_empty());
    }

    #[test]
    fn translations_drive_templates_and_direction() {
        let en = Catalog::builtin("en").unwrap();
        let he = Catalog::builtin("he").unwrap();
        assert_eq!(en.translations.direction, Direction::Ltr);
        assert_eq!(he.translations.direction, Direction::Rtl);
        assert_eq!(en.template("motion.move").as_deref(), Some("move [STEPS] steps"));
        assert_ne!(he.template("motion.move"), en.template("motion.move"));
        assert!(he.template("motion.move").unwrap().contains("[STEPS]"));
    }

    #[test]
    fn unknown_language_is_an_error() {
        assert!(matches!(
            Translations::builtin("xx"),
            Err(Error::UnknownLanguage { .. })
        ));
    }

    #[test]
    fn every_builtin_alternative_resolves() {
        let registry = Registry::builtin().unwrap();
        for opcode in registry.opcodes() {
            for alt in registry.alternatives(&opcode) {
                assert!(registry.resolve(alt).is_some(), "{opcode} lists unknown {alt}");
            }
        }
    }
}
