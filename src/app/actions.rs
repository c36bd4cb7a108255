use eframe::egui;
use notchkit::{Direction, FixedAdvance, NodeId, Registry, svg};
use tracing::{info, warn};

use super::{BlocksApp, InputEdit, settings};

impl BlocksApp {
    pub(super) fn undo(&mut self) {
        if self.editor.undo() {
            self.status = Some("Undone".to_string());
        } else {
            self.status = Some("Nothing to undo".to_string());
        }
        self.forget_missing();
    }

    pub(super) fn redo(&mut self) {
        if self.editor.redo() {
            self.status = Some("Redone".to_string());
        } else {
            self.status = Some("Nothing to redo".to_string());
        }
        self.forget_missing();
    }

    /// Drops the selection and any inline edit whose node is gone.
    pub(super) fn forget_missing(&mut self) {
        let tree = self.editor.tree();
        if self.selected.is_some_and(|n| !tree.contains(n) || tree.block(n).is_none()) {
            self.selected = None;
        }
        if self.context_block.is_some_and(|n| !tree.contains(n)) {
            self.context_block = None;
        }
        if self.editing.as_ref().is_some_and(|e| !tree.contains(e.input)) {
            self.editing = None;
        }
    }

    pub(super) fn delete_selected(&mut self) {
        let Some(block) = self.selected.take() else {
            return;
        };
        self.delete_block(block);
    }

    pub(super) fn delete_block(&mut self, block: NodeId) {
        if self.editor.delete_block(block) {
            self.status = Some("Deleted block".to_string());
        }
        self.forget_missing();
    }

    pub(super) fn duplicate_selected(&mut self) {
        if let Some(block) = self.selected {
            self.duplicate_block(block);
        }
    }

    pub(super) fn duplicate_block(&mut self, block: NodeId) {
        if let Some(script) = self.editor.duplicate_block(block) {
            self.selected = self.editor.tree().children(script).first().copied();
            self.status = Some("Duplicated block".to_string());
        }
    }

    /// Drops a fresh block in the middle of the visible canvas.
    pub(super) fn add_block_at_view_center(&mut self, opcode: &str) {
        let pos = if self.canvas_rect.is_positive() {
            self.view
                .screen_to_world(self.canvas_origin(), self.canvas_rect.center())
        } else {
            egui::Pos2::ZERO
        };
        match self.editor.spawn_block(opcode, pos) {
            Some(script) => {
                self.selected = self.editor.tree().children(script).first().copied();
                self.status = Some(format!("Added {opcode}"));
            }
            None => self.status = Some(format!("Unknown block {opcode}")),
        }
    }

    pub(super) fn swap_block(&mut self, block: NodeId, opcode: &str) {
        let discarded = self.editor.swap_block(block, opcode);
        self.status = Some(if discarded > 0 {
            format!("Switched to {opcode}, dropped {discarded} input(s); undo history cleared")
        } else {
            format!("Switched to {opcode}")
        });
    }

    pub(super) fn begin_input_edit(&mut self, input: NodeId) {
        let Some(value) = self.editor.tree().input(input).map(|i| i.value().display()) else {
            return;
        };
        self.editing = Some(InputEdit {
            input,
            text: value,
            focus: true,
        });
    }

    pub(super) fn apply_input_edit(&mut self) {
        let Some(edit) = self.editing.take() else {
            return;
        };
        if self.editor.tree().contains(edit.input) {
            self.editor.set_input_text(edit.input, &edit.text);
        }
    }

    pub(super) fn set_language(&mut self, language: &str) {
        match self.editor.set_language(language) {
            Ok(()) => {
                self.settings.language = language.to_string();
                self.settings.direction = None;
                self.persist_settings();
                self.status = Some(format!("Language: {language}"));
            }
            Err(e) => self.status = Some(format!("Language switch failed: {e}")),
        }
        self.forget_missing();
    }

    pub(super) fn reset_view(&mut self) {
        self.view = super::View::default();
        if self.editor.direction() == Direction::Rtl {
            self.view.pan_screen.x = -self.view.pan_screen.x;
        }
    }

    pub(super) fn set_direction(&mut self, direction: Direction) {
        self.editor.set_direction(direction);
        self.settings.direction = Some(direction);
        self.persist_settings();
        self.status = Some(format!("Direction: {}", direction.label()));
    }

    pub(super) fn save_to_path(&mut self) {
        let path = self.settings.document_path.clone();
        match self.editor.to_json() {
            Ok(json) => match std::fs::write(&path, json) {
                Ok(()) => self.status = Some(format!("Saved {path}")),
                Err(e) => self.status = Some(format!("Save failed: {e}")),
            },
            Err(e) => self.status = Some(format!("Serialize failed: {e}")),
        }
    }

    pub(super) fn save_json_dialog(&mut self) {
        let default_name = format!("{}.json", self.document_name);
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(&default_name)
            .add_filter("JSON", &["json"])
            .save_file()
        {
            let path_str = path.display().to_string();
            match self.editor.to_json() {
                Ok(json) => match std::fs::write(&path, json) {
                    Ok(()) => {
                        self.settings.document_path = path_str.clone();
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            self.document_name = stem.to_string();
                        }
                        self.status = Some(format!("Saved {path_str}"));
                    }
                    Err(e) => self.status = Some(format!("Save failed: {e}")),
                },
                Err(e) => self.status = Some(format!("Serialize failed: {e}")),
            }
        }
    }

    fn render_svg(&self) -> String {
        svg::workspace_to_svg(
            self.editor.tree(),
            self.editor.scripts(),
            self.editor.catalog(),
            self.settings.text_size,
        )
    }

    pub(super) fn save_svg_to_path(&mut self) {
        let path = self.settings.svg_path.clone();
        match std::fs::write(&path, self.render_svg()) {
            Ok(()) => self.status = Some(format!("Saved {path}")),
            Err(e) => self.status = Some(format!("SVG save failed: {e}")),
        }
    }

    pub(super) fn save_svg_dialog(&mut self) {
        let default_name = format!("{}.svg", self.document_name);
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(&default_name)
            .add_filter("SVG", &["svg"])
            .save_file()
        {
            let path_str = path.display().to_string();
            match std::fs::write(&path, self.render_svg()) {
                Ok(()) => {
                    self.settings.svg_path = path_str.clone();
                    self.status = Some(format!("Saved {path_str}"));
                }
                Err(e) => self.status = Some(format!("SVG save failed: {e}")),
            }
        }
    }

    fn load_document_file(&mut self, path: &std::path::Path) {
        let path_str = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(json) => match self.editor.load_json(&json) {
                Ok(()) => {
                    self.settings.document_path = path_str.clone();
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        self.document_name = stem.to_string();
                    }
                    self.selected = None;
                    self.editing = None;
                    self.status = Some(format!("Loaded {path_str}"));
                }
                Err(e) => self.status = Some(format!("Parse failed: {e}")),
            },
            Err(e) => self.status = Some(format!("Read failed: {e}")),
        }
    }

    pub(super) fn load_from_path(&mut self) {
        let path = std::path::PathBuf::from(&self.settings.document_path);
        self.load_document_file(&path);
    }

    pub(super) fn open_json_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        {
            self.load_document_file(&path);
        }
    }

    pub(super) fn open_registry_dialog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("TOML", &["toml"])
            .pick_file()
        else {
            return;
        };
        match Registry::load(&path) {
            Ok(registry) => {
                self.editor.set_registry(registry);
                self.settings.registry_path = Some(path.display().to_string());
                self.persist_settings();
                self.forget_missing();
                self.status = Some(format!("Loaded blocks from {}", path.display()));
            }
            Err(e) => self.status = Some(format!("Block registry failed: {e}")),
        }
    }

    pub(super) fn settings_snapshot(&self) -> settings::AppSettings {
        settings::AppSettings {
            editor: self.editor.config().clone(),
            ..self.settings.clone()
        }
    }

    pub(super) fn persist_settings(&mut self) {
        let snapshot = self.settings_snapshot();
        if let Err(e) = settings::save_settings(&self.settings_path, &snapshot) {
            warn!(error = %e, path = %self.settings_path, "settings not saved");
            self.status = Some(format!("Settings save failed: {e}"));
        }
    }

    pub(super) fn reload_settings(&mut self) {
        let settings = settings::load_settings(&self.settings_path)
            .or_else(|| settings::load_settings("settings.json"))
            .unwrap_or_default();

        let (catalog, problem) = Self::load_catalog(&settings);
        self.editor.set_config(settings.editor.clone());
        self.pointer
            .set_min_drag_distance(settings.editor.min_drag_distance);
        if settings.text_size != self.settings.text_size {
            self.editor
                .set_measure(Box::new(FixedAdvance::for_text_size(settings.text_size)));
        }
        if catalog.registry != self.editor.catalog().registry {
            self.editor.set_registry(catalog.registry);
        }
        if catalog.translations != self.editor.catalog().translations {
            self.editor.set_translations(catalog.translations);
        }
        if let Some(direction) = settings.direction {
            self.editor.set_direction(direction);
        }
        self.settings = settings;
        self.forget_missing();
        info!(path = %self.settings_path, "settings reloaded");
        self.status = Some(problem.unwrap_or_else(|| "Settings reloaded".to_string()));
    }
}
