use eframe::egui;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use notchkit::{Catalog, Direction, Translations};

use super::BlocksApp;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum CommandId {
    Undo,
    Redo,
    DuplicateBlock,
    DeleteBlock,
    Save,
    Open,
    ExportSvg,
    ToggleDirection,
    ResetView,
    ReloadSettings,
    Help,
    AddBlock(String),
    Language(&'static str),
}

pub(super) struct CommandSpec {
    pub id: CommandId,
    pub name: String,
    pub search: String,
}

const FIXED: &[(CommandId, &str, &str)] = &[
    (CommandId::Undo, "Edit: Undo", "undo"),
    (CommandId::Redo, "Edit: Redo", "redo"),
    (CommandId::DuplicateBlock, "Edit: Duplicate block", "duplicate clone copy block"),
    (CommandId::DeleteBlock, "Edit: Delete block", "delete remove block"),
    (CommandId::Save, "File: Save", "save file json"),
    (CommandId::Open, "File: Open", "load open file json"),
    (CommandId::ExportSvg, "File: Export SVG", "export svg image"),
    (CommandId::ToggleDirection, "View: Toggle direction", "direction rtl ltr mirror"),
    (CommandId::ResetView, "View: Reset view", "reset zoom pan view"),
    (CommandId::ReloadSettings, "Settings: Reload", "reload settings config"),
    (CommandId::Help, "Help: Show help", "help shortcuts keys"),
];

/// Every command the palette offers for the current catalog.
fn commands(catalog: &Catalog) -> Vec<CommandSpec> {
    let mut out: Vec<CommandSpec> = FIXED
        .iter()
        .map(|(id, name, search)| CommandSpec {
            id: id.clone(),
            name: (*name).to_string(),
            search: (*search).to_string(),
        })
        .collect();
    for &language in Translations::BUILTIN {
        out.push(CommandSpec {
            id: CommandId::Language(language),
            name: format!("Language: {language}"),
            search: format!("language translate {language}"),
        });
    }
    for opcode in catalog.registry.opcodes() {
        let label = catalog.template(&opcode).unwrap_or_default();
        out.push(CommandSpec {
            name: format!("Add: {label}"),
            search: format!("add block {opcode} {label}"),
            id: CommandId::AddBlock(opcode),
        });
    }
    out
}

#[derive(Default)]
pub(super) struct CommandPalette {
    pub open: bool,
    pub query: String,
    pub selected: usize,
    request_focus: bool,
}

#[derive(Clone, Copy)]
pub(super) struct CommandContext {
    pub has_selection: bool,
    pub has_undo: bool,
    pub has_redo: bool,
}

impl CommandPalette {
    pub fn open(&mut self, query: impl Into<String>) {
        self.open = true;
        self.query = query.into();
        self.selected = 0;
        self.request_focus = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.query.clear();
        self.selected = 0;
        self.request_focus = false;
    }

    fn is_enabled(cx: CommandContext, id: &CommandId) -> bool {
        match id {
            CommandId::Undo => cx.has_undo,
            CommandId::Redo => cx.has_redo,
            CommandId::DuplicateBlock | CommandId::DeleteBlock => cx.has_selection,
            _ => true,
        }
    }

    pub(super) fn execute(app: &mut BlocksApp, ctx: &egui::Context, id: CommandId) {
        match id {
            CommandId::Undo => app.undo(),
            CommandId::Redo => app.redo(),
            CommandId::DuplicateBlock => app.duplicate_selected(),
            CommandId::DeleteBlock => app.delete_selected(),
            CommandId::Save => app.save_to_path(),
            CommandId::Open => app.load_from_path(),
            CommandId::ExportSvg => app.save_svg_to_path(),
            CommandId::ToggleDirection => {
                let flipped = app.editor.direction().flipped();
                app.set_direction(flipped);
            }
            CommandId::ResetView => app.reset_view(),
            CommandId::ReloadSettings => app.reload_settings(),
            CommandId::Help => app.show_help = true,
            CommandId::AddBlock(opcode) => app.add_block_at_view_center(&opcode),
            CommandId::Language(language) => app.set_language(language),
        }
        ctx.request_repaint();
    }

    fn filtered(&self, all: Vec<CommandSpec>) -> Vec<(CommandSpec, i64)> {
        let matcher = SkimMatcherV2::default();
        let q = self.query.trim();
        if q.is_empty() {
            return all.into_iter().map(|c| (c, 0)).collect();
        }
        let mut out = Vec::new();
        for c in all {
            if let Some(score) = matcher.fuzzy_match(&c.search, q) {
                out.push((c, score));
            }
        }
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name.cmp(&b.0.name)));
        out
    }

    pub fn ui(
        &mut self,
        ctx: &egui::Context,
        catalog: &Catalog,
        direction: Direction,
        cx: CommandContext,
    ) -> Option<CommandId> {
        if !self.open {
            return None;
        }
        let matches = self.filtered(commands(catalog));
        if self.selected >= matches.len() {
            self.selected = matches.len().saturating_sub(1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.close();
            return None;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowDown)) && !matches.is_empty() {
            self.selected = (self.selected + 1).min(matches.len() - 1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowUp)) && !matches.is_empty() {
            self.selected = self.selected.saturating_sub(1);
        }
        let mut run_selected = ctx.input(|i| i.key_pressed(egui::Key::Enter));

        let screen = ctx.content_rect();
        let width = 560.0;
        let height = 320.0;
        let pos = egui::pos2(screen.center().x - width * 0.5, screen.top() + 48.0);
        let align = match direction {
            Direction::Ltr => egui::Align::Min,
            Direction::Rtl => egui::Align::Max,
        };
        egui::Area::new(egui::Id::new("command_palette"))
            .fixed_pos(pos)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                let frame = egui::Frame::new()
                    .fill(egui::Color32::from_rgba_unmultiplied(20, 20, 20, 240))
                    .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(90, 160, 255)))
                    .inner_margin(10.0)
                    .corner_radius(egui::CornerRadius::same(8));
                frame.show(ui, |ui| {
                    ui.set_min_size(egui::vec2(width, height));
                    let resp = ui.add(
                        egui::TextEdit::singleline(&mut self.query)
                            .desired_width(f32::INFINITY)
                            .hint_text("Search commands and blocks"),
                    );
                    if self.request_focus {
                        resp.request_focus();
                        self.request_focus = false;
                    }
                    ui.separator();
                    egui::ScrollArea::vertical().max_height(height - 64.0).show(ui, |ui| {
                        ui.with_layout(egui::Layout::top_down(align), |ui| {
                            for (idx, (spec, _score)) in matches.iter().take(24).enumerate() {
                                let enabled = CommandPalette::is_enabled(cx, &spec.id);
                                let resp = ui.add_enabled(
                                    enabled,
                                    egui::Button::new(spec.name.as_str()).selected(idx == self.selected),
                                );
                                if resp.clicked() {
                                    self.selected = idx;
                                    run_selected = true;
                                }
                            }
                        });
                    });
                });
            });

        if run_selected
            && let Some((spec, _)) = matches.get(self.selected)
            && CommandPalette::is_enabled(cx, &spec.id)
        {
            let cmd = spec.id.clone();
            self.close();
            return Some(cmd);
        }
        None
    }
}
