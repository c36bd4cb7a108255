use eframe::egui;
use notchkit::interaction::{InteractionKind, PointerEvent};
use notchkit::{Direction, DropOutcome, NodeId, Translations};
use notchkit::geometry::node_rect;
use tracing::debug;

use super::command_palette::{CommandContext, CommandPalette};
use super::render::{Scene, draw_background, draw_node, draw_snap_preview, draw_workspace};
use super::{Action, BlocksApp, Press};

impl eframe::App for BlocksApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sync_view_direction();
        self.forget_missing();
        self.refresh_markers();
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| self.menu_bar(ui));
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(status) = &self.status {
                    ui.label(status);
                } else {
                    ui.label("Ready");
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("Zoom: {:.0}%", self.view.zoom * 100.0));
                    ui.separator();
                    ui.label(format!(
                        "Scripts: {}",
                        self.editor.tree().scripts(self.editor.scripts()).len()
                    ));
                    ui.separator();
                    ui.label(format!("Undo: {}", self.editor.history().undo_len()));
                    ui.separator();
                    ui.label(self.editor.catalog().translations.language.as_str());
                });
            });
        });

        let palette_panel = match self.editor.direction() {
            Direction::Ltr => egui::SidePanel::left("palette_ltr"),
            Direction::Rtl => egui::SidePanel::right("palette_rtl"),
        };
        palette_panel
            .default_width(280.0)
            .resizable(true)
            .show(ctx, |ui| self.palette_panel(ctx, ui));

        egui::CentralPanel::default().show(ctx, |ui| self.canvas_panel(ctx, ui));

        self.handle_pointer(ctx);
        self.draw_carrier(ctx);
        self.input_editor(ctx);

        let cx = CommandContext {
            has_selection: self.selected.is_some(),
            has_undo: self.editor.history().can_undo(),
            has_redo: self.editor.history().can_redo(),
        };
        let direction = self.editor.direction();
        if let Some(cmd) = self
            .command_palette
            .ui(ctx, self.editor.catalog(), direction, cx)
        {
            CommandPalette::execute(self, ctx, cmd);
        }

        super::help::draw_help_window(ctx, &mut self.show_help);

        if self.editor.drag().is_some() {
            ctx.set_cursor_icon(egui::CursorIcon::Grabbing);
        }
    }
}

impl BlocksApp {
    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let wants_keyboard = ctx.wants_keyboard_input();
        let skip_shortcuts = wants_keyboard || self.editing.is_some() || self.command_palette.open;
        ctx.input_mut(|i| {
            if !skip_shortcuts
                && i.consume_key(egui::Modifiers::COMMAND | egui::Modifiers::SHIFT, egui::Key::P)
            {
                self.command_palette.open("");
            }
            if i.consume_key(egui::Modifiers::COMMAND | egui::Modifiers::SHIFT, egui::Key::S) {
                self.save_svg_dialog();
            }
            if i.consume_key(egui::Modifiers::COMMAND, egui::Key::S) {
                self.save_json_dialog();
            }
            if i.consume_key(egui::Modifiers::COMMAND, egui::Key::O) {
                self.open_json_dialog();
            }
            if i.consume_key(egui::Modifiers::NONE, egui::Key::F1) {
                self.show_help = !self.show_help;
            }
            if skip_shortcuts {
                return;
            }
            if i.consume_key(egui::Modifiers::COMMAND | egui::Modifiers::SHIFT, egui::Key::Z)
                || i.consume_key(egui::Modifiers::COMMAND, egui::Key::Y)
            {
                self.redo();
            } else if i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z) {
                self.undo();
            }
            if i.consume_key(egui::Modifiers::NONE, egui::Key::Escape) {
                if self.editor.drag().is_some() {
                    self.editor.cancel_drag();
                    self.status = Some("Drag cancelled".to_string());
                }
                self.pointer.cancel();
                self.press = None;
                self.panning = false;
                self.selected = None;
            }
            if i.consume_key(egui::Modifiers::COMMAND, egui::Key::D) {
                self.duplicate_selected();
            }
            if i.consume_key(egui::Modifiers::NONE, egui::Key::Delete)
                || i.consume_key(egui::Modifiers::NONE, egui::Key::Backspace)
            {
                self.delete_selected();
            }
        });
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("File", |ui| {
            ui.label("Program name:");
            ui.text_edit_singleline(&mut self.document_name);
            ui.separator();
            if ui.button("Open... (⌘O)").clicked() {
                self.open_json_dialog();
                ui.close();
            }
            if ui.button("Save JSON... (⌘S)").clicked() {
                self.save_json_dialog();
                ui.close();
            }
            if ui.button("Export SVG... (⌘⇧S)").clicked() {
                self.save_svg_dialog();
                ui.close();
            }
            if ui.button("Load blocks...").clicked() {
                self.open_registry_dialog();
                ui.close();
            }
            ui.separator();
            ui.label("Quick save paths:");
            ui.small("JSON:");
            if ui
                .text_edit_singleline(&mut self.settings.document_path)
                .lost_focus()
            {
                self.persist_settings();
            }
            ui.small("SVG:");
            if ui.text_edit_singleline(&mut self.settings.svg_path).lost_focus() {
                self.persist_settings();
            }
            ui.horizontal(|ui| {
                if ui.small_button("Quick Save JSON").clicked() {
                    self.save_to_path();
                    ui.close();
                }
                if ui.small_button("Quick Load JSON").clicked() {
                    self.load_from_path();
                    ui.close();
                }
                if ui.small_button("Quick Save SVG").clicked() {
                    self.save_svg_to_path();
                    ui.close();
                }
            });
            ui.separator();
            if ui.button("Reload settings").clicked() {
                self.reload_settings();
                ui.close();
            }
        });
        ui.menu_button("Edit", |ui| {
            if ui
                .add_enabled(self.editor.history().can_undo(), egui::Button::new("Undo (⌘Z)"))
                .clicked()
            {
                self.undo();
                ui.close();
            }
            if ui
                .add_enabled(self.editor.history().can_redo(), egui::Button::new("Redo (⌘⇧Z)"))
                .clicked()
            {
                self.redo();
                ui.close();
            }
            ui.separator();
            if ui
                .add_enabled(self.selected.is_some(), egui::Button::new("Duplicate (⌘D)"))
                .clicked()
            {
                self.duplicate_selected();
                ui.close();
            }
            if ui
                .add_enabled(self.selected.is_some(), egui::Button::new("Delete (Del)"))
                .clicked()
            {
                self.delete_selected();
                ui.close();
            }
            ui.separator();
            if ui.button("Command palette (⌘⇧P)").clicked() {
                self.command_palette.open("");
                ui.close();
            }
        });
        ui.menu_button("View", |ui| {
            ui.label("Language:");
            let current = self.editor.catalog().translations.language.clone();
            for language in Translations::BUILTIN {
                if ui.radio(current == *language, *language).clicked() {
                    self.set_language(language);
                    ui.close();
                }
            }
            ui.separator();
            let direction = self.editor.direction();
            for candidate in [Direction::Ltr, Direction::Rtl] {
                if ui.radio(direction == candidate, candidate.label()).clicked() {
                    self.set_direction(candidate);
                    ui.close();
                }
            }
            ui.separator();
            if ui.button("Reset view").clicked() {
                self.reset_view();
                ui.close();
            }
        });
        ui.menu_button("Help", |ui| {
            if ui.button("Shortcuts (F1)").clicked() {
                self.show_help = true;
                ui.close();
            }
        });
    }

    fn palette_panel(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let palette = self.editor.palette();
        let offsets = self
            .editor
            .tree()
            .workspace(palette)
            .map(|w| w.category_offsets().to_vec())
            .unwrap_or_default();
        ui.horizontal_wrapped(|ui| {
            for category in &offsets {
                let name = self
                    .editor
                    .catalog()
                    .translations
                    .category_name(&category.id)
                    .to_string();
                let color = self
                    .editor
                    .catalog()
                    .color(&category.id)
                    .and_then(|hex| egui::Color32::from_hex(hex).ok())
                    .unwrap_or(egui::Color32::GRAY);
                if ui.add(egui::Button::new(name).fill(color)).clicked() {
                    self.palette_view.pan_screen.y = 12.0 - category.offset * self.palette_view.zoom;
                }
            }
        });
        ui.separator();

        let (rect, _response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
        self.palette_rect = rect;
        let scroll_delta = ctx.input(|i| i.raw_scroll_delta.y);
        if scroll_delta.abs() > 0.0
            && let Some(hover) = ctx.input(|i| i.pointer.hover_pos())
            && rect.contains(hover)
        {
            self.palette_view.pan_screen.y += scroll_delta;
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, ui.visuals().panel_fill);
        let scene = Scene {
            tree: self.editor.tree(),
            catalog: self.editor.catalog(),
            origin: self.palette_origin(),
            view: &self.palette_view,
            text_size: self.settings.text_size,
            selected: None,
            header_color: ui.visuals().strong_text_color(),
        };
        draw_workspace(&painter, &scene, palette);
        if let Some(drag) = self.editor.drag()
            && drag.target() == Some(palette)
        {
            painter.rect_filled(rect, 0.0, egui::Color32::from_rgba_unmultiplied(200, 40, 40, 30));
        }
    }

    fn canvas_panel(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        self.canvas_rect = rect;
        let origin = self.canvas_origin();

        let scroll_delta = ctx.input(|i| i.raw_scroll_delta.y);
        if scroll_delta.abs() > 0.0
            && let Some(hover_pos) = ctx.input(|i| i.pointer.hover_pos())
            && rect.contains(hover_pos)
        {
            let zoom_delta = (1.0 + scroll_delta * 0.001).clamp(0.8, 1.25);
            self.view.zoom_about_screen_point(origin, hover_pos, zoom_delta);
        }

        if response.secondary_clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            let world = self.view.screen_to_world(origin, pos);
            self.context_world = world;
            self.context_block = None;
            let scripts = self.editor.scripts();
            if let Some(hit) = self.editor.hit(scripts, world)
                && let Some(action) =
                    self.interactions
                        .dispatch(self.editor.tree(), hit, InteractionKind::ContextMenu, world)
            {
                self.apply_action(action, scripts, world);
            }
        }

        let painter = ui.painter_at(rect);
        draw_background(&painter, rect, &self.view);
        let scene = Scene {
            tree: self.editor.tree(),
            catalog: self.editor.catalog(),
            origin,
            view: &self.view,
            text_size: self.settings.text_size,
            selected: self.selected,
            header_color: ui.visuals().strong_text_color(),
        };
        let scripts = self.editor.scripts();
        draw_workspace(&painter, &scene, scripts);
        if let Some(drag) = self.editor.drag()
            && drag.target() == Some(scripts)
            && let Some(snap) = drag.snap()
        {
            draw_snap_preview(&painter, &scene, &snap);
        }

        response.context_menu(|ui| self.context_menu(ui));

        if self.editor.drag().is_none()
            && let Some(hover) = ctx.input(|i| i.pointer.hover_pos())
            && rect.contains(hover)
            && self
                .editor
                .block_at(scripts, self.view.screen_to_world(origin, hover))
                .is_some()
        {
            ctx.set_cursor_icon(egui::CursorIcon::Grab);
        }
    }

    fn context_menu(&mut self, ui: &mut egui::Ui) {
        let Some(block) = self.context_block else {
            ui.menu_button("Add block", |ui| {
                egui::ScrollArea::vertical().max_height(360.0).show(ui, |ui| {
                    let opcodes: Vec<String> = self.editor.catalog().registry.opcodes().collect();
                    for opcode in opcodes {
                        let label = self.editor.catalog().template(&opcode).unwrap_or_default();
                        if ui.button(label).clicked() {
                            self.editor.spawn_block(&opcode, self.context_world);
                            ui.close();
                        }
                    }
                });
            });
            return;
        };
        if ui.button("Duplicate").clicked() {
            self.duplicate_block(block);
            ui.close();
        }
        if ui.button("Delete").clicked() {
            self.delete_block(block);
            self.context_block = None;
            ui.close();
        }
        let alternatives = self.editor.alternatives(block);
        if !alternatives.is_empty() {
            ui.separator();
            ui.menu_button("Switch to", |ui| {
                for opcode in alternatives {
                    let label = self.editor.catalog().template(&opcode).unwrap_or_else(|| opcode.clone());
                    if ui.button(label).clicked() {
                        self.swap_block(block, &opcode);
                        ui.close();
                    }
                }
            });
        }
    }

    /// `true` when the pointer is over one of the panes and not over a
    /// menu, window or popup drawn above them.
    fn pointer_owned(&self, ctx: &egui::Context, pos: egui::Pos2) -> bool {
        let on_background = ctx
            .layer_id_at(pos)
            .is_none_or(|layer| layer.order == egui::Order::Background);
        on_background && (self.canvas_rect.contains(pos) || self.palette_rect.contains(pos))
    }

    fn handle_pointer(&mut self, ctx: &egui::Context) {
        let (pressed, released, pos) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.latest_pos(),
            )
        });
        let Some(pos) = pos else {
            return;
        };
        if pressed
            && !self.command_palette.open
            && self.pointer_owned(ctx, pos)
            && let Some((workspace, world)) = self.pane_at(pos)
        {
            self.apply_input_edit();
            self.pointer.down(pos);
            self.press = Some(Press {
                workspace,
                hit: self.editor.hit(workspace, world),
                last: pos,
            });
        }
        if self.pointer.is_pressed()
            && let Some(event) = self.pointer.move_to(pos)
        {
            self.on_pointer(event);
        }
        if released && let Some(event) = self.pointer.up(pos) {
            self.on_pointer(event);
        }
        if let Some(press) = &mut self.press {
            press.last = pos;
        }
        if !self.pointer.is_pressed() {
            self.press = None;
        }
    }

    fn on_pointer(&mut self, event: PointerEvent) {
        let Some(press) = self.press else {
            return;
        };
        match event {
            PointerEvent::Click { pos } => {
                let (view, origin) = self.frame_of(press.workspace);
                let world = view.screen_to_world(origin, pos);
                let action = press.hit.and_then(|hit| {
                    self.interactions
                        .dispatch(self.editor.tree(), hit, InteractionKind::Click, world)
                });
                match action {
                    Some(action) => self.apply_action(action, press.workspace, world),
                    None if press.workspace == self.editor.scripts() => self.selected = None,
                    None => {}
                }
            }
            PointerEvent::DragStart { origin, pos } => {
                let (view, screen_origin) = self.frame_of(press.workspace);
                let world = view.screen_to_world(screen_origin, origin);
                let action = press.hit.and_then(|hit| {
                    self.interactions
                        .dispatch(self.editor.tree(), hit, InteractionKind::Drag, world)
                });
                match action {
                    Some(action) => {
                        self.apply_action(action, press.workspace, world);
                        self.track_drag(pos);
                    }
                    None => {
                        self.panning = true;
                        self.pan(press.workspace, pos - origin);
                    }
                }
            }
            PointerEvent::DragMove { pos } => {
                if self.editor.drag().is_some() {
                    self.track_drag(pos);
                } else if self.panning {
                    self.pan(press.workspace, pos - press.last);
                }
            }
            PointerEvent::DragEnd { pos } => {
                self.panning = false;
                if self.editor.drag().is_none() {
                    return;
                }
                self.track_drag(pos);
                let outcome = self.editor.drop_drag();
                debug!(?outcome, "drop");
                self.status = outcome.map(|o| {
                    let text = match o {
                        DropOutcome::Snapped => "Snapped",
                        DropOutcome::Displaced => "Snapped; displaced the previous block",
                        DropOutcome::Wrapped => "Wrapped",
                        DropOutcome::Placed => "Placed",
                        DropOutcome::Deleted => "Deleted",
                        DropOutcome::Reverted => "Returned",
                    };
                    text.to_string()
                });
                self.forget_missing();
            }
        }
    }

    fn pan(&mut self, workspace: NodeId, delta: egui::Vec2) {
        if workspace == self.editor.palette() {
            self.palette_view.pan_screen.y += delta.y;
        } else {
            self.view.pan_screen += delta;
        }
    }

    /// Moves the carrier under the pointer, retargeting the pane it is over.
    fn track_drag(&mut self, screen: egui::Pos2) {
        if self.editor.drag().is_none() {
            return;
        }
        match self.pane_at(screen) {
            Some((ws, world)) => {
                self.editor.drag_to(Some(ws), world);
            }
            None => {
                let world = self.view.screen_to_world(self.canvas_origin(), screen);
                self.editor.drag_to(None, world);
            }
        }
    }

    fn apply_action(&mut self, action: Action, workspace: NodeId, world: egui::Pos2) {
        match action {
            Action::Select(block) => self.selected = Some(block),
            Action::Drag(block) => {
                self.selected = None;
                if !self.editor.start_drag(block, world) {
                    debug!(block = %block, workspace = %workspace, "nothing to drag");
                }
            }
            Action::EditInput(input) => self.begin_input_edit(input),
            Action::Menu(block) => {
                self.selected = Some(block);
                self.context_block = Some(block);
            }
        }
    }

    fn draw_carrier(&self, ctx: &egui::Context) {
        let Some(drag) = self.editor.drag() else {
            return;
        };
        let target = drag.target().unwrap_or(self.editor.scripts());
        let (view, origin) = self.frame_of(target);
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Tooltip,
            egui::Id::new("carrier"),
        ));
        let scene = Scene {
            tree: self.editor.tree(),
            catalog: self.editor.catalog(),
            origin,
            view: &view,
            text_size: self.settings.text_size,
            selected: None,
            header_color: egui::Color32::WHITE,
        };
        let carrier = drag.carrier();
        let at = self.editor.tree().position(carrier);
        draw_node(&painter, &scene, carrier, at, egui::Color32::WHITE, None);
    }

    /// Inline text box over the input being edited.
    fn input_editor(&mut self, ctx: &egui::Context) {
        let Some(input) = self.editing.as_ref().map(|e| e.input) else {
            return;
        };
        let tree = self.editor.tree();
        let world = tree.offset_in_root(input);
        let size = tree.size(input);
        let rect = node_rect(world, size, tree.direction());
        let origin = self.canvas_origin();
        let min = self.view.world_to_screen(origin, rect.min);
        let width = (rect.width() * self.view.zoom).max(48.0);

        let mut commit = false;
        let mut discard = false;
        egui::Area::new(egui::Id::new("input_edit"))
            .fixed_pos(min)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                let Some(edit) = self.editing.as_mut() else {
                    return;
                };
                let response = ui.add(
                    egui::TextEdit::singleline(&mut edit.text)
                        .desired_width(width)
                        .font(egui::FontId::monospace(self.settings.text_size * self.view.zoom)),
                );
                if edit.focus {
                    response.request_focus();
                    edit.focus = false;
                }
                if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                    discard = true;
                } else if response.lost_focus() {
                    commit = true;
                }
            });
        if discard {
            self.editing = None;
        } else if commit {
            self.apply_input_edit();
        }
    }
}
