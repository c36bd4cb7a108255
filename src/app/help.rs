use eframe::egui;

pub(super) fn draw_help_window(ctx: &egui::Context, open: &mut bool) {
    egui::Window::new("Help & Commands")
        .open(open)
        .resizable(true)
        .default_width(560.0)
        .default_height(480.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Keyboard Shortcuts");
                ui.separator();

                ui.label("General");
                help_row(ui, "⌘⇧P", "Open command palette");
                help_row(ui, "⌘S", "Save program (JSON)");
                help_row(ui, "⌘⇧S", "Export scripts as SVG");
                help_row(ui, "⌘O", "Open program");
                help_row(ui, "⌘Z", "Undo");
                help_row(ui, "⌘⇧Z / ⌘Y", "Redo");
                help_row(ui, "F1", "Toggle this window");
                help_row(ui, "Escape", "Cancel the current drag or edit");

                ui.add_space(10.0);
                ui.label("Blocks");
                help_row(ui, "Drag", "Move a block and every block below it");
                help_row(ui, "Drag from palette", "Add a new block");
                help_row(ui, "Drop on palette", "Delete the dragged blocks");
                help_row(ui, "Click input", "Edit its value");
                help_row(ui, "Right-click", "Duplicate, delete or switch block");
                help_row(ui, "⌘D", "Duplicate selected block");
                help_row(ui, "Delete / Backspace", "Delete selected block");

                ui.add_space(10.0);
                ui.label("Canvas");
                help_row(ui, "Drag background", "Pan");
                help_row(ui, "Scroll wheel", "Zoom in/out");

                ui.add_space(20.0);
                ui.heading("Command Palette");
                ui.separator();
                ui.label("Type to search commands, languages and every block in the palette.");
                ui.label("Arrow keys move the selection, Enter runs it.");

                ui.add_space(20.0);
                ui.heading("Settings");
                ui.separator();
                ui.label("Settings are read from ~/.config/notchkit.toml or ./settings.toml:");
                ui.add_space(5.0);
                ui.code(
                    r##"language = "he"
text_size = 12.0
registry_path = "blocks.toml"

[editor]
max_snap_distance = 20.0
min_drag_distance = 3.0
displaced_offset = [20.0, 20.0]
undo_limit = 200"##,
                );

                ui.add_space(20.0);
                ui.heading("File Formats");
                ui.separator();
                ui.label("• Programs are saved as JSON script descriptors (.json)");
                ui.label("• Block registries and translations are TOML tables");
                ui.label("• Export to SVG for use in other applications");
            });
        });
}

fn help_row(ui: &mut egui::Ui, shortcut: &str, description: &str) {
    ui.horizontal(|ui| {
        ui.add_sized(
            [140.0, 16.0],
            egui::Label::new(egui::RichText::new(shortcut).monospace().strong()),
        );
        ui.label(description);
    });
}
