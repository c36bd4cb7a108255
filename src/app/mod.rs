use eframe::egui;
use notchkit::interaction::{Handle, InteractionKind, Interactions, PointerTracker};
use notchkit::{
    Catalog, Direction, Editor, FixedAdvance, KindTag, NodeId, Registry, Translations,
};
use tracing::{info, warn};

mod actions;
mod command_palette;
mod help;
mod render;
mod settings;
mod update;

#[derive(Clone, Copy, Debug)]
struct View {
    pan_screen: egui::Vec2,
    zoom: f32,
}

impl Default for View {
    fn default() -> Self {
        Self {
            pan_screen: egui::vec2(40.0, 40.0),
            zoom: 1.0,
        }
    }
}

impl View {
    fn world_to_screen(&self, origin: egui::Pos2, world: egui::Pos2) -> egui::Pos2 {
        origin + self.pan_screen + world.to_vec2() * self.zoom
    }

    fn screen_to_world(&self, origin: egui::Pos2, screen: egui::Pos2) -> egui::Pos2 {
        ((screen - origin - self.pan_screen) / self.zoom).to_pos2()
    }

    fn zoom_about_screen_point(
        &mut self,
        origin: egui::Pos2,
        screen_point: egui::Pos2,
        zoom_delta: f32,
    ) {
        let before = self.screen_to_world(origin, screen_point);
        self.zoom = (self.zoom * zoom_delta).clamp(0.25, 4.0);
        let after_screen = self.world_to_screen(origin, before);
        self.pan_screen += screen_point - after_screen;
    }
}

/// What a pointer gesture on a node asks the app to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Select(NodeId),
    Drag(NodeId),
    EditInput(NodeId),
    Menu(NodeId),
}

struct Handles {
    select: Handle,
    drag: Handle,
    edit: Handle,
    menu: Handle,
}

impl Handles {
    fn register(interactions: &mut Interactions<Action>) -> Self {
        Self {
            select: interactions.register(InteractionKind::Click, |e| Some(Action::Select(e.node))),
            drag: interactions.register(InteractionKind::Drag, |e| Some(Action::Drag(e.node))),
            edit: interactions.register(InteractionKind::Click, |e| Some(Action::EditInput(e.node))),
            menu: interactions.register(InteractionKind::ContextMenu, |e| Some(Action::Menu(e.node))),
        }
    }
}

/// Pane the pointer was pressed in and what it hit there.
#[derive(Clone, Copy, Debug)]
struct Press {
    workspace: NodeId,
    hit: Option<NodeId>,
    /// Last screen position seen while the press lasts.
    last: egui::Pos2,
}

/// Inline text editor open over an input.
#[derive(Clone, Debug)]
struct InputEdit {
    input: NodeId,
    text: String,
    focus: bool,
}

pub struct BlocksApp {
    editor: Editor,
    interactions: Interactions<Action>,
    handles: Handles,
    pointer: PointerTracker,
    press: Option<Press>,
    panning: bool,
    view: View,
    palette_view: View,
    /// Direction the views were last laid out for.
    view_direction: Direction,
    canvas_rect: egui::Rect,
    palette_rect: egui::Rect,
    selected: Option<NodeId>,
    context_block: Option<NodeId>,
    context_world: egui::Pos2,
    editing: Option<InputEdit>,
    document_name: String,
    settings: settings::AppSettings,
    settings_path: String,
    status: Option<String>,
    command_palette: command_palette::CommandPalette,
    show_help: bool,
}

impl BlocksApp {
    fn config_path() -> Option<String> {
        if let Some(home) = std::env::var_os("HOME") {
            let path = std::path::PathBuf::from(home).join(".config").join("notchkit.toml");
            if path.exists() {
                return Some(path.display().to_string());
            }
        }
        if std::path::Path::new("settings.toml").exists() {
            return Some("settings.toml".to_string());
        }
        None
    }

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings_path = Self::config_path().unwrap_or_else(|| "settings.toml".to_string());
        let settings = settings::load_settings(&settings_path)
            .or_else(|| settings::load_settings("settings.json"))
            .unwrap_or_default();
        let (catalog, status) = Self::load_catalog(&settings);
        let mut editor = Editor::new(
            catalog,
            settings.editor.clone(),
            Box::new(FixedAdvance::for_text_size(settings.text_size)),
        );
        if let Some(direction) = settings.direction {
            editor.set_direction(direction);
        }
        info!(settings = %settings_path, "host started");

        let mut interactions = Interactions::default();
        let handles = Handles::register(&mut interactions);
        Self {
            pointer: PointerTracker::new(settings.editor.min_drag_distance),
            editor,
            interactions,
            handles,
            press: None,
            panning: false,
            view: View::default(),
            palette_view: View {
                pan_screen: egui::vec2(12.0, 12.0),
                zoom: 1.0,
            },
            view_direction: Direction::Ltr,
            canvas_rect: egui::Rect::NOTHING,
            palette_rect: egui::Rect::NOTHING,
            selected: None,
            context_block: None,
            context_world: egui::Pos2::ZERO,
            editing: None,
            document_name: Self::generate_default_name(),
            settings,
            settings_path,
            status,
            command_palette: command_palette::CommandPalette::default(),
            show_help: false,
        }
    }

    /// Registry and translations named in the settings, falling back to the
    /// built-in set (with a status message) when a file cannot be used.
    fn load_catalog(settings: &settings::AppSettings) -> (Catalog, Option<String>) {
        let mut problems = Vec::new();
        let registry = match &settings.registry_path {
            Some(path) => Registry::load(path).or_else(|e| {
                warn!(error = %e, "falling back to the built-in blocks");
                problems.push(e.to_string());
                Registry::builtin()
            }),
            None => Registry::builtin(),
        };
        let translations = match &settings.translations_path {
            Some(path) => Translations::load(path).or_else(|e| {
                warn!(error = %e, "falling back to a built-in translation");
                problems.push(e.to_string());
                Translations::builtin(&settings.language)
            }),
            None => Translations::builtin(&settings.language),
        };
        let translations = translations.unwrap_or_else(|e| {
            problems.push(e.to_string());
            Translations::default()
        });
        let registry = registry.unwrap_or_else(|e| {
            problems.push(e.to_string());
            Registry::default()
        });
        let status = (!problems.is_empty()).then(|| problems.join("; "));
        (Catalog::new(registry, translations), status)
    }

    fn generate_default_name() -> String {
        let now = std::time::SystemTime::now();
        let since_epoch = now.duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
        let secs = since_epoch.as_secs();
        let days = secs / 86400;
        let years_since_1970 = days / 365;
        let year = 1970 + years_since_1970;
        let remaining_days = days % 365;
        let month = (remaining_days / 30) + 1;
        let day = (remaining_days % 30) + 1;
        let day_secs = secs % 86400;
        let hour = day_secs / 3600;
        let minute = (day_secs % 3600) / 60;
        format!("program-{:04}-{:02}-{:02}-{:02}{:02}", year, month, day, hour, minute)
    }

    /// Re-attaches handlers to every block and input, and forgets nodes
    /// that are gone.
    fn refresh_markers(&mut self) {
        let tree = self.editor.tree();
        self.interactions.prune(tree);
        for ws in [self.editor.scripts(), self.editor.palette()] {
            for node in tree.descendants(ws) {
                match tree.tag(node) {
                    KindTag::Block => {
                        self.interactions.mark(node, self.handles.drag);
                        if !tree.is_palette(ws) {
                            self.interactions.mark(node, self.handles.select);
                            self.interactions.mark(node, self.handles.menu);
                        }
                    }
                    KindTag::Input if !tree.is_palette(ws) => {
                        let editable = tree
                            .input(node)
                            .is_some_and(|i| i.kind().editable() && i.block().is_none());
                        if editable {
                            self.interactions.mark(node, self.handles.edit);
                        } else {
                            self.interactions.unmark(node);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Screen point of the world origin before panning. Right-to-left
    /// panes grow leftwards from their right edge.
    fn pane_origin(&self, rect: egui::Rect) -> egui::Pos2 {
        match self.editor.direction() {
            Direction::Ltr => rect.min,
            Direction::Rtl => rect.right_top(),
        }
    }

    fn canvas_origin(&self) -> egui::Pos2 {
        self.pane_origin(self.canvas_rect)
    }

    fn palette_origin(&self) -> egui::Pos2 {
        self.pane_origin(self.palette_rect)
    }

    /// View and screen origin used to draw `ws`.
    fn frame_of(&self, ws: NodeId) -> (View, egui::Pos2) {
        if ws == self.editor.palette() {
            (self.palette_view, self.palette_origin())
        } else {
            (self.view, self.canvas_origin())
        }
    }

    /// Workspace under a screen point and the point in its coordinates.
    fn pane_at(&self, screen: egui::Pos2) -> Option<(NodeId, egui::Pos2)> {
        let ws = if self.palette_rect.contains(screen) {
            self.editor.palette()
        } else if self.canvas_rect.contains(screen) {
            self.editor.scripts()
        } else {
            return None;
        };
        let (view, origin) = self.frame_of(ws);
        Some((ws, view.screen_to_world(origin, screen)))
    }

    /// Keeps pans pointing at the same content after a mirror.
    fn sync_view_direction(&mut self) {
        let direction = self.editor.direction();
        if direction != self.view_direction {
            self.view.pan_screen.x = -self.view.pan_screen.x;
            self.palette_view.pan_screen.x = -self.palette_view.pan_screen.x;
            self.view_direction = direction;
        }
    }
}
