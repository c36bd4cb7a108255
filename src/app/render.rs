use eframe::egui;
use notchkit::connection::ConnectionRole;
use notchkit::geometry::{Direction, Path, triangulate};
use notchkit::transfer::Candidate;
use notchkit::{Catalog, InputKind, KindTag, NodeId, Tree};

use super::View;

const CURVE_STEPS: usize = 8;

/// Everything a draw pass needs besides the painter.
pub(super) struct Scene<'a> {
    pub tree: &'a Tree,
    pub catalog: &'a Catalog,
    pub origin: egui::Pos2,
    pub view: &'a View,
    pub text_size: f32,
    pub selected: Option<NodeId>,
    /// Text color for headers that sit directly on the workspace.
    pub header_color: egui::Color32,
}

pub(super) fn draw_background(painter: &egui::Painter, rect: egui::Rect, view: &View) {
    let bg = painter.ctx().style().visuals.extreme_bg_color;
    painter.rect_filled(rect, 0.0, bg);
    let grid_color = painter.ctx().style().visuals.faint_bg_color;
    let spacing_world = 64.0;
    let spacing_screen = spacing_world * view.zoom;
    if spacing_screen >= 24.0 {
        let start = rect.min + view.pan_screen;
        let x0 = ((rect.min.x - start.x) / spacing_screen).floor() * spacing_screen + start.x;
        let y0 = ((rect.min.y - start.y) / spacing_screen).floor() * spacing_screen + start.y;
        let mut x = x0;
        while x < rect.max.x {
            painter.line_segment(
                [egui::pos2(x, rect.min.y), egui::pos2(x, rect.max.y)],
                egui::Stroke::new(1.0, grid_color),
            );
            x += spacing_screen;
        }
        let mut y = y0;
        while y < rect.max.y {
            painter.line_segment(
                [egui::pos2(rect.min.x, y), egui::pos2(rect.max.x, y)],
                egui::Stroke::new(1.0, grid_color),
            );
            y += spacing_screen;
        }
    }
}

fn category_color(catalog: &Catalog, category: &str) -> egui::Color32 {
    catalog
        .color(category)
        .and_then(|hex| egui::Color32::from_hex(hex).ok())
        .unwrap_or(egui::Color32::GRAY)
}

/// Fills and strokes a block or input outline whose origin is at `world`.
fn draw_outline(
    painter: &egui::Painter,
    scene: &Scene<'_>,
    outline: &Path,
    world: egui::Pos2,
    fill: egui::Color32,
    stroke: egui::Stroke,
) {
    for poly in outline.flatten(world, CURVE_STEPS) {
        let points: Vec<egui::Pos2> = poly
            .iter()
            .map(|p| scene.view.world_to_screen(scene.origin, *p))
            .collect();
        let mut mesh = egui::Mesh::default();
        for p in &points {
            mesh.colored_vertex(*p, fill);
        }
        for [a, b, c] in triangulate(&points) {
            mesh.add_triangle(a as u32, b as u32, c as u32);
        }
        painter.add(egui::Shape::mesh(mesh));
        painter.add(egui::Shape::closed_line(points, stroke));
    }
}

fn text_anchor(direction: Direction) -> egui::Align2 {
    match direction {
        Direction::Ltr => egui::Align2::LEFT_TOP,
        Direction::Rtl => egui::Align2::RIGHT_TOP,
    }
}

/// Draws `id` and its subtree with the node origin at `world`.
pub(super) fn draw_node(
    painter: &egui::Painter,
    scene: &Scene<'_>,
    id: NodeId,
    world: egui::Pos2,
    text_color: egui::Color32,
    hidden_text: Option<NodeId>,
) {
    let tree = scene.tree;
    match tree.tag(id) {
        KindTag::Block => {
            let Some(block) = tree.block(id) else {
                return;
            };
            let fill = category_color(scene.catalog, block.category());
            let stroke = if scene.selected == Some(id) {
                egui::Stroke::new(2.5, painter.ctx().style().visuals.selection.stroke.color)
            } else {
                egui::Stroke::new(1.0, egui::Color32::from_black_alpha(64))
            };
            draw_outline(painter, scene, block.outline(), world, fill, stroke);
            draw_children(painter, scene, id, world, egui::Color32::WHITE, None);
        }
        KindTag::Input => {
            let Some(input) = tree.input(id) else {
                return;
            };
            if !input.outline().is_empty() {
                let fill = match input.kind() {
                    InputKind::Boolean => egui::Color32::from_black_alpha(38),
                    _ => egui::Color32::WHITE,
                };
                draw_outline(painter, scene, input.outline(), world, fill, egui::Stroke::NONE);
            }
            let color = match input.kind() {
                InputKind::Boolean => egui::Color32::WHITE,
                _ => egui::Color32::from_gray(40),
            };
            let hidden = input.block().map(|_| input.text_node());
            draw_children(painter, scene, id, world, color, hidden);
        }
        KindTag::Text => {
            if hidden_text == Some(id) {
                return;
            }
            let Some(text) = tree.text(id).filter(|t| !t.is_empty()) else {
                return;
            };
            painter.text(
                scene.view.world_to_screen(scene.origin, world),
                text_anchor(tree.direction()),
                text,
                egui::FontId::monospace(scene.text_size * scene.view.zoom),
                text_color,
            );
        }
        KindTag::Stack => draw_children(painter, scene, id, world, text_color, None),
        KindTag::Workspace => draw_children(painter, scene, id, world, scene.header_color, None),
    }
}

fn draw_children(
    painter: &egui::Painter,
    scene: &Scene<'_>,
    id: NodeId,
    world: egui::Pos2,
    text_color: egui::Color32,
    hidden_text: Option<NodeId>,
) {
    for child in scene.tree.children(id) {
        let at = world + scene.tree.position(*child).to_vec2();
        draw_node(painter, scene, *child, at, text_color, hidden_text);
    }
}

pub(super) fn draw_workspace(painter: &egui::Painter, scene: &Scene<'_>, ws: NodeId) {
    draw_node(painter, scene, ws, egui::Pos2::ZERO, scene.header_color, None);
}

/// Marks where the carrier would attach if dropped now.
pub(super) fn draw_snap_preview(painter: &egui::Painter, scene: &Scene<'_>, snap: &Candidate) {
    let color = painter.ctx().style().visuals.selection.stroke.color;
    let at = scene.view.world_to_screen(scene.origin, snap.connection.pos);
    match snap.connection.role {
        ConnectionRole::InputSlot(input) => {
            let size = scene.tree.size(input) * scene.view.zoom;
            let min = match scene.tree.direction() {
                Direction::Ltr => at,
                Direction::Rtl => egui::pos2(at.x - size.x, at.y),
            };
            painter.rect_stroke(
                egui::Rect::from_min_size(min, size),
                egui::CornerRadius::same(6),
                egui::Stroke::new(2.0, color),
                egui::StrokeKind::Outside,
            );
        }
        _ => {
            let length = 48.0 * scene.view.zoom * scene.tree.direction().sign();
            painter.line_segment(
                [at, at + egui::vec2(length, 0.0)],
                egui::Stroke::new(3.0, color),
            );
        }
    }
}
