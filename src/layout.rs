//! Per-kind layout. Each `reposition_*` assumes every child is already
//! measured, places the children in local coordinates and records the
//! node's own measurements. Nothing here asks for new text measurements.

use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::geometry::{NotchShape, Path};
use crate::input::InputKind;
use crate::registry::BlockType;
use crate::tree::{KindTag, NodeId, NodeKind, Tree};
use crate::workspace::WorkspaceRole;

/// Render constants shared by every layout routine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub stack_min_width: f32,
    pub stack_min_height: f32,
    pub stack_horiz_padding: f32,
    pub stack_vert_padding: f32,
    pub notch_left: f32,
    pub notch_wall_width: f32,
    pub notch_width: f32,
    pub notch_height: f32,
    pub branch_width: f32,
    pub component_spacing: f32,
    pub empty_branch_height: f32,
    pub hat_height: f32,
    pub hat_width: f32,
    pub reporter_horiz_padding: f32,
    pub boolean_horiz_padding: f32,
    pub undefined_min_width: f32,
    pub string_horiz_padding: f32,
    pub string_vert_padding: f32,
    pub string_height: f32,
    pub number_horiz_padding: f32,
    pub number_vert_padding: f32,
    pub number_height: f32,
    pub number_min_width: f32,
    pub boolean_height: f32,
    pub boolean_width: f32,
    pub boolean_side: f32,
    pub palette_padding: f32,
    pub palette_block_space: f32,
    pub palette_category_gap: f32,
    pub palette_header_gap: f32,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            stack_min_width: 39.0,
            stack_min_height: 16.0,
            stack_horiz_padding: 4.0,
            stack_vert_padding: 3.0,
            notch_left: 12.0,
            notch_wall_width: 3.0,
            notch_width: 9.0,
            notch_height: 3.0,
            branch_width: 15.0,
            component_spacing: 4.0,
            empty_branch_height: 12.0,
            hat_height: 12.0,
            hat_width: 80.0,
            reporter_horiz_padding: 8.0,
            boolean_horiz_padding: 8.0,
            undefined_min_width: 40.0,
            string_horiz_padding: 4.0,
            string_vert_padding: 2.0,
            string_height: 12.0,
            number_horiz_padding: 4.0,
            number_vert_padding: 2.0,
            number_height: 12.0,
            number_min_width: 8.0,
            boolean_height: 14.0,
            boolean_width: 30.0,
            boolean_side: 7.0,
            palette_padding: 10.0,
            palette_block_space: 10.0,
            palette_category_gap: 15.0,
            palette_header_gap: 5.0,
        }
    }
}

impl Metrics {
    pub fn notch(&self) -> NotchShape {
        NotchShape {
            wall: self.notch_wall_width,
            width: self.notch_width,
            height: self.notch_height,
        }
    }
}

pub(crate) fn reposition(tree: &mut Tree, id: NodeId) {
    match tree.tag(id) {
        KindTag::Text => {}
        KindTag::Block => reposition_block(tree, id),
        KindTag::Input => reposition_input(tree, id),
        KindTag::Stack => reposition_stack(tree, id),
        KindTag::Workspace => reposition_workspace(tree, id),
    }
}

/// Writes a child position given in logical (reading-direction) units.
fn place(tree: &mut Tree, child: NodeId, x: f32, y: f32) {
    let sign = tree.direction().sign();
    tree.set_position(child, egui::pos2(x * sign, y));
}

fn commit(tree: &mut Tree, id: NodeId, size: egui::Vec2) {
    tree.node_mut(id).measurements = Some(size);
}

fn reposition_block(tree: &mut Tree, id: NodeId) {
    let (block_type, hat, terminal) = match tree.block(id) {
        Some(b) => (b.block_type, b.hat, b.terminal),
        None => return,
    };
    let (size, outline) = match block_type {
        BlockType::Command => layout_command(tree, id, hat, terminal),
        BlockType::Undefined => {
            let size = layout_rows(tree, id, false).size;
            let m = tree.metrics();
            let size = egui::vec2(size.x.max(m.undefined_min_width), size.y);
            (size, Path::rect(size.x, size.y, tree.direction()))
        }
        BlockType::Reporter => layout_value(tree, id, ValueShape::Pill),
        BlockType::Boolean => layout_value(tree, id, ValueShape::Hexagon),
    };
    if let Some(block) = tree.block_mut(id) {
        block.outline = outline;
    }
    commit(tree, id, size);
}

struct Rows {
    size: egui::Vec2,
    /// Vertical extent of each branch, in order.
    branches: Vec<(f32, f32)>,
}

/// Command-style flow: components run along a row and every branch stack
/// closes the current row and starts a new one beneath it.
fn layout_rows(tree: &mut Tree, id: NodeId, hat: bool) -> Rows {
    let m = tree.metrics().clone();
    let children = tree.children(id).to_vec();
    let mut width = m.stack_min_width;
    let mut y = if hat { m.hat_height } else { 0.0 };
    let mut x = m.stack_horiz_padding;
    let mut row_height = m.stack_min_height;
    let mut row: Vec<(NodeId, f32, f32)> = Vec::new();
    let mut branches = Vec::new();

    for child in children {
        let size = tree.size(child);
        if tree.tag(child) == KindTag::Stack {
            y += flush_row(tree, &mut row, y, row_height, m.stack_vert_padding);
            width = width.max(x + m.stack_horiz_padding);
            x = m.stack_horiz_padding;
            row_height = m.stack_min_height;

            place(tree, child, m.branch_width, y);
            let height = size.y.max(m.empty_branch_height);
            branches.push((y, y + height));
            width = width.max(m.branch_width + size.x);
            y += height;
        } else {
            if !row.is_empty() {
                x += m.component_spacing;
            }
            row.push((child, x, size.y));
            x += size.x;
            row_height = row_height.max(size.y);
        }
    }
    y += flush_row(tree, &mut row, y, row_height, m.stack_vert_padding);
    width = width.max(x + m.stack_horiz_padding);

    Rows {
        size: egui::vec2(width, y),
        branches,
    }
}

/// Centres a finished row vertically and returns its height.
fn flush_row(
    tree: &mut Tree,
    row: &mut Vec<(NodeId, f32, f32)>,
    y: f32,
    row_height: f32,
    vert_padding: f32,
) -> f32 {
    let height = row_height + vert_padding;
    for (child, x, h) in row.drain(..) {
        place(tree, child, x, y + (height - h) / 2.0);
    }
    height
}

fn layout_command(tree: &mut Tree, id: NodeId, hat: bool, terminal: bool) -> (egui::Vec2, Path) {
    let rows = layout_rows(tree, id, hat);
    let m = tree.metrics().clone();
    let notch = m.notch();
    let inner_notch_end = m.branch_width + m.notch_left + notch.total_width();

    let mut width = rows.size.x;
    if hat {
        width = width.max(m.hat_width);
    }
    if !rows.branches.is_empty() {
        width = width.max(inner_notch_end + m.stack_horiz_padding);
    }
    let height = rows.size.y;

    let mut path = Path::new(tree.direction());
    if hat {
        path.move_to(0.0, m.hat_height).hat(m.hat_width, m.hat_height);
    } else {
        path.move_to(0.0, 0.0).h(m.notch_left).notch_forward(notch);
    }
    path.h_to(width);
    for (start, end) in &rows.branches {
        path.v_to(*start)
            .h_to(inner_notch_end)
            .notch_backward(notch)
            .h_to(m.branch_width)
            .v_to(*end)
            .h(m.notch_left)
            .notch_forward(notch)
            .h_to(width);
    }
    path.v_to(height);
    if !terminal {
        path.h_to(m.notch_left + notch.total_width()).notch_backward(notch);
    }
    path.h_to(0.0).close();

    (egui::vec2(width, height), path)
}

enum ValueShape {
    Pill,
    Hexagon,
}

fn layout_value(tree: &mut Tree, id: NodeId, shape: ValueShape) -> (egui::Vec2, Path) {
    let m = tree.metrics().clone();
    let children = tree.children(id).to_vec();
    let mut content_width = 0.0f32;
    let mut content_height = m.stack_min_height;
    let mut offsets = Vec::with_capacity(children.len());
    for (i, child) in children.iter().enumerate() {
        let size = tree.size(*child);
        if i > 0 {
            content_width += m.component_spacing;
        }
        offsets.push((*child, content_width, size.y));
        content_width += size.x;
        content_height = content_height.max(size.y);
    }
    let height = content_height + m.stack_vert_padding;
    let padding = match shape {
        ValueShape::Pill => m.reporter_horiz_padding,
        ValueShape::Hexagon => m.boolean_horiz_padding,
    };
    let width = (content_width + 2.0 * padding).max(height);
    let start = (width - content_width) / 2.0;
    for (child, x, h) in offsets {
        place(tree, child, start + x, (height - h) / 2.0);
    }
    let path = match shape {
        ValueShape::Pill => Path::pill(width, height, tree.direction()),
        ValueShape::Hexagon => Path::hexagon(width, height, height / 2.0, tree.direction()),
    };
    (egui::vec2(width, height), path)
}

fn reposition_input(tree: &mut Tree, id: NodeId) {
    let (kind, text, block) = match tree.input(id) {
        Some(input) => (input.kind, input.text, input.block),
        None => return,
    };
    let m = tree.metrics().clone();
    let dir = tree.direction();
    place(tree, text, 0.0, 0.0);

    if let Some(block) = block {
        place(tree, block, 0.0, 0.0);
        let size = tree.size(block);
        if let Some(input) = tree.input_mut(id) {
            input.outline = Path::new(dir);
        }
        commit(tree, id, size);
        return;
    }

    let text_size = tree.size(text);
    let (size, outline) = match kind {
        InputKind::String => {
            let height = m.string_height + 2.0 * m.string_vert_padding;
            let width = text_size.x + 2.0 * m.string_horiz_padding;
            place(tree, text, m.string_horiz_padding, (height - text_size.y) / 2.0);
            (egui::vec2(width, height), Path::rect(width, height, dir))
        }
        InputKind::Number | InputKind::Angle => {
            let radius = m.number_vert_padding + m.number_height / 2.0;
            let height = 2.0 * radius;
            let inner = text_size.x.max(m.number_min_width);
            let width = (inner + 2.0 * m.number_horiz_padding).max(height);
            place(tree, text, (width - text_size.x) / 2.0, (height - text_size.y) / 2.0);
            (egui::vec2(width, height), Path::pill(width, height, dir))
        }
        InputKind::Boolean => {
            let (width, height) = (m.boolean_width, m.boolean_height);
            (
                egui::vec2(width, height),
                Path::hexagon(width, height, m.boolean_side, dir),
            )
        }
    };
    if let Some(input) = tree.input_mut(id) {
        input.outline = outline;
    }
    commit(tree, id, size);
}

fn reposition_stack(tree: &mut Tree, id: NodeId) {
    let children = tree.children(id).to_vec();
    let mut y = 0.0;
    let mut width = 0.0f32;
    for child in children {
        let size = tree.size(child);
        place(tree, child, 0.0, y);
        y += size.y;
        width = width.max(size.x);
    }
    commit(tree, id, egui::vec2(width, y));
}

fn reposition_workspace(tree: &mut Tree, id: NodeId) {
    let role = match &tree.node(id).kind {
        NodeKind::Workspace(ws) => ws.role,
        _ => return,
    };
    match role {
        WorkspaceRole::Scripts => {
            let mut extent = egui::Vec2::ZERO;
            for child in tree.children(id).to_vec() {
                let pos = tree.position(child);
                let size = tree.size(child);
                extent.x = extent.x.max(pos.x.abs() + size.x);
                extent.y = extent.y.max(pos.y + size.y);
            }
            commit(tree, id, extent);
        }
        WorkspaceRole::Palette => reposition_palette(tree, id),
    }
}

/// Palette entries run top to bottom with a header before each category.
fn reposition_palette(tree: &mut Tree, id: NodeId) {
    let m = tree.metrics().clone();
    let mut y = m.palette_padding;
    let mut width = 0.0f32;
    let mut offsets = Vec::new();
    let mut previous: Option<KindTag> = None;
    for child in tree.children(id).to_vec() {
        let size = tree.size(child);
        match tree.tag(child) {
            KindTag::Text => {
                if previous.is_some() {
                    y += m.palette_category_gap;
                }
                offsets.push(y);
                place(tree, child, m.palette_padding, y);
                y += size.y + m.palette_header_gap;
            }
            _ => {
                if previous == Some(KindTag::Stack) {
                    y += m.palette_block_space;
                }
                place(tree, child, m.palette_padding, y);
                y += size.y;
            }
        }
        previous = Some(tree.tag(child));
        width = width.max(size.x + 2.0 * m.palette_padding);
    }
    if let NodeKind::Workspace(ws) = &mut tree.node_mut(id).kind {
        for (entry, offset) in ws.category_offsets.iter_mut().zip(offsets) {
            entry.offset = offset;
        }
    }
    commit(tree, id, egui::vec2(width, y + m.palette_padding));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::tests::plain_block;
    use crate::geometry::Direction;
    use crate::input::{InputKind, Value};
    use crate::tree::FixedAdvance;

    fn measure() -> FixedAdvance {
        FixedAdvance::default()
    }

    #[test]
    fn single_label_command_block() {
        let mut tree = Tree::default();
        let block = plain_block(&mut tree, "move");
        tree.resize(block, &measure());
        // Label is 28x14; row is max(16, 14) + 3 = 19 high, 4 + 28 + 4 < 39.
        assert_eq!(tree.size(block), egui::vec2(39.0, 19.0));
        let label = tree.children(block)[0];
        assert_eq!(tree.position(label), egui::pos2(4.0, 2.5));
        let d = tree.block(block).map(|b| b.outline.to_svg_d()).unwrap();
        assert_eq!(
            d,
            "M0 0 L12 0 L15 3 L24 3 L27 0 L39 0 L39 19 L27 19 L24 22 L15 22 L12 19 L0 19 Z"
        );
    }

    #[test]
    fn terminal_block_has_no_bottom_notch() {
        let mut tree = Tree::default();
        let block = plain_block(&mut tree, "stop");
        if let Some(b) = tree.block_mut(block) {
            b.terminal = true;
        }
        tree.resize(block, &measure());
        let d = tree.block(block).map(|b| b.outline.to_svg_d()).unwrap();
        assert!(d.ends_with("L39 19 L0 19 Z"), "{d}");
    }

    #[test]
    fn row_is_centred_on_the_tallest_component() {
        let mut tree = Tree::default();
        let block = plain_block(&mut tree, "go");
        let input = tree.create_input(InputKind::Number, Value::Number(10.0));
        tree.add(block, input, None);
        tree.resize(block, &measure());
        // Number input: radius 2 + 6 = 8, height 16; width max(14 + 8, 16) = 22.
        assert_eq!(tree.size(input), egui::vec2(22.0, 16.0));
        // Row: 4 + 14 + 4 + 22 + 4 = 48 wide; max(16, 16) + 3 = 19 high.
        assert_eq!(tree.size(block), egui::vec2(48.0, 19.0));
        assert_eq!(tree.position(input), egui::pos2(22.0, 1.5));
    }

    #[test]
    fn branch_opens_a_new_row() {
        let mut tree = Tree::default();
        let block = plain_block(&mut tree, "forever");
        let branch = tree.create_stack();
        tree.add(block, branch, None);
        tree.resize(block, &measure());
        // Row 19, empty branch 12, closing row 19.
        assert_eq!(tree.position(branch), egui::pos2(15.0, 19.0));
        assert_eq!(tree.size(block).y, 50.0);
        // "forever" is 49 wide: 4 + 49 + 4.
        assert_eq!(tree.size(block).x, 57.0);

        let inner = plain_block(&mut tree, "say something long");
        tree.add(branch, inner, None);
        tree.resize(inner, &measure());
        let inner_size = tree.size(inner);
        assert_eq!(tree.size(block).x, 15.0 + inner_size.x);
        assert_eq!(tree.size(block).y, 19.0 + inner_size.y + 19.0);
    }

    #[test]
    fn reporter_is_a_pill_at_least_as_wide_as_tall() {
        let mut tree = Tree::default();
        let block = plain_block(&mut tree, "x");
        if let Some(b) = tree.block_mut(block) {
            b.block_type = BlockType::Reporter;
        }
        tree.resize(block, &measure());
        // 7 + 16 = 23 wide, 19 high.
        assert_eq!(tree.size(block), egui::vec2(23.0, 19.0));
        let d = tree.block(block).map(|b| b.outline.to_svg_d()).unwrap();
        assert!(d.starts_with("M9.5 0 L13.5 0 A9.5 9.5"), "{d}");
    }

    #[test]
    fn occupied_input_measures_as_its_block() {
        let mut tree = Tree::default();
        let input = tree.create_input(InputKind::String, Value::Text("abc".into()));
        tree.resize(input, &measure());
        assert_eq!(tree.size(input), egui::vec2(29.0, 16.0));

        let reporter = plain_block(&mut tree, "answer");
        if let Some(b) = tree.block_mut(reporter) {
            b.block_type = BlockType::Reporter;
        }
        tree.insert_block(input, reporter);
        tree.resize(input, &measure());
        assert_eq!(tree.size(input), tree.size(reporter));
    }

    #[test]
    fn right_to_left_mirrors_child_offsets() {
        let mut tree = Tree::default();
        tree.set_direction(Direction::Rtl);
        let block = plain_block(&mut tree, "go");
        let input = tree.create_input(InputKind::Number, Value::Number(10.0));
        tree.add(block, input, None);
        tree.resize(block, &measure());
        assert_eq!(tree.position(input), egui::pos2(-22.0, 1.5));
        let d = tree.block(block).map(|b| b.outline.to_svg_d()).unwrap();
        assert!(d.starts_with("M0 0 L-12 0 L-15 3"), "{d}");
    }

    #[test]
    fn stack_piles_blocks_and_takes_the_widest() {
        let mut tree = Tree::default();
        let stack = tree.create_stack();
        let a = plain_block(&mut tree, "a");
        let b = plain_block(&mut tree, "a much wider label");
        tree.add(stack, a, None);
        tree.add(stack, b, None);
        tree.resize(stack, &measure());
        assert_eq!(tree.position(b), egui::pos2(0.0, 19.0));
        assert_eq!(tree.size(stack), egui::vec2(tree.size(b).x, 38.0));
    }
}
