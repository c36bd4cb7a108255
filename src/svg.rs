use eframe::egui;

use crate::geometry::{Direction, node_rect};
use crate::input::InputKind;
use crate::registry::Catalog;
use crate::tree::{KindTag, NodeId, Tree};

const FALLBACK_FILL: &str = "#9a9a9a";

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn text_anchor(direction: Direction) -> &'static str {
    match direction {
        Direction::Ltr => "start",
        Direction::Rtl => "end",
    }
}

struct Writer<'a> {
    tree: &'a Tree,
    catalog: &'a Catalog,
    text_size: f32,
    out: String,
}

impl Writer<'_> {
    fn node(&mut self, id: NodeId, origin: egui::Pos2, hidden_text: Option<NodeId>) {
        let tree = self.tree;
        match tree.tag(id) {
            KindTag::Block => {
                if let Some(block) = tree.block(id) {
                    let fill = self.catalog.color(block.category()).unwrap_or(FALLBACK_FILL);
                    self.out.push_str(&format!(
                        r#"<path transform="translate({:.3} {:.3})" d="{}" fill="{}" stroke="rgb(0,0,0)" stroke-opacity="0.250" stroke-width="1.000"/>"#,
                        origin.x,
                        origin.y,
                        block.outline().to_svg_d(),
                        escape_xml(fill)
                    ));
                    self.out.push('\n');
                }
                self.children(id, origin, None);
            }
            KindTag::Input => {
                let Some(input) = tree.input(id) else {
                    return;
                };
                if !input.outline().is_empty() {
                    let fill = match input.kind() {
                        InputKind::Boolean => "rgb(0,0,0)\" fill-opacity=\"0.150",
                        _ => "rgb(255,255,255)",
                    };
                    self.out.push_str(&format!(
                        r#"<path transform="translate({:.3} {:.3})" d="{}" fill="{}"/>"#,
                        origin.x,
                        origin.y,
                        input.outline().to_svg_d(),
                        fill
                    ));
                    self.out.push('\n');
                }
                let hidden = input.block().map(|_| input.text_node());
                self.children(id, origin, hidden);
            }
            KindTag::Text => {
                if hidden_text == Some(id) {
                    return;
                }
                let Some(text) = tree.text(id).filter(|t| !t.is_empty()) else {
                    return;
                };
                self.out.push_str(&format!(
                    r#"<text x="{:.3}" y="{:.3}" font-family="sans-serif" font-size="{:.3}" text-anchor="{}" fill="rgb(255,255,255)">{}</text>"#,
                    origin.x,
                    origin.y + self.text_size,
                    self.text_size,
                    text_anchor(tree.direction()),
                    escape_xml(text)
                ));
                self.out.push('\n');
            }
            KindTag::Stack | KindTag::Workspace => self.children(id, origin, None),
        }
    }

    fn children(&mut self, id: NodeId, origin: egui::Pos2, hidden_text: Option<NodeId>) {
        for child in self.tree.children(id) {
            let at = origin + self.tree.position(*child).to_vec2();
            self.node(*child, at, hidden_text);
        }
    }
}

/// Renders the scripts of `ws` as a standalone SVG document.
pub fn workspace_to_svg(tree: &Tree, ws: NodeId, catalog: &Catalog, text_size: f32) -> String {
    let direction = tree.direction();
    let mut bounds: Option<egui::Rect> = None;
    for script in tree.scripts(ws) {
        let Some(size) = tree.measurements(script) else {
            continue;
        };
        let b = node_rect(tree.position(script), size, direction);
        bounds = Some(bounds.map(|r| r.union(b)).unwrap_or(b));
    }
    let bounds = bounds.unwrap_or_else(|| egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 600.0)));
    let padding = 24.0;
    let min_x = bounds.min.x - padding;
    let min_y = bounds.min.y - padding;
    let width = bounds.width() + padding * 2.0;
    let height = bounds.height() + padding * 2.0;

    let mut writer = Writer {
        tree,
        catalog,
        text_size,
        out: String::new(),
    };
    writer.out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    writer.out.push('\n');
    writer.out.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{:.3} {:.3} {:.3} {:.3}" width="{:.3}" height="{:.3}">"#,
        min_x, min_y, width, height, width, height
    ));
    writer.out.push('\n');
    for script in tree.scripts(ws) {
        writer.node(script, tree.position(script), None);
    }
    writer.out.push_str("</svg>\n");
    writer.out
}
