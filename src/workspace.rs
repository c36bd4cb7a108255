use eframe::egui;
use tracing::debug;

use crate::registry::Catalog;
use crate::tree::{KindTag, NodeId, NodeKind, Tree, invariant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkspaceRole {
    /// Free-form canvas of user scripts.
    Scripts,
    /// Read-only list of every registry block, grouped by category.
    Palette,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryOffset {
    pub id: String,
    pub offset: f32,
}

#[derive(Clone, Debug)]
pub struct WorkspaceNode {
    pub(crate) role: WorkspaceRole,
    pub(crate) category_offsets: Vec<CategoryOffset>,
}

impl WorkspaceNode {
    pub fn role(&self) -> WorkspaceRole {
        self.role
    }

    /// Vertical position of each category header, for category jumps.
    pub fn category_offsets(&self) -> &[CategoryOffset] {
        &self.category_offsets
    }
}

impl Tree {
    pub fn workspace(&self, id: NodeId) -> Option<&WorkspaceNode> {
        match &self.node(id).kind {
            NodeKind::Workspace(ws) => Some(ws),
            _ => None,
        }
    }

    pub fn is_palette(&self, id: NodeId) -> bool {
        self.workspace(id)
            .is_some_and(|ws| ws.role == WorkspaceRole::Palette)
    }

    pub fn create_workspace(&mut self, role: WorkspaceRole) -> NodeId {
        self.insert(NodeKind::Workspace(WorkspaceNode {
            role,
            category_offsets: Vec::new(),
        }))
    }

    /// Scripts of a workspace in index-path order.
    pub fn scripts(&self, ws: NodeId) -> Vec<NodeId> {
        self.children(ws)
            .iter()
            .copied()
            .filter(|c| self.tag(*c) == KindTag::Stack)
            .collect()
    }

    pub fn script_at(&self, ws: NodeId, index: usize) -> Option<NodeId> {
        self.scripts(ws).get(index).copied()
    }

    pub fn script_index(&self, ws: NodeId, script: NodeId) -> Option<usize> {
        self.scripts(ws).iter().position(|s| *s == script)
    }

    /// Places `script` at `pos` as the `index`-th script (default: last).
    pub fn add_script(&mut self, ws: NodeId, script: NodeId, index: Option<usize>, pos: egui::Pos2) {
        if self.workspace(ws).is_none() {
            invariant(format!("{ws} is not a workspace"));
        }
        if !self.is_script(script) {
            invariant(format!("{script} is not a script"));
        }
        let child_index = index.map(|i| {
            self.scripts(ws)
                .get(i)
                .and_then(|s| self.children(ws).iter().position(|c| c == s))
                .unwrap_or(self.children(ws).len())
        });
        self.set_position(script, pos);
        self.add(ws, script, child_index);
    }

    /// Detaches and destroys every child of a workspace.
    pub fn clear_workspace(&mut self, ws: NodeId) {
        for child in self.children(ws).to_vec() {
            self.remove(ws, child);
            if self.contains(child) {
                self.destroy(child);
            }
        }
    }

    /// Refills a palette with one entry per registry block under a header
    /// per category.
    pub fn populate_palette(&mut self, palette: NodeId, catalog: &Catalog) {
        self.clear_workspace(palette);
        let mut offsets = Vec::new();
        for category in &catalog.registry.categories {
            let header = self.insert_text(catalog.translations.category_name(&category.id));
            self.add(palette, header, None);
            offsets.push(CategoryOffset {
                id: category.id.clone(),
                offset: 0.0,
            });
            for spec in &category.blocks {
                let block = self.create_block(&format!("{}.{}", category.id, spec.opcode), catalog);
                let script = self.create_script(&[block]);
                self.add(palette, script, None);
            }
        }
        debug!(categories = offsets.len(), "palette rebuilt");
        if let NodeKind::Workspace(ws) = &mut self.node_mut(palette).kind {
            ws.category_offsets = offsets;
        }
    }
}
