//! Candidate attachment points, in the coordinates of the workspace (or
//! detached root) that holds them. Lists are rebuilt on demand; nothing
//! here is cached across mutations.

use eframe::egui;

use crate::tree::{KindTag, NodeId, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Top notch of a block inside a stack.
    InsertBefore(NodeId),
    /// Bottom of a stack, or the origin of an empty one.
    After(NodeId),
    /// Top of a placed script; dropping here slides the script.
    BeforeScript(NodeId),
    /// Socket of an input.
    InputSlot(NodeId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Connection {
    pub pos: egui::Pos2,
    pub role: ConnectionRole,
}

impl Connection {
    fn new(pos: egui::Pos2, role: ConnectionRole) -> Self {
        Self { pos, role }
    }
}

/// Stack connections of `stack` drawn at `origin`, branches included.
pub fn stack_connections(tree: &Tree, stack: NodeId, origin: egui::Pos2) -> Vec<Connection> {
    let mut out = Vec::new();
    collect_stack(tree, stack, origin, &mut out);
    out
}

fn collect_stack(tree: &Tree, stack: NodeId, origin: egui::Pos2, out: &mut Vec<Connection>) {
    let children = tree.children(stack);
    let Some(last) = children.last().copied() else {
        out.push(Connection::new(origin, ConnectionRole::After(stack)));
        return;
    };
    for child in children {
        let pos = origin + tree.position(*child).to_vec2();
        let Some(block) = tree.block(*child) else {
            continue;
        };
        if block.block_type().is_stackable() && !block.is_hat() {
            out.push(Connection::new(pos, ConnectionRole::InsertBefore(*child)));
        }
        for branch in tree.branches(*child) {
            collect_stack(tree, branch, pos + tree.position(branch).to_vec2(), out);
        }
    }
    let open_end = tree
        .block(last)
        .is_some_and(|b| b.block_type().is_stackable() && !b.is_terminal());
    if open_end {
        let end = origin + egui::vec2(0.0, tree.size(stack).y);
        out.push(Connection::new(end, ConnectionRole::After(stack)));
    }
}

/// Like [`stack_connections`], with the script's own head marked so a drop
/// there reads as extending the script upwards.
pub fn script_connections(tree: &Tree, script: NodeId, origin: egui::Pos2) -> Vec<Connection> {
    let mut out = stack_connections(tree, script, origin);
    let first = tree.children(script).first().copied();
    if let (Some(head), Some(first)) = (out.first_mut(), first) {
        if head.role == ConnectionRole::InsertBefore(first) {
            head.role = ConnectionRole::BeforeScript(script);
        }
    }
    out
}

/// Every stack connection in a workspace. A palette offers none.
pub fn workspace_stack_connections(tree: &Tree, ws: NodeId) -> Vec<Connection> {
    if tree.is_palette(ws) {
        return Vec::new();
    }
    tree.scripts(ws)
        .into_iter()
        .flat_map(|script| script_connections(tree, script, tree.position(script)))
        .collect()
}

/// Input sockets below `root` that would take `block`, recursing into
/// blocks already sitting in sockets.
pub fn reporter_connections(
    tree: &Tree,
    root: NodeId,
    origin: egui::Pos2,
    block: NodeId,
) -> Vec<Connection> {
    let mut out = Vec::new();
    collect_inputs(tree, root, origin, block, &mut out);
    out
}

fn collect_inputs(
    tree: &Tree,
    node: NodeId,
    origin: egui::Pos2,
    block: NodeId,
    out: &mut Vec<Connection>,
) {
    for child in tree.children(node) {
        let pos = origin + tree.position(*child).to_vec2();
        match tree.tag(*child) {
            KindTag::Input => {
                if tree.can_accept_block(*child, block) {
                    out.push(Connection::new(pos, ConnectionRole::InputSlot(*child)));
                }
                if let Some(inner) = tree.input(*child).and_then(|i| i.block()) {
                    collect_inputs(tree, inner, pos + tree.position(inner).to_vec2(), block, out);
                }
            }
            KindTag::Block | KindTag::Stack => collect_inputs(tree, *child, pos, block, out),
            KindTag::Text | KindTag::Workspace => {}
        }
    }
}

pub fn workspace_reporter_connections(tree: &Tree, ws: NodeId, block: NodeId) -> Vec<Connection> {
    if tree.is_palette(ws) {
        return Vec::new();
    }
    tree.scripts(ws)
        .into_iter()
        .flat_map(|script| reporter_connections(tree, script, tree.position(script), block))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Catalog;
    use crate::tree::FixedAdvance;
    use crate::workspace::WorkspaceRole;

    fn setup(opcodes: &[&str]) -> (Tree, NodeId, NodeId, Vec<NodeId>) {
        let catalog = Catalog::builtin("en").unwrap();
        let mut tree = Tree::default();
        let ws = tree.create_workspace(WorkspaceRole::Scripts);
        let blocks: Vec<NodeId> = opcodes.iter().map(|o| tree.create_block(o, &catalog)).collect();
        let script = tree.create_script(&blocks);
        tree.add_script(ws, script, None, egui::pos2(100.0, 50.0));
        tree.resize(ws, &FixedAdvance::default());
        (tree, ws, script, blocks)
    }

    #[test]
    fn plain_stack_offers_insert_points_and_an_end() {
        let (tree, _, script, blocks) = setup(&["motion.move", "looks.say"]);
        let conns = stack_connections(&tree, script, egui::pos2(100.0, 50.0));
        let roles: Vec<_> = conns.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                ConnectionRole::InsertBefore(blocks[0]),
                ConnectionRole::InsertBefore(blocks[1]),
                ConnectionRole::After(script),
            ]
        );
        assert_eq!(conns[1].pos, egui::pos2(100.0, 50.0 + tree.size(blocks[0]).y));
        assert_eq!(conns[2].pos, egui::pos2(100.0, 50.0 + tree.size(script).y));
    }

    #[test]
    fn script_head_becomes_before_script() {
        let (tree, _, script, blocks) = setup(&["motion.move", "looks.say"]);
        let conns = script_connections(&tree, script, egui::Pos2::ZERO);
        assert_eq!(conns[0].role, ConnectionRole::BeforeScript(script));
        assert_eq!(conns[1].role, ConnectionRole::InsertBefore(blocks[1]));
    }

    #[test]
    fn hats_and_terminals_close_their_ends() {
        let (tree, _, script, blocks) = setup(&["events.when_flag", "motion.move", "control.stop"]);
        let conns = script_connections(&tree, script, egui::Pos2::ZERO);
        let roles: Vec<_> = conns.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                ConnectionRole::InsertBefore(blocks[1]),
                ConnectionRole::InsertBefore(blocks[2]),
            ]
        );
    }

    #[test]
    fn empty_branch_offers_its_origin() {
        let (tree, _, script, blocks) = setup(&["control.forever"]);
        let branch = tree.first_branch(blocks[0]).unwrap();
        let conns = stack_connections(&tree, script, egui::Pos2::ZERO);
        let inner = conns
            .iter()
            .find(|c| c.role == ConnectionRole::After(branch))
            .unwrap();
        assert_eq!(inner.pos, tree.position(branch));
        assert_eq!(inner.pos.x, 15.0);
        // forever is terminal: nothing after the script.
        assert!(!conns.iter().any(|c| c.role == ConnectionRole::After(script)));
    }

    #[test]
    fn palette_offers_nothing() {
        let catalog = Catalog::builtin("en").unwrap();
        let mut tree = Tree::default();
        let palette = tree.create_workspace(WorkspaceRole::Palette);
        tree.populate_palette(palette, &catalog);
        tree.resize(palette, &FixedAdvance::default());
        assert!(workspace_stack_connections(&tree, palette).is_empty());
    }

    #[test]
    fn reporter_slots_respect_acceptance_and_recurse() {
        let catalog = Catalog::builtin("en").unwrap();
        let (mut tree, ws, _, blocks) = setup(&["control.if", "motion.move"]);
        let reporter = tree.create_block("operators.add", &catalog);
        let predicate = tree.create_block("operators.gt", &catalog);
        tree.resize(reporter, &FixedAdvance::default());
        tree.resize(predicate, &FixedAdvance::default());

        let condition = tree.param(blocks[0], "CONDITION").unwrap();
        let steps = tree.param(blocks[1], "STEPS").unwrap();
        let slots = |tree: &Tree, block| -> Vec<NodeId> {
            workspace_reporter_connections(tree, ws, block)
                .into_iter()
                .map(|c| match c.role {
                    ConnectionRole::InputSlot(i) => i,
                    other => panic!("unexpected {other:?}"),
                })
                .collect()
        };
        assert_eq!(slots(&tree, reporter), vec![steps]);
        assert_eq!(slots(&tree, predicate), vec![condition, steps]);

        // A reporter sitting in STEPS exposes its own sockets.
        let add = tree.create_block("operators.add", &catalog);
        tree.insert_block(steps, add);
        tree.resize(ws, &FixedAdvance::default());
        let found = slots(&tree, reporter);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0], steps);
        assert_eq!(found[1], tree.param(add, "A").unwrap());
    }
}
