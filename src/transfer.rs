//! Grab, track and shove: moving runs of blocks between locations.

use eframe::egui;
use tracing::{debug, trace};

use crate::connection::{
    Connection, ConnectionRole, workspace_reporter_connections, workspace_stack_connections,
};
use crate::geometry::{distance_sq, within};
use crate::history::Transfer;
use crate::location::{Location, PathStep, Slot, resolve_or_panic};
use crate::registry::Catalog;
use crate::tree::{KindTag, NodeId, TextMeasure, Tree, invariant};

#[derive(Clone, Debug, PartialEq)]
pub struct Grabbed {
    pub carrier: NodeId,
    /// Where the blocks came from. Equivalent to the grabbed location, but
    /// a script that vanished is reported as its placement.
    pub origin: Location,
    pub count: usize,
}

pub fn grab(
    tree: &mut Tree,
    location: &Location,
    max_count: Option<usize>,
    catalog: &Catalog,
    measure: &dyn TextMeasure,
) -> Grabbed {
    let grabbed = match location {
        Location::Spawn { blocks } => {
            let built: Vec<NodeId> = blocks.iter().map(|d| tree.build_block(d, catalog)).collect();
            let carrier = tree.create_script(&built);
            Grabbed {
                carrier,
                origin: location.clone(),
                count: built.len(),
            }
        }
        Location::Placement {
            workspace, script, ..
        } => {
            let head = Location::path(*workspace, *script, vec![PathStep::Index(0)]);
            grab_path(tree, &head, max_count, measure)
        }
        Location::Path { .. } => grab_path(tree, location, max_count, measure),
    };
    tree.resize(grabbed.carrier, measure);
    debug!(carrier = %grabbed.carrier, count = grabbed.count, "grabbed");
    grabbed
}

fn grab_path(
    tree: &mut Tree,
    location: &Location,
    max_count: Option<usize>,
    measure: &dyn TextMeasure,
) -> Grabbed {
    match resolve_or_panic(tree, location) {
        Slot::Input { input } => {
            let at = tree.offset_in_root(input);
            let Some(block) = tree.take_block(input) else {
                invariant(format!("input {input} is empty; nothing to grab"));
            };
            let carrier = tree.create_script(&[block]);
            tree.set_position(carrier, at);
            tree.resize(input, measure);
            Grabbed {
                carrier,
                origin: location.clone(),
                count: 1,
            }
        }
        Slot::Gap { stack, index } => {
            if tree.measurements(stack).is_none() {
                tree.resize(stack, measure);
            }
            let children = tree.children(stack).to_vec();
            let end = max_count.map_or(children.len(), |n| index.saturating_add(n).min(children.len()));
            if index >= end {
                invariant(format!("no blocks to grab at {index} of {stack}"));
            }
            let taken = &children[index..end];
            let at = tree.offset_in_root(taken[0]);

            let workspace = tree
                .parent(stack)
                .filter(|_| tree.is_top_level(stack));
            let mut origin = location.clone();
            let mut slide = None;
            if let (Some(ws), 0) = (workspace, index) {
                if end == children.len() {
                    let pos = tree.position(stack);
                    let script = tree.script_index(ws, stack).unwrap_or(0);
                    origin = Location::Placement {
                        workspace: ws,
                        script,
                        x: pos.x,
                        y: pos.y,
                    };
                } else {
                    slide = Some(tree.position(children[end]).y);
                }
            }

            let carrier = tree.create_script(taken);
            tree.set_position(carrier, at);
            if let Some(dy) = slide {
                let pos = tree.position(stack);
                tree.set_position(stack, pos + egui::vec2(0.0, dy));
            }
            if tree.contains(stack) {
                tree.resize(stack, measure);
            } else if let Some(ws) = workspace {
                tree.resize(ws, measure);
            }
            Grabbed {
                carrier,
                origin,
                count: taken.len(),
            }
        }
    }
}

pub fn shove(tree: &mut Tree, location: &Location, carrier: NodeId, measure: &dyn TextMeasure) {
    if let Some(parent) = tree.parent(carrier) {
        invariant(format!("carrier {carrier} is still attached to {parent}"));
    }
    match location {
        Location::Spawn { .. } => {
            tree.destroy(carrier);
        }
        Location::Placement {
            workspace,
            script,
            x,
            y,
        } => {
            tree.add_script(*workspace, carrier, Some(*script), egui::pos2(*x, *y));
            tree.resize(carrier, measure);
        }
        Location::Path { .. } => match resolve_or_panic(tree, location) {
            Slot::Input { input } => {
                let blocks = tree.children(carrier).to_vec();
                let [block] = blocks[..] else {
                    invariant(format!(
                        "an input takes one block, carrier {carrier} holds {}",
                        blocks.len()
                    ));
                };
                tree.detach(block);
                tree.destroy(carrier);
                tree.insert_block(input, block);
                tree.resize(input, measure);
            }
            Slot::Gap { stack, index } => {
                if tree.is_top_level(stack) && index == 0 {
                    if tree.measurements(carrier).is_none() {
                        tree.resize(carrier, measure);
                    }
                    let dy = tree.size(carrier).y;
                    let pos = tree.position(stack);
                    tree.set_position(stack, pos - egui::vec2(0.0, dy));
                }
                let blocks = tree.children(carrier).to_vec();
                for (i, block) in blocks.iter().enumerate() {
                    tree.add(stack, *block, Some(index + i));
                }
                tree.destroy(carrier);
                tree.resize(stack, measure);
            }
        },
    }
    debug!(carrier = %carrier, "shoved");
}

pub fn execute(tree: &mut Tree, transfer: &Transfer, catalog: &Catalog, measure: &dyn TextMeasure) {
    let grabbed = grab(tree, &transfer.from, Some(transfer.block_count), catalog, measure);
    if grabbed.count != transfer.block_count {
        invariant(format!(
            "transfer expected {} blocks at {:?}, found {}",
            transfer.block_count, transfer.from, grabbed.count
        ));
    }
    shove(tree, &transfer.to, grabbed.carrier, measure);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    Top,
    Bottom,
    Wrap,
    Value,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CarrierAnchors {
    pub top: Option<egui::Pos2>,
    pub bottom: Option<egui::Pos2>,
    pub wrap: Option<egui::Pos2>,
    pub value: Option<egui::Pos2>,
}

impl CarrierAnchors {
    pub fn of(tree: &Tree, carrier: NodeId, at: egui::Pos2) -> Self {
        let blocks = tree.children(carrier);
        let (Some(first), Some(last)) = (blocks.first().copied(), blocks.last().copied()) else {
            return Self::default();
        };
        let Some(head) = tree.block(first) else {
            return Self::default();
        };
        if !head.block_type().is_stackable() {
            return Self {
                value: Some(at),
                ..Self::default()
            };
        }
        let top = (!head.is_hat()).then_some(at);
        let bottom = tree
            .block(last)
            .filter(|b| !b.is_terminal())
            .map(|_| at + egui::vec2(0.0, tree.size(carrier).y));
        let wrap = tree
            .first_branch(first)
            .filter(|branch| !head.is_hat() && tree.children(*branch).is_empty())
            .map(|branch| at + tree.position(first).to_vec2() + tree.position(branch).to_vec2());
        Self {
            top,
            bottom,
            wrap,
            value: None,
        }
    }

    pub fn get(&self, anchor: Anchor) -> Option<egui::Pos2> {
        match anchor {
            Anchor::Top => self.top,
            Anchor::Bottom => self.bottom,
            Anchor::Wrap => self.wrap,
            Anchor::Value => self.value,
        }
    }

    pub fn eligible(&self, role: ConnectionRole) -> &'static [Anchor] {
        match role {
            // Splicing into the middle of a stack needs an open bottom.
            ConnectionRole::InsertBefore(_) if self.bottom.is_some() => &[Anchor::Top, Anchor::Wrap],
            ConnectionRole::InsertBefore(_) => &[Anchor::Wrap],
            ConnectionRole::After(_) => &[Anchor::Top],
            ConnectionRole::BeforeScript(_) => &[Anchor::Bottom, Anchor::Wrap],
            ConnectionRole::InputSlot(_) => &[Anchor::Value],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub connection: Connection,
    pub anchor: Anchor,
    pub distance_sq: f32,
}

/// Closest eligible pairing within `max_distance`. On equal distances the
/// candidate found first in list order wins.
pub fn nearest(
    connections: &[Connection],
    anchors: &CarrierAnchors,
    max_distance: f32,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for connection in connections {
        for anchor in anchors.eligible(connection.role) {
            let Some(point) = anchors.get(*anchor) else {
                continue;
            };
            if !within(point, connection.pos, max_distance) {
                continue;
            }
            let d = distance_sq(point, connection.pos);
            if best.is_none_or(|b| d < b.distance_sq) {
                best = Some(Candidate {
                    connection: *connection,
                    anchor: *anchor,
                    distance_sq: d,
                });
            }
        }
    }
    best
}

pub fn candidates_for(tree: &Tree, ws: NodeId, carrier: NodeId) -> Vec<Connection> {
    let Some(first) = tree.children(carrier).first().copied() else {
        return Vec::new();
    };
    if tree.tag(ws) != KindTag::Workspace {
        return Vec::new();
    }
    if tree.is_stackable(first) {
        workspace_stack_connections(tree, ws)
    } else {
        workspace_reporter_connections(tree, ws, first)
    }
}

#[derive(Clone, Debug)]
pub struct Drag {
    carrier: NodeId,
    origin: Location,
    count: usize,
    grab_offset: egui::Vec2,
    target: Option<NodeId>,
    connections: Vec<Connection>,
    recomputations: usize,
    snap: Option<Candidate>,
}

impl Drag {
    pub fn new(grabbed: Grabbed, grab_offset: egui::Vec2) -> Self {
        Self {
            carrier: grabbed.carrier,
            origin: grabbed.origin,
            count: grabbed.count,
            grab_offset,
            target: None,
            connections: Vec::new(),
            recomputations: 0,
            snap: None,
        }
    }

    pub fn carrier(&self) -> NodeId {
        self.carrier
    }

    pub fn origin(&self) -> &Location {
        &self.origin
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn snap(&self) -> Option<Candidate> {
        self.snap
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    pub(crate) fn into_parts(self) -> (NodeId, Location, usize, Option<NodeId>, Option<Candidate>) {
        (self.carrier, self.origin, self.count, self.target, self.snap)
    }

    /// The candidate list is rebuilt only when the target changes.
    pub fn track(
        &mut self,
        tree: &mut Tree,
        target: Option<NodeId>,
        pointer: egui::Pos2,
        max_snap_distance: f32,
    ) -> Option<Candidate> {
        let at = pointer - self.grab_offset;
        tree.set_position(self.carrier, at);
        if target != self.target || self.recomputations == 0 {
            self.target = target;
            self.connections = match target {
                Some(ws) => candidates_for(tree, ws, self.carrier),
                None => Vec::new(),
            };
            self.recomputations += 1;
            trace!(target = ?target, candidates = self.connections.len(), "drop target changed");
        }
        let anchors = CarrierAnchors::of(tree, self.carrier, at);
        self.snap = nearest(&self.connections, &anchors, max_snap_distance);
        if let Some(snap) = &self.snap {
            trace!(role = ?snap.connection.role, anchor = ?snap.anchor, "snap candidate");
        }
        self.snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Catalog;
    use crate::tree::FixedAdvance;
    use crate::workspace::WorkspaceRole;

    struct Fixture {
        tree: Tree,
        catalog: Catalog,
        ws: NodeId,
        script: NodeId,
        blocks: Vec<NodeId>,
    }

    fn fixture(opcodes: &[&str]) -> Fixture {
        let catalog = Catalog::builtin("en").unwrap();
        let mut tree = Tree::default();
        let ws = tree.create_workspace(WorkspaceRole::Scripts);
        let blocks: Vec<NodeId> = opcodes.iter().map(|o| tree.create_block(o, &catalog)).collect();
        let script = tree.create_script(&blocks);
        tree.add_script(ws, script, None, egui::pos2(40.0, 60.0));
        tree.resize(ws, &FixedAdvance::default());
        Fixture {
            tree,
            catalog,
            ws,
            script,
            blocks,
        }
    }

    fn head(ws: NodeId, index: usize) -> Location {
        Location::path(ws, 0, vec![PathStep::Index(index)])
    }

    #[test]
    fn grabbing_the_middle_takes_younger_siblings() {
        let mut f = fixture(&["motion.move", "looks.say", "control.wait"]);
        let m = FixedAdvance::default();
        let g = grab(&mut f.tree, &head(f.ws, 1), None, &f.catalog, &m);
        assert_eq!(g.count, 2);
        assert_eq!(f.tree.children(g.carrier), &f.blocks[1..]);
        assert_eq!(f.tree.children(f.script), &f.blocks[..1]);
        assert_eq!(g.origin, head(f.ws, 1));
        // The carrier starts where its first block was drawn.
        assert_eq!(f.tree.position(g.carrier), egui::pos2(40.0, 60.0 + f.tree.size(f.blocks[0]).y));
    }

    #[test]
    fn max_count_caps_the_grab() {
        let mut f = fixture(&["motion.move", "looks.say", "control.wait"]);
        let m = FixedAdvance::default();
        let g = grab(&mut f.tree, &head(f.ws, 1), Some(1), &f.catalog, &m);
        assert_eq!(f.tree.children(g.carrier), &[f.blocks[1]]);
        assert_eq!(f.tree.children(f.script), &[f.blocks[0], f.blocks[2]]);
    }

    #[test]
    fn grabbing_a_whole_script_reports_its_placement() {
        let mut f = fixture(&["motion.move", "looks.say"]);
        let m = FixedAdvance::default();
        let g = grab(&mut f.tree, &head(f.ws, 0), None, &f.catalog, &m);
        assert!(!f.tree.contains(f.script));
        assert_eq!(
            g.origin,
            Location::Placement {
                workspace: f.ws,
                script: 0,
                x: 40.0,
                y: 60.0
            }
        );
        shove(&mut f.tree, &g.origin, g.carrier, &m);
        let restored = f.tree.script_at(f.ws, 0).unwrap();
        assert_eq!(f.tree.position(restored), egui::pos2(40.0, 60.0));
        assert_eq!(f.tree.children(restored), &f.blocks[..]);
    }

    #[test]
    fn head_grab_and_shove_slide_the_script() {
        let mut f = fixture(&["motion.move", "looks.say"]);
        let m = FixedAdvance::default();
        let first_height = f.tree.size(f.blocks[0]).y;
        let g = grab(&mut f.tree, &head(f.ws, 0), Some(1), &f.catalog, &m);
        // The rest stays where it was drawn.
        assert_eq!(f.tree.position(f.script), egui::pos2(40.0, 60.0 + first_height));
        shove(&mut f.tree, &g.origin, g.carrier, &m);
        assert_eq!(f.tree.position(f.script), egui::pos2(40.0, 60.0));
        assert_eq!(f.tree.children(f.script), &f.blocks[..]);
    }

    #[test]
    fn input_grab_empties_the_socket() {
        let mut f = fixture(&["motion.move"]);
        let m = FixedAdvance::default();
        let steps = f.tree.param(f.blocks[0], "STEPS").unwrap();
        let reporter = f.tree.create_block("motion.x_position", &f.catalog);
        f.tree.insert_block(steps, reporter);
        f.tree.resize(f.ws, &m);
        let loc = Location::path(
            f.ws,
            0,
            vec![PathStep::Index(0), PathStep::Param("STEPS".into())],
        );
        let g = grab(&mut f.tree, &loc, None, &f.catalog, &m);
        assert_eq!(f.tree.children(g.carrier), &[reporter]);
        assert_eq!(f.tree.input(steps).and_then(|i| i.block()), None);
        shove(&mut f.tree, &loc, g.carrier, &m);
        assert_eq!(f.tree.input(steps).and_then(|i| i.block()), Some(reporter));
    }

    #[test]
    fn spawn_builds_and_destroys() {
        let mut f = fixture(&["motion.move"]);
        let m = FixedAdvance::default();
        let before = f.tree.len();
        let spawn = Location::Spawn {
            blocks: vec![f.tree.serialize_block(f.blocks[0])],
        };
        let g = grab(&mut f.tree, &spawn, None, &f.catalog, &m);
        assert_eq!(g.count, 1);
        assert!(f.tree.len() > before);
        shove(&mut f.tree, &spawn, g.carrier, &m);
        assert_eq!(f.tree.len(), before);
    }

    #[test]
    #[should_panic(expected = "already holds")]
    fn shoving_into_an_occupied_input_is_fatal() {
        let mut f = fixture(&["motion.move"]);
        let m = FixedAdvance::default();
        let steps = f.tree.param(f.blocks[0], "STEPS").unwrap();
        let a = f.tree.create_block("motion.x_position", &f.catalog);
        f.tree.insert_block(steps, a);
        let b = f.tree.create_block("motion.y_position", &f.catalog);
        let carrier = f.tree.create_script(&[b]);
        let loc = Location::path(f.ws, 0, vec![PathStep::Index(0), PathStep::Param("STEPS".into())]);
        shove(&mut f.tree, &loc, carrier, &m);
    }

    fn conn(x: f32, y: f32, role: ConnectionRole) -> Connection {
        Connection {
            pos: egui::pos2(x, y),
            role,
        }
    }

    fn id(raw: u64) -> NodeId {
        serde_json::from_str(&raw.to_string()).unwrap()
    }

    #[test]
    fn nearest_prefers_the_closest_and_the_first_on_ties() {
        let anchors = CarrierAnchors {
            top: Some(egui::pos2(0.0, 0.0)),
            bottom: Some(egui::pos2(0.0, 20.0)),
            ..CarrierAnchors::default()
        };
        let conns = [
            conn(3.0, 4.0, ConnectionRole::After(id(1))),
            conn(0.0, 5.0, ConnectionRole::After(id(2))),
            conn(1.0, 1.0, ConnectionRole::InputSlot(id(3))),
        ];
        let best = nearest(&conns, &anchors, 20.0).unwrap();
        assert_eq!(best.connection.role, ConnectionRole::After(id(1)));
        assert_eq!(best.distance_sq, 25.0);

        let closer = [conns[0], conn(0.0, 2.0, ConnectionRole::After(id(4)))];
        let best = nearest(&closer, &anchors, 20.0).unwrap();
        assert_eq!(best.connection.role, ConnectionRole::After(id(4)));
    }

    #[test]
    fn nothing_beyond_the_threshold_is_chosen() {
        let anchors = CarrierAnchors {
            top: Some(egui::pos2(0.0, 0.0)),
            ..CarrierAnchors::default()
        };
        let conns = [
            conn(20.0, 0.1, ConnectionRole::After(id(1))),
            conn(30.0, 0.0, ConnectionRole::After(id(2))),
        ];
        assert!(nearest(&conns, &anchors, 20.0).is_none());
        assert!(nearest(&conns[..1], &anchors, 20.1).is_some());
    }

    #[test]
    fn before_script_pairs_with_the_bottom_anchor() {
        let anchors = CarrierAnchors {
            top: Some(egui::pos2(0.0, 100.0)),
            bottom: Some(egui::pos2(0.0, 119.0)),
            ..CarrierAnchors::default()
        };
        let conns = [conn(0.0, 120.0, ConnectionRole::BeforeScript(id(7)))];
        let best = nearest(&conns, &anchors, 20.0).unwrap();
        assert_eq!(best.anchor, Anchor::Bottom);
        assert_eq!(best.distance_sq, 1.0);
    }

    #[test]
    fn c_block_carrier_exposes_a_wrap_anchor() {
        let mut f = fixture(&["motion.move"]);
        let m = FixedAdvance::default();
        let spawn = Location::Spawn {
            blocks: vec![crate::descriptor::BlockDescriptor::new("control.forever")],
        };
        let g = grab(&mut f.tree, &spawn, None, &f.catalog, &m);
        let anchors = CarrierAnchors::of(&f.tree, g.carrier, egui::pos2(10.0, 10.0));
        assert_eq!(anchors.top, Some(egui::pos2(10.0, 10.0)));
        // forever is terminal.
        assert_eq!(anchors.bottom, None);
        assert_eq!(anchors.wrap, Some(egui::pos2(25.0, 29.0)));
        assert_eq!(
            anchors.eligible(ConnectionRole::InsertBefore(f.blocks[0])),
            &[Anchor::Wrap]
        );
    }

    #[test]
    fn drag_recomputes_only_when_the_target_changes() {
        let mut f = fixture(&["motion.move"]);
        let m = FixedAdvance::default();
        let spawn = Location::Spawn {
            blocks: vec![crate::descriptor::BlockDescriptor::new("looks.say")],
        };
        let g = grab(&mut f.tree, &spawn, None, &f.catalog, &m);
        let mut drag = Drag::new(g, egui::Vec2::ZERO);
        let end = egui::pos2(40.0, 60.0 + f.tree.size(f.script).y);

        drag.track(&mut f.tree, Some(f.ws), egui::pos2(300.0, 300.0), 20.0);
        assert!(drag.snap().is_none());
        drag.track(&mut f.tree, Some(f.ws), end + egui::vec2(2.0, 3.0), 20.0);
        assert_eq!(drag.recomputations(), 1);
        assert_eq!(
            drag.snap().map(|s| s.connection.role),
            Some(ConnectionRole::After(f.script))
        );
        drag.track(&mut f.tree, None, end, 20.0);
        assert_eq!(drag.recomputations(), 2);
        assert!(drag.snap().is_none());
    }
}
