//! Arena-backed composition tree.
//!
//! Every node lives in one map owned by [`Tree`]. A parent owns the ordered
//! list of its children; a child only remembers its parent's id. Layout runs
//! in two phases: make sure every descendant is measured, then let the node
//! reposition its children and record its own measurements.

use eframe::egui;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, trace, warn};

use crate::block::BlockNode;
use crate::geometry::Direction;
use crate::input::InputNode;
use crate::layout::{self, Metrics};
use crate::stack::StackNode;
use crate::workspace::WorkspaceNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextNode {
    pub text: String,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Text(TextNode),
    Block(BlockNode),
    Input(InputNode),
    Stack(StackNode),
    Workspace(WorkspaceNode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindTag {
    Text,
    Block,
    Input,
    Stack,
    Workspace,
}

impl KindTag {
    pub fn name(self) -> &'static str {
        match self {
            KindTag::Text => "text",
            KindTag::Block => "block",
            KindTag::Input => "input",
            KindTag::Stack => "stack",
            KindTag::Workspace => "workspace",
        }
    }
}

impl NodeKind {
    pub fn tag(&self) -> KindTag {
        match self {
            NodeKind::Text(_) => KindTag::Text,
            NodeKind::Block(_) => KindTag::Block,
            NodeKind::Input(_) => KindTag::Input,
            NodeKind::Stack(_) => KindTag::Stack,
            NodeKind::Workspace(_) => KindTag::Workspace,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) position: egui::Pos2,
    pub(crate) measurements: Option<egui::Vec2>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn position(&self) -> egui::Pos2 {
        self.position
    }

    pub fn measurements(&self) -> Option<egui::Vec2> {
        self.measurements
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

pub trait TextMeasure {
    fn measure(&self, text: &str) -> egui::Vec2;
}

/// Monospace estimate: every character advances by the same amount.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedAdvance {
    pub advance: f32,
    pub line_height: f32,
}

impl FixedAdvance {
    pub fn for_text_size(size: f32) -> Self {
        Self {
            advance: (size * 0.6).round(),
            line_height: (size * 1.2).round(),
        }
    }
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self::for_text_size(12.0)
    }
}

impl TextMeasure for FixedAdvance {
    fn measure(&self, text: &str) -> egui::Vec2 {
        let chars = text.chars().filter(|c| *c != '\n').count();
        egui::vec2(chars as f32 * self.advance, self.line_height)
    }
}

#[derive(Clone, Debug)]
pub struct ResizeTicket {
    node: NodeId,
    generation: u64,
    pub pending: Vec<(NodeId, String)>,
}

impl ResizeTicket {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeOutcome {
    Applied,
    /// A later resize or a change beneath the node made this ticket stale.
    Superseded,
}

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    direction: Direction,
    metrics: Metrics,
    generations: HashMap<NodeId, u64>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(Metrics::default())
    }
}

/// Logs and panics; used where a broken invariant means an upstream bug.
#[track_caller]
pub(crate) fn invariant(message: impl std::fmt::Display) -> ! {
    error!("invariant violated: {message}");
    panic!("{message}");
}

impl Tree {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
            direction: Direction::Ltr,
            metrics,
            generations: HashMap::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub(crate) fn set_metrics(&mut self, metrics: Metrics) {
        self.metrics = metrics;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                parent: None,
                children: Vec::new(),
                position: egui::Pos2::ZERO,
                measurements: None,
                kind,
            },
        );
        id
    }

    pub(crate) fn insert_text(&mut self, text: impl Into<String>) -> NodeId {
        self.insert(NodeKind::Text(TextNode { text: text.into() }))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[track_caller]
    pub fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(&id) {
            Some(node) => node,
            None => invariant(format!("node {id} does not exist")),
        }
    }

    #[track_caller]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => invariant(format!("node {id} does not exist")),
        }
    }

    pub fn tag(&self, id: NodeId) -> KindTag {
        self.node(id).kind.tag()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn position(&self, id: NodeId) -> egui::Pos2 {
        self.node(id).position
    }

    pub(crate) fn set_position(&mut self, id: NodeId, position: egui::Pos2) {
        self.node_mut(id).position = position;
    }

    pub fn measurements(&self, id: NodeId) -> Option<egui::Vec2> {
        self.node(id).measurements
    }

    #[track_caller]
    pub fn size(&self, id: NodeId) -> egui::Vec2 {
        match self.node(id).measurements {
            Some(size) => size,
            None => invariant(format!("node {id} was read before it was measured")),
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    pub(crate) fn set_text(&mut self, id: NodeId, text: &str) {
        if let NodeKind::Text(t) = &mut self.node_mut(id).kind {
            if t.text != text {
                t.text = text.to_string();
                self.invalidate(id);
            }
        }
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    pub fn is_ancestor(&self, ancestor: NodeId, of: NodeId) -> bool {
        self.ancestors(of).any(|a| a == ancestor)
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Attaches `child` under `parent`, detaching it from any previous
    /// parent first. `index` defaults to the end.
    pub fn add(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        if parent == child || self.is_ancestor(child, parent) {
            invariant(format!("attaching {child} under {parent} would create a cycle"));
        }
        if self.tag(parent) == KindTag::Stack && self.tag(child) != KindTag::Block {
            invariant(format!(
                "a stack only holds blocks, got a {} ({child})",
                self.tag(child).name()
            ));
        }
        if self.tag(parent) == KindTag::Text {
            invariant(format!("text node {parent} cannot have children"));
        }
        if let Some(old) = self.parent(child) {
            self.remove(old, child);
        }
        let node = self.node_mut(parent);
        let at = index.unwrap_or(node.children.len()).min(node.children.len());
        node.children.insert(at, child);
        self.node_mut(child).parent = Some(parent);
        self.invalidate(parent);
    }

    /// Detaches `child` from `parent`. A top-level script that loses its
    /// last block leaves its workspace and is destroyed on the spot.
    pub fn remove(&mut self, parent: NodeId, child: NodeId) {
        if self.parent(child) != Some(parent) {
            invariant(format!("{child} is not a child of {parent}"));
        }
        self.node_mut(parent).children.retain(|c| *c != child);
        self.node_mut(child).parent = None;
        self.invalidate(parent);

        let emptied_script = self.children(parent).is_empty()
            && self.stack(parent).is_some_and(|s| s.script)
            && self
                .parent(parent)
                .is_some_and(|ws| self.tag(ws) == KindTag::Workspace);
        if emptied_script {
            if let Some(ws) = self.parent(parent) {
                trace!(script = %parent, "empty script leaves its workspace");
                self.remove(ws, parent);
            }
            self.destroy(parent);
        }
    }

    pub fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.parent(child) {
            self.remove(parent, child);
        }
    }

    pub fn destroy(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            invariant(format!("cannot destroy {id} while it is attached to {parent}"));
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children);
            }
            self.generations.remove(&next);
        }
    }

    /// Clears measurements on `id` and every ancestor, and makes any
    /// in-flight resize ticket that covers them stale.
    pub(crate) fn invalidate(&mut self, id: NodeId) {
        let mut cur = Some(id);
        while let Some(n) = cur {
            let node = self.node_mut(n);
            node.measurements = None;
            cur = node.parent;
            if let Some(generation) = self.generations.get_mut(&n) {
                *generation += 1;
            }
        }
    }

    fn invalidate_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let node = self.node_mut(next);
            node.measurements = None;
            pending.extend(node.children.iter().copied());
        }
        self.invalidate(id);
    }

    /// Measures whatever is stale below `id`, repositions `id`, and then
    /// every ancestor up to the root.
    pub fn resize(&mut self, id: NodeId, measure: &dyn TextMeasure) {
        self.resize_with(id, measure);
    }

    pub fn force_resize(&mut self, id: NodeId, measure: &dyn TextMeasure) {
        self.invalidate_subtree(id);
        self.resize_with(id, measure);
    }

    fn resize_with(&mut self, id: NodeId, measure: &dyn TextMeasure) {
        let ticket = self.begin_resize(id);
        let sizes: Vec<(NodeId, egui::Vec2)> = ticket
            .pending
            .iter()
            .map(|(node, text)| (*node, measure.measure(text)))
            .collect();
        self.complete_resize(ticket, &sizes, true);
    }

    /// Starts a resize whose text sizes are delivered later. Any ticket
    /// issued earlier for the same node stops being applicable.
    pub fn begin_resize(&mut self, id: NodeId) -> ResizeTicket {
        let generation = self.generations.entry(id).or_insert(0);
        *generation += 1;
        let generation = *generation;
        let mut pending = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node(next);
            if node.measurements.is_some() {
                continue;
            }
            match &node.kind {
                NodeKind::Text(t) => pending.push((next, t.text.clone())),
                _ => stack.extend(node.children.iter().copied()),
            }
        }
        ResizeTicket {
            node: id,
            generation,
            pending,
        }
    }

    pub fn complete_resize(
        &mut self,
        ticket: ResizeTicket,
        sizes: &[(NodeId, egui::Vec2)],
        reposition_parents: bool,
    ) -> ResizeOutcome {
        let current = self.generations.get(&ticket.node).copied();
        if !self.contains(ticket.node) || current != Some(ticket.generation) {
            trace!(node = %ticket.node, "resize superseded");
            return ResizeOutcome::Superseded;
        }
        for (id, size) in sizes {
            if let Some(node) = self.nodes.get_mut(id) {
                if matches!(node.kind, NodeKind::Text(_)) {
                    node.measurements = Some(*size);
                }
            }
        }
        self.measure_below(ticket.node);
        if self.tag(ticket.node) != KindTag::Text {
            layout::reposition(self, ticket.node);
        }
        if reposition_parents {
            let ancestors: Vec<NodeId> = self.ancestors(ticket.node).collect();
            for ancestor in ancestors {
                self.measure_below(ancestor);
                layout::reposition(self, ancestor);
            }
        }
        ResizeOutcome::Applied
    }

    fn measure_below(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            if self.node(child).measurements.is_some() {
                continue;
            }
            if self.tag(child) == KindTag::Text {
                warn!(node = %child, "text node had no measurement; treating it as empty");
                self.node_mut(child).measurements = Some(egui::Vec2::ZERO);
                continue;
            }
            self.measure_below(child);
            layout::reposition(self, child);
        }
    }

    /// Position of `id` relative to the workspace (or detached root) above it.
    pub fn offset_in_root(&self, id: NodeId) -> egui::Pos2 {
        let mut pos = egui::Pos2::ZERO;
        let mut cur = id;
        loop {
            match self.parent(cur) {
                Some(parent) => {
                    pos += self.position(cur).to_vec2();
                    if self.tag(parent) == KindTag::Workspace {
                        return pos;
                    }
                    cur = parent;
                }
                None => {
                    if self.tag(cur) == KindTag::Workspace {
                        return pos;
                    }
                    return pos + self.position(cur).to_vec2();
                }
            }
        }
    }

    pub fn workspace_of(&self, id: NodeId) -> Option<NodeId> {
        if self.tag(id) == KindTag::Workspace {
            return Some(id);
        }
        self.ancestors(id).find(|a| self.tag(*a) == KindTag::Workspace)
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StackNode;

    fn measure() -> FixedAdvance {
        FixedAdvance::default()
    }

    #[test]
    fn fixed_advance_counts_characters() {
        let m = measure();
        assert_eq!(m.advance, 7.0);
        assert_eq!(m.line_height, 14.0);
        assert_eq!(m.measure("move"), egui::vec2(28.0, 14.0));
        assert_eq!(m.measure(""), egui::vec2(0.0, 14.0));
    }

    #[test]
    fn re_adding_moves_the_child() {
        let mut tree = Tree::default();
        let a = tree.insert(NodeKind::Stack(StackNode::default()));
        let b = tree.insert(NodeKind::Stack(StackNode::default()));
        let block = crate::block::tests::plain_block(&mut tree, "x");
        tree.add(a, block, None);
        tree.add(b, block, None);
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[block]);
        assert_eq!(tree.parent(block), Some(b));
    }

    #[test]
    #[should_panic(expected = "a stack only holds blocks")]
    fn stack_rejects_non_blocks() {
        let mut tree = Tree::default();
        let stack = tree.insert(NodeKind::Stack(StackNode::default()));
        let text = tree.insert_text("oops");
        tree.add(stack, text, None);
    }

    #[test]
    #[should_panic(expected = "while it is attached")]
    fn destroying_an_attached_node_panics() {
        let mut tree = Tree::default();
        let stack = tree.insert(NodeKind::Stack(StackNode::default()));
        let block = crate::block::tests::plain_block(&mut tree, "x");
        tree.add(stack, block, None);
        tree.destroy(block);
    }

    #[test]
    fn destroy_removes_the_whole_subtree() {
        let mut tree = Tree::default();
        let stack = tree.insert(NodeKind::Stack(StackNode::default()));
        let block = crate::block::tests::plain_block(&mut tree, "hello");
        tree.add(stack, block, None);
        tree.destroy(stack);
        assert!(tree.is_empty());
    }

    #[test]
    fn resize_twice_is_stable() {
        let mut tree = Tree::default();
        let stack = tree.insert(NodeKind::Stack(StackNode::default()));
        let block = crate::block::tests::plain_block(&mut tree, "say hello");
        tree.add(stack, block, None);
        tree.resize(stack, &measure());
        let first = tree.measurements(stack);
        tree.resize(stack, &measure());
        assert_eq!(tree.measurements(stack), first);
        assert!(first.is_some());
    }

    #[test]
    fn newer_resize_supersedes_older_ticket() {
        let mut tree = Tree::default();
        let stack = tree.insert(NodeKind::Stack(StackNode::default()));
        let block = crate::block::tests::plain_block(&mut tree, "wait");
        tree.add(stack, block, None);

        let stale = tree.begin_resize(stack);
        let fresh = tree.begin_resize(stack);
        let sizes: Vec<_> = fresh
            .pending
            .iter()
            .map(|(id, text)| (*id, measure().measure(text)))
            .collect();
        assert_eq!(tree.complete_resize(stale, &sizes, true), ResizeOutcome::Superseded);
        assert!(tree.measurements(stack).is_none());
        assert_eq!(tree.complete_resize(fresh, &sizes, true), ResizeOutcome::Applied);
        assert!(tree.measurements(stack).is_some());
    }

    #[test]
    fn change_below_supersedes_pending_ticket() {
        let mut tree = Tree::default();
        let stack = tree.insert(NodeKind::Stack(StackNode::default()));
        let block = crate::block::tests::plain_block(&mut tree, "wait");
        tree.add(stack, block, None);
        let ticket = tree.begin_resize(stack);
        let other = crate::block::tests::plain_block(&mut tree, "more");
        tree.add(stack, other, None);
        assert_eq!(tree.complete_resize(ticket, &[], true), ResizeOutcome::Superseded);
    }

    #[test]
    fn resize_walks_up_through_every_ancestor() {
        let mut tree = Tree::default();
        let outer = tree.insert(NodeKind::Stack(StackNode::default()));
        let block = crate::block::tests::plain_block(&mut tree, "a");
        tree.add(outer, block, None);
        tree.resize(outer, &measure());
        let before = tree.size(outer);

        let label = tree.children(block)[0];
        tree.set_text(label, "a much longer label");
        assert!(tree.measurements(outer).is_none());
        tree.resize(label, &measure());
        assert!(tree.size(outer).x > before.x);
    }
}
