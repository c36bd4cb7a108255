//! Pointer contract: click/drag/context-menu handlers attached to nodes
//! through explicit handles, and a tracker that turns raw pointer input
//! into clicks and drags.

use eframe::egui;
use std::collections::HashMap;
use tracing::trace;

use crate::geometry::exceeds;
use crate::tree::{NodeId, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Click,
    Drag,
    ContextMenu,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InteractionEvent {
    /// Node carrying the marker that matched.
    pub node: NodeId,
    /// Node the pointer actually hit.
    pub target: NodeId,
    pub pos: egui::Pos2,
}

type Callback<A> = Box<dyn Fn(&InteractionEvent) -> Option<A>>;

struct Registration<A> {
    kind: InteractionKind,
    callback: Callback<A>,
}

/// Handler table owned by whoever dispatches pointer events. Callbacks
/// return an action of type `A` for the caller to apply.
pub struct Interactions<A> {
    next: u64,
    handlers: HashMap<Handle, Registration<A>>,
    markers: HashMap<NodeId, Vec<Handle>>,
}

impl<A> Default for Interactions<A> {
    fn default() -> Self {
        Self {
            next: 0,
            handlers: HashMap::new(),
            markers: HashMap::new(),
        }
    }
}

impl<A> Interactions<A> {
    pub fn register(
        &mut self,
        kind: InteractionKind,
        callback: impl Fn(&InteractionEvent) -> Option<A> + 'static,
    ) -> Handle {
        self.next += 1;
        let handle = Handle(self.next);
        self.handlers.insert(
            handle,
            Registration {
                kind,
                callback: Box::new(callback),
            },
        );
        handle
    }

    /// Drops a handler and every marker that points at it.
    pub fn unregister(&mut self, handle: Handle) {
        self.handlers.remove(&handle);
        for handles in self.markers.values_mut() {
            handles.retain(|h| *h != handle);
        }
        self.markers.retain(|_, handles| !handles.is_empty());
    }

    pub fn mark(&mut self, node: NodeId, handle: Handle) {
        let handles = self.markers.entry(node).or_default();
        if !handles.contains(&handle) {
            handles.push(handle);
        }
    }

    pub fn unmark(&mut self, node: NodeId) {
        self.markers.remove(&node);
    }

    /// Forgets markers on nodes that no longer exist.
    pub fn prune(&mut self, tree: &Tree) {
        self.markers.retain(|node, _| tree.contains(*node));
    }

    fn handler_on(&self, node: NodeId, kind: InteractionKind) -> Option<&Registration<A>> {
        self.markers
            .get(&node)?
            .iter()
            .filter_map(|h| self.handlers.get(h))
            .find(|r| r.kind == kind)
    }

    /// Runs the handler of the closest marked ancestor of `hit` (itself
    /// included) registered for `kind`.
    pub fn dispatch(
        &self,
        tree: &Tree,
        hit: NodeId,
        kind: InteractionKind,
        pos: egui::Pos2,
    ) -> Option<A> {
        let chain = std::iter::once(hit).chain(tree.ancestors(hit));
        for node in chain {
            if let Some(registration) = self.handler_on(node, kind) {
                trace!(?kind, node = %node, target = %hit, "dispatching interaction");
                return (registration.callback)(&InteractionEvent {
                    node,
                    target: hit,
                    pos,
                });
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Click { pos: egui::Pos2 },
    DragStart { origin: egui::Pos2, pos: egui::Pos2 },
    DragMove { pos: egui::Pos2 },
    DragEnd { pos: egui::Pos2 },
}

/// Tells a click from a drag: the pointer must travel further than
/// `min_drag_distance` while pressed.
#[derive(Clone, Debug)]
pub struct PointerTracker {
    min_drag_distance: f32,
    press: Option<egui::Pos2>,
    dragging: bool,
}

impl PointerTracker {
    pub fn new(min_drag_distance: f32) -> Self {
        Self {
            min_drag_distance,
            press: None,
            dragging: false,
        }
    }

    pub fn set_min_drag_distance(&mut self, distance: f32) {
        self.min_drag_distance = distance;
    }

    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn down(&mut self, pos: egui::Pos2) {
        self.press = Some(pos);
        self.dragging = false;
    }

    pub fn move_to(&mut self, pos: egui::Pos2) -> Option<PointerEvent> {
        let origin = self.press?;
        if self.dragging {
            return Some(PointerEvent::DragMove { pos });
        }
        if exceeds(pos - origin, self.min_drag_distance) {
            self.dragging = true;
            return Some(PointerEvent::DragStart { origin, pos });
        }
        None
    }

    pub fn up(&mut self, pos: egui::Pos2) -> Option<PointerEvent> {
        self.press.take()?;
        if std::mem::take(&mut self.dragging) {
            Some(PointerEvent::DragEnd { pos })
        } else {
            Some(PointerEvent::Click { pos })
        }
    }

    /// Drops the current press without reporting anything.
    pub fn cancel(&mut self) {
        self.press = None;
        self.dragging = false;
    }
}
