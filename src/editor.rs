//! The editing session: tree, catalog, history and the drag in flight.

use eframe::egui;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::descriptor::{BlockDescriptor, WorkspaceDescriptor};
use crate::error::{Error, Result};
use crate::geometry::{Direction, node_rect};
use crate::history::{History, HistoryEntry, Transfer};
use crate::location::{Location, PathStep, Slot, location_of_block, location_of_slot, slot_of_block};
use crate::registry::{Catalog, Category, Registry, Translations};
use crate::connection::ConnectionRole;
use crate::transfer::{Anchor, Candidate, Drag, Grabbed, execute, grab, shove};
use crate::tree::{KindTag, NodeId, TextMeasure, Tree, invariant};
use crate::workspace::WorkspaceRole;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    Snapped,
    /// Put into an occupied input; the previous block became its own script.
    Displaced,
    /// A C-block now wraps the blocks that followed the drop point.
    Wrapped,
    Placed,
    Deleted,
    Reverted,
}

pub struct Editor {
    tree: Tree,
    catalog: Catalog,
    config: EditorConfig,
    history: History,
    measure: Box<dyn TextMeasure>,
    scripts: NodeId,
    palette: NodeId,
    drag: Option<Drag>,
}

impl Editor {
    pub fn new(catalog: Catalog, config: EditorConfig, measure: Box<dyn TextMeasure>) -> Self {
        let mut tree = Tree::new(config.metrics.clone());
        tree.set_direction(catalog.translations.direction);
        let scripts = tree.create_workspace(WorkspaceRole::Scripts);
        let palette = tree.create_workspace(WorkspaceRole::Palette);
        tree.populate_palette(palette, &catalog);
        tree.resize(scripts, measure.as_ref());
        tree.resize(palette, measure.as_ref());
        info!(
            language = %catalog.translations.language,
            blocks = catalog.registry.opcodes().count(),
            "editor ready"
        );
        Self {
            tree,
            history: History::new(config.undo_limit),
            catalog,
            config,
            measure,
            scripts,
            palette,
            drag: None,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn scripts(&self) -> NodeId {
        self.scripts
    }

    pub fn palette(&self) -> NodeId {
        self.palette
    }

    pub fn drag(&self) -> Option<&Drag> {
        self.drag.as_ref()
    }

    pub fn direction(&self) -> Direction {
        self.tree.direction()
    }

    pub fn set_measure(&mut self, measure: Box<dyn TextMeasure>) {
        self.measure = measure;
        self.relayout();
    }

    pub fn set_config(&mut self, config: EditorConfig) {
        self.history.set_limit(config.undo_limit);
        let metrics_changed = config.metrics != self.config.metrics;
        self.config = config;
        if metrics_changed {
            self.tree.set_metrics(self.config.metrics.clone());
            self.relayout();
        }
    }

    fn relayout(&mut self) {
        self.tree.force_resize(self.scripts, self.measure.as_ref());
        self.tree.force_resize(self.palette, self.measure.as_ref());
    }

    /// Grabs `block` for dragging. A palette block spawns a copy; a block
    /// in a stack takes its younger siblings along. `pointer` is in the
    /// coordinates of the block's workspace.
    pub fn start_drag(&mut self, block: NodeId, pointer: egui::Pos2) -> bool {
        self.cancel_drag();
        let Some(b) = self.tree.block(block) else {
            return false;
        };
        let carries_one = !b.block_type().is_stackable();
        let at = self.tree.offset_in_root(block);
        let measure = self.measure.as_ref();
        let grabbed = if self.tree.workspace_of(block).is_some_and(|ws| self.tree.is_palette(ws)) {
            let spawn = Location::Spawn {
                blocks: vec![self.tree.serialize_block(block)],
            };
            grab(&mut self.tree, &spawn, None, &self.catalog, measure)
        } else {
            let Some(from) = location_of_block(&self.tree, block) else {
                return false;
            };
            let in_input = self.tree.parent(block).is_some_and(|p| self.tree.tag(p) == KindTag::Input);
            let max = (carries_one || in_input).then_some(1);
            grab(&mut self.tree, &from, max, &self.catalog, measure)
        };
        self.tree.set_position(grabbed.carrier, at);
        debug!(block = %block, origin = ?grabbed.origin, "drag started");
        self.drag = Some(Drag::new(grabbed, pointer - at));
        true
    }

    /// Moves the carrier. `target` is the workspace under the pointer and
    /// `pointer` is in its coordinates.
    pub fn drag_to(&mut self, target: Option<NodeId>, pointer: egui::Pos2) -> Option<Candidate> {
        let max = self.config.max_snap_distance;
        let drag = self.drag.as_mut()?;
        drag.track(&mut self.tree, target, pointer, max)
    }

    pub fn cancel_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            let (carrier, origin, ..) = drag.into_parts();
            shove(&mut self.tree, &origin, carrier, self.measure.as_ref());
            debug!("drag cancelled");
        }
    }

    pub fn drop_drag(&mut self) -> Option<DropOutcome> {
        let (carrier, origin, count, target, snap) = self.drag.take()?.into_parts();
        let outcome = match (target, snap) {
            (None, _) => {
                shove(&mut self.tree, &origin, carrier, self.measure.as_ref());
                DropOutcome::Reverted
            }
            (Some(ws), _) if self.tree.is_palette(ws) => {
                if matches!(origin, Location::Spawn { .. }) {
                    shove(&mut self.tree, &origin, carrier, self.measure.as_ref());
                } else {
                    let to = Location::Spawn {
                        blocks: self.tree.serialize_blocks(carrier),
                    };
                    shove(&mut self.tree, &to, carrier, self.measure.as_ref());
                    self.history
                        .record(HistoryEntry::Single(Transfer::new(origin, to, count)));
                }
                DropOutcome::Deleted
            }
            (Some(ws), None) => {
                let pos = self.tree.position(carrier);
                let to = Location::Placement {
                    workspace: ws,
                    script: self.tree.scripts(ws).len(),
                    x: pos.x,
                    y: pos.y,
                };
                shove(&mut self.tree, &to, carrier, self.measure.as_ref());
                self.history
                    .record(HistoryEntry::Single(Transfer::new(origin, to, count)));
                DropOutcome::Placed
            }
            (Some(_), Some(candidate)) => self.drop_on(candidate, carrier, origin, count),
        };
        debug!(?outcome, "dropped");
        Some(outcome)
    }

    fn drop_on(
        &mut self,
        candidate: Candidate,
        carrier: NodeId,
        origin: Location,
        count: usize,
    ) -> DropOutcome {
        let gap = |tree: &Tree, block: NodeId| match slot_of_block(tree, block) {
            Some(slot @ Slot::Gap { .. }) => slot,
            _ => invariant(format!("{block} is not in a stack")),
        };
        let slot = match candidate.connection.role {
            ConnectionRole::InputSlot(input) => Slot::Input { input },
            ConnectionRole::InsertBefore(block) => gap(&self.tree, block),
            ConnectionRole::BeforeScript(script) => Slot::Gap {
                stack: script,
                index: 0,
            },
            ConnectionRole::After(stack) => Slot::Gap {
                stack,
                index: self.tree.children(stack).len(),
            },
        };
        match slot {
            Slot::Input { input } => {
                if self.tree.input(input).and_then(|i| i.block()).is_some() {
                    self.displace(input, carrier, origin, count);
                    return DropOutcome::Displaced;
                }
            }
            Slot::Gap { stack, index } if candidate.anchor == Anchor::Wrap => {
                self.wrap(stack, index, carrier, origin, count);
                return DropOutcome::Wrapped;
            }
            Slot::Gap { .. } => {}
        }
        let to = self.address(slot);
        shove(&mut self.tree, &to, carrier, self.measure.as_ref());
        self.history
            .record(HistoryEntry::Single(Transfer::new(origin, to, count)));
        DropOutcome::Snapped
    }

    #[track_caller]
    fn address(&self, slot: Slot) -> Location {
        match location_of_slot(&self.tree, slot) {
            Some(location) => location,
            None => invariant(format!("{slot:?} is not inside a placed script")),
        }
    }

    /// Parks the carrier as a script, moves the input's block out to a new
    /// script next to it, then moves the carrier into the input.
    fn displace(&mut self, input: NodeId, carrier: NodeId, origin: Location, count: usize) {
        let Some(ws) = self.tree.workspace_of(input) else {
            invariant(format!("input {input} is not in a workspace"));
        };
        let into = self.address(Slot::Input { input });
        let scripts = self.tree.scripts(ws).len();
        let pos = self.tree.position(carrier);
        let parked = Location::Placement {
            workspace: ws,
            script: scripts,
            x: pos.x,
            y: pos.y,
        };
        let out = self.tree.offset_in_root(input) + self.config.displaced_offset();
        let steps = vec![
            Transfer::new(origin, parked.clone(), count),
            Transfer::new(
                into.clone(),
                Location::Placement {
                    workspace: ws,
                    script: scripts + 1,
                    x: out.x,
                    y: out.y,
                },
                1,
            ),
            Transfer::new(parked.clone(), into, count),
        ];
        let measure = self.measure.as_ref();
        shove(&mut self.tree, &parked, carrier, measure);
        for step in &steps[1..] {
            execute(&mut self.tree, step, &self.catalog, measure);
        }
        self.history.record(HistoryEntry::Group(steps));
    }

    fn wrap(&mut self, stack: NodeId, index: usize, carrier: NodeId, origin: Location, count: usize) {
        let following = self.tree.children(stack).len() - index;
        let head = self.tree.children(carrier)[0];
        let branch_param = self.tree.first_branch(head).and_then(|branch| {
            let params = self.tree.block(head)?.params();
            params
                .iter()
                .find(|(_, n)| **n == branch)
                .map(|(pid, _)| pid.clone())
        });
        let Some(branch_param) = branch_param else {
            invariant(format!("{head} has no branch to wrap with"));
        };
        let to = self.address(Slot::Gap { stack, index });
        let Location::Path {
            workspace,
            script,
            steps,
        } = &to
        else {
            invariant("a stack gap always has an index path");
        };
        let prefix = &steps[..steps.len() - 1];
        let mut rest = prefix.to_vec();
        rest.push(PathStep::Index(index + count));
        let mut branch = prefix.to_vec();
        branch.extend([
            PathStep::Index(index),
            PathStep::Param(branch_param),
            PathStep::Index(0),
        ]);
        let (workspace, script) = (*workspace, *script);
        let rest_from = Location::path(workspace, script, rest);
        let into_branch = Location::path(workspace, script, branch);
        let follower = (self.tree.is_top_level(stack) && index == 0)
            .then(|| self.tree.children(stack).first().copied())
            .flatten()
            .map(|block| (block, self.tree.offset_in_root(block)));
        let mut steps = vec![
            Transfer::new(origin, to.clone(), count),
            Transfer::new(rest_from, into_branch, following),
        ];
        let measure = self.measure.as_ref();
        shove(&mut self.tree, &to, carrier, measure);
        execute(&mut self.tree, &steps[1], &self.catalog, measure);

        // At a script's head the wrapped blocks stay where they were drawn.
        if let Some((follower, drawn_at)) = follower {
            let wrapped = self.tree.offset_in_root(follower);
            if wrapped != drawn_at {
                let Some(placed) = self.tree.script_at(workspace, script) else {
                    invariant(format!("script {script} vanished while wrapping"));
                };
                let at = self.tree.position(placed);
                let moved = at + (drawn_at - wrapped);
                let from = Location::Placement {
                    workspace,
                    script,
                    x: at.x,
                    y: at.y,
                };
                let to = Location::Placement {
                    workspace,
                    script,
                    x: moved.x,
                    y: moved.y,
                };
                let relocate = Transfer::new(from, to, count);
                execute(&mut self.tree, &relocate, &self.catalog, measure);
                steps.push(relocate);
            }
        }
        self.history.record(HistoryEntry::Group(steps));
    }

    pub fn transfer(&mut self, transfer: Transfer) {
        self.cancel_drag();
        execute(&mut self.tree, &transfer, &self.catalog, self.measure.as_ref());
        self.history.record(HistoryEntry::Single(transfer));
    }

    pub fn undo(&mut self) -> bool {
        self.cancel_drag();
        let Some(entry) = self.history.take_undo() else {
            return false;
        };
        for step in entry.undo_steps() {
            execute(&mut self.tree, &step, &self.catalog, self.measure.as_ref());
        }
        debug!(steps = entry.steps().len(), "undo");
        self.history.push_redo(entry);
        true
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_drag();
        let Some(entry) = self.history.take_redo() else {
            return false;
        };
        for step in entry.steps() {
            execute(&mut self.tree, step, &self.catalog, self.measure.as_ref());
        }
        debug!(steps = entry.steps().len(), "redo");
        self.history.push_undo(entry);
        true
    }

    /// Applies typed text to an input. Replacing a block this way cannot be
    /// undone, so the history is dropped.
    pub fn set_input_text(&mut self, input: NodeId, text: &str) {
        if self.tree.input(input).and_then(|i| i.block()).is_some() {
            self.history.clear();
        }
        self.tree.set_input_text(input, text);
        self.tree.resize(input, self.measure.as_ref());
    }

    pub fn alternatives(&self, block: NodeId) -> Vec<String> {
        self.tree
            .block(block)
            .map(|b| self.catalog.registry.alternatives(b.opcode()).to_vec())
            .unwrap_or_default()
    }

    /// Re-points a block at another opcode, keeping parameters whose ids
    /// survive. Returns how many parameters were discarded.
    pub fn swap_block(&mut self, block: NodeId, opcode: &str) -> usize {
        self.cancel_drag();
        let discarded = self.tree.set_block(block, opcode, &self.catalog);
        if discarded > 0 {
            // Recorded paths may run through the discarded parameters.
            self.history.clear();
        }
        self.tree.resize(block, self.measure.as_ref());
        discarded
    }

    pub fn delete_block(&mut self, block: NodeId) -> bool {
        self.cancel_drag();
        if self.in_palette(block) {
            return false;
        }
        let Some(from) = location_of_block(&self.tree, block) else {
            return false;
        };
        let single = !self.tree.is_stackable(block)
            || self.tree.parent(block).is_some_and(|p| self.tree.tag(p) == KindTag::Input);
        let measure = self.measure.as_ref();
        let Grabbed {
            carrier,
            origin,
            count,
        } = grab(&mut self.tree, &from, single.then_some(1), &self.catalog, measure);
        let to = Location::Spawn {
            blocks: self.tree.serialize_blocks(carrier),
        };
        shove(&mut self.tree, &to, carrier, measure);
        self.history
            .record(HistoryEntry::Single(Transfer::new(origin, to, count)));
        true
    }

    pub fn duplicate_block(&mut self, block: NodeId) -> Option<NodeId> {
        self.cancel_drag();
        let parent = self.tree.parent(block)?;
        let blocks: Vec<BlockDescriptor> = match self.tree.tag(parent) {
            KindTag::Stack if self.tree.is_stackable(block) => {
                let index = self.tree.index_in_parent(block)?;
                self.tree.children(parent)[index..]
                    .iter()
                    .map(|b| self.tree.serialize_block(*b))
                    .collect()
            }
            _ => vec![self.tree.serialize_block(block)],
        };
        let pos = self.tree.offset_in_root(block) + self.config.displaced_offset();
        self.spawn(blocks, pos)
    }

    pub fn spawn_block(&mut self, opcode: &str, pos: egui::Pos2) -> Option<NodeId> {
        self.cancel_drag();
        self.spawn(vec![BlockDescriptor::new(opcode)], pos)
    }

    fn spawn(&mut self, blocks: Vec<BlockDescriptor>, pos: egui::Pos2) -> Option<NodeId> {
        if blocks.is_empty() {
            return None;
        }
        let index = self.tree.scripts(self.scripts).len();
        let transfer = Transfer::new(
            Location::Spawn {
                blocks: blocks.clone(),
            },
            Location::Placement {
                workspace: self.scripts,
                script: index,
                x: pos.x,
                y: pos.y,
            },
            blocks.len(),
        );
        self.transfer(transfer);
        self.tree.script_at(self.scripts, index)
    }

    fn in_palette(&self, node: NodeId) -> bool {
        self.tree
            .workspace_of(node)
            .is_some_and(|ws| self.tree.is_palette(ws))
    }

    pub fn set_language(&mut self, language: &str) -> Result<()> {
        let translations = Translations::builtin(language)?;
        self.set_translations(translations);
        Ok(())
    }

    /// Relabels every block through the descriptor swap so values persist,
    /// rebuilds the palette and mirrors when the direction changed.
    pub fn set_translations(&mut self, translations: Translations) {
        self.cancel_drag();
        let direction = translations.direction;
        info!(language = %translations.language, "switching language");
        self.catalog.translations = translations;
        let mut discarded = 0;
        for block in self.tree.blocks_below(self.scripts) {
            discarded += self.tree.relabel(block, &self.catalog);
        }
        if discarded > 0 {
            self.history.clear();
        }
        self.tree.populate_palette(self.palette, &self.catalog);
        if direction != self.tree.direction() {
            self.set_direction(direction);
        } else {
            self.relayout();
        }
    }

    pub fn set_direction(&mut self, direction: Direction) {
        if direction == self.tree.direction() {
            return;
        }
        self.cancel_drag();
        info!(direction = direction.label(), "mirroring workspaces");
        self.tree.set_direction(direction);
        for script in self.tree.scripts(self.scripts) {
            let pos = self.tree.position(script);
            self.tree.set_position(script, egui::pos2(-pos.x, pos.y));
        }
        self.history.mirror_placements();
        self.relayout();
    }

    /// Replaces the block registry. Blocks whose opcode disappeared turn
    /// into placeholders; placeholders whose opcode appeared come back.
    pub fn set_registry(&mut self, registry: Registry) {
        self.cancel_drag();
        self.catalog.registry = registry;
        for block in self.tree.blocks_below(self.scripts) {
            self.tree.relabel(block, &self.catalog);
        }
        self.history.clear();
        self.tree.populate_palette(self.palette, &self.catalog);
        self.relayout();
    }

    pub fn add_category(&mut self, category: Category) {
        self.cancel_drag();
        self.catalog.registry.add_category(category);
        let upgraded = self.tree.upgrade_placeholders(self.scripts, &self.catalog);
        if upgraded > 0 {
            debug!(upgraded, "placeholders resolved");
            self.history.clear();
        }
        self.tree.populate_palette(self.palette, &self.catalog);
        self.relayout();
    }

    pub fn to_document(&self) -> WorkspaceDescriptor {
        self.tree.serialize_workspace(self.scripts)
    }

    pub fn document_of(&self, ws: NodeId) -> Result<WorkspaceDescriptor> {
        let is_scripts = self.tree.contains(ws)
            && self
                .tree
                .workspace(ws)
                .is_some_and(|w| w.role() == WorkspaceRole::Scripts);
        if !is_scripts {
            return Err(Error::UnknownWorkspace { id: ws.raw() });
        }
        Ok(self.tree.serialize_workspace(ws))
    }

    pub fn load_document(&mut self, document: &WorkspaceDescriptor) {
        self.cancel_drag();
        self.tree
            .load_workspace(self.scripts, document, &self.catalog);
        self.history.clear();
        self.tree.resize(self.scripts, self.measure.as_ref());
        info!(scripts = document.scripts.len(), "document loaded");
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn load_json(&mut self, text: &str) -> Result<()> {
        let document: WorkspaceDescriptor = serde_json::from_str(text)?;
        self.load_document(&document);
        Ok(())
    }

    /// Deepest block or input under `pos` (workspace coordinates).
    pub fn hit(&self, ws: NodeId, pos: egui::Pos2) -> Option<NodeId> {
        self.tree
            .children(ws)
            .iter()
            .rev()
            .filter(|c| self.tree.tag(**c) == KindTag::Stack)
            .find_map(|script| self.hit_in(*script, self.tree.position(*script), pos))
    }

    fn hit_in(&self, node: NodeId, origin: egui::Pos2, pos: egui::Pos2) -> Option<NodeId> {
        for child in self.tree.children(node).iter().rev() {
            if self.tree.tag(*child) == KindTag::Text {
                continue;
            }
            let at = origin + self.tree.position(*child).to_vec2();
            if let Some(found) = self.hit_in(*child, at, pos) {
                return Some(found);
            }
        }
        match self.tree.tag(node) {
            KindTag::Block | KindTag::Input => {
                let size = self.tree.measurements(node)?;
                node_rect(origin, size, self.tree.direction())
                    .contains(pos)
                    .then_some(node)
            }
            _ => None,
        }
    }

    pub fn block_at(&self, ws: NodeId, pos: egui::Pos2) -> Option<NodeId> {
        let hit = self.hit(ws, pos)?;
        std::iter::once(hit)
            .chain(self.tree.ancestors(hit))
            .find(|n| self.tree.tag(*n) == KindTag::Block)
    }
}
