//! Data addresses for transfer sources and destinations.
//!
//! An index path is resolved against the live tree every time it is used.
//! Resolved node ids are never kept around between edits, so a path stays
//! meaningful after unrelated structure beneath its prefix has changed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::descriptor::BlockDescriptor;
use crate::tree::{KindTag, NodeId, Tree, invariant};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathStep {
    /// Nth block of a stack, nth parameter child of a block, or the block
    /// inside an input (`0`).
    Index(usize),
    /// Named parameter of a block.
    Param(String),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Index(i) => write!(f, "{i}"),
            PathStep::Param(p) => write!(f, "{p:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Location {
    /// Blocks that do not live anywhere yet (palette clones, deletions).
    Spawn { blocks: Vec<BlockDescriptor> },
    /// A gap in a stack or an input socket, reached from a placed script.
    Path {
        workspace: NodeId,
        script: usize,
        steps: Vec<PathStep>,
    },
    /// A whole top-level script at a given index and position.
    Placement {
        workspace: NodeId,
        script: usize,
        x: f32,
        y: f32,
    },
}

impl Location {
    pub fn path(workspace: NodeId, script: usize, steps: Vec<PathStep>) -> Self {
        Location::Path {
            workspace,
            script,
            steps,
        }
    }

    pub fn workspace(&self) -> Option<NodeId> {
        match self {
            Location::Spawn { .. } => None,
            Location::Path { workspace, .. } | Location::Placement { workspace, .. } => {
                Some(*workspace)
            }
        }
    }

    /// Negates the horizontal coordinate of a placement.
    pub fn mirror(&mut self) {
        if let Location::Placement { x, .. } = self {
            *x = -*x;
        }
    }
}

/// Where an index path lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The gap before the `index`-th block (`index == len` is the end).
    Gap { stack: NodeId, index: usize },
    Input { input: NodeId },
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("{workspace} is not a workspace")]
    NoWorkspace { workspace: NodeId },
    #[error("workspace {workspace} has no script {index}")]
    NoScript { workspace: NodeId, index: usize },
    #[error("step {at} ({step}) cannot be taken from a {found}")]
    Step {
        at: usize,
        step: PathStep,
        found: &'static str,
    },
    #[error("step {at} wants child {index} but there are only {len}")]
    OutOfRange { at: usize, index: usize, len: usize },
    #[error("path ends on a {found}, not on a gap or an input")]
    Incomplete { found: &'static str },
    #[error("only index paths can be resolved to a slot")]
    NotAPath,
}

/// Resolves an index path against the current tree.
pub fn resolve(tree: &Tree, location: &Location) -> Result<Slot, LocationError> {
    let Location::Path {
        workspace,
        script,
        steps,
    } = location
    else {
        return Err(LocationError::NotAPath);
    };
    if !tree.contains(*workspace) || tree.workspace(*workspace).is_none() {
        return Err(LocationError::NoWorkspace {
            workspace: *workspace,
        });
    }
    let mut cur = tree
        .script_at(*workspace, *script)
        .ok_or(LocationError::NoScript {
            workspace: *workspace,
            index: *script,
        })?;

    for (at, step) in steps.iter().enumerate() {
        let last = at + 1 == steps.len();
        let children = tree.children(cur);
        let found = tree.tag(cur).name();
        let bad_step = || LocationError::Step {
            at,
            step: step.clone(),
            found,
        };
        cur = match (tree.tag(cur), step) {
            (KindTag::Stack, PathStep::Index(index)) if last => {
                if *index > children.len() {
                    return Err(LocationError::OutOfRange {
                        at,
                        index: *index,
                        len: children.len(),
                    });
                }
                return Ok(Slot::Gap {
                    stack: cur,
                    index: *index,
                });
            }
            (KindTag::Stack, PathStep::Index(index)) => {
                *children.get(*index).ok_or(LocationError::OutOfRange {
                    at,
                    index: *index,
                    len: children.len(),
                })?
            }
            (KindTag::Block, PathStep::Param(pid)) => tree.param(cur, pid).ok_or_else(bad_step)?,
            (KindTag::Block, PathStep::Index(index)) => {
                let child = *children.get(*index).ok_or(LocationError::OutOfRange {
                    at,
                    index: *index,
                    len: children.len(),
                })?;
                if !matches!(tree.tag(child), KindTag::Input | KindTag::Stack) {
                    return Err(bad_step());
                }
                child
            }
            (KindTag::Input, PathStep::Index(0)) => tree
                .input(cur)
                .and_then(|i| i.block())
                .ok_or_else(bad_step)?,
            _ => return Err(bad_step()),
        };
    }

    match tree.tag(cur) {
        KindTag::Input => Ok(Slot::Input { input: cur }),
        other => Err(LocationError::Incomplete { found: other.name() }),
    }
}

/// Resolves a path or treats the failure as a broken addressing contract.
#[track_caller]
pub fn resolve_or_panic(tree: &Tree, location: &Location) -> Slot {
    match resolve(tree, location) {
        Ok(slot) => slot,
        Err(err) => invariant(format!("location {location:?} does not resolve: {err}")),
    }
}

/// Workspace, script index and steps leading from the script to `node`.
fn path_to(tree: &Tree, node: NodeId) -> Option<(NodeId, usize, Vec<PathStep>)> {
    let mut steps = Vec::new();
    let mut cur = node;
    loop {
        let parent = tree.parent(cur)?;
        match tree.tag(parent) {
            KindTag::Workspace => {
                let index = tree.script_index(parent, cur)?;
                steps.reverse();
                return Some((parent, index, steps));
            }
            KindTag::Stack => steps.push(PathStep::Index(tree.index_in_parent(cur)?)),
            KindTag::Block => {
                let pid = tree
                    .block(parent)?
                    .params()
                    .iter()
                    .find(|(_, n)| **n == cur)
                    .map(|(pid, _)| pid.clone())?;
                steps.push(PathStep::Param(pid));
            }
            KindTag::Input => steps.push(PathStep::Index(0)),
            KindTag::Text => return None,
        }
        cur = parent;
    }
}

/// Address of a slot, or `None` when it is not inside a placed script.
pub fn location_of_slot(tree: &Tree, slot: Slot) -> Option<Location> {
    match slot {
        Slot::Gap { stack, index } => {
            let (workspace, script, mut steps) = path_to(tree, stack)?;
            steps.push(PathStep::Index(index));
            Some(Location::path(workspace, script, steps))
        }
        Slot::Input { input } => {
            let (workspace, script, steps) = path_to(tree, input)?;
            Some(Location::path(workspace, script, steps))
        }
    }
}

/// Slot currently holding `block`.
pub fn slot_of_block(tree: &Tree, block: NodeId) -> Option<Slot> {
    let parent = tree.parent(block)?;
    match tree.tag(parent) {
        KindTag::Stack => Some(Slot::Gap {
            stack: parent,
            index: tree.index_in_parent(block)?,
        }),
        KindTag::Input => Some(Slot::Input { input: parent }),
        _ => None,
    }
}

/// Address from which grabbing takes `block` (and, in a stack, whatever
/// follows it).
pub fn location_of_block(tree: &Tree, block: NodeId) -> Option<Location> {
    location_of_slot(tree, slot_of_block(tree, block)?)
}
