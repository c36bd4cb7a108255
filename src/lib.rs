//! Editing core for notch-connected block programs: a composition tree with
//! two-phase layout, drag-and-drop transfers between stacks and inputs, and
//! an undo log of location-addressed moves.

pub mod block;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod interaction;
pub mod layout;
pub mod location;
pub mod registry;
pub mod stack;
pub mod svg;
pub mod transfer;
pub mod tree;
pub mod workspace;

pub use config::EditorConfig;
pub use descriptor::{BlockDescriptor, ParamValue, ScriptDescriptor, WorkspaceDescriptor};
pub use editor::{DropOutcome, Editor};
pub use error::{Error, Result};
pub use geometry::Direction;
pub use history::{History, HistoryEntry, Transfer};
pub use input::{InputKind, Value};
pub use layout::Metrics;
pub use location::{Location, PathStep, Slot};
pub use registry::{BlockType, Catalog, Registry, Translations};
pub use tree::{FixedAdvance, KindTag, NodeId, TextMeasure, Tree};
pub use workspace::WorkspaceRole;
