//! Plain serialized form of blocks, scripts and workspaces.

use eframe::egui;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::input::{InputKind, Value};
use crate::registry::{BlockType, Catalog};
use crate::tree::{KindTag, NodeId, Tree};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Value(Value),
    Block(Box<BlockDescriptor>),
    Branch(Vec<BlockDescriptor>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub opcode: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl BlockDescriptor {
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, param: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(param.into(), value);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptDescriptor {
    pub x: f32,
    pub y: f32,
    pub blocks: Vec<BlockDescriptor>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDescriptor {
    #[serde(default)]
    pub scripts: Vec<ScriptDescriptor>,
}

impl Tree {
    pub fn serialize_block(&self, block: NodeId) -> BlockDescriptor {
        let b = self.expect_block(block);
        let mut params = BTreeMap::new();
        for (pid, node) in &b.params {
            let value = match self.tag(*node) {
                KindTag::Stack => ParamValue::Branch(self.serialize_blocks(*node)),
                KindTag::Input => match self.input(*node) {
                    Some(input) => match input.block() {
                        Some(inner) => ParamValue::Block(Box::new(self.serialize_block(inner))),
                        None => ParamValue::Value(input.value().clone()),
                    },
                    None => continue,
                },
                _ => continue,
            };
            params.insert(pid.clone(), value);
        }
        BlockDescriptor {
            opcode: b.opcode.clone(),
            params,
        }
    }

    pub fn serialize_blocks(&self, stack: NodeId) -> Vec<BlockDescriptor> {
        self.children(stack)
            .iter()
            .map(|b| self.serialize_block(*b))
            .collect()
    }

    pub fn serialize_script(&self, script: NodeId) -> ScriptDescriptor {
        let pos = self.position(script);
        ScriptDescriptor {
            x: pos.x,
            y: pos.y,
            blocks: self.serialize_blocks(script),
        }
    }

    pub fn serialize_workspace(&self, ws: NodeId) -> WorkspaceDescriptor {
        WorkspaceDescriptor {
            scripts: self
                .scripts(ws)
                .into_iter()
                .map(|s| self.serialize_script(s))
                .collect(),
        }
    }

    /// Builds an unattached block from a descriptor. Parameters the block
    /// does not declare are dropped, except on placeholder blocks, which
    /// keep them so nothing is lost before the opcode becomes known.
    pub fn build_block(&mut self, desc: &BlockDescriptor, catalog: &Catalog) -> NodeId {
        let id = self.create_block(&desc.opcode, catalog);
        let placeholder = self.expect_block(id).block_type == BlockType::Undefined;
        for (pid, value) in &desc.params {
            match self.param(id, pid) {
                Some(node) => self.fill_param(node, value, catalog),
                None if placeholder => {
                    let node = self.build_param(value, catalog);
                    self.attach_param(id, pid, node);
                }
                None => {
                    warn!(opcode = %desc.opcode, param = %pid, "descriptor names an undeclared parameter");
                }
            }
        }
        id
    }

    fn fill_param(&mut self, node: NodeId, value: &ParamValue, catalog: &Catalog) {
        match (self.tag(node), value) {
            (KindTag::Input, ParamValue::Value(v)) => self.set_input_value(node, v),
            (KindTag::Input, ParamValue::Block(desc)) => {
                let block = self.build_block(desc, catalog);
                self.insert_block(node, block);
            }
            (KindTag::Stack, ParamValue::Branch(descs)) => {
                for desc in descs {
                    let block = self.build_block(desc, catalog);
                    self.add(node, block, None);
                }
            }
            (tag, _) => warn!(node = %node, kind = tag.name(), "parameter value does not fit its slot"),
        }
    }

    fn build_param(&mut self, value: &ParamValue, catalog: &Catalog) -> NodeId {
        match value {
            ParamValue::Value(v) => {
                let kind = match v {
                    Value::Bool(_) => InputKind::Boolean,
                    Value::Number(_) => InputKind::Number,
                    Value::Text(_) => InputKind::String,
                };
                self.create_input(kind, v.clone())
            }
            ParamValue::Block(desc) => {
                let input = self.create_input(InputKind::String, Value::Text(String::new()));
                let block = self.build_block(desc, catalog);
                self.insert_block(input, block);
                input
            }
            ParamValue::Branch(descs) => {
                let stack = self.create_stack();
                for desc in descs {
                    let block = self.build_block(desc, catalog);
                    self.add(stack, block, None);
                }
                stack
            }
        }
    }

    /// Builds an unattached script positioned at the descriptor's `x, y`.
    pub fn build_script(&mut self, desc: &ScriptDescriptor, catalog: &Catalog) -> NodeId {
        let blocks: Vec<NodeId> = desc
            .blocks
            .iter()
            .map(|d| self.build_block(d, catalog))
            .collect();
        let script = self.create_script(&blocks);
        self.set_position(script, egui::pos2(desc.x, desc.y));
        script
    }

    /// Replaces the contents of a scripts workspace.
    pub fn load_workspace(&mut self, ws: NodeId, desc: &WorkspaceDescriptor, catalog: &Catalog) {
        self.clear_workspace(ws);
        for script in &desc.scripts {
            if script.blocks.is_empty() {
                continue;
            }
            let id = self.build_script(script, catalog);
            self.add_script(ws, id, None, egui::pos2(script.x, script.y));
        }
    }
}
