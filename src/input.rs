//! Parameter sockets holding either a literal or one reporter block.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::Path;
use crate::registry::BlockType;
use crate::tree::{NodeId, NodeKind, Tree, invariant};

/// Primitive literal stored in an input or a descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn display(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    String,
    Number,
    Angle,
    Boolean,
}

impl InputKind {
    /// Literal a socket of this kind holds when nothing was typed into it.
    pub fn empty_value(self) -> Value {
        match self {
            InputKind::String => Value::Text(String::new()),
            InputKind::Number | InputKind::Angle => Value::Number(0.0),
            InputKind::Boolean => Value::Bool(false),
        }
    }

    /// Converts any literal into one this kind can hold.
    pub fn coerce(self, value: &Value) -> Value {
        match (self, value) {
            (InputKind::String, Value::Text(s)) => Value::Text(s.clone()),
            (InputKind::String, other) => Value::Text(other.display()),
            (InputKind::Number | InputKind::Angle, Value::Number(n)) => {
                Value::Number(if n.is_finite() { *n } else { 0.0 })
            }
            (InputKind::Number | InputKind::Angle, Value::Text(s)) => Value::Number(parse_number(s)),
            (InputKind::Number | InputKind::Angle, Value::Bool(b)) => {
                Value::Number(if *b { 1.0 } else { 0.0 })
            }
            (InputKind::Boolean, Value::Bool(b)) => Value::Bool(*b),
            (InputKind::Boolean, Value::Number(n)) => Value::Bool(*n != 0.0),
            (InputKind::Boolean, Value::Text(s)) => Value::Bool(s.trim().eq_ignore_ascii_case("true")),
        }
    }

    pub fn accepts(self, block_type: BlockType) -> bool {
        match self {
            InputKind::Boolean => block_type == BlockType::Boolean,
            _ => matches!(block_type, BlockType::Reporter | BlockType::Boolean),
        }
    }

    pub fn editable(self) -> bool {
        !matches!(self, InputKind::Boolean)
    }
}

/// Reads user text as a number. Either `.` or `,` works as the decimal
/// separator; anything unreadable becomes `0`.
pub fn parse_number(text: &str) -> f64 {
    let normalized = text.trim().replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[derive(Clone, Debug)]
pub struct InputNode {
    pub(crate) kind: InputKind,
    pub(crate) value: Value,
    pub(crate) block: Option<NodeId>,
    /// Label child showing the literal; hidden while a block is present.
    pub(crate) text: NodeId,
    pub(crate) outline: Path,
}

impl InputNode {
    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn block(&self) -> Option<NodeId> {
        self.block
    }

    pub fn text_node(&self) -> NodeId {
        self.text
    }

    pub fn outline(&self) -> &Path {
        &self.outline
    }
}

impl Tree {
    pub fn input(&self, id: NodeId) -> Option<&InputNode> {
        match &self.node(id).kind {
            NodeKind::Input(input) => Some(input),
            _ => None,
        }
    }

    pub(crate) fn input_mut(&mut self, id: NodeId) -> Option<&mut InputNode> {
        match &mut self.node_mut(id).kind {
            NodeKind::Input(input) => Some(input),
            _ => None,
        }
    }

    #[track_caller]
    fn expect_input(&self, id: NodeId) -> &InputNode {
        match self.input(id) {
            Some(input) => input,
            None => invariant(format!("{id} is a {}, not an input", self.tag(id).name())),
        }
    }

    pub fn create_input(&mut self, kind: InputKind, value: Value) -> NodeId {
        let value = kind.coerce(&value);
        let label = self.insert_text(display_text(kind, &value));
        let id = self.insert(NodeKind::Input(InputNode {
            kind,
            value,
            block: None,
            text: label,
            outline: Path::new(self.direction()),
        }));
        self.add(id, label, None);
        id
    }

    /// Stores a literal, coerced to the socket's kind. A block sitting in
    /// the socket is detached and destroyed.
    pub fn set_input_value(&mut self, id: NodeId, value: &Value) {
        if let Some(block) = self.expect_input(id).block {
            debug!(input = %id, block = %block, "literal replaces block in input");
            self.take_block(id);
            self.destroy(block);
        }
        let kind = self.expect_input(id).kind;
        let value = kind.coerce(value);
        let shown = display_text(kind, &value);
        let text = self.expect_input(id).text;
        if let Some(input) = self.input_mut(id) {
            input.value = value;
        }
        self.set_text(text, &shown);
        self.invalidate(id);
    }

    /// Applies text typed by the user.
    pub fn set_input_text(&mut self, id: NodeId, text: &str) {
        self.set_input_value(id, &Value::Text(text.to_string()));
    }

    pub fn set_input_kind(&mut self, id: NodeId, kind: InputKind) {
        let current = self.expect_input(id);
        if current.kind == kind {
            return;
        }
        let value = current.value.clone();
        if let Some(input) = self.input_mut(id) {
            input.kind = kind;
        }
        if self.expect_input(id).block.is_none() {
            self.set_input_value(id, &value);
        } else if let Some(input) = self.input_mut(id) {
            input.value = kind.coerce(&value);
            self.invalidate(id);
        }
    }

    pub fn can_accept_block(&self, input: NodeId, block: NodeId) -> bool {
        match (self.input(input), self.block(block)) {
            (Some(i), Some(b)) => i.kind.accepts(b.block_type),
            _ => false,
        }
    }

    /// Puts `block` into an empty socket. The literal stays stored but is
    /// not shown while the block sits there.
    pub fn insert_block(&mut self, input: NodeId, block: NodeId) {
        if let Some(existing) = self.expect_input(input).block {
            invariant(format!("input {input} already holds {existing}"));
        }
        let text = self.expect_input(input).text;
        self.add(input, block, None);
        if let Some(i) = self.input_mut(input) {
            i.block = Some(block);
        }
        self.set_text(text, "");
    }

    /// Detaches the occupying block and shows the literal again.
    pub fn take_block(&mut self, input: NodeId) -> Option<NodeId> {
        let current = self.expect_input(input);
        let block = current.block?;
        let shown = display_text(current.kind, &current.value);
        let text = current.text;
        if let Some(i) = self.input_mut(input) {
            i.block = None;
        }
        self.remove(input, block);
        self.set_text(text, &shown);
        Some(block)
    }
}

fn display_text(kind: InputKind, value: &Value) -> String {
    match kind {
        InputKind::Boolean => String::new(),
        _ => value.display(),
    }
}
