use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::geometry::Path;
use crate::registry::{ArgSpec, BlockType, Catalog, split_opcode};
use crate::tree::{KindTag, NodeId, NodeKind, Tree, invariant};

/// Label shown for a block whose opcode nothing in the registry knows.
pub const PLACEHOLDER_LABEL: &str = "???";

#[derive(Clone, Debug)]
pub struct BlockNode {
    pub(crate) opcode: String,
    pub(crate) category: String,
    pub(crate) block_type: BlockType,
    pub(crate) hat: bool,
    pub(crate) terminal: bool,
    pub(crate) params: BTreeMap<String, NodeId>,
    pub(crate) outline: Path,
}

impl BlockNode {
    fn empty(opcode: &str) -> Self {
        Self {
            opcode: opcode.to_string(),
            category: split_opcode(opcode).0.to_string(),
            block_type: BlockType::Undefined,
            hat: false,
            terminal: false,
            params: BTreeMap::new(),
            outline: Path::default(),
        }
    }

    pub fn opcode(&self) -> &str {
        &self.opcode
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn is_hat(&self) -> bool {
        self.hat
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn params(&self) -> &BTreeMap<String, NodeId> {
        &self.params
    }

    pub fn outline(&self) -> &Path {
        &self.outline
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelPart {
    Text(String),
    Param(String),
}

/// Splits `"move [STEPS] steps"` into text runs and bracketed parameters.
pub fn parse_label(template: &str) -> Vec<LabelPart> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut rest = template;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if close > 0 && !after[..close].contains('[') => {
                text.push_str(&rest[..open]);
                push_text(&mut parts, &mut text);
                parts.push(LabelPart::Param(after[..close].to_string()));
                rest = &after[close + 1..];
            }
            _ => {
                text.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    text.push_str(rest);
    push_text(&mut parts, &mut text);
    parts
}

fn push_text(parts: &mut Vec<LabelPart>, text: &mut String) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        parts.push(LabelPart::Text(trimmed.to_string()));
    }
    text.clear();
}

impl Tree {
    pub fn block(&self, id: NodeId) -> Option<&BlockNode> {
        match &self.node(id).kind {
            NodeKind::Block(block) => Some(block),
            _ => None,
        }
    }

    pub(crate) fn block_mut(&mut self, id: NodeId) -> Option<&mut BlockNode> {
        match &mut self.node_mut(id).kind {
            NodeKind::Block(block) => Some(block),
            _ => None,
        }
    }

    #[track_caller]
    pub(crate) fn expect_block(&self, id: NodeId) -> &BlockNode {
        match self.block(id) {
            Some(block) => block,
            None => invariant(format!("{id} is a {}, not a block", self.tag(id).name())),
        }
    }

    pub fn param(&self, block: NodeId, param: &str) -> Option<NodeId> {
        self.block(block)?.params.get(param).copied()
    }

    /// Branch stacks of a block, in label order.
    pub fn branches(&self, block: NodeId) -> Vec<NodeId> {
        self.children(block)
            .iter()
            .copied()
            .filter(|c| self.tag(*c) == KindTag::Stack)
            .collect()
    }

    pub fn first_branch(&self, block: NodeId) -> Option<NodeId> {
        self.children(block)
            .iter()
            .copied()
            .find(|c| self.tag(*c) == KindTag::Stack)
    }

    pub fn is_stackable(&self, id: NodeId) -> bool {
        self.block(id).is_some_and(|b| b.block_type.is_stackable())
    }

    /// Builds a block for `opcode` with default parameter values.
    pub fn create_block(&mut self, opcode: &str, catalog: &Catalog) -> NodeId {
        let id = self.insert(NodeKind::Block(BlockNode::empty(opcode)));
        self.set_block(id, opcode, catalog);
        id
    }

    /// Points an existing block at a (possibly different) opcode and
    /// rebuilds its label. Parameters whose ids survive keep their node and
    /// value; the rest are destroyed. Returns how many were destroyed.
    pub fn set_block(&mut self, id: NodeId, opcode: &str, catalog: &Catalog) -> usize {
        let mut old_params = match self.block_mut(id) {
            Some(block) => std::mem::take(&mut block.params),
            None => invariant(format!("{id} is not a block")),
        };
        for child in self.children(id).to_vec() {
            self.remove(id, child);
            if !old_params.values().any(|p| *p == child) {
                self.destroy(child);
            }
        }

        let mut params = BTreeMap::new();
        let mut discarded = 0;
        let resolved = catalog
            .registry
            .resolve(opcode)
            .map(|(category, spec)| (category.id.clone(), spec.clone()));

        let (category, block_type, hat, terminal) = match resolved {
            Some((category, spec)) => {
                let template = catalog.template(opcode).unwrap_or_else(|| spec.text.clone());
                for part in parse_label(&template) {
                    match part {
                        LabelPart::Param(pid) if spec.args.contains_key(&pid) && !params.contains_key(&pid) => {
                            let arg = &spec.args[&pid];
                            let (node, dropped) = self.reuse_param(old_params.remove(&pid), arg);
                            discarded += dropped;
                            self.add(id, node, None);
                            params.insert(pid, node);
                        }
                        LabelPart::Param(pid) => {
                            warn!(opcode, param = %pid, "label names an undeclared parameter");
                            let text = self.insert_text(format!("[{pid}]"));
                            self.add(id, text, None);
                        }
                        LabelPart::Text(text) => {
                            let text = self.insert_text(text);
                            self.add(id, text, None);
                        }
                    }
                }
                (category, spec.block_type, spec.hat, spec.terminal)
            }
            None => {
                warn!(opcode, "unknown opcode; using placeholder");
                let text = self.insert_text(PLACEHOLDER_LABEL);
                self.add(id, text, None);
                for (pid, node) in std::mem::take(&mut old_params) {
                    self.add(id, node, None);
                    params.insert(pid, node);
                }
                (
                    split_opcode(opcode).0.to_string(),
                    BlockType::Undefined,
                    false,
                    false,
                )
            }
        };

        for (_, node) in old_params {
            self.destroy(node);
            discarded += 1;
        }
        if let Some(block) = self.block_mut(id) {
            block.opcode = opcode.to_string();
            block.category = category;
            block.block_type = block_type;
            block.hat = hat;
            block.terminal = terminal;
            block.params = params;
        }
        self.invalidate(id);
        if discarded > 0 {
            debug!(block = %id, opcode, discarded, "parameters dropped by block swap");
        }
        discarded
    }

    fn reuse_param(&mut self, old: Option<NodeId>, arg: &ArgSpec) -> (NodeId, usize) {
        let kind = arg.arg_type.input_kind();
        match (kind, old) {
            (Some(kind), Some(node)) if self.tag(node) == KindTag::Input => {
                self.set_input_kind(node, kind);
                (node, 0)
            }
            (None, Some(node)) if self.tag(node) == KindTag::Stack => (node, 0),
            (kind, old) => {
                let dropped = match old {
                    Some(node) => {
                        self.destroy(node);
                        1
                    }
                    None => 0,
                };
                let node = match kind {
                    Some(kind) => {
                        let value = arg.default.clone().unwrap_or_else(|| kind.empty_value());
                        self.create_input(kind, value)
                    }
                    None => self.create_stack(),
                };
                (node, dropped)
            }
        }
    }

    /// Adds a parameter the registry does not declare; used for
    /// placeholder blocks rebuilt from a descriptor.
    pub(crate) fn attach_param(&mut self, block: NodeId, pid: &str, node: NodeId) {
        self.add(block, node, None);
        if let Some(b) = self.block_mut(block) {
            b.params.insert(pid.to_string(), node);
        }
    }

    /// Rebuilds the label of `block` from the current catalog.
    pub fn relabel(&mut self, block: NodeId, catalog: &Catalog) -> usize {
        let opcode = self.expect_block(block).opcode.clone();
        self.set_block(block, &opcode, catalog)
    }

    /// Every block at or below `root`.
    pub fn blocks_below(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.tag(*n) == KindTag::Block)
            .collect()
    }

    /// Re-resolves placeholder blocks whose opcode the registry now knows.
    pub fn upgrade_placeholders(&mut self, root: NodeId, catalog: &Catalog) -> usize {
        let mut upgraded = 0;
        for block in self.blocks_below(root) {
            let pending = self
                .block(block)
                .filter(|b| b.block_type == BlockType::Undefined)
                .map(|b| b.opcode.clone());
            if let Some(opcode) = pending {
                if catalog.registry.resolve(&opcode).is_some() {
                    self.set_block(block, &opcode, catalog);
                    upgraded += 1;
                }
            }
        }
        upgraded
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::input::{InputKind, Value};
    use crate::registry::Category;

    /// Command block with a single text label and no registry behind it.
    pub(crate) fn plain_block(tree: &mut Tree, label: &str) -> NodeId {
        let mut node = BlockNode::empty("test.plain");
        node.block_type = BlockType::Command;
        let id = tree.insert(NodeKind::Block(node));
        let text = tree.insert_text(label);
        tree.add(id, text, None);
        id
    }

    fn catalog() -> Catalog {
        Catalog::builtin("en").unwrap()
    }

    fn labels(tree: &Tree, block: NodeId) -> Vec<String> {
        tree.children(block)
            .iter()
            .filter_map(|c| tree.text(*c).map(str::to_string))
            .collect()
    }

    #[test]
    fn parses_params_and_text_runs() {
        assert_eq!(
            parse_label("go to x: [X] y: [Y]"),
            vec![
                LabelPart::Text("go to x:".into()),
                LabelPart::Param("X".into()),
                LabelPart::Text("y:".into()),
                LabelPart::Param("Y".into()),
            ]
        );
        assert_eq!(
            parse_label("[A] > [B]"),
            vec![
                LabelPart::Param("A".into()),
                LabelPart::Text(">".into()),
                LabelPart::Param("B".into()),
            ]
        );
    }

    #[test]
    fn unbalanced_brackets_stay_literal() {
        assert_eq!(parse_label("a [ b"), vec![LabelPart::Text("a [ b".into())]);
        assert_eq!(parse_label("[] x"), vec![LabelPart::Text("[] x".into())]);
    }

    #[test]
    fn create_block_builds_inputs_with_defaults() {
        let mut tree = Tree::default();
        let block = tree.create_block("motion.move", &catalog());
        let b = tree.block(block).unwrap();
        assert_eq!(b.block_type(), BlockType::Command);
        assert_eq!(b.category(), "motion");
        let steps = tree.param(block, "STEPS").unwrap();
        assert_eq!(tree.input(steps).map(|i| i.value().clone()), Some(Value::Number(10.0)));
        assert_eq!(labels(&tree, block), vec!["move", "steps"]);
    }

    #[test]
    fn branch_params_become_stacks() {
        let mut tree = Tree::default();
        let block = tree.create_block("control.if_else", &catalog());
        assert_eq!(tree.branches(block).len(), 2);
        assert_eq!(tree.first_branch(block), tree.param(block, "SUBSTACK"));
        let condition = tree.param(block, "CONDITION").unwrap();
        assert_eq!(tree.input(condition).map(|i| i.kind()), Some(InputKind::Boolean));
    }

    #[test]
    fn unknown_opcode_becomes_a_placeholder() {
        let mut tree = Tree::default();
        let block = tree.create_block("pen.clear", &catalog());
        assert_eq!(tree.block(block).map(|b| b.block_type()), Some(BlockType::Undefined));
        assert_eq!(labels(&tree, block), vec![PLACEHOLDER_LABEL]);
        assert_eq!(tree.block(block).map(|b| b.category().to_string()), Some("pen".into()));
    }

    #[test]
    fn swapping_keeps_values_of_surviving_params() {
        let mut tree = Tree::default();
        let cat = catalog();
        let block = tree.create_block("motion.turn_right", &cat);
        let degrees = tree.param(block, "DEGREES").unwrap();
        tree.set_input_text(degrees, "90");
        let dropped = tree.set_block(block, "motion.turn_left", &cat);
        assert_eq!(dropped, 0);
        assert_eq!(tree.param(block, "DEGREES"), Some(degrees));
        assert_eq!(tree.input(degrees).map(|i| i.value().clone()), Some(Value::Number(90.0)));
        assert_eq!(labels(&tree, block), vec!["turn left", "degrees"]);
    }

    #[test]
    fn swapping_discards_params_that_disappear() {
        let mut tree = Tree::default();
        let cat = catalog();
        let block = tree.create_block("control.if_else", &cat);
        let second = tree.param(block, "SUBSTACK2").unwrap();
        let dropped = tree.set_block(block, "control.if", &cat);
        assert_eq!(dropped, 1);
        assert!(!tree.contains(second));
        assert_eq!(tree.branches(block).len(), 1);
    }

    #[test]
    fn placeholder_upgrades_when_its_category_arrives() {
        let mut tree = Tree::default();
        let mut cat = catalog();
        let block = tree.create_block("pen.clear", &cat);
        assert_eq!(tree.upgrade_placeholders(block, &cat), 0);

        let pen: Category = toml::from_str(
            r##"
            id = "pen"
            color = "#0fbd8c"
            [[blocks]]
            opcode = "clear"
            text = "erase all"
            "##,
        )
        .unwrap();
        cat.registry.add_category(pen);
        assert_eq!(tree.upgrade_placeholders(block, &cat), 1);
        assert_eq!(tree.block(block).map(|b| b.block_type()), Some(BlockType::Command));
        assert_eq!(labels(&tree, block), vec!["erase all"]);
    }
}
