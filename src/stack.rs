use crate::tree::{KindTag, NodeId, NodeKind, Tree};

/// Ordered run of blocks. `script` marks a top-level fragment (or a drag
/// carrier) as opposed to a branch inside a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackNode {
    pub(crate) script: bool,
}

impl StackNode {
    pub fn is_script(&self) -> bool {
        self.script
    }
}

impl Tree {
    pub fn stack(&self, id: NodeId) -> Option<&StackNode> {
        match &self.node(id).kind {
            NodeKind::Stack(stack) => Some(stack),
            _ => None,
        }
    }

    pub fn create_stack(&mut self) -> NodeId {
        self.insert(NodeKind::Stack(StackNode { script: false }))
    }

    /// New unparented script holding `blocks` in order.
    pub fn create_script(&mut self, blocks: &[NodeId]) -> NodeId {
        let id = self.insert(NodeKind::Stack(StackNode { script: true }));
        for block in blocks {
            self.add(id, *block, None);
        }
        id
    }

    pub fn is_script(&self, id: NodeId) -> bool {
        self.stack(id).is_some_and(|s| s.script)
    }

    /// A script placed directly in a workspace.
    pub fn is_top_level(&self, id: NodeId) -> bool {
        self.is_script(id)
            && self
                .parent(id)
                .is_some_and(|p| self.tag(p) == KindTag::Workspace)
    }
}
