//! Scene graph: an arena of operator instances forming a rooted tree.
//!
//! Children are owned through their parent's input slots; the parent link is
//! a plain arena id. Ids are handed out monotonically and never reused, so a
//! destroyed node's id keeps failing lookups with [`GraphError::NotFound`].
//! Every graph carries a process-unique tag baked into its ids, so an id from
//! one graph never resolves in another.
//!
//! Every mutation validates first and only then touches the arena, so a
//! failing call leaves the graph exactly as it was.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use thiserror::Error;
use tracing::debug;

use crate::registry::OperatorType;
use crate::types::{IoType, Literal};

static NEXT_GRAPH_TAG: AtomicU32 = AtomicU32::new(0);

/// Handle to a node: the owning graph's tag plus the arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    graph: u32,
    index: usize,
}

impl NodeId {
    /// Arena slot within the owning graph.
    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Operator,
}

/// Content of one input slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SlotValue {
    Empty,
    Literal(Literal),
    Node(NodeId),
}

impl SlotValue {
    pub fn child(&self) -> Option<NodeId> {
        match self {
            SlotValue::Node(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("slot {slot} is out of range for an operator with {arity} input(s)")]
    SlotOutOfRange { slot: usize, arity: usize },
    #[error("slot expects `{expected}`, got `{found}`")]
    TypeMismatch { expected: IoType, found: IoType },
    #[error("moving node {node} under {target} would create a cycle")]
    CycleDetected { node: NodeId, target: NodeId },
    #[error("the scene root cannot be deleted")]
    RootDeletionForbidden,
    #[error("the scene root cannot be moved")]
    RootIsImmovable,
    #[error("node {0} not found")]
    NotFound(NodeId),
    #[error("invalid node name `{0}` (expected non-empty ASCII alphanumerics)")]
    InvalidName(String),
    #[error("a sibling named `{0}` already exists")]
    DuplicateName(String),
    #[error("literal has a non-finite component")]
    NonFiniteLiteral,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeInstance {
    id: NodeId,
    name: String,
    kind: NodeKind,
    operator: Arc<OperatorType>,
    parent: Option<NodeId>,
    sibling_slot: usize,
    inputs: Vec<SlotValue>,
}

impl NodeInstance {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    pub fn operator(&self) -> &Arc<OperatorType> {
        &self.operator
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Index of the parent slot holding this node. Always 0 for the root.
    pub fn sibling_slot(&self) -> usize {
        self.sibling_slot
    }

    pub fn inputs(&self) -> &[SlotValue] {
        &self.inputs
    }

    pub fn input(&self, slot: usize) -> Option<&SlotValue> {
        self.inputs.get(slot)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneGraph {
    tag: u32,
    nodes: Vec<Option<NodeInstance>>,
    root: NodeId,
    live: usize,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let tag = NEXT_GRAPH_TAG.fetch_add(1, Ordering::Relaxed);
        let root = NodeId {
            graph: tag,
            index: 0,
        };
        Self {
            tag,
            nodes: vec![Some(NodeInstance {
                id: root,
                name: "root".to_string(),
                kind: NodeKind::Root,
                operator: Arc::new(OperatorType::root()),
                parent: None,
                sibling_slot: 0,
                inputs: vec![SlotValue::Empty],
            })],
            root,
            live: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Only the root is left.
    pub fn is_empty(&self) -> bool {
        self.live == 1
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeInstance, GraphError> {
        if id.graph != self.tag {
            return Err(GraphError::NotFound(id));
        }
        self.nodes
            .get(id.index)
            .and_then(Option::as_ref)
            .ok_or(GraphError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeInstance, GraphError> {
        if id.graph != self.tag {
            return Err(GraphError::NotFound(id));
        }
        self.nodes
            .get_mut(id.index)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NotFound(id))
    }

    /// Create a node of `operator` in `parent`'s input `slot`.
    ///
    /// Whatever the slot held before is discarded; a previous child subtree is
    /// destroyed. The new node's slots start from the operator's defaults.
    pub fn attach(
        &mut self,
        name: &str,
        operator: &Arc<OperatorType>,
        parent: NodeId,
        slot: usize,
    ) -> Result<NodeId, GraphError> {
        validate_name(name)?;
        self.check_slot(parent, slot, operator.output())?;
        self.check_sibling_name(parent, slot, name, None)?;

        self.discard_slot(parent, slot)?;

        let id = NodeId {
            graph: self.tag,
            index: self.nodes.len(),
        };
        let inputs = operator
            .defaults()
            .iter()
            .map(|d| d.map_or(SlotValue::Empty, SlotValue::Literal))
            .collect();
        self.nodes.push(Some(NodeInstance {
            id,
            name: name.to_string(),
            kind: NodeKind::Operator,
            operator: operator.clone(),
            parent: Some(parent),
            sibling_slot: slot,
            inputs,
        }));
        self.live += 1;
        self.node_mut(parent)?.inputs[slot] = SlotValue::Node(id);

        Ok(id)
    }

    /// Re-parent `node` into `new_parent`'s input `slot`.
    ///
    /// Moving a node into the slot it already occupies is a no-op. Any subtree
    /// already in the destination slot is destroyed.
    pub fn move_node(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        slot: usize,
    ) -> Result<(), GraphError> {
        let current = self.node(node)?;
        if current.is_root() {
            return Err(GraphError::RootIsImmovable);
        }
        let (old_parent, old_slot) = (current.parent, current.sibling_slot);
        let name = current.name.clone();
        let output = current.operator.output();

        self.check_slot(new_parent, slot, output)?;
        if old_parent == Some(new_parent) && old_slot == slot {
            return Ok(());
        }
        if self.subtree_contains(node, new_parent) {
            return Err(GraphError::CycleDetected {
                node,
                target: new_parent,
            });
        }
        self.check_sibling_name(new_parent, slot, &name, Some(node))?;

        // Detach first: the destination slot may hold an ancestor of `node`.
        if let Some(old_parent) = old_parent {
            self.node_mut(old_parent)?.inputs[old_slot] = SlotValue::Empty;
        }
        self.discard_slot(new_parent, slot)?;

        self.node_mut(new_parent)?.inputs[slot] = SlotValue::Node(node);
        let moved = self.node_mut(node)?;
        moved.parent = Some(new_parent);
        moved.sibling_slot = slot;
        Ok(())
    }

    /// Destroy `node` and its whole subtree, leaving the parent slot empty.
    pub fn delete(&mut self, node: NodeId) -> Result<(), GraphError> {
        let current = self.node(node)?;
        if current.is_root() {
            return Err(GraphError::RootDeletionForbidden);
        }
        if let Some(parent) = current.parent {
            let slot = current.sibling_slot;
            self.node_mut(parent)?.inputs[slot] = SlotValue::Empty;
        }
        let destroyed = self.destroy_subtree(node);
        debug!(%node, destroyed, "deleted subtree");
        Ok(())
    }

    /// Depth-first search for `id` starting at `from`.
    pub fn find_by_id(&self, from: NodeId, id: NodeId) -> Result<&NodeInstance, GraphError> {
        let mut stack = vec![self.node(from)?];
        while let Some(n) = stack.pop() {
            if n.id == id {
                return Ok(n);
            }
            for child in n.inputs.iter().rev().filter_map(SlotValue::child) {
                stack.push(self.node(child)?);
            }
        }
        Err(GraphError::NotFound(id))
    }

    /// Fill `slot` with a constant. A child in that slot is detached and destroyed.
    pub fn set_literal(
        &mut self,
        node: NodeId,
        slot: usize,
        literal: Literal,
    ) -> Result<(), GraphError> {
        self.check_slot(node, slot, literal.ty)?;
        if !literal.is_finite() {
            return Err(GraphError::NonFiniteLiteral);
        }
        self.discard_slot(node, slot)?;
        self.node_mut(node)?.inputs[slot] = SlotValue::Literal(literal);
        Ok(())
    }

    /// Empty `slot`, destroying any child it holds.
    pub fn clear_slot(&mut self, node: NodeId, slot: usize) -> Result<(), GraphError> {
        let arity = self.node(node)?.inputs.len();
        if slot >= arity {
            return Err(GraphError::SlotOutOfRange { slot, arity });
        }
        self.discard_slot(node, slot)
    }

    pub fn rename(&mut self, node: NodeId, name: &str) -> Result<(), GraphError> {
        validate_name(name)?;
        let current = self.node(node)?;
        if let Some(parent) = current.parent {
            self.check_sibling_name(parent, current.sibling_slot, name, Some(node))?;
        }
        self.node_mut(node)?.name = name.to_string();
        Ok(())
    }

    /// GLSL local name for `node`: `node` followed by the names on the path
    /// below the root, joined by `_`.
    pub fn internal_name(&self, node: NodeId) -> Result<String, GraphError> {
        let mut segments = Vec::new();
        let mut cursor = self.node(node)?;
        while let Some(parent) = cursor.parent {
            segments.push(cursor.name.as_str());
            cursor = self.node(parent)?;
        }
        segments.push("node");
        segments.reverse();
        Ok(segments.join("_"))
    }

    /// Direct children of `node` in slot order.
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(self
            .node(node)?
            .inputs
            .iter()
            .filter_map(SlotValue::child)
            .collect())
    }

    /// All nodes below `node` in depth-first pre-order, `node` excluded.
    pub fn descendants(&self, node: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut out = Vec::new();
        let mut stack = self.children(node)?;
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let mut kids = self.children(id)?;
            kids.reverse();
            stack.extend(kids);
        }
        Ok(out)
    }

    /// Ids of every live node, in allocation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().flatten().map(|n| n.id)
    }

    fn subtree_contains(&self, top: NodeId, needle: NodeId) -> bool {
        self.find_by_id(top, needle).is_ok()
    }

    fn check_slot(&self, parent: NodeId, slot: usize, ty: IoType) -> Result<(), GraphError> {
        let inputs = self.node(parent)?.operator.inputs();
        let expected = *inputs.get(slot).ok_or(GraphError::SlotOutOfRange {
            slot,
            arity: inputs.len(),
        })?;
        if expected != ty {
            return Err(GraphError::TypeMismatch {
                expected,
                found: ty,
            });
        }
        Ok(())
    }

    /// Children in other slots of `parent` must not already use `name`.
    /// The occupant of `slot` is about to be replaced, so it does not count.
    fn check_sibling_name(
        &self,
        parent: NodeId,
        slot: usize,
        name: &str,
        ignore: Option<NodeId>,
    ) -> Result<(), GraphError> {
        let parent = self.node(parent)?;
        for (idx, value) in parent.inputs.iter().enumerate() {
            let Some(child) = value.child() else {
                continue;
            };
            if idx == slot || Some(child) == ignore {
                continue;
            }
            if self.node(child)?.name == name {
                return Err(GraphError::DuplicateName(name.to_string()));
            }
        }
        Ok(())
    }

    fn discard_slot(&mut self, node: NodeId, slot: usize) -> Result<(), GraphError> {
        let target = self.node_mut(node)?;
        let previous = std::mem::replace(&mut target.inputs[slot], SlotValue::Empty);
        if let SlotValue::Node(child) = previous {
            self.destroy_subtree(child);
        }
        Ok(())
    }

    fn destroy_subtree(&mut self, top: NodeId) -> usize {
        let mut destroyed = 0;
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id.index).and_then(Option::take) else {
                continue;
            };
            stack.extend(node.inputs.iter().filter_map(SlotValue::child));
            destroyed += 1;
        }
        self.live -= destroyed;
        destroyed
    }
}

fn validate_name(name: &str) -> Result<(), GraphError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GraphError::InvalidName(name.to_string()));
    }
    Ok(())
}
