use crate::{Node, NodeId, NodeMapError};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// A bijection between [Node]s and positive [NodeId]s.
///
/// Identifiers are handed out sequentially starting at 1 and are never reused.
#[derive(Debug, Clone)]
pub struct NodeMap {
    ids: FxHashMap<Node, NodeId>,
    nodes: BTreeMap<NodeId, Node>,
    next_id: i64,
}

impl NodeMap {
    /// Creates an empty [NodeMap].
    pub fn new() -> Self {
        Self {
            ids: FxHashMap::default(),
            nodes: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Restores a map from persisted entries.
    ///
    /// Every id must be positive, smaller than `next_id`, and unique, and every node must be
    /// unique.
    pub fn from_entries(
        next_id: i64,
        entries: impl IntoIterator<Item = (NodeId, Node)>,
    ) -> Result<Self, NodeMapError> {
        if next_id < 1 {
            return Err(NodeMapError::InvalidNextId(next_id));
        }

        let mut result = Self {
            next_id,
            ..Self::new()
        };
        for (id, node) in entries {
            if !id.is_term() || id.as_i64() >= next_id {
                return Err(NodeMapError::IdOutOfRange(id.as_i64(), next_id));
            }
            if result.nodes.contains_key(&id) {
                return Err(NodeMapError::DuplicateId(id.as_i64()));
            }
            if result.ids.contains_key(&node) {
                return Err(NodeMapError::DuplicateNode(node.to_string()));
            }
            result.ids.insert(node.clone(), id);
            result.nodes.insert(id, node);
        }
        Ok(result)
    }

    /// Returns the id of `node`, assigning a fresh one if the node is not yet known.
    pub fn intern(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.ids.get(&node) {
            return *id;
        }

        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.ids.insert(node.clone(), id);
        self.nodes.insert(id, node);
        id
    }

    /// Forgets the node with the given `id`. The id is not handed out again.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.ids.remove(&node);
        Some(node)
    }

    /// Returns the id of `node` without interning it.
    pub fn get_id(&self, node: &Node) -> Option<NodeId> {
        self.ids.get(node).copied()
    }

    /// Returns the node with the given `id`.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// The id that will be assigned to the next new node.
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    /// The number of interned nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node has been interned.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }
}

impl Default for NodeMap {
    fn default() -> Self {
        Self::new()
    }
}
