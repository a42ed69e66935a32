use crate::dap::Variable;
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};

pub type NodeId = usize;

/// How deep the session expands variables on its own after a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandDepth {
    /// Expand nodes whose depth is below the limit. `Depth(0)` fetches scope variables only.
    Depth(usize),
    /// Walk everything reachable. Still refuses references already requested in this pass.
    Unbounded,
}

impl ExpandDepth {
    pub fn allows(&self, depth: usize) -> bool {
        match self {
            ExpandDepth::Depth(limit) => depth < *limit,
            ExpandDepth::Unbounded => true,
        }
    }
}

impl Default for ExpandDepth {
    fn default() -> Self {
        ExpandDepth::Depth(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub name: String,
    pub value: String,
    /// Non-zero when the value has children.
    pub reference: i64,
    /// Sequence number of the request whose response produced this node.
    pub response_to: u64,
    /// Sequence number of this node's own `variables` request, once sent.
    pub expansion_seq: Option<u64>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
}

impl VariableNode {
    pub fn is_expandable(&self) -> bool {
        self.reference != 0
    }
}

/// Forest of inspected variables for the current stop.
///
/// Parents are discovered when a batch arrives: the batch's `request_seq` is looked up
/// among the expansion requests issued by existing nodes. Unknown sequence numbers make
/// the batch top level.
#[derive(Debug, Default)]
pub struct VariableTree {
    nodes: Vec<VariableNode>,
    roots: Vec<NodeId>,
    expansions: HashMap<u64, NodeId>,
    requested: HashSet<i64>,
}

impl VariableTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.expansions.clear();
        self.requested.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&VariableNode> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Attach a batch of variables answering request `request_seq`. Returns the new ids.
    pub fn insert(&mut self, request_seq: u64, variables: Vec<Variable>) -> Vec<NodeId> {
        let parent = self.expansions.get(&request_seq).copied();
        let depth = parent.map(|p| self.nodes[p].depth + 1).unwrap_or(0);

        let mut added = Vec::with_capacity(variables.len());
        for var in variables {
            let id = self.nodes.len();
            self.nodes.push(VariableNode {
                name: var.name,
                value: var.value,
                reference: var.variables_reference,
                response_to: request_seq,
                expansion_seq: None,
                parent,
                children: Vec::new(),
                depth,
            });
            match parent {
                Some(p) => self.nodes[p].children.push(id),
                None => self.roots.push(id),
            }
            added.push(id);
        }
        added
    }

    /// Marks `reference` as requested during this pass. False if it already was.
    pub fn claim_reference(&mut self, reference: i64) -> bool {
        self.requested.insert(reference)
    }

    /// Reference to request for expanding `id`, or `None` if that reference was already
    /// requested during this pass (by this node or any other).
    pub fn expansion_target(&mut self, id: NodeId) -> Result<Option<i64>> {
        let node = self.nodes.get(id).ok_or(Error::UnknownVariable(id))?;
        if !node.is_expandable() {
            return Err(Error::NotExpandable(id));
        }
        if node.expansion_seq.is_some() {
            return Ok(None);
        }
        let reference = node.reference;
        Ok(self.claim_reference(reference).then_some(reference))
    }

    pub fn record_expansion(&mut self, id: NodeId, seq: u64) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.expansion_seq = Some(seq);
            self.expansions.insert(seq, id);
        }
    }

    /// Depth-first pre-order listing as `(depth, id)`.
    pub fn walk(&self) -> Vec<(usize, NodeId)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            out.push((node.depth, id));
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Find a node by its dotted name path from the roots, e.g. `["arr", "[0]"]`.
    pub fn find_path(&self, path: &[&str]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut current = *self
            .roots
            .iter()
            .find(|&&id| self.nodes[id].name == *first)?;
        for name in rest {
            current = *self
                .children(current)
                .iter()
                .find(|&&id| self.nodes[id].name == *name)?;
        }
        Some(current)
    }
}
