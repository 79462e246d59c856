use crate::storage::types::{NodeId, hash64};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Consistent-hash ring mapping 64-bit positions to nodes.
///
/// Both nodes and filenames hash onto the same position space. A file is
/// stored on the N distinct successors of its position; the first successor
/// is the write coordinator. Successor traversal wraps from the maximum
/// position back to the minimum.
///
/// Reads are concurrent, mutations exclusive. When two nodes hash to the
/// same position the later insertion wins, which is acceptable because a
/// true rejoin carries a fresh epoch and therefore a fresh position.
pub struct HashRing {
    inner: RwLock<BTreeMap<u64, NodeId>>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

impl HashRing {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Ring position of a node, derived from `host:port:epoch`.
    pub fn position_of(node: &NodeId) -> u64 {
        hash64(node.to_string().as_bytes())
    }

    /// Ring position of a file, derived from the exact name bytes.
    pub fn file_position(name: &str) -> u64 {
        hash64(name.as_bytes())
    }

    pub fn add(&self, node: NodeId) {
        let position = Self::position_of(&node);
        let mut ring = self.inner.write().expect("ring lock poisoned");
        ring.insert(position, node);
    }

    /// Removes the node's slot, unless another node has since claimed it.
    pub fn remove(&self, node: &NodeId) {
        let position = Self::position_of(node);
        let mut ring = self.inner.write().expect("ring lock poisoned");
        if ring.get(&position) == Some(node) {
            ring.remove(&position);
        }
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        let position = Self::position_of(node);
        let ring = self.inner.read().expect("ring lock poisoned");
        ring.get(&position) == Some(node)
    }

    /// The first `n` distinct nodes at or after `position`, wrapping at the
    /// end of the ring. Never returns more nodes than the ring holds.
    pub fn successors(&self, position: u64, n: usize) -> Vec<NodeId> {
        let ring = self.inner.read().expect("ring lock poisoned");
        let mut out = Vec::with_capacity(n.min(ring.len()));
        for (_, node) in ring.range(position..).chain(ring.range(..position)) {
            if out.len() == n {
                break;
            }
            out.push(node.clone());
        }
        out
    }

    /// The replica set for a file: its `n` ring successors. Index 0 is the
    /// write coordinator.
    pub fn replicas(&self, name: &str, n: usize) -> Vec<NodeId> {
        self.successors(Self::file_position(name), n)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("ring lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries sorted by position, for diagnostics.
    pub fn entries(&self) -> Vec<(u64, NodeId)> {
        let ring = self.inner.read().expect("ring lock poisoned");
        ring.iter().map(|(p, n)| (*p, n.clone())).collect()
    }
}
