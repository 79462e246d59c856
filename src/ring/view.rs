use super::ring::HashRing;
use crate::storage::types::NodeId;
use std::sync::Arc;

/// Callback set the membership engine uses to report topology changes.
///
/// The file plane never talks to membership directly; membership pushes node
/// arrivals and departures through this seam and the ring stays authoritative
/// for placement.
pub trait RingView: Send + Sync {
    fn node_joined(&self, node: &NodeId);
    fn node_left(&self, node: &NodeId);
}

/// Standard adapter: membership events become ring mutations.
pub struct RingAdapter {
    ring: Arc<HashRing>,
}

impl RingAdapter {
    pub fn new(ring: Arc<HashRing>) -> Arc<Self> {
        Arc::new(Self { ring })
    }
}

impl RingView for RingAdapter {
    fn node_joined(&self, node: &NodeId) {
        tracing::debug!("ring: adding node {}", node);
        self.ring.add(node.clone());
    }

    fn node_left(&self, node: &NodeId) {
        tracing::debug!("ring: removing node {}", node);
        self.ring.remove(node);
    }
}
