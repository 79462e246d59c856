use crate::storage::types::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Instant;

// Membership discriminant bytes. Everything below 100 belongs to the
// membership plane; the file plane owns 100 and above.
pub const KIND_PING: u8 = 1;
pub const KIND_ACK: u8 = 2;
pub const KIND_GOSSIP: u8 = 3;
pub const KIND_JOIN: u8 = 4;
pub const KIND_LEAVE: u8 = 5;
pub const KIND_SWITCH: u8 = 6;

/// Lifecycle state of a node as seen by the local failure detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    /// Healthy and responsive.
    Alive,
    /// Missed the heartbeat window; may refute back to `Alive` or time out
    /// to `Dead`.
    Suspect,
    /// Confirmed failed; removed from placement and eventually cleaned up.
    Dead,
    /// Departed voluntarily via the `leave` command.
    Left,
}

impl NodeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            NodeStatus::Alive => "ALIVE",
            NodeStatus::Suspect => "SUSPECT",
            NodeStatus::Dead => "DEAD",
            NodeStatus::Left => "LEFT",
        }
    }
}

/// Which failure-detection protocol the cluster is running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureDetectionMode {
    PingAck,
    PingAckWithSuspicion,
    Gossip,
    GossipWithSuspicion,
}

impl FailureDetectionMode {
    pub fn suspicion_enabled(&self) -> bool {
        matches!(
            self,
            FailureDetectionMode::PingAckWithSuspicion | FailureDetectionMode::GossipWithSuspicion
        )
    }

    pub fn is_gossip(&self) -> bool {
        matches!(
            self,
            FailureDetectionMode::Gossip | FailureDetectionMode::GossipWithSuspicion
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureDetectionMode::PingAck => "PINGACK",
            FailureDetectionMode::PingAckWithSuspicion => "PINGACK+SUSPICION",
            FailureDetectionMode::Gossip => "GOSSIP",
            FailureDetectionMode::GossipWithSuspicion => "GOSSIP+SUSPICION",
        }
    }
}

/// One member's entry in the local membership table.
///
/// `incarnation` is a logical clock owned by the member itself; a higher
/// number always wins, which is how a falsely suspected node refutes the
/// claim. `heartbeat` orders updates within one incarnation in gossip mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInfo {
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub incarnation: u32,
    pub heartbeat: u32,

    /// When this node last heard from the member. Local-only; never sent.
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl MemberInfo {
    pub fn alive(node_id: NodeId) -> Self {
        Self {
            node_id,
            status: NodeStatus::Alive,
            incarnation: 0,
            heartbeat: 0,
            last_seen: Some(Instant::now()),
        }
    }
}

/// Wire protocol for the membership plane, serialized with bincode behind
/// the per-variant discriminant byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MembershipMessage {
    /// Direct health check carrying the sender's own entry.
    Ping(MemberInfo),
    /// Reply confirming the sender of a `Ping` is alive.
    Ack(MemberInfo),
    /// A batch of membership updates disseminating through the cluster.
    Gossip(Vec<MemberInfo>),
    /// A new node announcing itself to the introducer.
    Join(MemberInfo),
    /// A node departing voluntarily.
    Leave(MemberInfo),
    /// Cluster-wide failure-detection mode change.
    Switch(FailureDetectionMode),
}

impl MembershipMessage {
    pub fn kind(&self) -> u8 {
        match self {
            MembershipMessage::Ping(_) => KIND_PING,
            MembershipMessage::Ack(_) => KIND_ACK,
            MembershipMessage::Gossip(_) => KIND_GOSSIP,
            MembershipMessage::Join(_) => KIND_JOIN,
            MembershipMessage::Leave(_) => KIND_LEAVE,
            MembershipMessage::Switch(_) => KIND_SWITCH,
        }
    }
}
