use super::types::{FailureDetectionMode, MemberInfo, MembershipMessage, NodeStatus};
use crate::net::UdpTransport;
use crate::ring::RingView;
use crate::storage::types::NodeId;
use anyhow::Result;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
const SUSPECT_AFTER: Duration = Duration::from_secs(4);
const DEAD_AFTER: Duration = Duration::from_secs(8);
const CLEANUP_AFTER: Duration = Duration::from_secs(16);
const K_RANDOM: usize = 3;

/// SWIM-style membership and failure detection over the shared UDP socket.
///
/// Maintains the local view of the cluster, disseminates updates through
/// periodic pings or gossip, and pushes every topology change into the hash
/// ring through the `RingView` seam so file placement stays current.
pub struct MembershipService {
    pub local: NodeId,
    members: DashMap<NodeId, MemberInfo>,
    transport: Arc<UdpTransport>,
    ring_view: Arc<dyn RingView>,
    mode: RwLock<FailureDetectionMode>,
    introducer: (String, u16),
    left: AtomicBool,
}

impl MembershipService {
    pub fn new(
        local: NodeId,
        introducer: (String, u16),
        transport: Arc<UdpTransport>,
        ring_view: Arc<dyn RingView>,
    ) -> Arc<Self> {
        let members = DashMap::new();
        members.insert(local.clone(), MemberInfo::alive(local.clone()));
        ring_view.node_joined(&local);
        Arc::new(Self {
            local,
            members,
            transport,
            ring_view,
            mode: RwLock::new(FailureDetectionMode::PingAck),
            introducer,
            left: AtomicBool::new(false),
        })
    }

    pub fn is_introducer(&self) -> bool {
        self.local.host == self.introducer.0 && self.local.port == self.introducer.1
    }

    pub async fn current_mode(&self) -> FailureDetectionMode {
        *self.mode.read().await
    }

    pub fn members_snapshot(&self) -> Vec<MemberInfo> {
        self.members.iter().map(|e| e.value().clone()).collect()
    }

    pub fn alive_members(&self) -> Vec<MemberInfo> {
        self.members
            .iter()
            .filter(|e| e.value().status == NodeStatus::Alive)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn suspects(&self) -> Vec<NodeId> {
        self.members
            .iter()
            .filter(|e| e.value().status == NodeStatus::Suspect)
            .map(|e| e.key().clone())
            .collect()
    }

    fn self_info(&self) -> MemberInfo {
        self.members
            .get(&self.local)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| MemberInfo::alive(self.local.clone()))
    }

    async fn send(&self, msg: &MembershipMessage, dest: SocketAddr) -> Result<()> {
        let body = bincode::serialize(msg)?;
        self.transport.send(msg.kind(), &body, dest).await
    }

    async fn send_to_member(&self, msg: &MembershipMessage, node: &NodeId) {
        let body = match bincode::serialize(msg) {
            Ok(body) => body,
            Err(e) => {
                warn!("failed to serialize membership message: {}", e);
                return;
            }
        };
        if let Err(e) = self.transport.send_to_node(msg.kind(), &body, node).await {
            warn!("failed to send membership message to {}: {}", node, e);
        }
    }

    fn k_random_peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self
            .members
            .iter()
            .filter(|e| e.value().status == NodeStatus::Alive && *e.key() != self.local)
            .map(|e| e.key().clone())
            .collect();
        peers.shuffle(&mut rand::thread_rng());
        peers.truncate(K_RANDOM);
        peers
    }

    async fn gossip(&self, updates: Vec<MemberInfo>) {
        if updates.is_empty() {
            return;
        }
        let msg = MembershipMessage::Gossip(updates);
        for peer in self.k_random_peers() {
            self.send_to_member(&msg, &peer).await;
        }
    }

    /// Announces this node to the introducer. The introducer answers with
    /// the full membership list.
    pub async fn join(&self) -> Result<()> {
        let dest = self
            .transport
            .resolve(&self.introducer.0, self.introducer.1)
            .await?;
        info!(
            "joining cluster via introducer {}:{}",
            self.introducer.0, self.introducer.1
        );
        self.send(&MembershipMessage::Join(self.self_info()), dest)
            .await
    }

    /// Marks this node departed and tells the cluster. The caller shuts the
    /// process down afterwards.
    pub async fn leave(&self) {
        if let Some(mut entry) = self.members.get_mut(&self.local) {
            entry.status = NodeStatus::Left;
            entry.incarnation += 1;
        }
        let info = self.self_info();
        let msg = MembershipMessage::Leave(info);
        for peer in self.k_random_peers() {
            self.send_to_member(&msg, &peer).await;
        }
        self.left.store(true, Ordering::SeqCst);
        info!("left the cluster");
    }

    /// Switches the failure-detection protocol cluster-wide.
    pub async fn switch_mode(&self, mode: FailureDetectionMode) {
        let current = *self.mode.read().await;
        if current == mode {
            return;
        }
        info!("switching from {} to {}", current.label(), mode.label());
        let msg = MembershipMessage::Switch(mode);
        let peers: Vec<NodeId> = self
            .members
            .iter()
            .filter(|e| *e.key() != self.local && e.value().status == NodeStatus::Alive)
            .map(|e| e.key().clone())
            .collect();
        for peer in peers {
            self.send_to_member(&msg, &peer).await;
        }
        *self.mode.write().await = mode;
    }

    /// Inbound entry point from the router.
    pub async fn handle_datagram(&self, kind: u8, body: &[u8], src: SocketAddr) {
        let msg: MembershipMessage = match bincode::deserialize(body) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    "dropping undecodable membership datagram (kind {}) from {}: {}",
                    kind, src, e
                );
                return;
            }
        };
        match msg {
            MembershipMessage::Ping(info) => {
                self.merge_member(info).await;
                if let Err(e) = self
                    .send(&MembershipMessage::Ack(self.self_info()), src)
                    .await
                {
                    warn!("failed to ack ping from {}: {}", src, e);
                }
            }
            MembershipMessage::Ack(info) => {
                self.merge_member(info).await;
            }
            MembershipMessage::Gossip(updates) => {
                let mut refutations = Vec::new();
                for update in updates {
                    if let Some(refutation) = self.merge_member(update).await {
                        refutations.push(refutation);
                    }
                }
                self.gossip(refutations).await;
            }
            MembershipMessage::Join(mut info) => {
                info!("node {} joining the cluster", info.node_id);
                info.last_seen = Some(Instant::now());
                let node_id = info.node_id.clone();
                self.members.insert(node_id.clone(), info.clone());
                self.ring_view.node_joined(&node_id);
                // New node gets the full list; the rest learn via gossip.
                let snapshot = self.members_snapshot();
                if let Err(e) = self.send(&MembershipMessage::Gossip(snapshot), src).await {
                    warn!("failed to send membership list to joiner: {}", e);
                }
                self.gossip(vec![info]).await;
            }
            MembershipMessage::Leave(info) => {
                info!("node {} left the cluster", info.node_id);
                let node_id = info.node_id.clone();
                if let Some(mut entry) = self.members.get_mut(&node_id) {
                    entry.status = NodeStatus::Left;
                    entry.incarnation = entry.incarnation.max(info.incarnation);
                    entry.last_seen = Some(Instant::now());
                }
                self.ring_view.node_left(&node_id);
            }
            MembershipMessage::Switch(mode) => {
                info!("switching failure detection to {} on request", mode.label());
                *self.mode.write().await = mode;
            }
        }
    }

    /// Folds one remote observation into the local table using incarnation
    /// precedence. Returns a refutation entry when the observation wrongly
    /// declares this node suspect or dead.
    async fn merge_member(&self, update: MemberInfo) -> Option<MemberInfo> {
        // A claim about ourselves that is not Alive gets refuted with a
        // higher incarnation.
        if update.node_id == self.local {
            if update.status != NodeStatus::Alive && !self.left.load(Ordering::SeqCst) {
                let refutation = {
                    let mut entry = self.members.get_mut(&self.local)?;
                    if update.incarnation >= entry.incarnation {
                        entry.incarnation = update.incarnation + 1;
                        entry.status = NodeStatus::Alive;
                        info!(
                            "refuting {} claim about self (incarnation {})",
                            update.status.label(),
                            entry.incarnation
                        );
                        Some(entry.value().clone())
                    } else {
                        None
                    }
                };
                return refutation;
            }
            return None;
        }

        match self.members.get_mut(&update.node_id) {
            Some(mut existing) => {
                if update.incarnation > existing.incarnation {
                    let was = existing.status;
                    existing.incarnation = update.incarnation;
                    existing.heartbeat = existing.heartbeat.max(update.heartbeat);
                    existing.status = update.status;
                    existing.last_seen = Some(Instant::now());
                    if was != update.status {
                        debug!(
                            "{}: {} -> {} (incarnation {})",
                            update.node_id,
                            was.label(),
                            update.status.label(),
                            update.incarnation
                        );
                    }
                    if update.status == NodeStatus::Dead || update.status == NodeStatus::Left {
                        self.ring_view.node_left(&update.node_id);
                    } else if was == NodeStatus::Dead || was == NodeStatus::Left {
                        self.ring_view.node_joined(&update.node_id);
                    }
                } else if update.incarnation == existing.incarnation {
                    if update.heartbeat > existing.heartbeat {
                        existing.heartbeat = update.heartbeat;
                    }
                    // Fresh Alive evidence resets the silence timer even when
                    // the heartbeat did not move (ping-ack mode never bumps it).
                    if update.status == NodeStatus::Alive
                        && existing.status == NodeStatus::Alive
                    {
                        existing.last_seen = Some(Instant::now());
                    }
                    // Within one incarnation Suspect overrides Alive, and a
                    // departure overrides anything.
                    let escalates = matches!(
                        (existing.status, update.status),
                        (NodeStatus::Alive, NodeStatus::Suspect)
                            | (NodeStatus::Suspect, NodeStatus::Dead)
                            | (_, NodeStatus::Left)
                    );
                    if escalates {
                        existing.status = update.status;
                        if update.status == NodeStatus::Dead || update.status == NodeStatus::Left {
                            self.ring_view.node_left(&update.node_id);
                        }
                    }
                }
                None
            }
            None => {
                if update.status == NodeStatus::Alive || update.status == NodeStatus::Suspect {
                    info!("discovered member {} via gossip", update.node_id);
                    let mut info = update;
                    info.last_seen = Some(Instant::now());
                    let node_id = info.node_id.clone();
                    self.members.insert(node_id.clone(), info);
                    self.ring_view.node_joined(&node_id);
                }
                None
            }
        }
    }

    /// One round of the outgoing maintenance worker: probe peers, advance
    /// failure-detection timers, and clean up departed members.
    pub async fn tick(&self) {
        if self.left.load(Ordering::SeqCst) {
            return;
        }
        let mode = *self.mode.read().await;
        let now = Instant::now();

        let mut status_updates = Vec::new();
        let mut ring_removals = Vec::new();
        let mut table_removals = Vec::new();

        for mut entry in self.members.iter_mut() {
            let info = entry.value_mut();
            if info.node_id == self.local {
                if mode.is_gossip() {
                    info.heartbeat += 1;
                }
                continue;
            }
            let Some(last_seen) = info.last_seen else {
                info.last_seen = Some(now);
                continue;
            };
            let elapsed = now.duration_since(last_seen);
            match info.status {
                NodeStatus::Alive if elapsed > SUSPECT_AFTER => {
                    if mode.suspicion_enabled() {
                        warn!("suspecting {} (silent for {:?})", info.node_id, elapsed);
                        info.status = NodeStatus::Suspect;
                    } else {
                        warn!("declaring {} dead (silent for {:?})", info.node_id, elapsed);
                        info.status = NodeStatus::Dead;
                        ring_removals.push(info.node_id.clone());
                    }
                    status_updates.push(info.clone());
                }
                NodeStatus::Suspect if elapsed > DEAD_AFTER => {
                    warn!("declaring {} dead after suspicion timeout", info.node_id);
                    info.status = NodeStatus::Dead;
                    ring_removals.push(info.node_id.clone());
                    status_updates.push(info.clone());
                }
                NodeStatus::Dead | NodeStatus::Left if elapsed > CLEANUP_AFTER => {
                    table_removals.push(info.node_id.clone());
                }
                _ => {}
            }
        }

        for node_id in &table_removals {
            self.members.remove(node_id);
            debug!("cleaned up departed member {}", node_id);
        }
        for node_id in &ring_removals {
            self.ring_view.node_left(node_id);
        }

        if mode.is_gossip() {
            let snapshot = self.members_snapshot();
            let msg = MembershipMessage::Gossip(snapshot);
            for peer in self.k_random_peers() {
                self.send_to_member(&msg, &peer).await;
            }
        } else {
            let msg = MembershipMessage::Ping(self.self_info());
            for peer in self.k_random_peers() {
                self.send_to_member(&msg, &peer).await;
            }
        }

        self.gossip(status_updates).await;
    }
}
