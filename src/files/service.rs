use super::pending::{CollectTable, LsTable, ParkedMerges, PendingTable, SingleSlot};
use crate::net::UdpTransport;
use crate::ring::HashRing;
use crate::storage::types::{Block, FileMetadata, NodeId, now_ms};
use crate::storage::{ClientWriteTracker, FileStore};
use crate::wire::messages::{
    AppendFileRequest, AppendFileResponse, CreateFileRequest, FileMessage, FileExistsRequest,
    GetFileRequest, MergeFileRequest, MergeFileResponse,
};
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub(crate) const GET_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const APPEND_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const MERGE_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const LS_TIMEOUT: Duration = Duration::from_secs(3);
pub(crate) const COLLECT_TIMEOUT: Duration = Duration::from_secs(5);

/// What a pending get resolves to.
pub enum GetOutcome {
    /// The assembled file contents, already verified for read-my-writes.
    Data(Vec<u8>),
    /// The replica answered but its copy misses appends this client was
    /// acknowledged for; the caller should try another replica.
    NotSatisfied,
    Failed(String),
}

/// The file operations coordinator.
///
/// Exposes the create/get/append/merge/ls/store verbs to the CLI, drives
/// replication to the ring successors of each file, and owns the
/// request-reply rendezvous between caller tasks and the ingress worker.
pub struct FileService {
    pub(crate) local: NodeId,
    pub(crate) replication: usize,
    pub(crate) ring: Arc<HashRing>,
    pub(crate) store: Arc<FileStore>,
    pub(crate) tracker: Arc<ClientWriteTracker>,
    pub(crate) transport: Arc<UdpTransport>,
    /// Client-side cache: payload sources for create/append, destinations
    /// for get. Distinct from the replicated block store.
    cache: DashMap<String, Vec<u8>>,
    /// Per-file append sequence for writes issued from this node.
    sequences: DashMap<String, u32>,
    pub(crate) pending_gets: PendingTable<GetOutcome>,
    pub(crate) pending_append: SingleSlot<AppendFileResponse>,
    pub(crate) pending_merge: SingleSlot<MergeFileResponse>,
    pub(crate) pending_ls: LsTable,
    pub(crate) pending_collects: CollectTable,
    pub(crate) parked_merges: ParkedMerges,
}

impl FileService {
    pub fn new(
        local: NodeId,
        replication: usize,
        ring: Arc<HashRing>,
        store: Arc<FileStore>,
        tracker: Arc<ClientWriteTracker>,
        transport: Arc<UdpTransport>,
        cache_dir: Option<&Path>,
    ) -> Arc<Self> {
        let cache = DashMap::new();
        if let Some(dir) = cache_dir {
            load_cache_dir(dir, &cache);
        }
        Arc::new(Self {
            local,
            replication: replication.max(1),
            ring,
            store,
            tracker,
            transport,
            cache,
            sequences: DashMap::new(),
            pending_gets: PendingTable::new(),
            pending_append: SingleSlot::new(),
            pending_merge: SingleSlot::new(),
            pending_ls: LsTable::new(),
            pending_collects: CollectTable::new(),
            parked_merges: ParkedMerges::new(),
        })
    }

    /// This node's client identity on the wire: its own ring position.
    pub fn client_id(&self) -> u64 {
        HashRing::position_of(&self.local)
    }

    /// The same identity as the string blocks and the tracker carry.
    pub fn client_key(&self) -> String {
        self.client_id().to_string()
    }

    pub(crate) fn replica_set(&self, name: &str) -> Vec<NodeId> {
        self.ring.replicas(name, self.replication)
    }

    fn next_sequence(&self, name: &str) -> u32 {
        let mut entry = self.sequences.entry(name.to_string()).or_insert(0);
        let seq = *entry;
        *entry += 1;
        seq
    }

    fn current_sequence(&self, name: &str) -> u32 {
        self.sequences.get(name).map(|e| *e).unwrap_or(0)
    }

    pub(crate) async fn send_message(&self, msg: &FileMessage, dest: SocketAddr) -> Result<()> {
        let body = msg.encode_body()?;
        self.transport.send(msg.kind() as u8, &body, dest).await
    }

    pub(crate) async fn send_to_node(&self, msg: &FileMessage, node: &NodeId) -> Result<()> {
        let body = msg.encode_body()?;
        self.transport
            .send_to_node(msg.kind() as u8, &body, node)
            .await
    }

    /// Places a payload into the client-local cache, e.g. for tests or
    /// pre-staging create sources.
    pub fn store_local_file(&self, name: &str, data: Vec<u8>) {
        self.cache.insert(name.to_string(), data);
    }

    pub fn local_file(&self, name: &str) -> Option<Vec<u8>> {
        self.cache.get(name).map(|e| e.value().clone())
    }

    /// Payload source for create/append: the cache first, the filesystem as
    /// fallback (which also warms the cache).
    async fn load_local(&self, name: &str) -> Option<Vec<u8>> {
        if let Some(data) = self.cache.get(name) {
            return Some(data.value().clone());
        }
        match tokio::fs::read(name).await {
            Ok(data) => {
                self.cache.insert(name.to_string(), data.clone());
                Some(data)
            }
            Err(e) => {
                warn!("cannot read local file {}: {}", name, e);
                None
            }
        }
    }

    /// Lands fetched contents: written to the named local path and cached.
    async fn deliver_local(&self, local_name: &str, data: Vec<u8>) -> Result<()> {
        tokio::fs::write(local_name, &data)
            .await
            .with_context(|| format!("writing {local_name}"))?;
        self.cache.insert(local_name.to_string(), data);
        Ok(())
    }

    // --- Public verbs ---

    /// Creates `hydfs_name` from the contents of `local_name`.
    ///
    /// The initial block is built once here and installed identically on
    /// every replica. Partial replication still reports success; the caller
    /// learns how many replicas were reached from the log.
    pub async fn create(&self, local_name: &str, hydfs_name: &str) -> Result<bool> {
        let Some(data) = self.load_local(local_name).await else {
            return Ok(false);
        };
        let replicas = self.replica_set(hydfs_name);
        if replicas.is_empty() {
            warn!("create {}: no replicas available in the ring", hydfs_name);
            return Ok(false);
        }

        let timestamp_ms = now_ms();
        if replicas.contains(&self.local) {
            let block = Block::new(self.client_key(), 0, timestamp_ms, data.clone());
            if !self.store.create_with_block(hydfs_name, block).await {
                warn!("create {}: file already exists", hydfs_name);
                return Ok(false);
            }
        }

        let msg = FileMessage::CreateRequest(CreateFileRequest {
            hydfs_name: hydfs_name.to_string(),
            local_name: local_name.to_string(),
            client_id: self.client_id(),
            data,
            timestamp_ms,
        });
        let mut sent = 0usize;
        for replica in replicas.iter().filter(|r| **r != self.local) {
            match self.send_to_node(&msg, replica).await {
                Ok(()) => sent += 1,
                Err(e) => warn!("create {}: send to {} failed: {}", hydfs_name, replica, e),
            }
        }
        if replicas.contains(&self.local) {
            sent += 1;
        }
        info!(
            "created {} on {}/{} replica(s)",
            hydfs_name,
            sent,
            replicas.len()
        );
        Ok(true)
    }

    /// Fetches `hydfs_name` into `local_name`, honoring read-my-writes.
    pub async fn get(&self, hydfs_name: &str, local_name: &str) -> Result<bool> {
        if let Some(metadata) = self.store.metadata(hydfs_name).await {
            if self
                .tracker
                .satisfies_read_my_writes(&self.client_key(), hydfs_name, &metadata.block_ids)
                .await
            {
                if let Some(data) = self.store.get(hydfs_name).await {
                    self.deliver_local(local_name, data).await?;
                    info!("get {}: served from the local store", hydfs_name);
                    return Ok(true);
                }
            } else {
                info!(
                    "get {}: local copy misses our own appends, asking replicas",
                    hydfs_name
                );
            }
        }

        let replicas = self.replica_set(hydfs_name);
        if replicas.is_empty() {
            warn!("get {}: no replicas available in the ring", hydfs_name);
            return Ok(false);
        }
        for replica in replicas.iter().filter(|r| **r != self.local) {
            let dest = match self.transport.resolve(&replica.host, replica.port).await {
                Ok(dest) => dest,
                Err(e) => {
                    warn!("get {}: cannot resolve {}: {}", hydfs_name, replica, e);
                    continue;
                }
            };
            if self.get_from(dest, hydfs_name, local_name).await? {
                return Ok(true);
            }
        }
        warn!("get {}: no replica produced a satisfying copy", hydfs_name);
        Ok(false)
    }

    /// One fetch attempt against an explicit replica address.
    pub async fn get_from(
        &self,
        dest: SocketAddr,
        hydfs_name: &str,
        local_name: &str,
    ) -> Result<bool> {
        let rx = self.pending_gets.register(hydfs_name).await;
        let msg = FileMessage::GetRequest(GetFileRequest {
            hydfs_name: hydfs_name.to_string(),
            local_name: local_name.to_string(),
            client_id: self.client_id(),
            last_known_sequence: self.current_sequence(hydfs_name),
        });
        if let Err(e) = self.send_message(&msg, dest).await {
            warn!("get {}: send to {} failed: {}", hydfs_name, dest, e);
            self.pending_gets.cancel(hydfs_name).await;
            return Ok(false);
        }

        match tokio::time::timeout(GET_TIMEOUT, rx).await {
            Ok(Ok(GetOutcome::Data(data))) => {
                self.deliver_local(local_name, data).await?;
                info!("get {}: fetched from {}", hydfs_name, dest);
                Ok(true)
            }
            Ok(Ok(GetOutcome::NotSatisfied)) => {
                info!(
                    "get {}: {} served a copy missing our appends",
                    hydfs_name, dest
                );
                Ok(false)
            }
            Ok(Ok(GetOutcome::Failed(error))) => {
                warn!("get {}: {} answered: {}", hydfs_name, dest, error);
                Ok(false)
            }
            _ => {
                self.pending_gets.cancel(hydfs_name).await;
                warn!("get {}: timed out waiting for {}", hydfs_name, dest);
                Ok(false)
            }
        }
    }

    /// `getfromreplica <host:port> <hydfs> <local>`: targeted fetch.
    pub async fn get_from_replica(
        &self,
        address: &str,
        hydfs_name: &str,
        local_name: &str,
    ) -> Result<bool> {
        let Some((host, port)) = address.split_once(':') else {
            warn!("invalid replica address {:?}, expected host:port", address);
            return Ok(false);
        };
        let Ok(port) = port.parse::<u16>() else {
            warn!("invalid port in replica address {:?}", address);
            return Ok(false);
        };
        let dest = self.transport.resolve(host, port).await?;
        self.get_from(dest, hydfs_name, local_name).await
    }

    /// Appends the contents of `local_name` as one new block.
    ///
    /// The request goes to the file's coordinator, which installs the block,
    /// acknowledges, then fans it out to the remaining replicas. The
    /// acknowledged block id is recorded for read-my-writes.
    pub async fn append(&self, local_name: &str, hydfs_name: &str) -> Result<bool> {
        let Some(data) = self.load_local(local_name).await else {
            return Ok(false);
        };
        let replicas = self.replica_set(hydfs_name);
        let Some(coordinator) = replicas.first().cloned() else {
            warn!("append {}: no replicas available in the ring", hydfs_name);
            return Ok(false);
        };

        let req = AppendFileRequest {
            hydfs_name: hydfs_name.to_string(),
            local_name: local_name.to_string(),
            client_id: self.client_id(),
            sequence_num: self.next_sequence(hydfs_name),
            data,
        };

        if coordinator == self.local {
            let resp = self.coordinate_append(&req).await;
            if !resp.success {
                warn!("append {}: {}", hydfs_name, resp.error);
            }
            return Ok(resp.success);
        }

        let rx = self.pending_append.register().await;
        let msg = FileMessage::AppendRequest(req);
        if let Err(e) = self.send_to_node(&msg, &coordinator).await {
            warn!("append {}: send to coordinator failed: {}", hydfs_name, e);
            self.pending_append.cancel().await;
            return Ok(false);
        }
        match tokio::time::timeout(APPEND_TIMEOUT, rx).await {
            Ok(Ok(resp)) if resp.success => {
                self.tracker
                    .record(&self.client_key(), hydfs_name, resp.block_id)
                    .await;
                info!(
                    "appended block {} to {} via coordinator {}",
                    resp.block_id, hydfs_name, coordinator
                );
                Ok(true)
            }
            Ok(Ok(resp)) => {
                warn!("append {}: coordinator refused: {}", hydfs_name, resp.error);
                Ok(false)
            }
            _ => {
                self.pending_append.cancel().await;
                warn!("append {}: timed out waiting for acknowledgment", hydfs_name);
                Ok(false)
            }
        }
    }

    /// Reconciles every replica of `hydfs_name` onto one canonical block
    /// order. Runs the two-phase protocol locally when this node is the
    /// coordinator, otherwise forwards and waits for the verdict.
    pub async fn merge(&self, hydfs_name: &str) -> Result<bool> {
        let replicas = self.replica_set(hydfs_name);
        let Some(coordinator) = replicas.first().cloned() else {
            warn!("merge {}: no replicas available in the ring", hydfs_name);
            return Ok(false);
        };

        if coordinator == self.local {
            let resp = self.coordinate_merge(hydfs_name, &replicas).await;
            if resp.success {
                info!("merged {} at version {}", hydfs_name, resp.new_version);
            } else {
                warn!("merge {}: {}", hydfs_name, resp.error);
            }
            return Ok(resp.success);
        }

        let rx = self.pending_merge.register().await;
        let msg = FileMessage::MergeRequest(MergeFileRequest {
            hydfs_name: hydfs_name.to_string(),
        });
        if let Err(e) = self.send_to_node(&msg, &coordinator).await {
            warn!("merge {}: send to coordinator failed: {}", hydfs_name, e);
            self.pending_merge.cancel().await;
            return Ok(false);
        }
        match tokio::time::timeout(MERGE_TIMEOUT, rx).await {
            Ok(Ok(resp)) if resp.success => {
                info!(
                    "merged {} at version {} (coordinator {})",
                    hydfs_name, resp.new_version, coordinator
                );
                Ok(true)
            }
            Ok(Ok(resp)) => {
                warn!("merge {}: coordinator refused: {}", hydfs_name, resp.error);
                Ok(false)
            }
            _ => {
                self.pending_merge.cancel().await;
                warn!("merge {}: timed out waiting for coordinator", hydfs_name);
                Ok(false)
            }
        }
    }

    /// Read-only diagnostic: asks every replica whether it holds the file
    /// and prints one line per replica.
    pub async fn ls(&self, hydfs_name: &str) -> Result<()> {
        let replicas = self.replica_set(hydfs_name);
        println!(
            "=== ls {} (file id {}) ===",
            hydfs_name,
            FileMetadata::generate_file_id(hydfs_name)
        );
        if replicas.is_empty() {
            println!("no replicas available in the ring");
            return Ok(());
        }

        let mut expected = Vec::new();
        for replica in &replicas {
            match self.transport.resolve(&replica.host, replica.port).await {
                Ok(addr) => expected.push((addr, replica.clone())),
                Err(e) => warn!("ls {}: cannot resolve {}: {}", hydfs_name, replica, e),
            }
        }
        let notify = self.pending_ls.begin(hydfs_name, expected.clone()).await;
        let msg = FileMessage::FileExistsRequest(FileExistsRequest {
            hydfs_name: hydfs_name.to_string(),
            requester_id: self.local.to_string(),
        });
        for (addr, _) in &expected {
            if let Err(e) = self.send_message(&msg, *addr).await {
                warn!("ls {}: send to {} failed: {}", hydfs_name, addr, e);
            }
        }

        let deadline = tokio::time::Instant::now() + LS_TIMEOUT;
        loop {
            if self.pending_ls.is_complete(hydfs_name).await {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            let _ = tokio::time::timeout_at(deadline, notify.notified()).await;
        }

        let Some(state) = self.pending_ls.finish(hydfs_name).await else {
            return Ok(());
        };
        let mut exists_somewhere = false;
        for (addr, replica) in &state.expected {
            let position = HashRing::position_of(replica);
            match state.responses.get(addr) {
                Some(resp) if resp.exists => {
                    exists_somewhere = true;
                    println!(
                        "  {} (ring {}) - HAS (size: {} bytes, version: {})",
                        replica.address(),
                        position,
                        resp.file_size,
                        resp.version
                    );
                }
                Some(_) => {
                    println!("  {} (ring {}) - NO FILE", replica.address(), position);
                }
                None => {
                    println!("  {} (ring {}) - NO RESPONSE", replica.address(), position);
                }
            }
        }
        println!(
            "{} {} in HyDFS",
            hydfs_name,
            if exists_somewhere { "EXISTS" } else { "DOES NOT EXIST" }
        );
        Ok(())
    }

    /// The `store` command: local cache contents plus HyDFS replicas held
    /// by this node.
    pub async fn list_store(&self) -> Result<()> {
        println!(
            "=== store on {} (ring {}) ===",
            self.local.address(),
            HashRing::position_of(&self.local)
        );
        let mut cached: Vec<String> = self.cache.iter().map(|e| e.key().clone()).collect();
        cached.sort();
        println!("local files ({}):", cached.len());
        for name in &cached {
            let size = self.cache.get(name).map(|e| e.value().len()).unwrap_or(0);
            println!("  {} ({} bytes)", name, size);
        }

        let mut names = self.store.list().await;
        names.sort();
        println!("hydfs replicas ({}):", names.len());
        for name in &names {
            if let Some(meta) = self.store.metadata(name).await {
                println!(
                    "  {} (file id {}, {} bytes, version {})",
                    name, meta.file_id, meta.total_size, meta.version
                );
            }
        }
        Ok(())
    }
}

/// Union-then-order step of the merge protocol: drop duplicate block ids,
/// then sort by `(client_id, sequence_num)` with timestamp and id as
/// deterministic tiebreaks.
pub fn canonical_order(blocks: Vec<Block>) -> Vec<Block> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Block> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if seen.insert(block.block_id) {
            unique.push(block);
        }
    }
    unique.sort_by(|a, b| {
        a.client_id
            .cmp(&b.client_id)
            .then(a.sequence_num.cmp(&b.sequence_num))
            .then(a.timestamp_ms.cmp(&b.timestamp_ms))
            .then(a.block_id.cmp(&b.block_id))
    });
    unique
}

fn load_cache_dir(dir: &Path, cache: &DashMap<String, Vec<u8>>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            debug!("no cache directory at {}, starting empty", dir.display());
            return;
        }
    };
    let mut loaded = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match std::fs::read(&path) {
            Ok(data) => {
                cache.insert(name.to_string(), data);
                loaded += 1;
            }
            Err(e) => warn!("failed to preload {}: {}", path.display(), e),
        }
    }
    if loaded > 0 {
        info!("preloaded {} file(s) from {}", loaded, dir.display());
    }
}
