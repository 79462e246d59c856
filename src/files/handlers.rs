//! Inbound file-plane message handlers.
//!
//! The router hands every decoded `FileMessage` here together with its
//! sender. Request handlers do their store work first and send replies only
//! after the store call has returned, so no lock is ever held across the
//! network. Response handlers complete the matching pending entry; late
//! responses find none and are dropped.

use super::service::{COLLECT_TIMEOUT, FileService, GetOutcome, canonical_order};
use crate::ring::HashRing;
use crate::storage::types::{Block, FileMetadata, NodeId, now_ms};
use crate::wire::messages::{
    AppendFileRequest, AppendFileResponse, CollectBlocksRequest, CollectBlocksResponse,
    CreateFileRequest, CreateFileResponse, FileExistsRequest, FileExistsResponse, FileMessage,
    GetFileRequest, GetFileResponse, LsEntry, LsFileRequest, LsFileResponse, ListStoreResponse,
    MergeFileRequest, MergeFileResponse, MergeUpdateAck, MergeUpdateMessage,
    ReplicateBlockMessage, StoredFile,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl FileService {
    /// Ingress dispatch. Merge coordination is the one handler that waits on
    /// further inbound messages, so it runs in its own task; everything else
    /// completes inline.
    pub async fn handle_message(self: &Arc<Self>, msg: FileMessage, src: SocketAddr) {
        match msg {
            FileMessage::CreateRequest(req) => self.handle_create_request(req, src).await,
            FileMessage::CreateResponse(resp) => {
                if resp.success {
                    debug!("replica {} acknowledged create of file {}", src, resp.file_id);
                } else {
                    warn!("replica {} rejected create: {}", src, resp.error);
                }
            }
            FileMessage::GetRequest(req) => self.handle_get_request(req, src).await,
            FileMessage::GetResponse(resp) => self.handle_get_response(resp).await,
            FileMessage::AppendRequest(req) => self.handle_append_request(req, src).await,
            FileMessage::AppendResponse(resp) => {
                if !self.pending_append.complete(resp).await {
                    debug!("dropping late append response from {}", src);
                }
            }
            FileMessage::MergeRequest(req) => {
                let service = self.clone();
                tokio::spawn(async move {
                    service.handle_merge_request(req, src).await;
                });
            }
            FileMessage::MergeResponse(resp) => {
                if !self.pending_merge.complete(resp).await {
                    debug!("dropping late merge response from {}", src);
                }
            }
            FileMessage::ReplicateFile(bundle) => {
                info!(
                    "installing replicated file {} ({} block(s))",
                    bundle.metadata.name,
                    bundle.blocks.len()
                );
                self.store.store(bundle.metadata, bundle.blocks).await;
            }
            FileMessage::ReplicateBlock(msg) => self.handle_replicate_block(msg, src).await,
            FileMessage::ReplicateAck(ack) => {
                debug!(
                    "{} installed block {} of {}",
                    src, ack.block.block_id, ack.hydfs_name
                );
            }
            FileMessage::LsRequest(req) => self.handle_ls_request(req, src).await,
            FileMessage::LsResponse(resp) => {
                info!(
                    "file {} is placed on {} replica(s)",
                    resp.file_id,
                    resp.entries.len()
                );
            }
            FileMessage::ListStoreRequest(_) => self.handle_liststore_request(src).await,
            FileMessage::ListStoreResponse(resp) => {
                info!("{} stores {} file(s)", src, resp.files.len());
            }
            FileMessage::FileExistsRequest(req) => {
                self.handle_file_exists_request(req, src).await
            }
            FileMessage::FileExistsResponse(resp) => {
                let name = resp.hydfs_name.clone();
                self.pending_ls.record(&name, src, resp).await;
            }
            FileMessage::CollectBlocksRequest(req) => {
                self.handle_collect_blocks_request(req, src).await
            }
            FileMessage::CollectBlocksResponse(resp) => {
                self.handle_collect_blocks_response(resp, src).await
            }
            FileMessage::MergeUpdate(update) => self.handle_merge_update(update, src).await,
            FileMessage::MergeUpdateAck(ack) => {
                debug!(
                    "{} applied merge of {} at version {}",
                    src, ack.hydfs_name, ack.version
                );
            }
            FileMessage::TransferFiles(msg) => {
                info!("installing {} transferred file(s) from {}", msg.files.len(), src);
                for bundle in msg.files {
                    self.store.store(bundle.metadata, bundle.blocks).await;
                }
            }
            FileMessage::DeleteFile(msg) => {
                info!("deleting {} on request from {}", msg.hydfs_name, src);
                self.store.delete(&msg.hydfs_name).await;
                self.tracker.clear_file(&msg.hydfs_name).await;
            }
            FileMessage::ErrorFileExists(err)
            | FileMessage::ErrorFileNotFound(err)
            | FileMessage::ErrorReplicaUnavailable(err) => {
                warn!("{} reported an error for {}: {}", src, err.hydfs_name, err.detail);
            }
        }
    }

    async fn handle_create_request(&self, req: CreateFileRequest, src: SocketAddr) {
        let client_key = req.client_id.to_string();
        let block = Block::new(client_key, 0, req.timestamp_ms, req.data);
        let success = self.store.create_with_block(&req.hydfs_name, block).await;
        if success {
            info!("created {} on request from {}", req.hydfs_name, src);
        } else {
            warn!("create of {} refused: file already exists", req.hydfs_name);
        }
        let resp = FileMessage::CreateResponse(CreateFileResponse {
            success,
            error: if success {
                String::new()
            } else {
                "file already exists".to_string()
            },
            file_id: FileMetadata::generate_file_id(&req.hydfs_name),
        });
        if let Err(e) = self.send_message(&resp, src).await {
            warn!("failed to answer create request from {}: {}", src, e);
        }
    }

    async fn handle_get_request(&self, req: GetFileRequest, src: SocketAddr) {
        let response = match self.store.metadata(&req.hydfs_name).await {
            Some(metadata) => {
                let blocks = self
                    .store
                    .get_blocks(&req.hydfs_name)
                    .await
                    .unwrap_or_default();
                GetFileResponse {
                    success: true,
                    error: String::new(),
                    metadata,
                    blocks,
                }
            }
            None => GetFileResponse {
                success: false,
                error: "file not found".to_string(),
                metadata: FileMetadata::named(req.hydfs_name.clone()),
                blocks: Vec::new(),
            },
        };
        let msg = FileMessage::GetResponse(response);
        if let Err(e) = self.send_message(&msg, src).await {
            // Most often the file outgrew a single datagram; say so instead
            // of leaving the requester to time out.
            warn!("get response for {} not sent: {}", req.hydfs_name, e);
            let fallback = FileMessage::GetResponse(GetFileResponse {
                success: false,
                error: "file too large for a single datagram".to_string(),
                metadata: FileMetadata::named(req.hydfs_name.clone()),
                blocks: Vec::new(),
            });
            if let Err(e) = self.send_message(&fallback, src).await {
                warn!("fallback get response for {} not sent: {}", req.hydfs_name, e);
            }
        }
    }

    async fn handle_get_response(&self, resp: GetFileResponse) {
        let name = resp.metadata.name.clone();
        if !resp.success {
            self.pending_gets
                .complete(&name, GetOutcome::Failed(resp.error))
                .await;
            return;
        }
        if !self
            .tracker
            .satisfies_read_my_writes(&self.client_key(), &name, &resp.metadata.block_ids)
            .await
        {
            self.pending_gets
                .complete(&name, GetOutcome::NotSatisfied)
                .await;
            return;
        }

        let by_id: HashMap<u64, &Block> =
            resp.blocks.iter().map(|b| (b.block_id, b)).collect();
        let mut data = Vec::with_capacity(resp.metadata.total_size as usize);
        for block_id in &resp.metadata.block_ids {
            match by_id.get(block_id) {
                Some(block) => data.extend_from_slice(&block.data),
                None => {
                    self.pending_gets
                        .complete(
                            &name,
                            GetOutcome::Failed(format!("response missing block {block_id}")),
                        )
                        .await;
                    return;
                }
            }
        }
        if !self.pending_gets.complete(&name, GetOutcome::Data(data)).await {
            debug!("dropping late get response for {}", name);
        }
    }

    async fn handle_append_request(&self, req: AppendFileRequest, src: SocketAddr) {
        let resp = self.coordinate_append(&req).await;
        let msg = FileMessage::AppendResponse(resp);
        if let Err(e) = self.send_message(&msg, src).await {
            warn!("failed to answer append request from {}: {}", src, e);
        }
    }

    /// Coordinator side of an append: install locally, record the ack for
    /// read-my-writes, then fan the exact block out to the other replicas.
    pub(crate) async fn coordinate_append(&self, req: &AppendFileRequest) -> AppendFileResponse {
        let client_key = req.client_id.to_string();
        let block = Block::new(
            client_key.clone(),
            req.sequence_num,
            now_ms(),
            req.data.clone(),
        );
        let block_id = block.block_id;
        if !self.store.append(&req.hydfs_name, block.clone()).await {
            return AppendFileResponse {
                success: false,
                error: "file not found".to_string(),
                block_id: 0,
            };
        }
        self.tracker
            .record(&client_key, &req.hydfs_name, block_id)
            .await;

        let replicas = self.replica_set(&req.hydfs_name);
        let msg = FileMessage::ReplicateBlock(ReplicateBlockMessage {
            hydfs_name: req.hydfs_name.clone(),
            block,
        });
        for replica in replicas.iter().filter(|r| **r != self.local) {
            if let Err(e) = self.send_to_node(&msg, replica).await {
                warn!(
                    "failed to replicate block {} of {} to {}: {}",
                    block_id, req.hydfs_name, replica, e
                );
            }
        }
        debug!("appended block {} to {}", block_id, req.hydfs_name);
        AppendFileResponse {
            success: true,
            error: String::new(),
            block_id,
        }
    }

    async fn handle_replicate_block(&self, msg: ReplicateBlockMessage, src: SocketAddr) {
        let ReplicateBlockMessage { hydfs_name, block } = msg;
        let installed = if self.store.has(&hydfs_name).await {
            self.store.append(&hydfs_name, block.clone()).await
        } else {
            // Replication can outrun the create; install the file around
            // this block and let a later merge settle the order.
            self.store
                .create_with_block(&hydfs_name, block.clone())
                .await
        };
        if installed {
            debug!("installed replicated block {} for {}", block.block_id, hydfs_name);
        } else {
            warn!(
                "could not install replicated block {} for {}",
                block.block_id, hydfs_name
            );
        }
        let ack = FileMessage::ReplicateAck(ReplicateBlockMessage { hydfs_name, block });
        if let Err(e) = self.send_message(&ack, src).await {
            warn!("failed to ack replicated block to {}: {}", src, e);
        }
    }

    async fn handle_merge_request(&self, req: MergeFileRequest, src: SocketAddr) {
        let replicas = self.replica_set(&req.hydfs_name);
        match replicas.first() {
            Some(coordinator) if *coordinator == self.local => {
                let resp = self.coordinate_merge(&req.hydfs_name, &replicas).await;
                let msg = FileMessage::MergeResponse(resp);
                if let Err(e) = self.send_message(&msg, src).await {
                    warn!("failed to answer merge request from {}: {}", src, e);
                }
            }
            Some(coordinator) => {
                // Ring views disagree; pass the request along. The requester
                // will retry after its timeout if the reply goes astray.
                debug!(
                    "forwarding merge of {} to coordinator {}",
                    req.hydfs_name, coordinator
                );
                let coordinator = coordinator.clone();
                let msg = FileMessage::MergeRequest(req);
                if let Err(e) = self.send_to_node(&msg, &coordinator).await {
                    warn!("failed to forward merge request: {}", e);
                }
            }
            None => {
                let msg = FileMessage::MergeResponse(MergeFileResponse {
                    success: false,
                    error: "no replicas available".to_string(),
                    new_version: 0,
                });
                if let Err(e) = self.send_message(&msg, src).await {
                    warn!("failed to answer merge request from {}: {}", src, e);
                }
            }
        }
    }

    /// Coordinator side of a merge: collect every replica's blocks, compute
    /// the canonical order, install it locally, then broadcast the result.
    /// Replicas that fail to answer are skipped; they converge on the next
    /// merge once they return.
    pub(crate) async fn coordinate_merge(
        &self,
        name: &str,
        replicas: &[NodeId],
    ) -> MergeFileResponse {
        let others: Vec<NodeId> = replicas
            .iter()
            .filter(|r| **r != self.local)
            .cloned()
            .collect();
        let notify = self.pending_collects.begin(name, others.len()).await;
        let req = FileMessage::CollectBlocksRequest(CollectBlocksRequest {
            hydfs_name: name.to_string(),
        });
        for replica in &others {
            if let Err(e) = self.send_to_node(&req, replica).await {
                warn!("merge {}: collect request to {} failed: {}", name, replica, e);
            }
        }

        let deadline = tokio::time::Instant::now() + COLLECT_TIMEOUT;
        loop {
            if self.pending_collects.is_complete(name).await {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            let _ = tokio::time::timeout_at(deadline, notify.notified()).await;
        }

        let mut all_blocks: Vec<Block> = Vec::new();
        let mut max_version = 0u32;
        if let Some(state) = self.pending_collects.finish(name).await {
            if state.responses.len() < state.expected {
                warn!(
                    "merge {}: proceeding with {}/{} replica responses",
                    name,
                    state.responses.len(),
                    state.expected
                );
            }
            for resp in state.responses {
                max_version = max_version.max(resp.version);
                all_blocks.extend(resp.blocks);
            }
        }
        if let Some(local_blocks) = self.store.get_blocks(name).await {
            all_blocks.extend(local_blocks);
        }
        if let Some(metadata) = self.store.metadata(name).await {
            max_version = max_version.max(metadata.version);
        }
        if all_blocks.is_empty() {
            return MergeFileResponse {
                success: false,
                error: "file not found on any replica".to_string(),
                new_version: 0,
            };
        }

        let canonical = canonical_order(all_blocks);
        let block_ids: Vec<u64> = canonical.iter().map(|b| b.block_id).collect();
        let new_version = max_version + 1;
        self.store.merge(name, canonical, new_version).await;
        info!(
            "merged {} into {} block(s) at version {}",
            name,
            block_ids.len(),
            new_version
        );

        let update = FileMessage::MergeUpdate(MergeUpdateMessage {
            hydfs_name: name.to_string(),
            block_ids,
            new_version,
        });
        for replica in &others {
            if let Err(e) = self.send_to_node(&update, replica).await {
                warn!("merge {}: update to {} failed: {}", name, replica, e);
            }
        }
        MergeFileResponse {
            success: true,
            error: String::new(),
            new_version,
        }
    }

    async fn handle_merge_update(&self, update: MergeUpdateMessage, src: SocketAddr) {
        let missing = self.store.missing_blocks(&update.block_ids).await;
        if missing.is_empty() {
            if self.apply_merge_update(&update, &HashMap::new()).await {
                let ack = FileMessage::MergeUpdateAck(MergeUpdateAck {
                    hydfs_name: update.hydfs_name.clone(),
                    version: update.new_version,
                });
                if let Err(e) = self.send_message(&ack, src).await {
                    warn!("failed to ack merge update to {}: {}", src, e);
                }
            }
        } else {
            // Pull the blocks we never saw from the coordinator, then apply
            // the parked update when they arrive.
            debug!(
                "merge update for {} names {} block(s) we lack; re-collecting",
                update.hydfs_name,
                missing.len()
            );
            let req = FileMessage::CollectBlocksRequest(CollectBlocksRequest {
                hydfs_name: update.hydfs_name.clone(),
            });
            self.parked_merges.park(update).await;
            if let Err(e) = self.send_message(&req, src).await {
                warn!("failed to request missing merge blocks from {}: {}", src, e);
            }
        }
    }

    /// Installs the coordinator's canonical order, drawing blocks from the
    /// local store first and `extra` (a back-fill response) second.
    async fn apply_merge_update(
        &self,
        update: &MergeUpdateMessage,
        extra: &HashMap<u64, Block>,
    ) -> bool {
        let mut canonical = Vec::with_capacity(update.block_ids.len());
        for block_id in &update.block_ids {
            if let Some(block) = self.store.block(*block_id).await {
                canonical.push(block);
            } else if let Some(block) = extra.get(block_id) {
                canonical.push(block.clone());
            } else {
                warn!(
                    "still missing block {} for {}; deferring to the next merge",
                    block_id, update.hydfs_name
                );
                return false;
            }
        }
        self.store
            .merge(&update.hydfs_name, canonical, update.new_version)
            .await
    }

    async fn handle_collect_blocks_request(&self, req: CollectBlocksRequest, src: SocketAddr) {
        let (blocks, version) = match self.store.metadata(&req.hydfs_name).await {
            Some(metadata) => (
                self.store
                    .get_blocks(&req.hydfs_name)
                    .await
                    .unwrap_or_default(),
                metadata.version,
            ),
            None => (Vec::new(), 0),
        };
        let msg = FileMessage::CollectBlocksResponse(CollectBlocksResponse {
            hydfs_name: req.hydfs_name,
            version,
            blocks,
        });
        if let Err(e) = self.send_message(&msg, src).await {
            warn!("failed to answer collect request from {}: {}", src, e);
        }
    }

    async fn handle_collect_blocks_response(&self, resp: CollectBlocksResponse, src: SocketAddr) {
        let name = resp.hydfs_name.clone();
        // A coordinator-side collection in flight claims the response.
        if self.pending_collects.is_pending(&name).await {
            self.pending_collects.record(&name, resp).await;
            return;
        }
        // Otherwise this is the back-fill for a parked merge update.
        if let Some(update) = self.parked_merges.take(&name).await {
            let extra: HashMap<u64, Block> = resp
                .blocks
                .into_iter()
                .map(|b| (b.block_id, b))
                .collect();
            if self.apply_merge_update(&update, &extra).await {
                let ack = FileMessage::MergeUpdateAck(MergeUpdateAck {
                    hydfs_name: update.hydfs_name.clone(),
                    version: update.new_version,
                });
                if let Err(e) = self.send_message(&ack, src).await {
                    warn!("failed to ack back-filled merge to {}: {}", src, e);
                }
            }
        } else {
            debug!("dropping unsolicited collect response for {}", name);
        }
    }

    async fn handle_ls_request(&self, req: LsFileRequest, src: SocketAddr) {
        let replicas = self.replica_set(&req.hydfs_name);
        let entries = replicas
            .iter()
            .map(|r| LsEntry {
                address: r.address(),
                ring_position: HashRing::position_of(r),
            })
            .collect();
        let msg = FileMessage::LsResponse(LsFileResponse {
            success: true,
            error: String::new(),
            file_id: FileMetadata::generate_file_id(&req.hydfs_name),
            entries,
        });
        if let Err(e) = self.send_message(&msg, src).await {
            warn!("failed to answer ls request from {}: {}", src, e);
        }
    }

    async fn handle_file_exists_request(&self, req: FileExistsRequest, src: SocketAddr) {
        let resp = match self.store.metadata(&req.hydfs_name).await {
            Some(metadata) => FileExistsResponse {
                hydfs_name: req.hydfs_name,
                exists: true,
                file_id: metadata.file_id,
                file_size: metadata.total_size,
                version: metadata.version,
            },
            None => FileExistsResponse {
                hydfs_name: req.hydfs_name,
                exists: false,
                file_id: 0,
                file_size: 0,
                version: 0,
            },
        };
        let msg = FileMessage::FileExistsResponse(resp);
        if let Err(e) = self.send_message(&msg, src).await {
            warn!("failed to answer file-exists request from {}: {}", src, e);
        }
    }

    async fn handle_liststore_request(&self, src: SocketAddr) {
        let mut files = Vec::new();
        for name in self.store.list().await {
            if let Some(metadata) = self.store.metadata(&name).await {
                files.push(StoredFile {
                    name,
                    file_id: metadata.file_id,
                });
            }
        }
        let msg = FileMessage::ListStoreResponse(ListStoreResponse { files });
        if let Err(e) = self.send_message(&msg, src).await {
            warn!("failed to answer liststore request from {}: {}", src, e);
        }
    }
}
