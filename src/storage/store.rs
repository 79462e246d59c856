use super::types::{Block, FileMetadata, now_ms};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot};

/// Work shipped to the background persistence writer. Entities are encoded
/// while the store lock is held; the filesystem is only touched by the
/// writer task, so the request path never blocks on disk I/O.
enum PersistJob {
    WriteMetadata { name: String, bytes: Vec<u8> },
    WriteBlock { block_id: u64, bytes: Vec<u8> },
    DeleteMetadata { name: String },
    DeleteBlock { block_id: u64 },
    Purge,
    Flush(oneshot::Sender<()>),
}

struct StoreInner {
    files: HashMap<String, FileMetadata>,
    blocks: HashMap<u64, Block>,
}

/// Local block store: filename -> metadata and block id -> block.
///
/// One reader-writer lock spans both maps, so `get` never observes a
/// `block_ids` entry whose block is absent. Mutations optionally stream
/// encoded entities to an on-disk layout that is replayed at startup.
pub struct FileStore {
    inner: RwLock<StoreInner>,
    persist: Option<mpsc::UnboundedSender<PersistJob>>,
}

impl FileStore {
    /// Purely in-memory store, used by tests and disposable nodes.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(StoreInner {
                files: HashMap::new(),
                blocks: HashMap::new(),
            }),
            persist: None,
        })
    }

    /// Opens a store rooted at `dir`, replaying any metadata and blocks
    /// persisted by a previous incarnation, and spawns the writer task.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join("metadata"))
            .with_context(|| format!("creating {}", dir.display()))?;
        std::fs::create_dir_all(dir.join("blocks"))?;

        let mut files = HashMap::new();
        let mut blocks = HashMap::new();
        for entry in std::fs::read_dir(dir.join("metadata"))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("meta") {
                continue;
            }
            let raw = std::fs::read(&path)?;
            let metadata = match FileMetadata::from_wire(&raw) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("skipping corrupt metadata {}: {}", path.display(), e);
                    continue;
                }
            };
            for block_id in &metadata.block_ids {
                let block_path = dir.join("blocks").join(format!("{block_id}.blk"));
                let raw = match std::fs::read(&block_path) {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!("missing block file {}: {}", block_path.display(), e);
                        continue;
                    }
                };
                match Block::from_wire(&raw) {
                    Ok(block) => {
                        blocks.insert(*block_id, block);
                    }
                    Err(e) => {
                        tracing::warn!("skipping corrupt block {}: {}", block_path.display(), e)
                    }
                }
            }
            files.insert(metadata.name.clone(), metadata);
        }
        if !files.is_empty() {
            tracing::info!("loaded {} file(s) from {}", files.len(), dir.display());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(persistence_writer(dir, rx));

        Ok(Arc::new(Self {
            inner: RwLock::new(StoreInner { files, blocks }),
            persist: Some(tx),
        }))
    }

    fn enqueue(&self, job: PersistJob) {
        if let Some(tx) = &self.persist
            && tx.send(job).is_err()
        {
            tracing::warn!("persistence writer is gone; store is now memory-only");
        }
    }

    /// Blocks until every persistence job enqueued so far has hit disk.
    pub async fn sync(&self) {
        let Some(tx) = &self.persist else { return };
        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(PersistJob::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Creates a file whose initial block is built from `data`. Fails if the
    /// name is already present.
    pub async fn create(&self, name: &str, data: Vec<u8>, client_id: &str) -> bool {
        let timestamp = now_ms();
        let block = Block::new(client_id.to_string(), 0, timestamp, data);
        self.create_with_block(name, block).await
    }

    /// Creates a file around an exact block, used when a replica must derive
    /// the same block id as the node that initiated the create.
    pub async fn create_with_block(&self, name: &str, block: Block) -> bool {
        let mut inner = self.inner.write().await;
        if inner.files.contains_key(name) {
            return false;
        }

        let now = now_ms();
        let mut metadata = FileMetadata {
            name: name.to_string(),
            file_id: FileMetadata::generate_file_id(name),
            total_size: 0,
            block_ids: Vec::new(),
            version: 1,
            created_ms: now,
            last_modified_ms: now,
        };
        if !block.data.is_empty() {
            metadata.total_size = block.size();
            metadata.block_ids.push(block.block_id);
            self.enqueue(PersistJob::WriteBlock {
                block_id: block.block_id,
                bytes: block.to_wire(),
            });
            inner.blocks.insert(block.block_id, block);
        }
        self.enqueue(PersistJob::WriteMetadata {
            name: name.to_string(),
            bytes: metadata.to_wire(),
        });
        inner.files.insert(name.to_string(), metadata);
        true
    }

    /// Appends one block under the per-store writer lock. Fails if the file
    /// is unknown or the block id already exists for it.
    pub async fn append(&self, name: &str, block: Block) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let Some(metadata) = inner.files.get_mut(name) else {
            return false;
        };
        if metadata.block_ids.contains(&block.block_id) {
            tracing::warn!(
                "rejecting duplicate block {} for file {}",
                block.block_id,
                name
            );
            return false;
        }

        metadata.block_ids.push(block.block_id);
        metadata.total_size += block.size();
        metadata.last_modified_ms = now_ms();
        metadata.version += 1;
        self.enqueue(PersistJob::WriteMetadata {
            name: name.to_string(),
            bytes: metadata.to_wire(),
        });
        self.enqueue(PersistJob::WriteBlock {
            block_id: block.block_id,
            bytes: block.to_wire(),
        });
        inner.blocks.insert(block.block_id, block);
        true
    }

    /// Whole-file contents: each block's data concatenated in canonical order.
    pub async fn get(&self, name: &str) -> Option<Vec<u8>> {
        let inner = self.inner.read().await;
        let metadata = inner.files.get(name)?;
        let mut data = Vec::with_capacity(metadata.total_size as usize);
        for block_id in &metadata.block_ids {
            if let Some(block) = inner.blocks.get(block_id) {
                data.extend_from_slice(&block.data);
            }
        }
        Some(data)
    }

    /// All blocks of a file in canonical order.
    pub async fn get_blocks(&self, name: &str) -> Option<Vec<Block>> {
        let inner = self.inner.read().await;
        let metadata = inner.files.get(name)?;
        Some(
            metadata
                .block_ids
                .iter()
                .filter_map(|id| inner.blocks.get(id).cloned())
                .collect(),
        )
    }

    pub async fn metadata(&self, name: &str) -> Option<FileMetadata> {
        self.inner.read().await.files.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.inner.read().await.files.contains_key(name)
    }

    pub async fn block(&self, block_id: u64) -> Option<Block> {
        self.inner.read().await.blocks.get(&block_id).cloned()
    }

    /// Which of `block_ids` this store has no block for.
    pub async fn missing_blocks(&self, block_ids: &[u64]) -> Vec<u64> {
        let inner = self.inner.read().await;
        block_ids
            .iter()
            .filter(|id| !inner.blocks.contains_key(id))
            .copied()
            .collect()
    }

    pub async fn list(&self) -> Vec<String> {
        self.inner.read().await.files.keys().cloned().collect()
    }

    /// Atomically replaces a file's block list with the canonical merge
    /// result, installing `new_version` on success. Stale updates (version
    /// not above the current one) are rejected so versions only move
    /// forward. Creates the metadata if this replica never saw the file.
    pub async fn merge(&self, name: &str, canonical: Vec<Block>, new_version: u32) -> bool {
        let mut inner = self.inner.write().await;
        let mut metadata = match inner.files.get(name) {
            Some(existing) => {
                if new_version <= existing.version {
                    tracing::debug!(
                        "ignoring stale merge of {} (version {} <= {})",
                        name,
                        new_version,
                        existing.version
                    );
                    return false;
                }
                existing.clone()
            }
            None => FileMetadata::named(name),
        };

        let old_ids = std::mem::take(&mut metadata.block_ids);
        let mut total_size = 0u64;
        for block in &canonical {
            total_size += block.size();
            metadata.block_ids.push(block.block_id);
            if !inner.blocks.contains_key(&block.block_id) {
                self.enqueue(PersistJob::WriteBlock {
                    block_id: block.block_id,
                    bytes: block.to_wire(),
                });
                inner.blocks.insert(block.block_id, block.clone());
            }
        }
        // Blocks the canonical order no longer references are unreachable.
        for old_id in old_ids {
            if !metadata.block_ids.contains(&old_id) {
                inner.blocks.remove(&old_id);
                self.enqueue(PersistJob::DeleteBlock { block_id: old_id });
            }
        }

        metadata.total_size = total_size;
        metadata.version = new_version;
        metadata.last_modified_ms = now_ms();
        if metadata.created_ms == 0 {
            metadata.created_ms = metadata.last_modified_ms;
        }
        self.enqueue(PersistJob::WriteMetadata {
            name: name.to_string(),
            bytes: metadata.to_wire(),
        });
        inner.files.insert(name.to_string(), metadata);
        true
    }

    /// Bulk install of a complete file, used for repair and initial
    /// replication. Overwrites whatever was present.
    pub async fn store(&self, metadata: FileMetadata, blocks: Vec<Block>) -> bool {
        let mut inner = self.inner.write().await;
        self.enqueue(PersistJob::WriteMetadata {
            name: metadata.name.clone(),
            bytes: metadata.to_wire(),
        });
        for block in blocks {
            self.enqueue(PersistJob::WriteBlock {
                block_id: block.block_id,
                bytes: block.to_wire(),
            });
            inner.blocks.insert(block.block_id, block);
        }
        inner.files.insert(metadata.name.clone(), metadata);
        true
    }

    /// Removes a file and every block it references.
    pub async fn delete(&self, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(metadata) = inner.files.remove(name) else {
            return false;
        };
        for block_id in metadata.block_ids {
            inner.blocks.remove(&block_id);
            self.enqueue(PersistJob::DeleteBlock { block_id });
        }
        self.enqueue(PersistJob::DeleteMetadata {
            name: name.to_string(),
        });
        true
    }

    /// Drops every file and block, on disk too. Used when a node rejoins
    /// and must not serve state from its previous incarnation.
    pub async fn clear_all(&self) {
        let mut inner = self.inner.write().await;
        inner.files.clear();
        inner.blocks.clear();
        self.enqueue(PersistJob::Purge);
    }
}

async fn persistence_writer(dir: PathBuf, mut rx: mpsc::UnboundedReceiver<PersistJob>) {
    while let Some(job) = rx.recv().await {
        if let Err(e) = apply_job(&dir, job).await {
            tracing::warn!("persistence write failed: {}", e);
        }
    }
    tracing::debug!("persistence writer for {} stopped", dir.display());
}

async fn apply_job(dir: &Path, job: PersistJob) -> Result<()> {
    match job {
        PersistJob::WriteMetadata { name, bytes } => {
            tokio::fs::write(dir.join("metadata").join(format!("{name}.meta")), bytes).await?;
        }
        PersistJob::WriteBlock { block_id, bytes } => {
            tokio::fs::write(dir.join("blocks").join(format!("{block_id}.blk")), bytes).await?;
        }
        PersistJob::DeleteMetadata { name } => {
            let _ = tokio::fs::remove_file(dir.join("metadata").join(format!("{name}.meta"))).await;
        }
        PersistJob::DeleteBlock { block_id } => {
            let _ =
                tokio::fs::remove_file(dir.join("blocks").join(format!("{block_id}.blk"))).await;
        }
        PersistJob::Purge => {
            let _ = tokio::fs::remove_dir_all(dir.join("metadata")).await;
            let _ = tokio::fs::remove_dir_all(dir.join("blocks")).await;
            tokio::fs::create_dir_all(dir.join("metadata")).await?;
            tokio::fs::create_dir_all(dir.join("blocks")).await?;
        }
        PersistJob::Flush(ack) => {
            let _ = ack.send(());
        }
    }
    Ok(())
}
