use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::Hasher;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of a node in the cluster.
///
/// The epoch (seconds at process start) makes a rejoined node distinct from
/// its prior incarnation: two `NodeId`s are equal only if host, port and
/// epoch all match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub host: String,
    pub port: u16,
    pub epoch: u32,
}

impl NodeId {
    /// Creates an identity for a node starting now.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            epoch: now_secs(),
        }
    }

    pub fn with_epoch(host: impl Into<String>, port: u16, epoch: u32) -> Self {
        Self {
            host: host.into(),
            port,
            epoch,
        }
    }

    /// The `host:port` endpoint this node receives datagrams on.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.epoch)
    }
}

/// Immutable unit of file data produced by one create or append call.
///
/// `block_id` is derived from `(client_id, timestamp_ms, sequence_num)`;
/// collisions are treated as application errors and rejected by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub block_id: u64,
    pub client_id: String,
    pub sequence_num: u32,
    pub timestamp_ms: u64,
    pub data: Vec<u8>,
}

impl Block {
    pub fn new(client_id: String, sequence_num: u32, timestamp_ms: u64, data: Vec<u8>) -> Self {
        let block_id = Self::generate_id(&client_id, timestamp_ms, sequence_num);
        Self {
            block_id,
            client_id,
            sequence_num,
            timestamp_ms,
            data,
        }
    }

    /// Derives the block id from the fields that make an append unique.
    pub fn generate_id(client_id: &str, timestamp_ms: u64, sequence_num: u32) -> u64 {
        let combined = format!("{client_id}{timestamp_ms}{sequence_num}");
        hash64(combined.as_bytes())
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Per-file metadata: the ordered block list plus bookkeeping.
///
/// `block_ids` is the canonical order in which blocks concatenate to form
/// the file. `version` strictly increases on every append or merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub file_id: u64,
    pub total_size: u64,
    pub block_ids: Vec<u64>,
    pub version: u32,
    pub created_ms: u64,
    pub last_modified_ms: u64,
}

impl FileMetadata {
    pub fn generate_file_id(name: &str) -> u64 {
        hash64(name.as_bytes())
    }

    /// Metadata shell carrying only a name, used by failure responses so the
    /// receiver can still match the reply to its pending request.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let file_id = Self::generate_file_id(&name);
        Self {
            name,
            file_id,
            total_size: 0,
            block_ids: Vec::new(),
            version: 0,
            created_ms: 0,
            last_modified_ms: 0,
        }
    }
}

/// Hashes raw bytes to a 64-bit value.
///
/// `DefaultHasher::new()` uses fixed keys, so the mapping is identical on
/// every node running the same binary. Well-distributed is all placement
/// needs; this is not a cryptographic hash.
pub fn hash64(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(data);
    hasher.finish()
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}
