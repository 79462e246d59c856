//! File-plane message catalogue.
//!
//! Every request, response and replication message is a struct with a
//! deterministic body encoding built from the primitives in `codec`, plus a
//! one-byte discriminant. Discriminants at and above 100 belong to the file
//! plane; values below that are membership traffic (see `router`).
//!
//! `FileMessage` is the dispatch enum: `decode` turns a discriminant and a
//! body into exactly one typed message or a `WireError`, so the router never
//! has to guess.

use super::codec::{ByteReader, ByteWriter, WireError};
use crate::storage::types::{Block, FileMetadata};

/// One-byte discriminant for every file-plane message.
///
/// Values below [`FILE_PLANE_THRESHOLD`](crate::router::FILE_PLANE_THRESHOLD)
/// are reserved for the membership engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileMessageKind {
    CreateRequest = 100,
    CreateResponse = 101,
    GetRequest = 102,
    GetResponse = 103,
    AppendRequest = 104,
    AppendResponse = 105,
    MergeRequest = 106,
    MergeResponse = 107,
    ReplicateFile = 108,
    ReplicateBlock = 109,
    ReplicateAck = 110,
    LsRequest = 111,
    LsResponse = 112,
    ListStoreRequest = 113,
    ListStoreResponse = 114,
    FileExistsRequest = 115,
    FileExistsResponse = 116,
    CollectBlocksRequest = 117,
    CollectBlocksResponse = 118,
    MergeUpdate = 119,
    MergeUpdateAck = 120,
    TransferFiles = 121,
    DeleteFile = 122,
    ErrorFileExists = 123,
    ErrorFileNotFound = 124,
    ErrorReplicaUnavailable = 125,
}

impl TryFrom<u8> for FileMessageKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, WireError> {
        use FileMessageKind::*;
        Ok(match value {
            100 => CreateRequest,
            101 => CreateResponse,
            102 => GetRequest,
            103 => GetResponse,
            104 => AppendRequest,
            105 => AppendResponse,
            106 => MergeRequest,
            107 => MergeResponse,
            108 => ReplicateFile,
            109 => ReplicateBlock,
            110 => ReplicateAck,
            111 => LsRequest,
            112 => LsResponse,
            113 => ListStoreRequest,
            114 => ListStoreResponse,
            115 => FileExistsRequest,
            116 => FileExistsResponse,
            117 => CollectBlocksRequest,
            118 => CollectBlocksResponse,
            119 => MergeUpdate,
            120 => MergeUpdateAck,
            121 => TransferFiles,
            122 => DeleteFile,
            123 => ErrorFileExists,
            124 => ErrorFileNotFound,
            125 => ErrorReplicaUnavailable,
            other => return Err(WireError::UnknownDiscriminant(other)),
        })
    }
}

// --- Recursive entity encodings ---

impl Block {
    pub(crate) fn encode_body(&self, w: &mut ByteWriter) {
        w.put_u64(self.block_id);
        w.put_str(&self.client_id);
        w.put_u32(self.sequence_num);
        w.put_u64(self.timestamp_ms);
        w.put_u32(self.data.len() as u32);
        w.put_raw(&self.data);
    }

    pub(crate) fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let block_id = r.get_u64("block.block_id")?;
        let client_id = r.get_str("block.client_id")?;
        let sequence_num = r.get_u32("block.sequence_num")?;
        let timestamp_ms = r.get_u64("block.timestamp_ms")?;
        let size = r.get_u32("block.size")? as usize;
        let data = r.get_raw(size, "block.data")?;
        Ok(Self {
            block_id,
            client_id,
            sequence_num,
            timestamp_ms,
            data,
        })
    }

    /// Standalone encoding, as persisted in `<storage_dir>/blocks/<id>.blk`.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode_body(&mut w);
        w.into_bytes()
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, WireError> {
        Self::decode_body(&mut ByteReader::new(buf))
    }
}

impl FileMetadata {
    pub(crate) fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.name);
        w.put_u64(self.file_id);
        w.put_u64(self.total_size);
        w.put_u32(self.version);
        w.put_u64(self.created_ms);
        w.put_u64(self.last_modified_ms);
        w.put_u32(self.block_ids.len() as u32);
        for id in &self.block_ids {
            w.put_u64(*id);
        }
    }

    pub(crate) fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let name = r.get_str("metadata.name")?;
        let file_id = r.get_u64("metadata.file_id")?;
        let total_size = r.get_u64("metadata.total_size")?;
        let version = r.get_u32("metadata.version")?;
        let created_ms = r.get_u64("metadata.created_ms")?;
        let last_modified_ms = r.get_u64("metadata.last_modified_ms")?;
        let count = r.get_u32("metadata.block_count")? as usize;
        let mut block_ids = Vec::with_capacity(count.min(r.remaining() / 8));
        for _ in 0..count {
            block_ids.push(r.get_u64("metadata.block_ids")?);
        }
        Ok(Self {
            name,
            file_id,
            total_size,
            block_ids,
            version,
            created_ms,
            last_modified_ms,
        })
    }

    /// Standalone encoding, as persisted in `<storage_dir>/metadata/<name>.meta`.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode_body(&mut w);
        w.into_bytes()
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, WireError> {
        Self::decode_body(&mut ByteReader::new(buf))
    }
}

fn put_bool(w: &mut ByteWriter, v: bool) {
    w.put_u8(if v { 1 } else { 0 });
}

fn get_bool(r: &mut ByteReader<'_>, what: &'static str) -> Result<bool, WireError> {
    Ok(r.get_u8(what)? != 0)
}

fn put_blocks(w: &mut ByteWriter, blocks: &[Block]) {
    w.put_u32(blocks.len() as u32);
    for block in blocks {
        block.encode_body(w);
    }
}

fn get_blocks(r: &mut ByteReader<'_>, what: &'static str) -> Result<Vec<Block>, WireError> {
    let count = r.get_u32(what)? as usize;
    let mut blocks = Vec::new();
    for _ in 0..count {
        blocks.push(Block::decode_body(r)?);
    }
    Ok(blocks)
}

// --- Message bodies ---

/// Asks a replica to install a brand-new file.
///
/// Carries the initial block's timestamp so every replica derives the exact
/// same block id; otherwise each would mint its own and a later merge would
/// duplicate the create payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFileRequest {
    pub hydfs_name: String,
    pub local_name: String,
    pub client_id: u64,
    pub data: Vec<u8>,
    pub timestamp_ms: u64,
}

impl CreateFileRequest {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_str(&self.local_name);
        w.put_u64(self.client_id);
        w.put_bytes(&self.data);
        w.put_u64(self.timestamp_ms);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("create.hydfs_name")?,
            local_name: r.get_str("create.local_name")?,
            client_id: r.get_u64("create.client_id")?,
            data: r.get_bytes("create.data")?,
            timestamp_ms: r.get_u64("create.timestamp_ms")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFileResponse {
    pub success: bool,
    pub error: String,
    pub file_id: u64,
}

impl CreateFileResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        put_bool(w, self.success);
        w.put_str(&self.error);
        w.put_u64(self.file_id);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            success: get_bool(r, "create_resp.success")?,
            error: r.get_str("create_resp.error")?,
            file_id: r.get_u64("create_resp.file_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFileRequest {
    pub hydfs_name: String,
    pub local_name: String,
    pub client_id: u64,
    pub last_known_sequence: u32,
}

impl GetFileRequest {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_str(&self.local_name);
        w.put_u64(self.client_id);
        w.put_u32(self.last_known_sequence);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("get.hydfs_name")?,
            local_name: r.get_str("get.local_name")?,
            client_id: r.get_u64("get.client_id")?,
            last_known_sequence: r.get_u32("get.last_known_sequence")?,
        })
    }
}

/// On failure `metadata` is a shell carrying only the file name, so the
/// requester can still match the reply to its pending get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFileResponse {
    pub success: bool,
    pub error: String,
    pub metadata: FileMetadata,
    pub blocks: Vec<Block>,
}

impl GetFileResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        put_bool(w, self.success);
        w.put_str(&self.error);
        self.metadata.encode_body(w);
        put_blocks(w, &self.blocks);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            success: get_bool(r, "get_resp.success")?,
            error: r.get_str("get_resp.error")?,
            metadata: FileMetadata::decode_body(r)?,
            blocks: get_blocks(r, "get_resp.block_count")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendFileRequest {
    pub hydfs_name: String,
    pub local_name: String,
    pub client_id: u64,
    pub sequence_num: u32,
    pub data: Vec<u8>,
}

impl AppendFileRequest {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_str(&self.local_name);
        w.put_u64(self.client_id);
        w.put_u32(self.sequence_num);
        w.put_bytes(&self.data);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("append.hydfs_name")?,
            local_name: r.get_str("append.local_name")?,
            client_id: r.get_u64("append.client_id")?,
            sequence_num: r.get_u32("append.sequence_num")?,
            data: r.get_bytes("append.data")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendFileResponse {
    pub success: bool,
    pub error: String,
    pub block_id: u64,
}

impl AppendFileResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        put_bool(w, self.success);
        w.put_str(&self.error);
        w.put_u64(self.block_id);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            success: get_bool(r, "append_resp.success")?,
            error: r.get_str("append_resp.error")?,
            block_id: r.get_u64("append_resp.block_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFileRequest {
    pub hydfs_name: String,
}

impl MergeFileRequest {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("merge.hydfs_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFileResponse {
    pub success: bool,
    pub error: String,
    pub new_version: u32,
}

impl MergeFileResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        put_bool(w, self.success);
        w.put_str(&self.error);
        w.put_u32(self.new_version);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            success: get_bool(r, "merge_resp.success")?,
            error: r.get_str("merge_resp.error")?,
            new_version: r.get_u32("merge_resp.new_version")?,
        })
    }
}

/// Whole-file payload: metadata plus every block it references. Used by
/// `REPLICATE_FILE` for single-file repair and by `TRANSFER_FILES` in bulk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBundle {
    pub metadata: FileMetadata,
    pub blocks: Vec<Block>,
}

impl FileBundle {
    fn encode_body(&self, w: &mut ByteWriter) {
        self.metadata.encode_body(w);
        put_blocks(w, &self.blocks);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            metadata: FileMetadata::decode_body(r)?,
            blocks: get_blocks(r, "bundle.block_count")?,
        })
    }
}

/// Carries one block to a replica. `REPLICATE_ACK` echoes the same body back
/// so the coordinator can tell which block was installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateBlockMessage {
    pub hydfs_name: String,
    pub block: Block,
}

impl ReplicateBlockMessage {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        self.block.encode_body(w);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("replicate.hydfs_name")?,
            block: Block::decode_body(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsFileRequest {
    pub hydfs_name: String,
}

impl LsFileRequest {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("ls.hydfs_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsEntry {
    pub address: String,
    pub ring_position: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsFileResponse {
    pub success: bool,
    pub error: String,
    pub file_id: u64,
    pub entries: Vec<LsEntry>,
}

impl LsFileResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        put_bool(w, self.success);
        w.put_str(&self.error);
        w.put_u64(self.file_id);
        w.put_u32(self.entries.len() as u32);
        for entry in &self.entries {
            w.put_str(&entry.address);
            w.put_u64(entry.ring_position);
        }
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let success = get_bool(r, "ls_resp.success")?;
        let error = r.get_str("ls_resp.error")?;
        let file_id = r.get_u64("ls_resp.file_id")?;
        let count = r.get_u32("ls_resp.count")? as usize;
        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(LsEntry {
                address: r.get_str("ls_resp.address")?,
                ring_position: r.get_u64("ls_resp.ring_position")?,
            });
        }
        Ok(Self {
            success,
            error,
            file_id,
            entries,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListStoreRequest {}

impl ListStoreRequest {
    fn encode_body(&self, _w: &mut ByteWriter) {}

    fn decode_body(_r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {})
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub file_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListStoreResponse {
    pub files: Vec<StoredFile>,
}

impl ListStoreResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_u32(self.files.len() as u32);
        for file in &self.files {
            w.put_str(&file.name);
            w.put_u64(file.file_id);
        }
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let count = r.get_u32("liststore_resp.count")? as usize;
        let mut files = Vec::new();
        for _ in 0..count {
            files.push(StoredFile {
                name: r.get_str("liststore_resp.name")?,
                file_id: r.get_u64("liststore_resp.file_id")?,
            });
        }
        Ok(Self { files })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExistsRequest {
    pub hydfs_name: String,
    pub requester_id: String,
}

impl FileExistsRequest {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_str(&self.requester_id);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("exists.hydfs_name")?,
            requester_id: r.get_str("exists.requester_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExistsResponse {
    pub hydfs_name: String,
    pub exists: bool,
    pub file_id: u64,
    pub file_size: u64,
    pub version: u32,
}

impl FileExistsResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        put_bool(w, self.exists);
        w.put_u64(self.file_id);
        w.put_u64(self.file_size);
        w.put_u32(self.version);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("exists_resp.hydfs_name")?,
            exists: get_bool(r, "exists_resp.exists")?,
            file_id: r.get_u64("exists_resp.file_id")?,
            file_size: r.get_u64("exists_resp.file_size")?,
            version: r.get_u32("exists_resp.version")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectBlocksRequest {
    pub hydfs_name: String,
}

impl CollectBlocksRequest {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("collect.hydfs_name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectBlocksResponse {
    pub hydfs_name: String,
    pub version: u32,
    pub blocks: Vec<Block>,
}

impl CollectBlocksResponse {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_u32(self.version);
        put_blocks(w, &self.blocks);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("collect_resp.hydfs_name")?,
            version: r.get_u32("collect_resp.version")?,
            blocks: get_blocks(r, "collect_resp.block_count")?,
        })
    }
}

/// Canonical block order decided by the merge coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeUpdateMessage {
    pub hydfs_name: String,
    pub block_ids: Vec<u64>,
    pub new_version: u32,
}

impl MergeUpdateMessage {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_u32(self.block_ids.len() as u32);
        for id in &self.block_ids {
            w.put_u64(*id);
        }
        w.put_u32(self.new_version);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let hydfs_name = r.get_str("merge_update.hydfs_name")?;
        let count = r.get_u32("merge_update.count")? as usize;
        let mut block_ids = Vec::with_capacity(count.min(r.remaining() / 8));
        for _ in 0..count {
            block_ids.push(r.get_u64("merge_update.block_ids")?);
        }
        let new_version = r.get_u32("merge_update.new_version")?;
        Ok(Self {
            hydfs_name,
            block_ids,
            new_version,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeUpdateAck {
    pub hydfs_name: String,
    pub version: u32,
}

impl MergeUpdateAck {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_u32(self.version);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("merge_ack.hydfs_name")?,
            version: r.get_u32("merge_ack.version")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFilesMessage {
    pub files: Vec<FileBundle>,
}

impl TransferFilesMessage {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_u32(self.files.len() as u32);
        for file in &self.files {
            file.encode_body(w);
        }
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        let count = r.get_u32("transfer.file_count")? as usize;
        let mut files = Vec::new();
        for _ in 0..count {
            files.push(FileBundle::decode_body(r)?);
        }
        Ok(Self { files })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFileMessage {
    pub hydfs_name: String,
}

impl DeleteFileMessage {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("delete.hydfs_name")?,
        })
    }
}

/// Shared body for the standalone error notifications (kinds 123-125).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub hydfs_name: String,
    pub detail: String,
}

impl ErrorMessage {
    fn encode_body(&self, w: &mut ByteWriter) {
        w.put_str(&self.hydfs_name);
        w.put_str(&self.detail);
    }

    fn decode_body(r: &mut ByteReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            hydfs_name: r.get_str("error.hydfs_name")?,
            detail: r.get_str("error.detail")?,
        })
    }
}

// --- Dispatch enum ---

/// Every file-plane message, tagged with its discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMessage {
    CreateRequest(CreateFileRequest),
    CreateResponse(CreateFileResponse),
    GetRequest(GetFileRequest),
    GetResponse(GetFileResponse),
    AppendRequest(AppendFileRequest),
    AppendResponse(AppendFileResponse),
    MergeRequest(MergeFileRequest),
    MergeResponse(MergeFileResponse),
    ReplicateFile(FileBundle),
    ReplicateBlock(ReplicateBlockMessage),
    ReplicateAck(ReplicateBlockMessage),
    LsRequest(LsFileRequest),
    LsResponse(LsFileResponse),
    ListStoreRequest(ListStoreRequest),
    ListStoreResponse(ListStoreResponse),
    FileExistsRequest(FileExistsRequest),
    FileExistsResponse(FileExistsResponse),
    CollectBlocksRequest(CollectBlocksRequest),
    CollectBlocksResponse(CollectBlocksResponse),
    MergeUpdate(MergeUpdateMessage),
    MergeUpdateAck(MergeUpdateAck),
    TransferFiles(TransferFilesMessage),
    DeleteFile(DeleteFileMessage),
    ErrorFileExists(ErrorMessage),
    ErrorFileNotFound(ErrorMessage),
    ErrorReplicaUnavailable(ErrorMessage),
}

impl FileMessage {
    pub fn kind(&self) -> FileMessageKind {
        use FileMessage::*;
        match self {
            CreateRequest(_) => FileMessageKind::CreateRequest,
            CreateResponse(_) => FileMessageKind::CreateResponse,
            GetRequest(_) => FileMessageKind::GetRequest,
            GetResponse(_) => FileMessageKind::GetResponse,
            AppendRequest(_) => FileMessageKind::AppendRequest,
            AppendResponse(_) => FileMessageKind::AppendResponse,
            MergeRequest(_) => FileMessageKind::MergeRequest,
            MergeResponse(_) => FileMessageKind::MergeResponse,
            ReplicateFile(_) => FileMessageKind::ReplicateFile,
            ReplicateBlock(_) => FileMessageKind::ReplicateBlock,
            ReplicateAck(_) => FileMessageKind::ReplicateAck,
            LsRequest(_) => FileMessageKind::LsRequest,
            LsResponse(_) => FileMessageKind::LsResponse,
            ListStoreRequest(_) => FileMessageKind::ListStoreRequest,
            ListStoreResponse(_) => FileMessageKind::ListStoreResponse,
            FileExistsRequest(_) => FileMessageKind::FileExistsRequest,
            FileExistsResponse(_) => FileMessageKind::FileExistsResponse,
            CollectBlocksRequest(_) => FileMessageKind::CollectBlocksRequest,
            CollectBlocksResponse(_) => FileMessageKind::CollectBlocksResponse,
            MergeUpdate(_) => FileMessageKind::MergeUpdate,
            MergeUpdateAck(_) => FileMessageKind::MergeUpdateAck,
            TransferFiles(_) => FileMessageKind::TransferFiles,
            DeleteFile(_) => FileMessageKind::DeleteFile,
            ErrorFileExists(_) => FileMessageKind::ErrorFileExists,
            ErrorFileNotFound(_) => FileMessageKind::ErrorFileNotFound,
            ErrorReplicaUnavailable(_) => FileMessageKind::ErrorReplicaUnavailable,
        }
    }

    /// Encodes the body without the discriminant; the transport prepends it.
    pub fn encode_body(&self) -> Result<Vec<u8>, WireError> {
        use FileMessage::*;
        let mut w = ByteWriter::new();
        match self {
            CreateRequest(m) => m.encode_body(&mut w),
            CreateResponse(m) => m.encode_body(&mut w),
            GetRequest(m) => m.encode_body(&mut w),
            GetResponse(m) => m.encode_body(&mut w),
            AppendRequest(m) => m.encode_body(&mut w),
            AppendResponse(m) => m.encode_body(&mut w),
            MergeRequest(m) => m.encode_body(&mut w),
            MergeResponse(m) => m.encode_body(&mut w),
            ReplicateFile(m) => m.encode_body(&mut w),
            ReplicateBlock(m) => m.encode_body(&mut w),
            ReplicateAck(m) => m.encode_body(&mut w),
            LsRequest(m) => m.encode_body(&mut w),
            LsResponse(m) => m.encode_body(&mut w),
            ListStoreRequest(m) => m.encode_body(&mut w),
            ListStoreResponse(m) => m.encode_body(&mut w),
            FileExistsRequest(m) => m.encode_body(&mut w),
            FileExistsResponse(m) => m.encode_body(&mut w),
            CollectBlocksRequest(m) => m.encode_body(&mut w),
            CollectBlocksResponse(m) => m.encode_body(&mut w),
            MergeUpdate(m) => m.encode_body(&mut w),
            MergeUpdateAck(m) => m.encode_body(&mut w),
            TransferFiles(m) => m.encode_body(&mut w),
            DeleteFile(m) => m.encode_body(&mut w),
            ErrorFileExists(m) => m.encode_body(&mut w),
            ErrorFileNotFound(m) => m.encode_body(&mut w),
            ErrorReplicaUnavailable(m) => m.encode_body(&mut w),
        }
        w.finish()
    }

    /// Decodes a received body against its discriminant byte.
    pub fn decode(kind: u8, body: &[u8]) -> Result<Self, WireError> {
        let kind = FileMessageKind::try_from(kind)?;
        let r = &mut ByteReader::new(body);
        Ok(match kind {
            FileMessageKind::CreateRequest => {
                FileMessage::CreateRequest(CreateFileRequest::decode_body(r)?)
            }
            FileMessageKind::CreateResponse => {
                FileMessage::CreateResponse(CreateFileResponse::decode_body(r)?)
            }
            FileMessageKind::GetRequest => FileMessage::GetRequest(GetFileRequest::decode_body(r)?),
            FileMessageKind::GetResponse => {
                FileMessage::GetResponse(GetFileResponse::decode_body(r)?)
            }
            FileMessageKind::AppendRequest => {
                FileMessage::AppendRequest(AppendFileRequest::decode_body(r)?)
            }
            FileMessageKind::AppendResponse => {
                FileMessage::AppendResponse(AppendFileResponse::decode_body(r)?)
            }
            FileMessageKind::MergeRequest => {
                FileMessage::MergeRequest(MergeFileRequest::decode_body(r)?)
            }
            FileMessageKind::MergeResponse => {
                FileMessage::MergeResponse(MergeFileResponse::decode_body(r)?)
            }
            FileMessageKind::ReplicateFile => {
                FileMessage::ReplicateFile(FileBundle::decode_body(r)?)
            }
            FileMessageKind::ReplicateBlock => {
                FileMessage::ReplicateBlock(ReplicateBlockMessage::decode_body(r)?)
            }
            FileMessageKind::ReplicateAck => {
                FileMessage::ReplicateAck(ReplicateBlockMessage::decode_body(r)?)
            }
            FileMessageKind::LsRequest => FileMessage::LsRequest(LsFileRequest::decode_body(r)?),
            FileMessageKind::LsResponse => FileMessage::LsResponse(LsFileResponse::decode_body(r)?),
            FileMessageKind::ListStoreRequest => {
                FileMessage::ListStoreRequest(ListStoreRequest::decode_body(r)?)
            }
            FileMessageKind::ListStoreResponse => {
                FileMessage::ListStoreResponse(ListStoreResponse::decode_body(r)?)
            }
            FileMessageKind::FileExistsRequest => {
                FileMessage::FileExistsRequest(FileExistsRequest::decode_body(r)?)
            }
            FileMessageKind::FileExistsResponse => {
                FileMessage::FileExistsResponse(FileExistsResponse::decode_body(r)?)
            }
            FileMessageKind::CollectBlocksRequest => {
                FileMessage::CollectBlocksRequest(CollectBlocksRequest::decode_body(r)?)
            }
            FileMessageKind::CollectBlocksResponse => {
                FileMessage::CollectBlocksResponse(CollectBlocksResponse::decode_body(r)?)
            }
            FileMessageKind::MergeUpdate => {
                FileMessage::MergeUpdate(MergeUpdateMessage::decode_body(r)?)
            }
            FileMessageKind::MergeUpdateAck => {
                FileMessage::MergeUpdateAck(MergeUpdateAck::decode_body(r)?)
            }
            FileMessageKind::TransferFiles => {
                FileMessage::TransferFiles(TransferFilesMessage::decode_body(r)?)
            }
            FileMessageKind::DeleteFile => {
                FileMessage::DeleteFile(DeleteFileMessage::decode_body(r)?)
            }
            FileMessageKind::ErrorFileExists => {
                FileMessage::ErrorFileExists(ErrorMessage::decode_body(r)?)
            }
            FileMessageKind::ErrorFileNotFound => {
                FileMessage::ErrorFileNotFound(ErrorMessage::decode_body(r)?)
            }
            FileMessageKind::ErrorReplicaUnavailable => {
                FileMessage::ErrorReplicaUnavailable(ErrorMessage::decode_body(r)?)
            }
        })
    }
}
