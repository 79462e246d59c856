//! Wire Codec Tests
//!
//! Validates the datagram serialization layer.
//!
//! ## Test Scopes
//! - **Round-trips**: `decode(encode(m)) = m` for every message type.
//! - **Byte layout**: integers are big-endian, strings are u32-length
//!   prefixed, so the encoding is stable across hosts.
//! - **Failure paths**: truncated bodies, invalid utf-8, oversized payloads
//!   and unknown discriminants are rejected, never panicked on.

#[cfg(test)]
mod tests {
    use crate::storage::types::{Block, FileMetadata};
    use crate::wire::codec::{ByteReader, ByteWriter, MAX_DATAGRAM, WireError};
    use crate::wire::messages::*;

    fn sample_block(client: &str, seq: u32, data: &[u8]) -> Block {
        Block::new(client.to_string(), seq, 1_700_000_000_000 + seq as u64, data.to_vec())
    }

    fn sample_metadata(name: &str, block_ids: Vec<u64>) -> FileMetadata {
        FileMetadata {
            name: name.to_string(),
            file_id: FileMetadata::generate_file_id(name),
            total_size: 42,
            block_ids,
            version: 3,
            created_ms: 1_700_000_000_000,
            last_modified_ms: 1_700_000_000_500,
        }
    }

    fn roundtrip(msg: FileMessage) {
        let body = msg.encode_body().expect("message should encode");
        let decoded =
            FileMessage::decode(msg.kind() as u8, &body).expect("message should decode");
        assert_eq!(msg, decoded);
    }

    // ============================================================
    // ROUND-TRIP TESTS (one per message type)
    // ============================================================

    #[test]
    fn test_roundtrip_create_request() {
        roundtrip(FileMessage::CreateRequest(CreateFileRequest {
            hydfs_name: "notes.txt".into(),
            local_name: "local.txt".into(),
            client_id: 0xDEAD_BEEF_CAFE,
            data: b"hello world".to_vec(),
            timestamp_ms: 1_700_000_000_123,
        }));
    }

    #[test]
    fn test_roundtrip_create_response() {
        roundtrip(FileMessage::CreateResponse(CreateFileResponse {
            success: false,
            error: "file already exists".into(),
            file_id: 99,
        }));
    }

    #[test]
    fn test_roundtrip_get_request() {
        roundtrip(FileMessage::GetRequest(GetFileRequest {
            hydfs_name: "notes.txt".into(),
            local_name: "out.txt".into(),
            client_id: 7,
            last_known_sequence: 4,
        }));
    }

    #[test]
    fn test_roundtrip_get_response() {
        let blocks = vec![sample_block("c1", 0, b"hi\n"), sample_block("c1", 1, b"more\n")];
        let ids: Vec<u64> = blocks.iter().map(|b| b.block_id).collect();
        roundtrip(FileMessage::GetResponse(GetFileResponse {
            success: true,
            error: String::new(),
            metadata: sample_metadata("notes.txt", ids),
            blocks,
        }));
    }

    #[test]
    fn test_roundtrip_get_response_failure() {
        roundtrip(FileMessage::GetResponse(GetFileResponse {
            success: false,
            error: "file not found".into(),
            metadata: FileMetadata::named("missing.txt"),
            blocks: Vec::new(),
        }));
    }

    #[test]
    fn test_roundtrip_append_request() {
        roundtrip(FileMessage::AppendRequest(AppendFileRequest {
            hydfs_name: "notes.txt".into(),
            local_name: "chunk.txt".into(),
            client_id: 12,
            sequence_num: 9,
            data: vec![0u8, 1, 2, 255],
        }));
    }

    #[test]
    fn test_roundtrip_append_response() {
        roundtrip(FileMessage::AppendResponse(AppendFileResponse {
            success: true,
            error: String::new(),
            block_id: u64::MAX,
        }));
    }

    #[test]
    fn test_roundtrip_merge_request_and_response() {
        roundtrip(FileMessage::MergeRequest(MergeFileRequest {
            hydfs_name: "notes.txt".into(),
        }));
        roundtrip(FileMessage::MergeResponse(MergeFileResponse {
            success: true,
            error: String::new(),
            new_version: 17,
        }));
    }

    #[test]
    fn test_roundtrip_replicate_block_and_ack() {
        let msg = ReplicateBlockMessage {
            hydfs_name: "notes.txt".into(),
            block: sample_block("c2", 5, b"payload"),
        };
        roundtrip(FileMessage::ReplicateBlock(msg.clone()));
        roundtrip(FileMessage::ReplicateAck(msg));
    }

    #[test]
    fn test_roundtrip_replicate_file_and_transfer() {
        let blocks = vec![sample_block("c1", 0, b"a"), sample_block("c1", 1, b"b")];
        let ids: Vec<u64> = blocks.iter().map(|b| b.block_id).collect();
        let bundle = FileBundle {
            metadata: sample_metadata("bundle.txt", ids),
            blocks,
        };
        roundtrip(FileMessage::ReplicateFile(bundle.clone()));
        roundtrip(FileMessage::TransferFiles(TransferFilesMessage {
            files: vec![bundle.clone(), bundle],
        }));
    }

    #[test]
    fn test_roundtrip_ls_messages() {
        roundtrip(FileMessage::LsRequest(LsFileRequest {
            hydfs_name: "notes.txt".into(),
        }));
        roundtrip(FileMessage::LsResponse(LsFileResponse {
            success: true,
            error: String::new(),
            file_id: 5,
            entries: vec![
                LsEntry {
                    address: "10.0.0.1:12345".into(),
                    ring_position: 111,
                },
                LsEntry {
                    address: "10.0.0.2:12346".into(),
                    ring_position: 222,
                },
            ],
        }));
    }

    #[test]
    fn test_roundtrip_liststore_messages() {
        roundtrip(FileMessage::ListStoreRequest(ListStoreRequest {}));
        roundtrip(FileMessage::ListStoreResponse(ListStoreResponse {
            files: vec![
                StoredFile {
                    name: "a.txt".into(),
                    file_id: 1,
                },
                StoredFile {
                    name: "b.txt".into(),
                    file_id: 2,
                },
            ],
        }));
    }

    #[test]
    fn test_roundtrip_file_exists_messages() {
        roundtrip(FileMessage::FileExistsRequest(FileExistsRequest {
            hydfs_name: "notes.txt".into(),
            requester_id: "host:1234:99".into(),
        }));
        roundtrip(FileMessage::FileExistsResponse(FileExistsResponse {
            hydfs_name: "notes.txt".into(),
            exists: true,
            file_id: 5,
            file_size: 1024,
            version: 7,
        }));
    }

    #[test]
    fn test_roundtrip_collect_messages() {
        roundtrip(FileMessage::CollectBlocksRequest(CollectBlocksRequest {
            hydfs_name: "notes.txt".into(),
        }));
        roundtrip(FileMessage::CollectBlocksResponse(CollectBlocksResponse {
            hydfs_name: "notes.txt".into(),
            version: 6,
            blocks: vec![sample_block("c3", 2, b"xyz")],
        }));
    }

    #[test]
    fn test_roundtrip_merge_update_messages() {
        roundtrip(FileMessage::MergeUpdate(MergeUpdateMessage {
            hydfs_name: "notes.txt".into(),
            block_ids: vec![3, 1, 4, 1_000_000],
            new_version: 8,
        }));
        roundtrip(FileMessage::MergeUpdateAck(MergeUpdateAck {
            hydfs_name: "notes.txt".into(),
            version: 8,
        }));
    }

    #[test]
    fn test_roundtrip_delete_and_errors() {
        roundtrip(FileMessage::DeleteFile(DeleteFileMessage {
            hydfs_name: "notes.txt".into(),
        }));
        let err = ErrorMessage {
            hydfs_name: "notes.txt".into(),
            detail: "replica unavailable".into(),
        };
        roundtrip(FileMessage::ErrorFileExists(err.clone()));
        roundtrip(FileMessage::ErrorFileNotFound(err.clone()));
        roundtrip(FileMessage::ErrorReplicaUnavailable(err));
    }

    #[test]
    fn test_block_entity_roundtrip() {
        let block = sample_block("client-a", 3, b"block payload");
        let decoded = Block::from_wire(&block.to_wire()).expect("block should decode");
        assert_eq!(block, decoded);
    }

    #[test]
    fn test_metadata_entity_roundtrip() {
        let metadata = sample_metadata("notes.txt", vec![1, 2, 3]);
        let decoded =
            FileMetadata::from_wire(&metadata.to_wire()).expect("metadata should decode");
        assert_eq!(metadata, decoded);
    }

    // ============================================================
    // BYTE LAYOUT
    // ============================================================

    #[test]
    fn test_integers_are_big_endian() {
        let mut w = ByteWriter::new();
        w.put_u32(0x0102_0304);
        w.put_u64(0x0102_0304_0506_0708);
        let bytes = w.into_bytes();
        assert_eq!(bytes[..4], [1, 2, 3, 4]);
        assert_eq!(bytes[4..], [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_string_layout_is_length_prefixed() {
        let mut w = ByteWriter::new();
        w.put_str("ab");
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_byte_array_uses_u64_prefix() {
        let mut w = ByteWriter::new();
        w.put_bytes(b"xyz");
        let bytes = w.into_bytes();
        assert_eq!(bytes, [0, 0, 0, 0, 0, 0, 0, 3, b'x', b'y', b'z']);
    }

    // ============================================================
    // FAILURE PATHS
    // ============================================================

    #[test]
    fn test_truncated_body_is_rejected() {
        let msg = FileMessage::GetRequest(GetFileRequest {
            hydfs_name: "notes.txt".into(),
            local_name: "out.txt".into(),
            client_id: 7,
            last_known_sequence: 0,
        });
        let body = msg.encode_body().unwrap();
        for cut in [0, 1, body.len() / 2, body.len() - 1] {
            let result = FileMessage::decode(msg.kind() as u8, &body[..cut]);
            assert!(
                matches!(result, Err(WireError::Truncated(_))),
                "cut at {cut} should be a truncation error"
            );
        }
    }

    #[test]
    fn test_length_exceeding_buffer_is_rejected() {
        // A string claiming 1000 bytes with only 2 present.
        let mut w = ByteWriter::new();
        w.put_u32(1000);
        w.put_raw(b"ab");
        let body = w.into_bytes();
        let mut r = ByteReader::new(&body);
        assert!(matches!(r.get_str("field"), Err(WireError::Truncated(_))));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let mut w = ByteWriter::new();
        w.put_u32(2);
        w.put_raw(&[0xff, 0xfe]);
        let body = w.into_bytes();
        let result = FileMessage::decode(106, &body); // MERGE_REQUEST = str(name)
        assert!(matches!(result, Err(WireError::InvalidUtf8(_))));
    }

    #[test]
    fn test_unknown_discriminant_is_rejected() {
        for kind in [0u8, 99, 126, 255] {
            let result = FileMessage::decode(kind, &[]);
            assert!(
                matches!(result, Err(WireError::UnknownDiscriminant(k)) if k == kind),
                "kind {kind} should be unknown"
            );
        }
    }

    #[test]
    fn test_oversized_message_fails_to_encode() {
        let msg = FileMessage::CreateRequest(CreateFileRequest {
            hydfs_name: "big.bin".into(),
            local_name: "big.bin".into(),
            client_id: 1,
            data: vec![0u8; MAX_DATAGRAM],
            timestamp_ms: 0,
        });
        assert_eq!(msg.encode_body(), Err(WireError::BufferTooSmall));
    }

    #[test]
    fn test_discriminant_values_match_the_protocol() {
        assert_eq!(FileMessageKind::CreateRequest as u8, 100);
        assert_eq!(FileMessageKind::AppendRequest as u8, 104);
        assert_eq!(FileMessageKind::ReplicateBlock as u8, 109);
        assert_eq!(FileMessageKind::FileExistsRequest as u8, 115);
        assert_eq!(FileMessageKind::MergeUpdate as u8, 119);
        assert_eq!(FileMessageKind::ErrorReplicaUnavailable as u8, 125);
    }
}
