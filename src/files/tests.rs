//! File Operations Tests
//!
//! Validates the merge ordering rules and drives the full verb set across
//! real nodes wired together over loopback UDP.
//!
//! ## Test Scopes
//! - **Canonical order**: dedup by block id, `(client_id, sequence_num)`
//!   ordering with deterministic tiebreaks.
//! - **End-to-end**: create/append/get/merge across two live nodes with
//!   routers running, including read-my-writes gating and merge back-fill.
//! - **Router**: undecodable datagrams are dropped and counted, never fatal.

#[cfg(test)]
mod tests {
    use crate::files::service::{FileService, canonical_order};
    use crate::membership::MembershipService;
    use crate::net::UdpTransport;
    use crate::ring::{HashRing, RingAdapter};
    use crate::router::Router;
    use crate::storage::types::{Block, NodeId};
    use crate::storage::{ClientWriteTracker, FileStore};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    struct TestNode {
        local: NodeId,
        addr: SocketAddr,
        ring: Arc<HashRing>,
        store: Arc<FileStore>,
        tracker: Arc<ClientWriteTracker>,
        files: Arc<FileService>,
        router: Arc<Router>,
    }

    async fn spawn_node(replication: usize) -> TestNode {
        let transport = Arc::new(UdpTransport::bind("127.0.0.1:0", 0.0).await.unwrap());
        let addr = transport.local_addr().unwrap();
        let local = NodeId::new("127.0.0.1", addr.port());
        let ring = Arc::new(HashRing::new());
        let ring_view = RingAdapter::new(ring.clone());
        let store = FileStore::in_memory();
        let tracker = Arc::new(ClientWriteTracker::new());
        let membership = MembershipService::new(
            local.clone(),
            ("127.0.0.1".to_string(), 1),
            transport.clone(),
            ring_view,
        );
        let files = FileService::new(
            local.clone(),
            replication,
            ring.clone(),
            store.clone(),
            tracker.clone(),
            transport.clone(),
            None,
        );
        let router = Router::new(membership, files.clone(), transport);
        tokio::spawn(router.clone().run());
        TestNode {
            local,
            addr,
            ring,
            store,
            tracker,
            files,
            router,
        }
    }

    /// Gives every node the same complete ring view, standing in for a
    /// converged membership layer.
    fn link(nodes: &[&TestNode]) {
        for a in nodes {
            for b in nodes {
                a.ring.add(b.local.clone());
            }
        }
    }

    fn block(client: &str, seq: u32, ts: u64, data: &[u8]) -> Block {
        Block::new(client.to_string(), seq, ts, data.to_vec())
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    // ============================================================
    // CANONICAL ORDER
    // ============================================================

    #[test]
    fn test_canonical_order_dedups_by_block_id() {
        let b = block("c1", 0, 100, b"x");
        let merged = canonical_order(vec![b.clone(), b.clone(), b.clone()]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_canonical_order_sorts_by_client_then_sequence() {
        let merged = canonical_order(vec![
            block("bbb", 1, 100, b"b1"),
            block("aaa", 1, 200, b"a1"),
            block("bbb", 0, 300, b"b0"),
            block("aaa", 0, 400, b"a0"),
        ]);
        let order: Vec<(String, u32)> = merged
            .iter()
            .map(|b| (b.client_id.clone(), b.sequence_num))
            .collect();
        assert_eq!(
            order,
            vec![
                ("aaa".to_string(), 0),
                ("aaa".to_string(), 1),
                ("bbb".to_string(), 0),
                ("bbb".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_canonical_order_breaks_ties_by_timestamp() {
        // Same client and sequence from different replicas: earlier
        // timestamp first.
        let merged = canonical_order(vec![
            block("c1", 0, 900, b"late"),
            block("c1", 0, 100, b"early"),
        ]);
        assert_eq!(merged[0].data, b"early");
        assert_eq!(merged[1].data, b"late");
    }

    #[test]
    fn test_canonical_order_is_deterministic() {
        let blocks = vec![
            block("c2", 0, 10, b"1"),
            block("c1", 1, 20, b"2"),
            block("c1", 0, 30, b"3"),
        ];
        let mut reversed = blocks.clone();
        reversed.reverse();
        let a: Vec<u64> = canonical_order(blocks).iter().map(|b| b.block_id).collect();
        let b: Vec<u64> = canonical_order(reversed).iter().map(|b| b.block_id).collect();
        assert_eq!(a, b);
    }

    // ============================================================
    // END-TO-END: CREATE / GET
    // ============================================================

    #[tokio::test]
    async fn test_create_installs_identical_block_on_all_replicas() {
        let a = spawn_node(2).await;
        let b = spawn_node(2).await;
        link(&[&a, &b]);

        a.files.store_local_file("hello.txt", b"hi\n".to_vec());
        assert!(a.files.create("hello.txt", "H").await.unwrap());
        settle().await;

        assert!(a.store.has("H").await);
        assert!(b.store.has("H").await);
        let meta_a = a.store.metadata("H").await.unwrap();
        let meta_b = b.store.metadata("H").await.unwrap();
        assert_eq!(
            meta_a.block_ids, meta_b.block_ids,
            "both replicas must derive the same initial block id"
        );
        assert_eq!(b.store.get("H").await.unwrap(), b"hi\n");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let a = spawn_node(2).await;
        let b = spawn_node(2).await;
        link(&[&a, &b]);

        a.files.store_local_file("x1.txt", b"one".to_vec());
        a.files.store_local_file("x2.txt", b"two".to_vec());
        assert!(a.files.create("x1.txt", "D").await.unwrap());
        settle().await;
        assert!(!a.files.create("x2.txt", "D").await.unwrap());
        assert_eq!(a.store.get("D").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_get_fetches_from_remote_replica() {
        let a = spawn_node(1).await;
        let b = spawn_node(1).await;
        link(&[&a, &b]);

        // Find a name whose single replica is b, so a must fetch remotely.
        let name = (0..256)
            .map(|i| format!("remote{i}"))
            .find(|n| a.ring.replicas(n, 1)[0] == b.local)
            .expect("some name lands on b");

        a.files.store_local_file("src.txt", b"remote data\n".to_vec());
        assert!(a.files.create("src.txt", &name).await.unwrap());
        settle().await;
        assert!(b.store.has(&name).await);
        assert!(!a.store.has(&name).await);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let out_str = out.to_str().unwrap().to_string();
        assert!(a.files.get(&name, &out_str).await.unwrap());
        assert_eq!(std::fs::read(&out).unwrap(), b"remote data\n");
    }

    #[tokio::test]
    async fn test_get_of_missing_file_fails_without_creating_output() {
        let a = spawn_node(1).await;
        let b = spawn_node(1).await;
        link(&[&a, &b]);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("never.txt");
        let out_str = out.to_str().unwrap().to_string();
        assert!(!a.files.get("NOTHERE", &out_str).await.unwrap());
        assert!(!out.exists(), "a failed get must not create the local file");
    }

    // ============================================================
    // END-TO-END: APPEND
    // ============================================================

    #[tokio::test]
    async fn test_appends_from_one_client_stay_ordered() {
        let a = spawn_node(2).await;
        let b = spawn_node(2).await;
        link(&[&a, &b]);

        a.files.store_local_file("hello.txt", b"hi\n".to_vec());
        assert!(a.files.create("hello.txt", "H").await.unwrap());
        settle().await;

        a.files.store_local_file("a1.txt", b"A1\n".to_vec());
        a.files.store_local_file("a2.txt", b"A2\n".to_vec());
        assert!(a.files.append("a1.txt", "H").await.unwrap());
        assert!(a.files.append("a2.txt", "H").await.unwrap());
        settle().await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let out_str = out.to_str().unwrap().to_string();
        assert!(a.files.get("H", &out_str).await.unwrap());
        assert_eq!(std::fs::read(&out).unwrap(), b"hi\nA1\nA2\n");

        // Both replicas saw the appends.
        assert_eq!(b.store.get("H").await.unwrap(), b"hi\nA1\nA2\n");
    }

    #[tokio::test]
    async fn test_append_to_missing_file_is_refused() {
        let a = spawn_node(2).await;
        let b = spawn_node(2).await;
        link(&[&a, &b]);

        a.files.store_local_file("chunk.txt", b"data".to_vec());
        assert!(!a.files.append("chunk.txt", "GHOST").await.unwrap());
    }

    // ============================================================
    // END-TO-END: READ-MY-WRITES
    // ============================================================

    #[tokio::test]
    async fn test_get_refuses_copy_missing_own_appends() {
        let a = spawn_node(1).await;
        let b = spawn_node(1).await;
        link(&[&a, &b]);

        let name = (0..256)
            .map(|i| format!("rmw{i}"))
            .find(|n| a.ring.replicas(n, 1)[0] == b.local)
            .expect("some name lands on b");

        a.files.store_local_file("seed.txt", b"seed\n".to_vec());
        assert!(a.files.create("seed.txt", &name).await.unwrap());
        settle().await;

        // Pretend b acknowledged an append that its copy does not contain.
        a.tracker
            .record(&a.files.client_key(), &name, 0xBAD_B10C)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let out_str = out.to_str().unwrap().to_string();
        assert!(
            !a.files.get(&name, &out_str).await.unwrap(),
            "a copy missing an acknowledged append must be refused"
        );
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_appending_client_reads_its_own_appends() {
        let a = spawn_node(1).await;
        let b = spawn_node(1).await;
        link(&[&a, &b]);

        let name = (0..256)
            .map(|i| format!("own{i}"))
            .find(|n| a.ring.replicas(n, 1)[0] == b.local)
            .expect("some name lands on b");

        a.files.store_local_file("seed.txt", b"seed\n".to_vec());
        assert!(a.files.create("seed.txt", &name).await.unwrap());
        settle().await;
        a.files.store_local_file("more.txt", b"more\n".to_vec());
        assert!(a.files.append("more.txt", &name).await.unwrap());

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let out_str = out.to_str().unwrap().to_string();
        assert!(a.files.get(&name, &out_str).await.unwrap());
        assert_eq!(std::fs::read(&out).unwrap(), b"seed\nmore\n");
    }

    // ============================================================
    // END-TO-END: MERGE
    // ============================================================

    #[tokio::test]
    async fn test_merge_converges_diverged_replicas() {
        let a = spawn_node(2).await;
        let b = spawn_node(2).await;
        link(&[&a, &b]);

        a.files.store_local_file("hello.txt", b"hi\n".to_vec());
        assert!(a.files.create("hello.txt", "M").await.unwrap());
        settle().await;
        a.files.store_local_file("a1.txt", b"A1\n".to_vec());
        assert!(a.files.append("a1.txt", "M").await.unwrap());
        settle().await;

        // Divergence: a block only b knows about, as if replication to a
        // was lost.
        assert!(
            b.store
                .append("M", block("zzz-client", 0, 999_999, b"B1\n"))
                .await
        );

        assert!(a.files.merge("M").await.unwrap());
        tokio::time::sleep(Duration::from_millis(800)).await;

        let meta_a = a.store.metadata("M").await.unwrap();
        let meta_b = b.store.metadata("M").await.unwrap();
        assert_eq!(meta_a.block_ids, meta_b.block_ids);
        assert_eq!(meta_a.version, meta_b.version);
        assert_eq!(
            a.store.get("M").await.unwrap(),
            b.store.get("M").await.unwrap()
        );
        // The divergent block survived the merge on both sides.
        assert!(
            String::from_utf8(a.store.get("M").await.unwrap())
                .unwrap()
                .contains("B1")
        );
    }

    #[tokio::test]
    async fn test_merge_of_missing_file_fails() {
        let a = spawn_node(2).await;
        let b = spawn_node(2).await;
        link(&[&a, &b]);
        assert!(!a.files.merge("NOTHERE").await.unwrap());
    }

    // ============================================================
    // ROUTER
    // ============================================================

    #[tokio::test]
    async fn test_router_drops_unknown_discriminants() {
        let a = spawn_node(2).await;
        let probe = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        probe.send_to(&[200u8, 1, 2, 3], a.addr).await.unwrap();
        probe.send_to(&[126u8], a.addr).await.unwrap();
        settle().await;

        assert_eq!(a.router.dropped_count(), 2);
        // The node is still fully functional afterwards.
        a.files.store_local_file("ok.txt", b"ok".to_vec());
        assert!(a.files.create("ok.txt", "OK").await.unwrap());
    }

    #[tokio::test]
    async fn test_router_drops_truncated_file_messages() {
        let a = spawn_node(2).await;
        let probe = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // A CREATE_REQUEST discriminant with a body too short to decode.
        probe.send_to(&[100u8, 0, 0], a.addr).await.unwrap();
        settle().await;
        assert_eq!(a.router.dropped_count(), 1);
    }
}
