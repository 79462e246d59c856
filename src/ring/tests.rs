//! Hash Ring Tests
//!
//! Validates placement: deterministic positions, distinct successor sets,
//! wrap-around traversal, and coordinator selection.

#[cfg(test)]
mod tests {
    use crate::ring::HashRing;
    use crate::ring::view::{RingAdapter, RingView};
    use crate::storage::types::NodeId;
    use std::sync::Arc;

    fn node(port: u16) -> NodeId {
        NodeId::with_epoch("10.0.0.1", port, 1_700_000_000)
    }

    #[test]
    fn test_positions_are_deterministic() {
        let n = node(5000);
        assert_eq!(HashRing::position_of(&n), HashRing::position_of(&n));
        assert_eq!(
            HashRing::file_position("notes.txt"),
            HashRing::file_position("notes.txt")
        );
    }

    #[test]
    fn test_rejoined_node_gets_a_new_position() {
        let old = NodeId::with_epoch("10.0.0.1", 5000, 1_700_000_000);
        let new = NodeId::with_epoch("10.0.0.1", 5000, 1_700_000_100);
        assert_ne!(HashRing::position_of(&old), HashRing::position_of(&new));
    }

    #[test]
    fn test_add_remove_contains() {
        let ring = HashRing::new();
        assert!(ring.is_empty());

        let n = node(5000);
        ring.add(n.clone());
        assert_eq!(ring.len(), 1);
        assert!(ring.contains(&n));

        // Removing a node that never joined is a no-op.
        ring.remove(&node(6000));
        assert_eq!(ring.len(), 1);

        ring.remove(&n);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_successors_are_distinct_and_bounded() {
        let ring = HashRing::new();
        for port in 5000..5005 {
            ring.add(node(port));
        }

        let successors = ring.successors(0, 3);
        assert_eq!(successors.len(), 3);
        for i in 0..successors.len() {
            for j in (i + 1)..successors.len() {
                assert_ne!(successors[i], successors[j], "successors must be distinct");
            }
        }

        // Asking for more than the ring holds returns every node once.
        assert_eq!(ring.successors(0, 10).len(), 5);
    }

    #[test]
    fn test_successors_wrap_around() {
        let ring = HashRing::new();
        for port in 5000..5004 {
            ring.add(node(port));
        }
        // Starting past the last position must wrap to the first entry.
        let entries = ring.entries();
        let last_position = entries.last().unwrap().0;
        let wrapped = ring.successors(last_position + 1, 1);
        assert_eq!(wrapped[0], entries[0].1);
    }

    #[test]
    fn test_replicas_start_at_first_node_at_or_after_file_position() {
        let ring = HashRing::new();
        for port in 5000..5008 {
            ring.add(node(port));
        }
        for name in ["a.txt", "b.txt", "notes.txt", "H", "K"] {
            let position = HashRing::file_position(name);
            let entries = ring.entries();
            let expected = entries
                .iter()
                .find(|(p, _)| *p >= position)
                .map(|(_, n)| n.clone())
                .unwrap_or_else(|| entries[0].1.clone());
            assert_eq!(
                ring.replicas(name, 3)[0],
                expected,
                "coordinator of {name} must be the first node at or after its position"
            );
        }
    }

    #[test]
    fn test_replica_set_is_identical_regardless_of_insertion_order() {
        let forward = HashRing::new();
        for port in 5000..5006 {
            forward.add(node(port));
        }
        let backward = HashRing::new();
        for port in (5000..5006).rev() {
            backward.add(node(port));
        }
        for name in ["x", "y", "z.txt"] {
            assert_eq!(forward.replicas(name, 3), backward.replicas(name, 3));
        }
    }

    #[test]
    fn test_empty_ring_yields_no_replicas() {
        let ring = HashRing::new();
        assert!(ring.replicas("anything", 3).is_empty());
        assert!(ring.successors(12345, 1).is_empty());
    }

    #[test]
    fn test_ring_adapter_applies_membership_events() {
        let ring = Arc::new(HashRing::new());
        let adapter = RingAdapter::new(ring.clone());

        let n = node(7000);
        adapter.node_joined(&n);
        assert!(ring.contains(&n));

        adapter.node_left(&n);
        assert!(!ring.contains(&n));
    }
}
