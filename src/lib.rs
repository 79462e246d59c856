//! HyDFS - Distributed Append-Structured File Store
//!
//! This library crate defines the core modules that make up the file store.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems:
//!
//! - **`ring`**: Consistent-hash placement. Maps nodes and filenames to 64-bit
//!   ring positions and enumerates the replica set (the N distinct successors)
//!   of any file. The `RingView` trait bridges membership events into the ring.
//! - **`storage`**: The block-structured local store. Every file is an ordered
//!   sequence of immutable blocks; creates and appends each produce one block.
//!   Also tracks per-client acknowledged appends for read-my-writes reads.
//! - **`wire`**: The datagram codec. Length-prefixed, big-endian encoding of
//!   every file-plane request, response and replication message.
//! - **`net`**: UDP datagram transport. Best-effort sends framed with a
//!   one-byte message kind, with optional ingress drop-rate fault injection.
//! - **`files`**: The file operations coordinator. Implements the
//!   create/get/append/merge/ls/store verbs, drives replication, and owns the
//!   request-reply rendezvous for synchronous calls.
//! - **`membership`**: The cluster coordination layer. SWIM-style failure
//!   detection over UDP (ping-ack or gossip heartbeat, with or without
//!   suspicion) that keeps the hash ring in sync with the live cluster.
//! - **`router`**: The inbound demultiplexer. Inspects each datagram's
//!   discriminant byte and dispatches to membership or the file plane.

pub mod files;
pub mod membership;
pub mod net;
pub mod ring;
pub mod router;
pub mod storage;
pub mod wire;
