//! Block-Structured Local Store Module
//!
//! Implements the per-node storage layer for the append-structured file
//! model.
//!
//! ## Core Concepts
//! - **Blocks**: A file is an ordered sequence of immutable, variable-size
//!   blocks. A create produces the first block, every append another; reads
//!   reassemble them in the canonical order.
//! - **Atomicity**: One reader-writer lock spans the metadata and block maps,
//!   so readers never observe a block list entry without its block.
//! - **Persistence**: Mutations stream codec-encoded entities to a background
//!   writer; the request path never blocks on the filesystem. Startup replays
//!   the on-disk layout.
//! - **Read-my-writes**: `ClientWriteTracker` remembers which appends this
//!   node acknowledged to which client, gating reads that would miss them.

pub mod store;
pub mod tracker;
pub mod types;

pub use store::FileStore;
pub use tracker::ClientWriteTracker;
pub use types::{Block, FileMetadata, NodeId};
