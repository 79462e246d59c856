//! File Operations Coordinator Module
//!
//! The write/read path of the file plane: the five public verbs plus the
//! inbound handlers that serve them on the replica and coordinator sides.
//!
//! ## Core Flows
//! - **create**: one initial block, installed locally when this node is a
//!   replica and pushed to the rest; partial success is reported, not retried.
//! - **append**: routed to the file's coordinator, which installs the block,
//!   acknowledges, then fans `REPLICATE_BLOCK` out to the other replicas.
//! - **get**: local store first (gated by read-my-writes), then one replica
//!   after another until a satisfying copy arrives or the timeout fires.
//! - **merge**: coordinator collects every replica's blocks, dedups by id,
//!   orders by `(client_id, sequence_num)`, and broadcasts the canonical
//!   list; replicas missing blocks pull them back from the coordinator.
//! - **Rendezvous**: synchronous verbs park a completion channel in
//!   `pending` and wait with a deadline; cancellation is by timeout only and
//!   late responses are dropped.

pub mod handlers;
pub mod pending;
pub mod service;

pub use service::{FileService, GetOutcome, canonical_order};

#[cfg(test)]
mod tests;
