//! Consistent-Hash Placement Module
//!
//! Maps nodes and filenames to positions on a logical 64-bit ring and
//! decides which nodes store which files.
//!
//! ## Core Concepts
//! - **Placement**: A file lives on the N distinct ring successors of its
//!   hashed name; the first successor coordinates writes and merges.
//! - **Determinism**: Positions come from a fixed-key hash of stable
//!   identity strings, so every node computes the same ownership map
//!   independently.
//! - **Membership bridge**: `RingView` is the only seam membership touches;
//!   node arrivals and departures flow through it into the ring.

pub mod ring;
pub mod view;

pub use ring::HashRing;
pub use view::{RingAdapter, RingView};

#[cfg(test)]
mod tests;
