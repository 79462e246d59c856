//! Membership & Failure Detection Module
//!
//! SWIM-style cluster coordination over the shared UDP socket. The file
//! plane never consumes this module directly; topology changes reach it only
//! through the `RingView` seam in `ring`.
//!
//! ## Core Mechanisms
//! - **Two protocols**: direct ping-ack probing or epidemic gossip of the
//!   full membership table, each with suspicion on or off, switchable at
//!   runtime across the whole cluster.
//! - **Failure detection**: ALIVE -> SUSPECT -> DEAD transitions driven by
//!   per-member silence timers on a periodic tick; DEAD and LEFT members are
//!   removed from placement immediately and cleaned out of the table later.
//! - **Incarnation numbers**: a logical clock owned by each member. A falsely
//!   suspected node bumps its incarnation and the refutation outranks the
//!   stale claim everywhere it spreads.

pub mod service;
pub mod types;

pub use service::MembershipService;
pub use types::{FailureDetectionMode, MemberInfo, MembershipMessage, NodeStatus};
