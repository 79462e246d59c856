//! Datagram Transport Module
//!
//! Thin UDP layer shared by membership gossip and file-plane traffic.
//! Frames are `[kind byte][body]`, capped at one 64 KiB datagram; larger
//! transfers are out of scope for the core. An optional ingress drop rate
//! supports fault-injection testing.

pub mod transport;

pub use transport::UdpTransport;

#[cfg(test)]
mod tests;
