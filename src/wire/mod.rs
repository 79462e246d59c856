//! Wire Codec Module
//!
//! Implements the datagram serialization layer shared by every node.
//!
//! ## Core Concepts
//! - **Framing**: Every datagram starts with a one-byte message discriminant
//!   followed by the message body; file-plane discriminants occupy 100-125.
//! - **Encoding**: Fixed integers in network byte order, strings prefixed by
//!   a `u32` length, byte arrays by a `u64` length. `Block` and
//!   `FileMetadata` reuse the primitive encoding recursively.
//! - **Totality**: `FileMessage::decode` maps every discriminant and body to
//!   exactly one typed message or a `WireError`; truncated or oversized
//!   payloads are rejected, never panicked on.

pub mod codec;
pub mod messages;

pub use codec::{ByteReader, ByteWriter, MAX_DATAGRAM, WireError};

#[cfg(test)]
mod tests;
