//! Inbound demultiplexer.
//!
//! Every datagram on the shared socket starts with a one-byte discriminant.
//! Values below [`FILE_PLANE_THRESHOLD`] are membership traffic, values at
//! or above it belong to the file plane, and anything that fails to decode
//! is dropped and counted. The mapping is total: every byte value lands in
//! exactly one of those three buckets.

use crate::files::FileService;
use crate::membership::MembershipService;
use crate::net::UdpTransport;
use crate::wire::MAX_DATAGRAM;
use crate::wire::messages::FileMessage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, warn};

/// Discriminants at or above this value are file-plane messages.
pub const FILE_PLANE_THRESHOLD: u8 = 100;

pub struct Router {
    membership: Arc<MembershipService>,
    files: Arc<FileService>,
    transport: Arc<UdpTransport>,
    dropped: AtomicU64,
}

impl Router {
    pub fn new(
        membership: Arc<MembershipService>,
        files: Arc<FileService>,
        transport: Arc<UdpTransport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            membership,
            files,
            transport,
            dropped: AtomicU64::new(0),
        })
    }

    /// Datagrams dropped because they failed to decode.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The ingress worker: reads whole datagrams into a reusable buffer and
    /// dispatches each synchronously. Handlers that must wait on further
    /// inbound traffic spawn their own task so ingress never stalls.
    pub async fn run(self: Arc<Self>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.transport.recv(&mut buf).await {
                Ok(Some((kind, len, src))) => {
                    let body = &buf[1..len];
                    if kind < FILE_PLANE_THRESHOLD {
                        self.membership.handle_datagram(kind, body, src).await;
                    } else {
                        match FileMessage::decode(kind, body) {
                            Ok(msg) => self.files.handle_message(msg, src).await,
                            Err(e) => {
                                self.dropped.fetch_add(1, Ordering::Relaxed);
                                warn!("dropping datagram from {}: {}", src, e);
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("socket receive failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}
