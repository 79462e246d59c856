//! Rendezvous state between caller tasks and the ingress worker.
//!
//! Synchronous verbs send a request, park a completion channel here, and
//! wait with a deadline; the ingress worker completes the entry when the
//! matching response arrives. Late responses find no entry and are dropped.
//!
//! Gets and the collect/exists aggregations are keyed by the HyDFS name the
//! response echoes back. Append and merge responses carry no name, so they
//! rendezvous through a single slot; the CLI issues one at a time.

use crate::storage::types::NodeId;
use crate::wire::messages::{CollectBlocksResponse, FileExistsResponse, MergeUpdateMessage};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, oneshot};

/// Waiters keyed by file name, one per name.
pub struct PendingTable<T> {
    entries: Mutex<HashMap<String, oneshot::Sender<T>>>,
}

impl<T> Default for PendingTable<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a waiter for `key`, replacing any stale one.
    pub async fn register(&self, key: &str) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().await.insert(key.to_string(), tx);
        rx
    }

    /// Wakes the waiter for `key`. Returns false when nobody was waiting,
    /// which is how late responses get dropped.
    pub async fn complete(&self, key: &str, value: T) -> bool {
        match self.entries.lock().await.remove(key) {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    pub async fn cancel(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

/// Single-occupancy rendezvous for responses that carry no key.
pub struct SingleSlot<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Default for SingleSlot<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> SingleSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        *self.slot.lock().await = Some(tx);
        rx
    }

    pub async fn complete(&self, value: T) -> bool {
        match self.slot.lock().await.take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    pub async fn cancel(&self) {
        self.slot.lock().await.take();
    }
}

/// In-flight `ls`: which replicas were asked and what each answered.
pub struct LsState {
    pub expected: Vec<(SocketAddr, NodeId)>,
    pub responses: HashMap<SocketAddr, FileExistsResponse>,
    pub notify: Arc<Notify>,
}

#[derive(Default)]
pub struct LsTable {
    entries: Mutex<HashMap<String, LsState>>,
}

impl LsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(&self, name: &str, expected: Vec<(SocketAddr, NodeId)>) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        let state = LsState {
            expected,
            responses: HashMap::new(),
            notify: notify.clone(),
        };
        self.entries.lock().await.insert(name.to_string(), state);
        notify
    }

    pub async fn record(&self, name: &str, src: SocketAddr, resp: FileExistsResponse) {
        let mut entries = self.entries.lock().await;
        if let Some(state) = entries.get_mut(name) {
            state.responses.insert(src, resp);
            if state.responses.len() >= state.expected.len() {
                state.notify.notify_one();
            }
        }
    }

    pub async fn is_complete(&self, name: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(name)
            .map(|s| s.responses.len() >= s.expected.len())
            .unwrap_or(true)
    }

    pub async fn finish(&self, name: &str) -> Option<LsState> {
        self.entries.lock().await.remove(name)
    }
}

/// In-flight merge collection on the coordinator: blocks gathered from the
/// other replicas before the canonical order is computed.
pub struct CollectState {
    pub expected: usize,
    pub responses: Vec<CollectBlocksResponse>,
    pub notify: Arc<Notify>,
}

#[derive(Default)]
pub struct CollectTable {
    entries: Mutex<HashMap<String, CollectState>>,
}

impl CollectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(&self, name: &str, expected: usize) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        let state = CollectState {
            expected,
            responses: Vec::new(),
            notify: notify.clone(),
        };
        self.entries.lock().await.insert(name.to_string(), state);
        notify
    }

    /// Returns false when no collection is in flight for `name`, so the
    /// caller can route the response to the merge back-fill path instead.
    pub async fn record(&self, name: &str, resp: CollectBlocksResponse) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(name) {
            Some(state) => {
                state.responses.push(resp);
                if state.responses.len() >= state.expected {
                    state.notify.notify_one();
                }
                true
            }
            None => false,
        }
    }

    pub async fn is_pending(&self, name: &str) -> bool {
        self.entries.lock().await.contains_key(name)
    }

    pub async fn is_complete(&self, name: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(name)
            .map(|s| s.responses.len() >= s.expected)
            .unwrap_or(true)
    }

    pub async fn finish(&self, name: &str) -> Option<CollectState> {
        self.entries.lock().await.remove(name)
    }
}

/// Merge updates a replica could not apply yet because it lacks some of the
/// named blocks. The update waits here while the blocks are re-requested
/// from the coordinator.
#[derive(Default)]
pub struct ParkedMerges {
    entries: Mutex<HashMap<String, MergeUpdateMessage>>,
}

impl ParkedMerges {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn park(&self, update: MergeUpdateMessage) {
        self.entries
            .lock()
            .await
            .insert(update.hydfs_name.clone(), update);
    }

    pub async fn take(&self, name: &str) -> Option<MergeUpdateMessage> {
        self.entries.lock().await.remove(name)
    }
}
