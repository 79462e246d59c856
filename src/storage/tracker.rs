use std::collections::HashMap;
use tokio::sync::RwLock;

/// Per-node record of which appends were acknowledged to which client.
///
/// A node that acknowledged an append may not serve that client a version of
/// the file missing the appended block; readers consult this before trusting
/// a local copy or a fetched response (read-my-writes).
#[derive(Default)]
pub struct ClientWriteTracker {
    // client_id -> (filename -> ordered block ids)
    inner: RwLock<HashMap<String, HashMap<String, Vec<u64>>>>,
}

impl ClientWriteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an append this node acknowledged on behalf of `client_id`.
    pub async fn record(&self, client_id: &str, name: &str, block_id: u64) {
        let mut inner = self.inner.write().await;
        inner
            .entry(client_id.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(block_id);
    }

    /// Ordered block ids this node has acknowledged for `(client_id, name)`.
    pub async fn appends_for(&self, client_id: &str, name: &str) -> Vec<u64> {
        let inner = self.inner.read().await;
        inner
            .get(client_id)
            .and_then(|files| files.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// True iff every block this node acknowledged for `(client_id, name)`
    /// appears in `file_block_ids`. A client with no recorded appends is
    /// satisfied by any version.
    pub async fn satisfies_read_my_writes(
        &self,
        client_id: &str,
        name: &str,
        file_block_ids: &[u64],
    ) -> bool {
        let inner = self.inner.read().await;
        let Some(recorded) = inner.get(client_id).and_then(|files| files.get(name)) else {
            return true;
        };
        recorded.iter().all(|id| file_block_ids.contains(id))
    }

    pub async fn clear_client(&self, client_id: &str) {
        self.inner.write().await.remove(client_id);
    }

    pub async fn clear_file(&self, name: &str) {
        let mut inner = self.inner.write().await;
        for files in inner.values_mut() {
            files.remove(name);
        }
    }
}
