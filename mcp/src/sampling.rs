//! Outbound `sampling/createMessage` requests: the server asks the
//! client's model for a completion mid-tool-call. Requests are tracked in
//! a pending table keyed by outgoing id and resolved when the matching
//! response line arrives on stdin; a 5-minute timeout guards against a
//! client that never replies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::jsonrpc::JsonRpcRequest;

pub const SAMPLING_TIMEOUT: Duration = Duration::from_secs(300);

type PendingTable = Mutex<HashMap<u64, oneshot::Sender<Value>>>;

/// Tracks in-flight outbound requests awaiting a client reply.
pub struct SamplingClient {
    next_id: AtomicU64,
    pending: PendingTable,
    outbound: Arc<Mutex<dyn std::io::Write + Send>>,
}

impl SamplingClient {
    #[must_use]
    pub fn new(outbound: Arc<Mutex<dyn std::io::Write + Send>>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            outbound,
        }
    }

    /// Send a `sampling/createMessage` request and await the client's
    /// reply, bounded by [`SAMPLING_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SamplingTimeout`] if no reply arrives in time, or
    /// [`Error::Io`] if the request cannot be written.
    pub async fn create_message(&self, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = JsonRpcRequest::outbound(id, "sampling/createMessage", params);
        let body = serde_json::to_string(&request)?;
        {
            let mut writer = self.outbound.lock();
            crate::jsonrpc::write_line(&mut *writer, &body)?;
        }

        match tokio::time::timeout(SAMPLING_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::SamplingChannelClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::SamplingTimeout)
            }
        }
    }

    /// Resolve a pending request from an inbound response line whose `id`
    /// matches an outstanding `create_message` call. Returns `true` if a
    /// matching pending request was found and resolved.
    pub fn resolve(&self, id: u64, result: Value) -> bool {
        if let Some(tx) = self.pending.lock().remove(&id) {
            let _ = tx.send(result);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_completes_the_pending_future() {
        let client = Arc::new(SamplingClient::new(Arc::new(Mutex::new(Vec::new()))));
        let client2 = Arc::clone(&client);
        let handle = tokio::spawn(async move { client2.create_message(serde_json::json!({"messages": []})).await });

        // Give the spawned task a chance to register its pending entry.
        tokio::task::yield_now().await;
        let resolved = client.resolve(1, serde_json::json!({"role": "assistant"}));
        assert!(resolved);
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result["role"], "assistant");
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_request_times_out() {
        let client = Arc::new(SamplingClient::new(Arc::new(Mutex::new(Vec::new()))));
        let client2 = Arc::clone(&client);
        let handle = tokio::spawn(async move { client2.create_message(serde_json::json!({})).await });
        tokio::time::advance(SAMPLING_TIMEOUT + Duration::from_secs(1)).await;
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::SamplingTimeout)));
    }
}
