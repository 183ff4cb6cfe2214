//! Trash dispatch: concurrent per-node deletion batches.
//!
//! Which blocks to trash is decided upstream; this module only delivers
//! the batches. Delivery is fail-soft: every sender runs to completion and
//! every per-node failure is reported, so one stalled node cannot hold up
//! deletions across the rest of the fleet.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::debug;

use crate::client::FleetClient;
use crate::error::Error;
use crate::events::{EventSink, NullSink, ScanEvent};

/// One block scheduled for deletion on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashRequest {
    /// Textual locator of the block to delete.
    pub locator: String,
    /// The node-reported mtime the deletion is conditioned on.
    pub block_mtime: i64,
}

/// Ordered deletion batch for one node.
pub type TrashBatch = Vec<TrashRequest>;

/// Delivers trash batches to their target nodes.
pub struct TrashDispatcher {
    client: FleetClient,
    sink: Arc<dyn EventSink>,
}

impl TrashDispatcher {
    /// Create a dispatcher that discards events.
    pub fn new(client: FleetClient) -> Self {
        Self::with_sink(client, Arc::new(NullSink))
    }

    /// Create a dispatcher reporting through `sink`.
    pub fn with_sink(client: FleetClient, sink: Arc<dyn EventSink>) -> Self {
        Self { client, sink }
    }

    /// Send every batch to its node concurrently.
    ///
    /// Waits for all senders and returns every per-node error; an empty
    /// list means every batch was delivered.
    pub async fn dispatch(&self, batches: HashMap<String, TrashBatch>) -> Vec<Error> {
        let mut senders = JoinSet::new();
        for (url, batch) in batches {
            let client = self.client.clone();
            let sink = Arc::clone(&self.sink);
            senders
                .spawn(async move { send_trash_list(&client, sink.as_ref(), &url, &batch).await });
        }

        let mut errors = Vec::new();
        while let Some(joined) = senders.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(error)) => errors.push(error),
                Err(join_error) => {
                    errors.push(Error::Internal(format!("trash sender failed: {join_error}")))
                }
            }
        }
        errors
    }
}

/// Send one batch to one node's trash endpoint.
async fn send_trash_list(
    client: &FleetClient,
    sink: &dyn EventSink,
    url: &str,
    batch: &TrashBatch,
) -> crate::error::Result<()> {
    debug!(%url, blocks = batch.len(), "sending trash list");
    let endpoint = format!("{url}/trash");
    let response = client
        .authed_put(&endpoint)
        .json(batch)
        .send()
        .await
        .map_err(|e| Error::TrashRequestFailed {
            node: url.to_string(),
            detail: e.to_string(),
        })?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(Error::TrashRejected {
            node: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let _ = response.bytes().await;
    sink.record(ScanEvent::TrashSent {
        node: url.to_string(),
        blocks: batch.len(),
    });
    Ok(())
}
