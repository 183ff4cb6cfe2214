//! Fleet-wide index scanning.
//!
//! The scanner fans one fetch task out per storage node and fans the
//! results back in through a channel. Only the collecting side mutates the
//! snapshot under construction; fetch tasks never touch shared state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::client::FleetClient;
use crate::directory::{NodeAddress, NodeDirectory, ServiceKind};
use crate::error::{Error, Result};
use crate::events::{EventSink, NullSink, ScanEvent};
use crate::fetcher::fetch_index;
use crate::index::NodeInventory;
use crate::locator::BlockKey;
use crate::summary::{summarize, ReplicationHistogram};

/// One node's claim on a block: its stable scan index and reported mtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHolder {
    /// Position of the holding node in [`FleetSnapshot::nodes`].
    pub node: usize,
    /// The holding node's reported mtime for the block.
    pub mtime: i64,
}

/// Result of one full fleet scan.
///
/// `block_to_nodes` is derived from the per-node inventories and exists
/// only once every fetch has succeeded; every holder entry corresponds to
/// exactly one record in that node's inventory.
#[derive(Debug, Default)]
pub struct FleetSnapshot {
    /// Discovered nodes in discovery order; positions are stable indices.
    pub nodes: Vec<NodeAddress>,
    /// Reverse mapping from node to its stable index.
    pub node_index: HashMap<NodeAddress, usize>,
    /// Per-node inventories after duplicate resolution.
    pub contents: HashMap<NodeAddress, NodeInventory>,
    /// Every node holding each block.
    pub block_to_nodes: HashMap<BlockKey, Vec<BlockHolder>>,
}

impl FleetSnapshot {
    /// Number of distinct blocks across the fleet.
    pub fn distinct_blocks(&self) -> usize {
        self.block_to_nodes.len()
    }
}

/// Scans every storage node and merges the results.
pub struct FleetScanner {
    client: FleetClient,
    sink: Arc<dyn EventSink>,
}

impl FleetScanner {
    /// Create a scanner that discards events.
    pub fn new(client: FleetClient) -> Self {
        Self::with_sink(client, Arc::new(NullSink))
    }

    /// Create a scanner reporting through `sink`.
    pub fn with_sink(client: FleetClient, sink: Arc<dyn EventSink>) -> Self {
        Self { client, sink }
    }

    /// Scan the whole fleet.
    ///
    /// Fails fast on the first per-node error; fetches still in flight are
    /// left to finish and their results are dropped unseen. A failed scan
    /// produces no snapshot.
    pub async fn scan(
        &self,
        directory: &dyn NodeDirectory,
        limit: Option<usize>,
    ) -> Result<FleetSnapshot> {
        let list = directory.storage_nodes(limit).await?;

        for node in &list.items {
            if node.service_kind != ServiceKind::Disk {
                return Err(Error::UnsupportedServiceKind {
                    node: node.url(),
                    kind: node.service_kind.to_string(),
                });
            }
        }

        self.sink.record(ScanEvent::DirectoryListed {
            available: list.items_available,
            received: list.items.len(),
        });
        if list.items.len() < list.items_available {
            return Err(Error::IncompleteDirectory {
                available: list.items_available,
                received: list.items.len(),
            });
        }

        let nodes = list.items;
        let node_index: HashMap<NodeAddress, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.clone(), i))
            .collect();

        // One buffered slot per fetch, so a sender outliving a failed scan
        // completes without blocking.
        let (tx, mut rx) = mpsc::channel(nodes.len().max(1));
        for node in &nodes {
            let client = self.client.clone();
            let sink = Arc::clone(&self.sink);
            let node = node.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = fetch_index(&client, &node, sink.as_ref()).await;
                let _ = tx.send((node, result)).await;
            });
        }
        drop(tx);

        let mut contents: HashMap<NodeAddress, NodeInventory> =
            HashMap::with_capacity(nodes.len());
        for _ in 0..nodes.len() {
            let Some((node, result)) = rx.recv().await else {
                return Err(Error::Internal(
                    "fetch task exited without reporting".to_string(),
                ));
            };
            let inventory = result?;
            debug!(node = %node, blocks = inventory.len(), "collected node inventory");
            contents.insert(node, inventory);
        }

        let mut block_to_nodes: HashMap<BlockKey, Vec<BlockHolder>> = HashMap::new();
        for (node, inventory) in &contents {
            let index = node_index[node];
            for record in inventory.blocks.values() {
                block_to_nodes.entry(record.key).or_default().push(BlockHolder {
                    node: index,
                    mtime: record.mtime,
                });
            }
        }

        Ok(FleetSnapshot {
            nodes,
            node_index,
            contents,
            block_to_nodes,
        })
    }

    /// Scan and reduce to a replication histogram in one call.
    pub async fn scan_and_summarize(
        &self,
        directory: &dyn NodeDirectory,
        limit: Option<usize>,
    ) -> Result<(FleetSnapshot, ReplicationHistogram)> {
        let snapshot = self.scan(directory, limit).await?;
        let histogram = summarize(&snapshot);
        self.sink.record(ScanEvent::ScanSummarized {
            nodes: snapshot.nodes.len(),
            distinct_blocks: snapshot.distinct_blocks(),
        });
        Ok((snapshot, histogram))
    }
}
