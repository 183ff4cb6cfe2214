//! Structured scan and trash events.
//!
//! Components report progress through an injected [`EventSink`] instead of
//! logging inline, so the caller decides where diagnostics go: dropped
//! ([`NullSink`]), forwarded to `tracing` ([`TracingSink`]), or retained in
//! memory ([`CollectingSink`]).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

/// A significant occurrence during a scan or trash dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// The directory returned its list of storage nodes.
    DirectoryListed { available: usize, received: usize },

    /// A node answered its status probe. The payload is the node's raw
    /// status object, forwarded as-is.
    NodeStatus {
        node: String,
        status: serde_json::Value,
        at: DateTime<Utc>,
    },

    /// A node's full index was fetched and parsed.
    IndexFetched {
        node: String,
        lines: u64,
        blocks: usize,
        duplicates: u64,
        size_disagreements: u64,
        at: DateTime<Utc>,
    },

    /// A scan completed and was reduced to a histogram.
    ScanSummarized { nodes: usize, distinct_blocks: usize },

    /// A trash batch was delivered to a node.
    TrashSent { node: String, blocks: usize },
}

/// Sink for scan events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: ScanEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: ScanEvent) {}
}

/// Sink that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: ScanEvent) {
        match &event {
            ScanEvent::DirectoryListed {
                available,
                received,
            } => {
                info!(available, received, "directory listed storage nodes");
            }
            ScanEvent::NodeStatus { node, .. } => {
                debug!(%node, "node status received");
            }
            ScanEvent::IndexFetched {
                node,
                lines,
                blocks,
                duplicates,
                size_disagreements,
                ..
            } => {
                info!(
                    %node,
                    lines,
                    blocks,
                    duplicates,
                    size_disagreements,
                    "node index fetched"
                );
            }
            ScanEvent::ScanSummarized {
                nodes,
                distinct_blocks,
            } => {
                info!(nodes, distinct_blocks, "scan summarized");
            }
            ScanEvent::TrashSent { node, blocks } => {
                info!(%node, blocks, "trash list delivered");
            }
        }
    }
}

/// Sink that retains events in memory, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ScanEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for CollectingSink {
    fn record(&self, event: ScanEvent) {
        self.events.lock().push(event);
    }
}
