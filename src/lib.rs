//! Fleet index scanner and trash coordinator for content-addressed block
//! storage.
//!
//! Queries every storage node in a cluster for its full block index,
//! merges the per-node inventories into a cluster-wide view with
//! replication-level statistics, and delivers per-node deletion batches,
//! aggregating partial failures.
//!
//! # Architecture
//!
//! ```text
//! directory ──▶ FleetScanner ──▶ FleetSnapshot ──▶ ReplicationHistogram
//!                   │ one fetch task per node
//!                   ▼
//!               fetcher (status probe + streamed index parse)
//!
//! trash plan ──▶ TrashDispatcher ──▶ aggregated per-node errors
//! ```
//!
//! A scan fails on the first node error rather than returning a partial
//! fleet view; trash dispatch is the opposite and attempts every batch,
//! reporting all failures together.
//!
//! # Modules
//!
//! - [`client`] - Shared authenticated HTTP client
//! - [`directory`] - Typed node-directory records and the directory seam
//! - [`error`] - Error types
//! - [`events`] - Structured observability sink
//! - [`fetcher`] - Per-node status probe and streamed index fetch
//! - [`index`] - Index line parsing and per-node inventories
//! - [`locator`] - Block locator codec
//! - [`scanner`] - Concurrent fleet scan and merge
//! - [`summary`] - Replication-level histogram
//! - [`trash`] - Concurrent trash dispatch

pub mod client;
pub mod directory;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod index;
pub mod locator;
pub mod scanner;
pub mod summary;
pub mod trash;

pub use client::{FleetClient, FleetConfig};
pub use directory::{HttpDirectory, NodeAddress, NodeDirectory, NodeList, ServiceKind};
pub use error::{Error, Result};
pub use events::{CollectingSink, EventSink, NullSink, ScanEvent, TracingSink};
pub use fetcher::{fetch_index, read_index};
pub use index::{BlockRecord, NodeInventory};
pub use locator::{BlockKey, Locator};
pub use scanner::{BlockHolder, FleetScanner, FleetSnapshot};
pub use summary::{summarize, ReplicationHistogram};
pub use trash::{TrashBatch, TrashDispatcher, TrashRequest};
