//! Error types for the fleet scanner and trash coordinator.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning the fleet or dispatching trash.
///
/// Node-scoped variants carry the URL of the offending node so a scan
/// failure always names the node that caused it.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP client construction failed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Directory service request or response decode failed
    #[error("directory request failed: {0}")]
    Directory(#[source] reqwest::Error),

    /// The directory returned a node of a kind the scanner cannot index
    #[error("unsupported service kind {kind:?} for node {node}")]
    UnsupportedServiceKind { node: String, kind: String },

    /// The directory returned fewer nodes than it reported available
    #[error("directory returned {received} of {available} storage nodes")]
    IncompleteDirectory { available: usize, received: usize },

    /// A textual block locator failed to parse
    #[error("malformed block locator {input:?}: {reason}")]
    MalformedLocator { input: String, reason: String },

    /// An index line was not a hint-free locator plus an mtime
    #[error("bad index line {line:?} from {node}: {reason}")]
    BadIndexLine {
        node: String,
        line: String,
        reason: String,
    },

    /// The node's status endpoint could not be reached
    #[error("node {node} unreachable: {source}")]
    NodeUnreachable {
        node: String,
        #[source]
        source: reqwest::Error,
    },

    /// The node's status endpoint answered with something other than a
    /// 200 JSON object
    #[error("node {node} unhealthy: {detail}")]
    NodeUnhealthy { node: String, detail: String },

    /// The index request failed in transport or was refused
    #[error("index request to {node} failed: {detail}")]
    IndexRequestFailed { node: String, detail: String },

    /// The index stream ended before the end-of-index marker
    #[error("index from {node} truncated at line {line}: {reason}")]
    IndexTruncated {
        node: String,
        line: u64,
        reason: String,
    },

    /// The index stream failed after the end-of-index marker instead of
    /// ending cleanly
    #[error("index from {node} had read error after EOF marker: {source}")]
    IndexTruncatedAfterEof {
        node: String,
        #[source]
        source: std::io::Error,
    },

    /// The index stream carried data after the end-of-index marker
    #[error("index from {node} had trailing data after EOF marker: {data:?}")]
    TrailingDataAfterEof { node: String, data: String },

    /// A trash request failed in transport
    #[error("trash request to {node} failed: {detail}")]
    TrashRequestFailed { node: String, detail: String },

    /// A node refused a trash batch
    #[error("trash list rejected by {node}: HTTP {status}")]
    TrashRejected { node: String, status: u16 },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
