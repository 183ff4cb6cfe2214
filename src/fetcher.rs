//! Per-node index fetching.
//!
//! One fetch covers a node's health probe, the authenticated index
//! request, and a streamed parse of the newline-delimited index body. Any
//! failure discards everything read from the node: a node contributes a
//! complete inventory to the fleet view or nothing at all.

use std::collections::HashMap;
use std::io;

use futures::TryStreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::client::FleetClient;
use crate::directory::NodeAddress;
use crate::error::{Error, Result};
use crate::events::{EventSink, ScanEvent};
use crate::index::{parse_index_line, NodeInventory};
use crate::locator::DIGEST_SIZE;

/// Fetch one node's full block inventory.
pub async fn fetch_index(
    client: &FleetClient,
    node: &NodeAddress,
    sink: &dyn EventSink,
) -> Result<NodeInventory> {
    probe_status(client, node, sink).await?;

    let url = format!("{}/index", node.url());
    debug!(%url, "requesting node index");
    let response = client
        .authed_get(&url)
        .send()
        .await
        .map_err(|e| Error::IndexRequestFailed {
            node: node.url(),
            detail: e.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(Error::IndexRequestFailed {
            node: node.url(),
            detail: format!("HTTP {}", response.status()),
        });
    }

    let stream = Box::pin(
        response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
    );
    let reader = BufReader::new(StreamReader::new(stream));
    let inventory = read_index(&node.url(), reader).await?;

    sink.record(ScanEvent::IndexFetched {
        node: node.url(),
        lines: inventory.lines,
        blocks: inventory.len(),
        duplicates: inventory.duplicates,
        size_disagreements: inventory.size_disagreements,
        at: chrono::Utc::now(),
    });
    Ok(inventory)
}

/// Probe the node's status endpoint.
///
/// The probe gates on reachability and an HTTP 200 JSON object; the
/// payload itself is opaque and only forwarded to the sink.
async fn probe_status(
    client: &FleetClient,
    node: &NodeAddress,
    sink: &dyn EventSink,
) -> Result<()> {
    let url = format!("{}/status.json", node.url());
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::NodeUnreachable {
            node: node.url(),
            source: e,
        })?;
    if !response.status().is_success() {
        return Err(Error::NodeUnhealthy {
            node: node.url(),
            detail: format!("HTTP {}", response.status()),
        });
    }

    let status: serde_json::Map<String, serde_json::Value> =
        response.json().await.map_err(|e| Error::NodeUnhealthy {
            node: node.url(),
            detail: format!("invalid status payload: {e}"),
        })?;

    sink.record(ScanEvent::NodeStatus {
        node: node.url(),
        status: serde_json::Value::Object(status),
        at: chrono::Utc::now(),
    });
    Ok(())
}

/// Parse a streamed index body into a [`NodeInventory`].
///
/// The body is a sequence of `<locator> <mtime>` lines terminated by one
/// bare newline. An end of stream without the sentinel fails with
/// [`Error::IndexTruncated`]; anything readable after it fails with
/// [`Error::TrailingDataAfterEof`].
pub async fn read_index<R>(node: &str, mut reader: R) -> Result<NodeInventory>
where
    R: AsyncBufRead + Unpin,
{
    let mut inventory = NodeInventory::new();
    let mut first_sizes: HashMap<[u8; DIGEST_SIZE], u64> = HashMap::new();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::IndexTruncated {
                node: node.to_string(),
                line: inventory.lines + 1,
                reason: e.to_string(),
            })?;
        if read == 0 {
            return Err(Error::IndexTruncated {
                node: node.to_string(),
                line: inventory.lines + 1,
                reason: "end of stream before the end-of-index marker".to_string(),
            });
        }
        if line == "\n" {
            break;
        }
        if !line.ends_with('\n') {
            return Err(Error::IndexTruncated {
                node: node.to_string(),
                line: inventory.lines + 1,
                reason: "end of stream in the middle of a line".to_string(),
            });
        }

        let record = parse_index_line(node, &line)?;
        match first_sizes.get(&record.key.digest) {
            Some(first) if *first != record.key.size => inventory.size_disagreements += 1,
            Some(_) => {}
            None => {
                first_sizes.insert(record.key.digest, record.key.size);
            }
        }
        inventory.record(record);
    }

    // The sentinel must be the last thing in the stream.
    line.clear();
    match reader.read_line(&mut line).await {
        Ok(0) => Ok(inventory),
        Ok(_) => Err(Error::TrailingDataAfterEof {
            node: node.to_string(),
            data: line.trim_end_matches('\n').to_string(),
        }),
        Err(e) => Err(Error::IndexTruncatedAfterEof {
            node: node.to_string(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use futures::stream;

    const DIGEST_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const DIGEST_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    async fn parse(body: &str) -> Result<NodeInventory> {
        read_index("test-node", body.as_bytes()).await
    }

    #[tokio::test]
    async fn parses_well_formed_index() {
        let body = format!("{DIGEST_A}+3 1000\n{DIGEST_B}+4 2000\n\n");
        let inventory = parse(&body).await.unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.lines, 2);
        assert_eq!(inventory.duplicates, 0);
    }

    #[tokio::test]
    async fn empty_index_is_not_an_error() {
        let inventory = parse("\n").await.unwrap();
        assert!(inventory.is_empty());
        assert_eq!(inventory.lines, 0);
    }

    #[tokio::test]
    async fn newer_duplicate_wins_in_stream_order() {
        for body in [
            format!("{DIGEST_A}+3 100\n{DIGEST_A}+3 200\n\n"),
            format!("{DIGEST_A}+3 200\n{DIGEST_A}+3 100\n\n"),
        ] {
            let inventory = parse(&body).await.unwrap();
            assert_eq!(inventory.len(), 1);
            assert_eq!(inventory.blocks.values().next().unwrap().mtime, 200);
            assert_eq!(inventory.duplicates, 1);
        }
    }

    #[tokio::test]
    async fn counts_size_disagreements() {
        let body = format!("{DIGEST_A}+3 100\n{DIGEST_A}+4 200\n{DIGEST_A}+3 300\n\n");
        let inventory = parse(&body).await.unwrap();
        // +3 and +4 are distinct keys; only the size flip is a disagreement.
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.size_disagreements, 1);
        assert_eq!(inventory.duplicates, 1);
    }

    #[tokio::test]
    async fn missing_sentinel_is_truncated() {
        let body = format!("{DIGEST_A}+3 1000\n");
        assert_matches!(
            parse(&body).await,
            Err(Error::IndexTruncated { line: 2, .. })
        );
    }

    #[tokio::test]
    async fn partial_final_line_is_truncated() {
        let body = format!("{DIGEST_A}+3 1000\n{DIGEST_B}+4 20");
        assert_matches!(
            parse(&body).await,
            Err(Error::IndexTruncated { line: 2, .. })
        );
    }

    #[tokio::test]
    async fn empty_stream_is_truncated() {
        assert_matches!(parse("").await, Err(Error::IndexTruncated { line: 1, .. }));
    }

    #[tokio::test]
    async fn trailing_data_after_sentinel_fails() {
        let body = format!("{DIGEST_A}+3 1000\n\n{DIGEST_B}+4 2000\n");
        let err = parse(&body).await.unwrap_err();
        assert_matches!(
            err,
            Error::TrailingDataAfterEof { data, .. } if data.contains(DIGEST_B)
        );
    }

    #[tokio::test]
    async fn hinted_line_fails_the_fetch() {
        let body = format!("{DIGEST_A}+3+K@zzzzz 1000\n\n");
        assert_matches!(parse(&body).await, Err(Error::BadIndexLine { .. }));
    }

    #[tokio::test]
    async fn bad_mtime_fails_the_fetch() {
        let body = format!("{DIGEST_A}+3 soon\n\n");
        assert_matches!(parse(&body).await, Err(Error::BadIndexLine { .. }));
    }

    #[tokio::test]
    async fn read_error_before_sentinel_is_truncated() {
        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from(format!("{DIGEST_A}+3 1000\n"))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let reader = BufReader::new(StreamReader::new(stream::iter(chunks)));
        assert_matches!(
            read_index("test-node", reader).await,
            Err(Error::IndexTruncated { .. })
        );
    }

    #[tokio::test]
    async fn read_error_after_sentinel_fails() {
        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from(format!("{DIGEST_A}+3 1000\n\n"))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let reader = BufReader::new(StreamReader::new(stream::iter(chunks)));
        assert_matches!(
            read_index("test-node", reader).await,
            Err(Error::IndexTruncatedAfterEof { .. })
        );
    }
}
