//! Index line parsing and per-node block inventories.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::locator::{BlockKey, Locator};

/// A block observed on one node: its key and the node-reported mtime.
///
/// The mtime is seconds since the epoch on the node's own clock. It is
/// meaningful for resolving duplicate listings from the same node and for
/// reporting, never for ordering records across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub key: BlockKey,
    pub mtime: i64,
}

impl BlockRecord {
    /// Node-reported modification time as a UTC timestamp.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.mtime, 0)
    }
}

/// Parse one line of a node's index response.
///
/// A well-formed line is exactly two whitespace-separated tokens: a
/// hint-free block locator and an integer mtime.
pub fn parse_index_line(node: &str, line: &str) -> Result<BlockRecord> {
    let bad_line = |reason: String| Error::BadIndexLine {
        node: node.to_string(),
        line: line.trim_end_matches('\n').to_string(),
        reason,
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(bad_line(format!(
            "expected 2 tokens, found {}",
            tokens.len()
        )));
    }

    let locator: Locator = tokens[0].parse().map_err(|e: Error| bad_line(e.to_string()))?;
    if locator.has_hints() {
        return Err(bad_line("index locator must not carry hints".to_string()));
    }

    let mtime: i64 = tokens[1]
        .parse()
        .map_err(|_| bad_line(format!("invalid mtime {:?}", tokens[1])))?;

    Ok(BlockRecord {
        key: locator.key,
        mtime,
    })
}

/// Everything one node reported in its index, after duplicate resolution.
///
/// The counters are diagnostics only; none of them fails a fetch.
#[derive(Debug, Clone, Default)]
pub struct NodeInventory {
    /// One record per block key.
    pub blocks: HashMap<BlockKey, BlockRecord>,
    /// Index lines recorded (the end-of-index sentinel is not counted).
    pub lines: u64,
    /// Lines that repeated a key already seen in this stream.
    pub duplicates: u64,
    /// Keys that reused a digest already seen with a different size.
    pub size_disagreements: u64,
}

impl NodeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Record one parsed index line.
    ///
    /// A repeated key keeps whichever record has the larger mtime; ties
    /// keep the record seen first.
    pub fn record(&mut self, record: BlockRecord) {
        self.lines += 1;
        match self.blocks.entry(record.key) {
            Entry::Occupied(mut existing) => {
                self.duplicates += 1;
                if existing.get().mtime < record.mtime {
                    existing.insert(record);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::locator::DIGEST_SIZE;

    const DIGEST: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn key(byte: u8, size: u64) -> BlockKey {
        BlockKey {
            digest: [byte; DIGEST_SIZE],
            size,
        }
    }

    #[test]
    fn parses_well_formed_line() {
        let record = parse_index_line("n", &format!("{}+3 1396879996\n", DIGEST)).unwrap();
        assert_eq!(record.key.size, 3);
        assert_eq!(record.mtime, 1396879996);
    }

    #[test]
    fn rejects_wrong_token_counts() {
        for line in ["", "   ", "onetoken", "a b c"] {
            assert_matches!(
                parse_index_line("n", line),
                Err(Error::BadIndexLine { .. }),
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn rejects_malformed_locator() {
        let err = parse_index_line("n", "nothex+3 100").unwrap_err();
        assert_matches!(err, Error::BadIndexLine { node, .. } if node == "n");
    }

    #[test]
    fn rejects_hinted_locator() {
        let err = parse_index_line("n", &format!("{}+3+K@zzzzz 100", DIGEST)).unwrap_err();
        assert_matches!(err, Error::BadIndexLine { reason, .. } if reason.contains("hint"));
    }

    #[test]
    fn rejects_bad_mtime() {
        for mtime in ["abc", "3.5", ""] {
            let line = format!("{}+3 {}", DIGEST, mtime);
            assert_matches!(
                parse_index_line("n", &line),
                Err(Error::BadIndexLine { .. }),
                "mtime {:?}",
                mtime
            );
        }
    }

    #[test]
    fn newer_duplicate_wins_either_order() {
        for (first, second) in [(100, 200), (200, 100)] {
            let mut inventory = NodeInventory::new();
            inventory.record(BlockRecord { key: key(0xaa, 3), mtime: first });
            inventory.record(BlockRecord { key: key(0xaa, 3), mtime: second });
            assert_eq!(inventory.len(), 1);
            assert_eq!(inventory.blocks[&key(0xaa, 3)].mtime, 200);
            assert_eq!(inventory.duplicates, 1);
            assert_eq!(inventory.lines, 2);
        }
    }

    #[test]
    fn equal_mtime_keeps_first_record() {
        let mut inventory = NodeInventory::new();
        inventory.record(BlockRecord { key: key(0xaa, 3), mtime: 100 });
        inventory.record(BlockRecord { key: key(0xaa, 3), mtime: 100 });
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.duplicates, 1);
    }

    #[test]
    fn different_sizes_are_distinct_keys() {
        let mut inventory = NodeInventory::new();
        inventory.record(BlockRecord { key: key(0xaa, 3), mtime: 100 });
        inventory.record(BlockRecord { key: key(0xaa, 4), mtime: 200 });
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.duplicates, 0);
    }
}
