//! Replication-level accounting.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::scanner::FleetSnapshot;

/// How many distinct blocks sit at each replication level.
///
/// A block's level is the number of distinct nodes holding it, so only
/// levels of one and above ever appear. A block known elsewhere but absent
/// from every scanned node is simply not in the histogram; accounting for
/// expected-but-missing blocks belongs to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationHistogram(BTreeMap<usize, u64>);

impl ReplicationHistogram {
    /// Number of distinct blocks at `level`.
    pub fn count_at(&self, level: usize) -> u64 {
        self.0.get(&level).copied().unwrap_or(0)
    }

    /// Iterate `(level, count)` in ascending level order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.0.iter().map(|(level, count)| (*level, *count))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ReplicationHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (level, count)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{level}: {count}")?;
        }
        f.write_str("}")
    }
}

/// Reduce a snapshot's derived block map to a replication histogram.
pub fn summarize(snapshot: &FleetSnapshot) -> ReplicationHistogram {
    let mut histogram: BTreeMap<usize, u64> = BTreeMap::new();
    for holders in snapshot.block_to_nodes.values() {
        *histogram.entry(holders.len()).or_insert(0) += 1;
    }
    ReplicationHistogram(histogram)
}
