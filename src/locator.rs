//! Block locator codec.
//!
//! A locator is the textual form of a block identifier:
//! `<digest-hex>+<size>[+hint...]`. The digest is a 128-bit content hash
//! written as 32 hex characters, and the declared byte size is part of the
//! block's identity. Hints may trail a client-facing locator; index records
//! must never carry them.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Number of bytes in a block content digest.
pub const DIGEST_SIZE: usize = 16;

const DIGEST_HEX_LEN: usize = 2 * DIGEST_SIZE;

/// A block's content identifier: digest plus declared byte size.
///
/// Two blocks with equal digests but different declared sizes are distinct
/// keys, so a digest collision across sizes cannot merge their records.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// Content digest.
    pub digest: [u8; DIGEST_SIZE],
    /// Declared byte size.
    pub size: u64,
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.digest {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "+{}", self.size)
    }
}

impl fmt::Debug for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockKey({})", self)
    }
}

/// A parsed block locator: the key plus any trailing hint tokens.
///
/// Hints are kept opaque; they are validated for presence only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub key: BlockKey,
    pub hints: Vec<String>,
}

impl Locator {
    pub fn has_hints(&self) -> bool {
        !self.hints.is_empty()
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedLocator {
            input: s.to_string(),
            reason,
        };

        let mut parts = s.split('+');
        let digest_part = parts.next().unwrap_or_default();
        let Some(size_part) = parts.next() else {
            return Err(malformed("missing size".to_string()));
        };

        let Some(digest) = parse_digest(digest_part) else {
            return Err(malformed(format!(
                "digest must be {} hex characters",
                DIGEST_HEX_LEN
            )));
        };
        let size: u64 = size_part
            .parse()
            .map_err(|_| malformed(format!("invalid size {:?}", size_part)))?;

        let hints: Vec<String> = parts.map(str::to_owned).collect();
        if hints.iter().any(String::is_empty) {
            return Err(malformed("empty hint token".to_string()));
        }

        Ok(Locator {
            key: BlockKey { digest, size },
            hints,
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for hint in &self.hints {
            write!(f, "+{}", hint)?;
        }
        Ok(())
    }
}

fn parse_digest(hex: &str) -> Option<[u8; DIGEST_SIZE]> {
    let bytes = hex.as_bytes();
    if bytes.len() != DIGEST_HEX_LEN {
        return None;
    }
    let mut digest = [0u8; DIGEST_SIZE];
    for (i, pair) in bytes.chunks(2).enumerate() {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        digest[i] = ((hi << 4) | lo) as u8;
    }
    Some(digest)
}
