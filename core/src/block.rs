//! The file-transfer block framing codec: `BLOCK<n>` header lines that
//! precede each payload chunk of an `openRead`/`openWrite` stream.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

const PREFIX: &str = "BLOCK";

/// A decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockHeader {
    /// `n` bytes of payload follow.
    Payload(u64),
    /// `BLOCK0`: end of stream, success.
    End,
    /// `BLOCK-1`: writer aborted; release resources without committing.
    Abort,
}

impl BlockHeader {
    pub fn encode(&self) -> String {
        match self {
            BlockHeader::Payload(n) => format!("{PREFIX}{n}"),
            BlockHeader::End => format!("{PREFIX}0"),
            BlockHeader::Abort => format!("{PREFIX}-1"),
        }
    }

    /// Parse a `BLOCK<n>` line. Compiles the validating regex lazily and
    /// retains it for the life of the process -- the regex is immutable and
    /// safe to share across sessions.
    pub fn decode(line: &str) -> Result<BlockHeader> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^BLOCK(-1|[0-9]+)$").unwrap());

        let caps = re
            .captures(line)
            .ok_or_else(|| Error::Protocol(format!("malformed block header: {line:?}")))?;
        let n: &str = &caps[1];

        if n == "-1" {
            return Ok(BlockHeader::Abort);
        }
        // The regex already guarantees `n` is an unsigned decimal run, so
        // this can only fail on a value wider than u64 (not realistic for a
        // single in-memory block), in which case we still report it as a
        // protocol error rather than panicking.
        let value: u64 = n
            .parse()
            .map_err(|_| Error::Protocol(format!("block size out of range: {line:?}")))?;
        Ok(if value == 0 {
            BlockHeader::End
        } else {
            BlockHeader::Payload(value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_positive_sizes() {
        for n in [1u64, 2, 1024, u32::MAX as u64] {
            let encoded = BlockHeader::Payload(n).encode();
            assert_eq!(BlockHeader::decode(&encoded).unwrap(), BlockHeader::Payload(n));
        }
    }

    #[test]
    fn round_trips_end_and_abort() {
        assert_eq!(BlockHeader::decode(&BlockHeader::End.encode()).unwrap(), BlockHeader::End);
        assert_eq!(BlockHeader::decode(&BlockHeader::Abort.encode()).unwrap(), BlockHeader::Abort);
    }

    #[test]
    fn rejects_malformed_headers() {
        for bad in ["BLOCK", "BLOCK ", "BLOCK 5", "BLOCK-2", "block5", "BLOCK5x", ""] {
            let err = BlockHeader::decode(bad).unwrap_err();
            assert!(err.to_string().contains(bad));
        }
    }
}
