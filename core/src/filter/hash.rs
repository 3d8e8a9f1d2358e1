use super::Filter;
use crate::error::Result;
use crate::value::Value;
use sha2::{Digest, Sha256};

/// Accumulates a SHA-256 digest over everything pushed through it, passing
/// the bytes through unchanged. Result is the lowercase hex digest.
pub struct CryptoHash {
    hasher: Sha256,
}

impl CryptoHash {
    pub fn new() -> Self {
        CryptoHash {
            hasher: Sha256::new(),
        }
    }
}

impl Filter for CryptoHash {
    fn id(&self) -> &'static str {
        "cryptoHash"
    }

    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.hasher.update(input);
        Ok(input.to_vec())
    }

    fn result(&self) -> Option<Value> {
        let digest = self.hasher.clone().finalize();
        Some(Value::Str(hex_lower(&digest)))
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_empty_input_to_the_known_sha256_digest() {
        let hasher = CryptoHash::new();
        let expected = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(expected.len(), 64);
        assert_eq!(hasher.result(), Some(Value::Str(expected.to_string())));
    }

    #[test]
    fn passes_bytes_through_unchanged() {
        let mut hasher = CryptoHash::new();
        assert_eq!(hasher.process(b"abc").unwrap(), b"abc".to_vec());
    }
}
