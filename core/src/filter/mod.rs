//! The filter pipeline: an ordered chain of byte-transforming stages applied
//! to a read or write stream. Grounded on the teacher's `Compressor` /
//! `Decompressor` strategy-object pattern (`compression.rs`) and the
//! `EncryptingAlgo` / `make_encrypting_algo` factory-by-identifier pattern
//! (`crypto/encryption.rs`): a filter descriptor names a type, and the
//! pipeline builder dispatches on that name to a concrete implementation.

mod checksum;
mod cipher;
mod gzip;
mod hash;
mod sink;
mod size;

use crate::error::{Error, Result};
use crate::value::Value;

/// Which side of a storage handle a pipeline is bound to. Filter order is
/// the descriptor order for both directions; only the conceptual data flow
/// differs (driver -> filters -> channel for reads, channel -> filters ->
/// driver for writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A single pipeline stage. `process` transforms one chunk; `finish` flushes
/// any buffered tail state (e.g. a compressor's trailing block) once the
/// upstream source is exhausted; `result` returns the stage's terminal
/// value, if it accumulates one.
pub trait Filter: Send {
    /// The filter identifier, as it appeared in the descriptor (`gzipCompress`, ...).
    fn id(&self) -> &'static str;

    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// Called exactly once, after the last `process` call, to drain any
    /// remaining buffered output.
    fn finish(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// The filter's accumulated result, if any (`cryptoHash`, `pageChecksum`,
    /// `size`). Filters with no result (`gzipCompress`, `cipherBlock`,
    /// `sink`) return `None`.
    fn result(&self) -> Option<Value> {
        None
    }
}

/// An ordered, immutable-after-construction chain of filters.
pub struct Pipeline {
    stages: Vec<Box<dyn Filter>>,
}

impl Pipeline {
    pub fn empty() -> Self {
        Pipeline { stages: Vec::new() }
    }

    /// Build a pipeline from a filter-list parameter: an ordered list of
    /// single-key descriptor maps, e.g. `[{"gzipCompress": []}]`.
    pub fn build(descriptors: &[Value], direction: Direction) -> Result<Pipeline> {
        let mut stages = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let entries = descriptor.as_map()?;
            let (name, params) = entries.first().ok_or_else(|| {
                Error::Protocol("filter descriptor must have exactly one key".into())
            })?;
            let params = params.as_list().unwrap_or(&[]);
            stages.push(make_filter(name, params, direction)?);
        }
        Ok(Pipeline { stages })
    }

    /// Push one chunk through every stage in order.
    pub fn process(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut buf = input.to_vec();
        for stage in self.stages.iter_mut() {
            buf = stage.process(&buf)?;
        }
        Ok(buf)
    }

    /// Drain every stage's tail output, cascading it through the remaining
    /// downstream stages rather than collecting each stage's `finish()` in
    /// isolation -- a stage's trailing bytes (e.g. gzip's final block) are
    /// still subject to every filter after it in the chain (e.g. a
    /// `cryptoHash` must see them to produce a correct digest).
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let mut carry = Vec::new();
        for stage in self.stages.iter_mut() {
            if !carry.is_empty() {
                carry = stage.process(&carry)?;
            }
            carry.extend(stage.finish()?);
        }
        Ok(carry)
    }

    /// The aggregate filter-result value: an ordered map from filter
    /// identifier to its accumulated result, skipping filters with none.
    pub fn result(&self) -> Value {
        let entries = self
            .stages
            .iter()
            .filter_map(|s| s.result().map(|v| (s.id().to_string(), v)))
            .collect();
        Value::Map(entries)
    }
}

fn make_filter(name: &str, params: &[Value], direction: Direction) -> Result<Box<dyn Filter>> {
    Ok(match name {
        "gzipCompress" => Box::new(gzip::GzipCompress::new()),
        "gzipDecompress" => Box::new(gzip::GzipDecompress::new()),
        "cipherBlock" => Box::new(cipher::CipherBlock::new(params, direction)?),
        "cryptoHash" => Box::new(hash::CryptoHash::new()),
        "pageChecksum" => Box::new(checksum::PageChecksum::new(params)?),
        "sink" => Box::new(sink::Sink::new()),
        "size" => Box::new(size::Size::new()),
        other => return Err(Error::Assert(other.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_filter_identifier_is_an_assert_error() {
        let descriptors = vec![Value::Map(vec![("bogus".into(), Value::List(vec![]))])];
        let err = Pipeline::build(&descriptors, Direction::Read).unwrap_err();
        match err {
            Error::Assert(name) => assert_eq!(name, "bogus"),
            other => panic!("expected Assert, got {other:?}"),
        }
    }

    #[test]
    fn empty_pipeline_result_is_empty_map() {
        let p = Pipeline::build(&[], Direction::Read).unwrap();
        assert_eq!(p.result(), Value::Map(vec![]));
    }

    /// `finish()` must cascade a stage's trailing bytes through every
    /// downstream stage -- a `cryptoHash` after a `gzipCompress` has to hash
    /// the compressed stream's final block too, not just what flowed through
    /// ordinary `process()` calls.
    #[test]
    fn finish_cascades_tail_bytes_through_downstream_stages() {
        let descriptors = vec![
            Value::Map(vec![("gzipCompress".to_string(), Value::List(vec![]))]),
            Value::Map(vec![("cryptoHash".to_string(), Value::List(vec![]))]),
        ];
        let mut pipeline = Pipeline::build(&descriptors, Direction::Write).unwrap();
        let compressed_so_far = pipeline.process(b"hello world").unwrap();
        let tail = pipeline.finish().unwrap();

        let mut full_compressed = compressed_so_far;
        full_compressed.extend(tail);

        let expected_digest = {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(&full_compressed);
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>()
        };

        let result = pipeline.result();
        let map = result.as_map().unwrap();
        let hash_entry = map.iter().find(|(k, _)| k == "cryptoHash").unwrap();
        assert_eq!(hash_entry.1, Value::Str(expected_digest));
    }
}
