use super::Filter;
use crate::error::{Error, Result};
use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Write;

/// Deflate-compresses the byte stream into gzip framing.
///
/// Streams rather than buffers the whole file: each `process` call flushes
/// the encoder's internal window so compressed bytes are available to
/// forward immediately, at a small compression-ratio cost.
pub struct GzipCompress {
    encoder: Option<GzEncoder<Vec<u8>>>,
}

impl GzipCompress {
    pub fn new() -> Self {
        GzipCompress {
            encoder: Some(GzEncoder::new(Vec::new(), Compression::default())),
        }
    }
}

impl Filter for GzipCompress {
    fn id(&self) -> &'static str {
        "gzipCompress"
    }

    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let encoder = self.encoder.as_mut().ok_or_else(|| {
            Error::Protocol("gzipCompress: process called after finish".into())
        })?;
        encoder.write_all(input)?;
        encoder.flush()?;
        Ok(std::mem::take(encoder.get_mut()))
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| Error::Protocol("gzipCompress: finish called twice".into()))?;
        Ok(encoder.finish()?)
    }
}

/// Inflate-decompresses a gzip byte stream.
pub struct GzipDecompress {
    decoder: Option<GzDecoder<Vec<u8>>>,
}

impl GzipDecompress {
    pub fn new() -> Self {
        GzipDecompress {
            decoder: Some(GzDecoder::new(Vec::new())),
        }
    }
}

impl Filter for GzipDecompress {
    fn id(&self) -> &'static str {
        "gzipDecompress"
    }

    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let decoder = self.decoder.as_mut().ok_or_else(|| {
            Error::Protocol("gzipDecompress: process called after finish".into())
        })?;
        decoder.write_all(input)?;
        decoder.flush()?;
        Ok(std::mem::take(decoder.get_mut()))
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let decoder = self
            .decoder
            .take()
            .ok_or_else(|| Error::Protocol("gzipDecompress: finish called twice".into()))?;
        Ok(decoder.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(20);

        let mut compressor = GzipCompress::new();
        let mut compressed = compressor.process(&original).unwrap();
        compressed.extend(compressor.finish().unwrap());

        let mut decompressor = GzipDecompress::new();
        let mut decompressed = decompressor.process(&compressed).unwrap();
        decompressed.extend(decompressor.finish().unwrap());

        assert_eq!(decompressed, original);
    }
}
