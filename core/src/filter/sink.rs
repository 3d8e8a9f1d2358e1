use super::Filter;
use crate::error::Result;

/// Discards all bytes pushed through it. No accumulated result.
pub struct Sink;

impl Sink {
    pub fn new() -> Self {
        Sink
    }
}

impl Filter for Sink {
    fn id(&self) -> &'static str {
        "sink"
    }

    fn process(&mut self, _input: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
