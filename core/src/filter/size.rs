use super::Filter;
use crate::error::Result;
use crate::value::Value;

/// Passes bytes through unchanged, accumulating a running total readable as
/// its result once the stream closes.
pub struct Size {
    total: u64,
}

impl Size {
    pub fn new() -> Self {
        Size { total: 0 }
    }
}

impl Filter for Size {
    fn id(&self) -> &'static str {
        "size"
    }

    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.total += input.len() as u64;
        Ok(input.to_vec())
    }

    fn result(&self) -> Option<Value> {
        Some(Value::UInt(self.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_total_bytes_across_chunks() {
        let mut s = Size::new();
        s.process(b"abc").unwrap();
        s.process(b"de").unwrap();
        assert_eq!(s.result(), Some(Value::UInt(5)));
    }
}
