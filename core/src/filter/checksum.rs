use super::Filter;
use crate::error::{Error, Result};
use crate::value::Value;

const DEFAULT_PAGE_SIZE: u64 = 8192;

/// Validates a stream of fixed-size database pages against a checksum
/// embedded in each page's trailing two bytes, the way the backup tool
/// verifies pages read off disk without decoding their contents.
///
/// Constructor params: `[page_size]` (optional, defaults to 8192). Passes
/// bytes through unchanged; accumulates the 0-based indices of pages whose
/// stored checksum does not match the recomputed one.
pub struct PageChecksum {
    page_size: usize,
    buffer: Vec<u8>,
    page_index: u64,
    invalid_pages: Vec<u64>,
}

impl PageChecksum {
    pub fn new(params: &[Value]) -> Result<Self> {
        let page_size = match params.first() {
            Some(v) => v.as_u64()?,
            None => DEFAULT_PAGE_SIZE,
        };
        if page_size < 16 {
            return Err(Error::Protocol(format!(
                "pageChecksum: page_size too small ({page_size})"
            )));
        }
        Ok(PageChecksum {
            page_size: page_size as usize,
            buffer: Vec::new(),
            page_index: 0,
            invalid_pages: Vec::new(),
        })
    }

    fn check_page(&mut self, page: &[u8]) {
        if page.len() < 2 {
            self.invalid_pages.push(self.page_index);
        } else {
            let (body, stored) = page.split_at(page.len() - 2);
            let expected = compute_checksum(body);
            let actual = u16::from_le_bytes([stored[0], stored[1]]);
            if expected != actual {
                self.invalid_pages.push(self.page_index);
            }
        }
        self.page_index += 1;
    }
}

/// A simple fold-and-wrap 16-bit checksum over the page body.
fn compute_checksum(body: &[u8]) -> u16 {
    let mut acc: u16 = 0;
    for chunk in body.chunks(2) {
        let word = match chunk {
            [a, b] => u16::from_le_bytes([*a, *b]),
            [a] => *a as u16,
            _ => unreachable!(),
        };
        acc = acc.wrapping_add(word).rotate_left(1);
    }
    acc
}

impl Filter for PageChecksum {
    fn id(&self) -> &'static str {
        "pageChecksum"
    }

    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.buffer.extend_from_slice(input);
        while self.buffer.len() >= self.page_size {
            let page: Vec<u8> = self.buffer.drain(..self.page_size).collect();
            self.check_page(&page);
        }
        Ok(input.to_vec())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        if !self.buffer.is_empty() {
            let trailing = std::mem::take(&mut self.buffer);
            self.check_page(&trailing);
        }
        Ok(Vec::new())
    }

    fn result(&self) -> Option<Value> {
        Some(Value::Map(vec![
            ("valid".to_string(), Value::Bool(self.invalid_pages.is_empty())),
            (
                "invalidPages".to_string(),
                Value::List(self.invalid_pages.iter().map(|p| Value::UInt(*p)).collect()),
            ),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_valid_checksum(fill: u8, page_size: usize) -> Vec<u8> {
        let mut page = vec![fill; page_size - 2];
        let checksum = compute_checksum(&page);
        page.extend_from_slice(&checksum.to_le_bytes());
        page
    }

    #[test]
    fn flags_no_pages_when_all_checksums_match() {
        let mut filter = PageChecksum::new(&[Value::UInt(32)]).unwrap();
        let page = page_with_valid_checksum(0xAB, 32);
        filter.process(&page).unwrap();
        filter.finish().unwrap();
        assert_eq!(
            filter.result(),
            Some(Value::Map(vec![
                ("valid".to_string(), Value::Bool(true)),
                ("invalidPages".to_string(), Value::List(vec![])),
            ]))
        );
    }

    #[test]
    fn flags_a_page_with_a_corrupted_checksum() {
        let mut filter = PageChecksum::new(&[Value::UInt(32)]).unwrap();
        let mut page = page_with_valid_checksum(0xAB, 32);
        let last = page.len() - 1;
        page[last] ^= 0xFF;
        filter.process(&page).unwrap();
        filter.finish().unwrap();
        let result = filter.result().unwrap();
        let map = result.as_map().unwrap();
        assert_eq!(map[0], ("valid".to_string(), Value::Bool(false)));
        assert_eq!(map[1].1, Value::List(vec![Value::UInt(0)]));
    }
}
