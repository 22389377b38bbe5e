use std::ops::Range;

use tracing::trace;

use crate::{DecodeError, ValueDecoder};

/// Append-only decode buffer shared by every record of a scan.
///
/// Decoded values are appended and addressed by range. Once the bytes
/// appended since the last reset reach `reset_bytes` the buffer is cleared
/// (keeping its allocation); once its capacity reaches `release_bytes` the
/// allocation itself is dropped.
#[derive(Debug)]
pub struct ScanScratch {
    buf: Vec<u8>,
    used: usize,
    reset_bytes: usize,
    release_bytes: usize,
    resets: u64,
    releases: u64,
}

impl ScanScratch {
    pub fn new(reset_bytes: usize, release_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            used: 0,
            reset_bytes,
            release_bytes,
            resets: 0,
            releases: 0,
        }
    }

    /// Decodes `raw` into the buffer and returns where the output landed.
    /// A failed decode leaves no bytes behind.
    pub fn decode(
        &mut self,
        decoder: &dyn ValueDecoder,
        raw: &[u8],
    ) -> Result<Range<usize>, DecodeError> {
        self.reclaim();
        let start = self.buf.len();
        if let Err(e) = decoder.decode(raw, &mut self.buf) {
            self.buf.truncate(start);
            return Err(e);
        }
        self.used += self.buf.len() - start;
        Ok(start..self.buf.len())
    }

    pub fn get(&self, range: Range<usize>) -> &[u8] {
        &self.buf[range]
    }

    fn reclaim(&mut self) {
        if self.buf.capacity() >= self.release_bytes {
            trace!(capacity = self.buf.capacity(), "releasing scan scratch");
            self.buf = Vec::new();
            self.used = 0;
            self.releases += 1;
        } else if self.used >= self.reset_bytes {
            trace!(used = self.used, "resetting scan scratch");
            self.buf.clear();
            self.used = 0;
            self.resets += 1;
        }
    }

    /// Bytes appended since the last reset or release.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn releases(&self) -> u64 {
        self.releases
    }
}
