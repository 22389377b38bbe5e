//! # PKey Table - Prefix-Key Hash Index Formats
//!
//! Every segment maps each prefix-key hash to the location of its suffix-key
//! chain. Three on-disk hash encodings exist; all of them are read through
//! the same two traits:
//!
//! ```text
//!                      ┌───────────────────────────┐
//!   pkey.idx bytes ──► │ open_table (format tag)   │
//!                      └─────────────┬─────────────┘
//!            ┌───────────────────────┼────────────────────────┐
//!            ▼                       ▼                        ▼
//!   ┌────────────────┐     ┌──────────────────┐     ┌────────────────────┐
//!   │ DenseTable     │     │ CuckooTable      │     │ SeparateChainTable │
//!   │ linear probing │     │ 2 hashes x ways  │     │ buckets → node list│
//!   └───────┬────────┘     └────────┬─────────┘     └─────────┬──────────┘
//!           └───────────── dyn PrefixKeyTable ────────────────┘
//!                                   │ iter()
//!                                   ▼
//!                     dyn PrefixKeyTableIterator
//! ```
//!
//! ## Ordering
//!
//! Open-addressed tables (dense, cuckoo) store keys at hashed positions, so
//! their iterators must be [`sort_by_key`](PrefixKeyTableIterator::sort_by_key)ed
//! before a merge can rely on ascending keys. The separate-chaining table keeps
//! its nodes in append order and treats `sort_by_key` as a no-op: iteration
//! order is whatever order the writer appended keys in.
//!
//! ## Layout
//!
//! ```text
//! [magic: u32 = "KPKT"][format tag: u8][version: u8][reserved: u16][body ...]
//! ```
//!
//! All integers are little-endian. See the per-format modules for the body.

mod cuckoo;
mod dense;
mod format;
mod separate_chain;
mod slots;

use std::fmt;
use std::io;

use thiserror::Error;

pub use cuckoo::CuckooTable;
pub use dense::DenseTable;
pub use format::{TableFormat, TABLE_HEADER_BYTES, TABLE_MAGIC, TABLE_VERSION};
pub use separate_chain::SeparateChainTable;

/// Default fill ratio used when sizing a table.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Opaque locator of a suffix-key chain inside one segment's chain store.
///
/// Offsets are only meaningful within the segment that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PKeyOffset(pub u64);

/// One `(prefix key, region, chain offset)` triple of a prefix-key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixKeyEntry {
    pub key: u64,
    pub region_id: i32,
    pub offset: PKeyOffset,
}

/// Errors raised while decoding or encoding a prefix-key table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("pkey table too small: {0} bytes")]
    TooSmall(usize),

    #[error("bad pkey table magic: {0:#010x}")]
    BadMagic(u32),

    #[error("unknown pkey table format tag {0}")]
    UnknownFormat(u8),

    #[error("unsupported pkey table version {0}")]
    UnsupportedVersion(u8),

    /// Structural damage: slot counts, states or links that do not add up.
    #[error("corrupt pkey table: {0}")]
    Corrupt(String),

    #[error("duplicate prefix key {0:#x}")]
    DuplicateKey(u64),

    #[error("invalid load factor {0}")]
    InvalidLoadFactor(f64),
}

/// A decoded, read-only prefix-key table.
pub trait PrefixKeyTable: Send + Sync + fmt::Debug {
    fn format(&self) -> TableFormat;

    /// Number of keys, taken from the table header.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point lookup.
    fn find(&self, key: u64) -> Option<PrefixKeyEntry>;

    /// Iterator in physical order. Call
    /// [`sort_by_key`](PrefixKeyTableIterator::sort_by_key) for key order.
    fn iter(&self) -> Box<dyn PrefixKeyTableIterator + '_>;
}

/// Cursor over the entries of one [`PrefixKeyTable`].
pub trait PrefixKeyTableIterator {
    fn is_valid(&self) -> bool;

    fn move_to_next(&mut self);

    /// Reorders the remaining entries by ascending key. Idempotent; a no-op
    /// for formats whose physical order is used as-is.
    fn sort_by_key(&mut self);

    /// Total number of entries the iterator walks.
    fn size(&self) -> usize;

    /// Current entry, `None` once exhausted.
    fn entry(&self) -> Option<PrefixKeyEntry>;

    fn key(&self) -> u64 {
        debug_assert!(self.is_valid());
        self.entry().map_or(0, |e| e.key)
    }

    fn value(&self) -> PKeyOffset {
        debug_assert!(self.is_valid());
        self.entry().map_or_else(PKeyOffset::default, |e| e.offset)
    }

    fn region_id(&self) -> i32 {
        debug_assert!(self.is_valid());
        self.entry().map_or(0, |e| e.region_id)
    }
}

/// Decodes a table, dispatching on the stored format tag.
///
/// # Errors
///
/// Returns an error for a short buffer, wrong magic, unknown tag, unknown
/// version, or a body whose sizes or slot states are inconsistent.
pub fn open_table(data: Vec<u8>) -> Result<Box<dyn PrefixKeyTable>, TableError> {
    let format = format::read_header(&data)?;
    Ok(match format {
        TableFormat::Dense => Box::new(DenseTable::open(data)?),
        TableFormat::Cuckoo => Box::new(CuckooTable::open(data)?),
        TableFormat::SeparateChain => Box::new(SeparateChainTable::open(data)?),
    })
}

/// Encodes `entries` as a table of the given format.
///
/// `entries` order matters only for [`TableFormat::SeparateChain`], which
/// keeps it as the iteration order.
///
/// # Errors
///
/// Fails on duplicate keys or a load factor outside `(0, 1]`.
pub fn encode_table(
    format: TableFormat,
    entries: &[PrefixKeyEntry],
    load_factor: f64,
) -> Result<Vec<u8>, TableError> {
    if !(load_factor > 0.0 && load_factor <= 1.0) {
        return Err(TableError::InvalidLoadFactor(load_factor));
    }
    let mut seen = std::collections::HashSet::with_capacity(entries.len());
    for e in entries {
        if !seen.insert(e.key) {
            return Err(TableError::DuplicateKey(e.key));
        }
    }
    match format {
        TableFormat::Dense => dense::encode(entries, load_factor),
        TableFormat::Cuckoo => cuckoo::encode(entries, load_factor),
        TableFormat::SeparateChain => separate_chain::encode(entries, load_factor),
    }
}

#[cfg(test)]
mod tests;
