//! # Segment - Immutable KKV Segment Files
//!
//! A segment is one immutable directory produced by dumping a
//! [`memtable::KkvMemtable`] (or by a compaction pass). Segments are
//! *write-once, read-many*: the merge-scan engine combines any number of
//! them into one logical table.
//!
//! ## Directory layout
//!
//! ```text
//! segment_000003/
//! ┌──────────────┬─────────────────────────────────────────────────────┐
//! │ segment.meta │ magic "KKVS" | version | flags | default_ts         │
//! │              │ doc_count | pkey_count | crc32                      │
//! ├──────────────┼─────────────────────────────────────────────────────┤
//! │ pkey.idx     │ prefix-key hash table (dense | cuckoo | sep. chain) │
//! │              │ pkey → (region, offset into skey.dat)               │
//! ├──────────────┼─────────────────────────────────────────────────────┤
//! │ skey.dat     │ one chain per pkey: tombstone header + records      │
//! ├──────────────┼─────────────────────────────────────────────────────┤
//! │ value.dat    │ [len | bytes] records, only when values are not     │
//! │              │ inlined into the chains                             │
//! └──────────────┴─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reading
//!
//! [`Segment::open`] loads and validates everything. A [`SegmentScanner`]
//! walks the prefix keys; [`SegmentScanner::materialize_chain`] returns a
//! [`SegmentChainIter`] implementing [`SinglePrefixKeyIterator`]. Suffix keys
//! are decoded with the [`SkeyCodec`] of the chain's region.

mod chain;
mod codec;
mod error;
mod format;
mod reader;
mod scanner;
mod writer;

pub use chain::{SegmentChainIter, SinglePrefixKeyIterator};
pub use codec::SkeyCodec;
pub use error::SegmentError;
pub use format::{
    SegmentMeta, MAX_VALUE_BYTES, META_BYTES, META_FILE, PKEY_FILE, SEGMENT_MAGIC,
    SEGMENT_VERSION, SKEY_FILE, VALUE_FILE,
};
pub use reader::Segment;
pub use scanner::SegmentScanner;
pub use writer::{ChainInput, ChainRecord, SegmentWriteOptions, SegmentWriter};

#[cfg(test)]
mod tests;
