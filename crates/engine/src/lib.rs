//! # Engine - KKV Merge-Scan Engine
//!
//! Combines any number of immutable [`segment::Segment`]s into one logical,
//! deduplicated, tombstone-resolved and TTL-filtered scan ordered by prefix
//! key.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ ScanReader                                               │
//! │   filters: skey tombstone → pkey tombstone → TTL/expiry  │
//! │   decode (plain format) → project fields → Document      │
//! │   checkpoint (pkey_ordinal, skey_ordinal)                │
//! ├──────────────────────────────────────────────────────────┤
//! │ CrossSegmentMerger                                       │
//! │   min-heap of SegmentScanners by pkey, newest first      │
//! │   → MergeGroup { pkey, region, MergedChainIter }         │
//! ├──────────────────────────────────────────────────────────┤
//! │ MergedChainIter                                          │
//! │   heap of SegmentChainIters by skey, newest wins         │
//! ├──────────────────────────────────────────────────────────┤
//! │ segment::SegmentScanner / segment::SegmentChainIter      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                                  |
//! |----------------|----------------------------------------------------------|
//! | [`merged`]     | suffix-key merge within one prefix key                   |
//! | [`merger`]     | prefix-key merge across segments, estimates, progress    |
//! | [`reader`]     | `ScanReader`, `Document`, `Checkpoint`                   |
//! | [`collab`]     | value decoder, field formatter, TTL decider              |
//! | [`scratch`]    | bounded decode buffer                                    |
//! | [`compaction`] | rewrite pass producing one segment                       |
//!
//! ## Last writer wins
//!
//! A segment's index is its position in the slice handed to the reader;
//! a larger index means a newer segment. For equal prefix keys the
//! newest segment is popped first, so its prefix-key tombstone hides every
//! older segment. For equal suffix keys the newest segment's record is
//! surfaced and older ones are skipped.
//!
//! ## Example
//!
//! ```no_run
//! use config::{RegionConfig, ScanOptions, Schema};
//! use engine::{Document, ScanReader};
//! use segment::Segment;
//!
//! # fn main() -> anyhow::Result<()> {
//! let schema = Schema::single(RegionConfig::builder(0, "default").value_field("v").build());
//! let segments = vec![Segment::open("data/segment_000000")?];
//! let mut reader = ScanReader::open(&segments, &schema, ScanOptions::from_env()?)?;
//! let mut doc = Document::new();
//! while reader.read(&mut doc)? {
//!     println!("{} {} {:?}", doc.pkey, doc.skey, doc.field("v"));
//! }
//! # Ok(())
//! # }
//! ```
pub mod collab;
pub mod compaction;
pub mod merged;
pub mod merger;
pub mod reader;
pub mod scratch;

mod error;

pub use collab::{
    pack_fields, FieldFormatter, PackValueFormatter, PassthroughDecoder, RegionTtlDecider,
    TtlDecider, ValueDecoder,
};
pub use compaction::{compact_segments, CompactionStats};
pub use error::{DecodeError, ScanError};
pub use merged::MergedChainIter;
pub use merger::{CrossSegmentMerger, MergeGroup};
pub use reader::{Checkpoint, Document, ScanReader, ScanReaderBuilder};
pub use scratch::ScanScratch;

#[cfg(test)]
mod tests;
