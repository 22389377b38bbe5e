use std::io;

use pkey_table::TableError;
use thiserror::Error;

/// Errors raised while writing, opening or reading a segment.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("pkey table: {0}")]
    Table(#[from] TableError),

    /// Malformed meta file, chain or value store.
    #[error("corrupt segment: {0}")]
    Corrupt(String),

    #[error("region {0} is not part of the schema")]
    UnknownRegion(i32),

    #[error("chain belongs to region {found}, expected region {expected}")]
    RegionMismatch { expected: i32, found: i32 },

    #[error("suffix key {skey:#x} does not fit a {width}-byte field")]
    SkeyOutOfRange { skey: u64, width: usize },

    #[error("value of {0} bytes exceeds the per-record limit")]
    ValueTooLarge(usize),

    #[error("segment directory already exists: {0}")]
    AlreadyExists(String),

    /// An accessor that needs a current record was called on an exhausted
    /// iterator.
    #[error("iterator is not positioned on a record")]
    InvalidState,
}

impl SegmentError {
    /// Returns `true` for errors that mean the on-disk data cannot be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SegmentError::Table(_)
                | SegmentError::Corrupt(_)
                | SegmentError::UnknownRegion(_)
                | SegmentError::RegionMismatch { .. }
        )
    }
}
