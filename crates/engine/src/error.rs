use config::ConfigError;
use segment::SegmentError;
use thiserror::Error;

use crate::Checkpoint;

/// Failure reported by a [`ValueDecoder`](crate::ValueDecoder) or
/// [`FieldFormatter`](crate::FieldFormatter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// Errors surfaced by a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("segment: {0}")]
    Segment(#[from] SegmentError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// The record under the cursor could not be decoded. The cursor stays
    /// on it, so the checkpoint does not move past it.
    #[error("decode failed for pkey {pkey:#x} skey {skey:#x}: {source}")]
    Decode {
        pkey: u64,
        skey: u64,
        #[source]
        source: DecodeError,
    },

    #[error("checkpoint {0} is past the end of the scan")]
    SeekPastEnd(Checkpoint),

    #[error("invalid checkpoint {0:?}")]
    InvalidCheckpoint(String),
}

impl ScanError {
    /// Returns `true` if the scan hit damaged or inconsistent on-disk data.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, ScanError::Segment(e) if e.is_corruption())
    }
}
