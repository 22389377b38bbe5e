//! Segment file names, meta file codec and chain layout constants.
//!
//! ## `segment.meta` (32 bytes)
//!
//! ```text
//! [magic: u32 = "KKVS"][version: u16][flags: u8][reserved: u8]
//! [default_ts: u32][doc_count: u64][pkey_count: u64][crc32: u32]
//! ```
//!
//! The CRC32 covers the 28 bytes before it.
//!
//! ## Chains (`skey.dat`)
//!
//! ```text
//! [flags: u8][pkey_deleted_ts: u32][count: u32]
//! count x [skey: width][flags: u8][ts: u32]?[expire: u32]?[value]
//! ```
//!
//! `ts` is present when the segment stores timestamps, `expire` when the
//! record flag says so. A value is `[len: u32][bytes]` when values are
//! inlined, otherwise `[offset: u64]` into `value.dat`, which holds
//! `[len: u32][bytes]` records. Deleted records carry no value.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::Cursor;

use crate::SegmentError;

pub const META_FILE: &str = "segment.meta";
pub const PKEY_FILE: &str = "pkey.idx";
pub const SKEY_FILE: &str = "skey.dat";
pub const VALUE_FILE: &str = "value.dat";

/// Magic number identifying a segment meta file (ASCII "KKVS").
pub const SEGMENT_MAGIC: u32 = 0x4B4B_5653;

pub const SEGMENT_VERSION: u16 = 1;

/// Size of the meta file in bytes.
pub const META_BYTES: usize = 4 + 2 + 1 + 1 + 4 + 8 + 8 + 4;

/// Maximum value size accepted on write and on read (10 MiB). Prevents OOM
/// on corrupt files.
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

const FLAG_STORE_TS: u8 = 1;
const FLAG_KEEP_SORT_SEQUENCE: u8 = 1 << 1;
const FLAG_INLINE_VALUES: u8 = 1 << 2;

pub(crate) const CHAIN_PKEY_DELETED: u8 = 1;
pub(crate) const RECORD_DELETED: u8 = 1;
pub(crate) const RECORD_HAS_EXPIRE: u8 = 1 << 1;

/// Header fields of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentMeta {
    pub store_ts: bool,
    pub keep_sort_sequence: bool,
    pub inline_values: bool,
    /// Timestamp reported for every record when `store_ts` is off.
    pub default_ts: u32,
    /// Physical documents: records plus prefix-key tombstones.
    pub doc_count: u64,
    pub pkey_count: u64,
}

impl SegmentMeta {
    pub(crate) fn encode(&self) -> Result<Vec<u8>, SegmentError> {
        let mut flags = 0u8;
        if self.store_ts {
            flags |= FLAG_STORE_TS;
        }
        if self.keep_sort_sequence {
            flags |= FLAG_KEEP_SORT_SEQUENCE;
        }
        if self.inline_values {
            flags |= FLAG_INLINE_VALUES;
        }

        let mut out = Vec::with_capacity(META_BYTES);
        out.write_u32::<LittleEndian>(SEGMENT_MAGIC)?;
        out.write_u16::<LittleEndian>(SEGMENT_VERSION)?;
        out.write_u8(flags)?;
        out.write_u8(0)?;
        out.write_u32::<LittleEndian>(self.default_ts)?;
        out.write_u64::<LittleEndian>(self.doc_count)?;
        out.write_u64::<LittleEndian>(self.pkey_count)?;

        let mut hasher = Crc32::new();
        hasher.update(&out);
        out.write_u32::<LittleEndian>(hasher.finalize())?;
        Ok(out)
    }

    pub(crate) fn decode(data: &[u8]) -> Result<Self, SegmentError> {
        if data.len() != META_BYTES {
            return Err(SegmentError::Corrupt(format!(
                "meta file is {} bytes, expected {}",
                data.len(),
                META_BYTES
            )));
        }
        let body = &data[..META_BYTES - 4];
        let mut r = Cursor::new(data);

        let magic = r.read_u32::<LittleEndian>()?;
        if magic != SEGMENT_MAGIC {
            return Err(SegmentError::Corrupt(format!(
                "bad segment magic: {magic:#010x}"
            )));
        }
        let version = r.read_u16::<LittleEndian>()?;
        if version != SEGMENT_VERSION {
            return Err(SegmentError::Corrupt(format!(
                "unsupported segment version {version}"
            )));
        }
        let flags = r.read_u8()?;
        let _reserved = r.read_u8()?;
        let default_ts = r.read_u32::<LittleEndian>()?;
        let doc_count = r.read_u64::<LittleEndian>()?;
        let pkey_count = r.read_u64::<LittleEndian>()?;
        let stored_crc = r.read_u32::<LittleEndian>()?;

        let mut hasher = Crc32::new();
        hasher.update(body);
        let actual_crc = hasher.finalize();
        if stored_crc != actual_crc {
            return Err(SegmentError::Corrupt(format!(
                "meta checksum mismatch: stored {stored_crc:#010x}, computed {actual_crc:#010x}"
            )));
        }

        Ok(Self {
            store_ts: flags & FLAG_STORE_TS != 0,
            keep_sort_sequence: flags & FLAG_KEEP_SORT_SEQUENCE != 0,
            inline_values: flags & FLAG_INLINE_VALUES != 0,
            default_ts,
            doc_count,
            pkey_count,
        })
    }
}
