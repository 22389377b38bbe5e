//! Table header constants and tag dispatch.
//!
//! ```text
//! [magic: u32 LE = "KPKT"][format tag: u8][version: u8][reserved: u16]
//! ```
//!
//! The reader inspects the magic first, then the tag, and hands the full
//! buffer to the matching format.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::TableError;

/// Magic number identifying a prefix-key table (ASCII "KPKT").
pub const TABLE_MAGIC: u32 = 0x4B50_4B54;

/// Current table layout version.
pub const TABLE_VERSION: u8 = 1;

/// Header size: magic (4) + tag (1) + version (1) + reserved (2).
pub const TABLE_HEADER_BYTES: usize = 4 + 1 + 1 + 2;

/// The three supported hash encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    /// Open addressing with linear probing over one slot array.
    Dense,
    /// Two hash functions, each addressing a bucket of several slots.
    Cuckoo,
    /// Bucket heads pointing into a flat, append-ordered node array.
    SeparateChain,
}

impl TableFormat {
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            TableFormat::Dense => 0,
            TableFormat::Cuckoo => 1,
            TableFormat::SeparateChain => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, TableError> {
        match tag {
            0 => Ok(TableFormat::Dense),
            1 => Ok(TableFormat::Cuckoo),
            2 => Ok(TableFormat::SeparateChain),
            other => Err(TableError::UnknownFormat(other)),
        }
    }
}

/// Validates the header and returns the stored format.
pub(crate) fn read_header(data: &[u8]) -> Result<TableFormat, TableError> {
    if data.len() < TABLE_HEADER_BYTES {
        return Err(TableError::TooSmall(data.len()));
    }
    let mut r = Cursor::new(data);
    let magic = r.read_u32::<LittleEndian>()?;
    if magic != TABLE_MAGIC {
        return Err(TableError::BadMagic(magic));
    }
    let format = TableFormat::from_tag(r.read_u8()?)?;
    let version = r.read_u8()?;
    if version != TABLE_VERSION {
        return Err(TableError::UnsupportedVersion(version));
    }
    Ok(format)
}

pub(crate) fn write_header(out: &mut Vec<u8>, format: TableFormat) -> Result<(), TableError> {
    out.write_u32::<LittleEndian>(TABLE_MAGIC)?;
    out.write_u8(format.tag())?;
    out.write_u8(TABLE_VERSION)?;
    out.write_u16::<LittleEndian>(0)?;
    Ok(())
}

/// Slot count needed to hold `n` keys at `load_factor`, never zero.
pub(crate) fn capacity_for(n: usize, load_factor: f64) -> usize {
    ((n as f64 / load_factor).ceil() as usize).max(n).max(1)
}

/// 64-bit finalizer (splitmix64) used to derive secondary hash positions.
pub(crate) fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
