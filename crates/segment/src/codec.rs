//! Fixed-width suffix-key encodings.

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};
use config::SkeyFieldType;

/// Concrete suffix-key codec, chosen once per region from its field type.
///
/// Decoded keys are carried as `u64`. Signed codecs sign-extend to 64 bits,
/// so `-1i8` decodes to `u64::MAX` and compares below `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeyCodec {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl SkeyCodec {
    /// String keys are stored as their 64-bit hash.
    #[must_use]
    pub fn for_field(ty: SkeyFieldType) -> Self {
        match ty {
            SkeyFieldType::Int8 => SkeyCodec::Int8,
            SkeyFieldType::Int16 => SkeyCodec::Int16,
            SkeyFieldType::Int32 => SkeyCodec::Int32,
            SkeyFieldType::Int64 => SkeyCodec::Int64,
            SkeyFieldType::UInt8 => SkeyCodec::UInt8,
            SkeyFieldType::UInt16 => SkeyCodec::UInt16,
            SkeyFieldType::UInt32 => SkeyCodec::UInt32,
            SkeyFieldType::UInt64 | SkeyFieldType::String => SkeyCodec::UInt64,
        }
    }

    #[must_use]
    pub fn width(self) -> usize {
        match self {
            SkeyCodec::Int8 | SkeyCodec::UInt8 => 1,
            SkeyCodec::Int16 | SkeyCodec::UInt16 => 2,
            SkeyCodec::Int32 | SkeyCodec::UInt32 => 4,
            SkeyCodec::Int64 | SkeyCodec::UInt64 => 8,
        }
    }

    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            SkeyCodec::Int8 | SkeyCodec::Int16 | SkeyCodec::Int32 | SkeyCodec::Int64
        )
    }

    /// Decodes exactly [`width`](Self::width) bytes.
    #[must_use]
    pub fn decode(self, raw: &[u8]) -> u64 {
        match self {
            SkeyCodec::Int8 => raw[0] as i8 as i64 as u64,
            SkeyCodec::Int16 => LittleEndian::read_i16(raw) as i64 as u64,
            SkeyCodec::Int32 => LittleEndian::read_i32(raw) as i64 as u64,
            SkeyCodec::Int64 => LittleEndian::read_i64(raw) as u64,
            SkeyCodec::UInt8 => u64::from(raw[0]),
            SkeyCodec::UInt16 => u64::from(LittleEndian::read_u16(raw)),
            SkeyCodec::UInt32 => u64::from(LittleEndian::read_u32(raw)),
            SkeyCodec::UInt64 => LittleEndian::read_u64(raw),
        }
    }

    /// Appends the low [`width`](Self::width) bytes of `skey`.
    pub fn encode(self, skey: u64, out: &mut Vec<u8>) {
        out.extend_from_slice(&skey.to_le_bytes()[..self.width()]);
    }

    /// Returns `true` if `skey` survives an encode/decode cycle unchanged.
    #[must_use]
    pub fn fits(self, skey: u64) -> bool {
        let mut buf = Vec::with_capacity(8);
        self.encode(skey, &mut buf);
        self.decode(&buf) == skey
    }

    /// Orders two decoded keys as the field type orders them.
    #[must_use]
    pub fn compare(self, a: u64, b: u64) -> Ordering {
        if self.is_signed() {
            (a as i64).cmp(&(b as i64))
        } else {
            a.cmp(&b)
        }
    }
}
