//! Pluggable value decoding, field projection and TTL policy.
//!
//! ## Pack value layout
//!
//! ```text
//! [field_count: u16 LE] field_count x ([len: u32 LE][bytes])
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use config::Schema;

use crate::DecodeError;

/// Turns stored value bytes into the pack layout the formatter reads.
pub trait ValueDecoder: Send + Sync {
    /// Appends the decoded form of `raw` to `out`.
    fn decode(&self, raw: &[u8], out: &mut Vec<u8>) -> Result<(), DecodeError>;
}

/// Copies values unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

impl ValueDecoder for PassthroughDecoder {
    fn decode(&self, raw: &[u8], out: &mut Vec<u8>) -> Result<(), DecodeError> {
        out.extend_from_slice(raw);
        Ok(())
    }
}

/// Extracts one named field (by position) from a decoded value.
pub trait FieldFormatter: Send + Sync {
    fn extract_field(&self, field_id: usize, value: &[u8]) -> Result<String, DecodeError>;
}

/// Reads fields out of the pack layout. Field bytes must be UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackValueFormatter;

impl FieldFormatter for PackValueFormatter {
    fn extract_field(&self, field_id: usize, value: &[u8]) -> Result<String, DecodeError> {
        if value.len() < 2 {
            return Err(DecodeError(format!(
                "pack value of {} bytes has no field count",
                value.len()
            )));
        }
        let count = LittleEndian::read_u16(value) as usize;
        if field_id >= count {
            return Err(DecodeError(format!(
                "field {field_id} requested, value packs {count}"
            )));
        }

        let mut pos = 2;
        for id in 0..=field_id {
            let len = value
                .get(pos..pos + 4)
                .map(LittleEndian::read_u32)
                .ok_or_else(|| DecodeError(format!("pack truncated in field {id} header")))?
                as usize;
            let bytes = value
                .get(pos + 4..pos + 4 + len)
                .ok_or_else(|| DecodeError(format!("pack truncated in field {id}")))?;
            if id == field_id {
                return String::from_utf8(bytes.to_vec())
                    .map_err(|e| DecodeError(format!("field {id} is not UTF-8: {e}")));
            }
            pos += 4 + len;
        }
        Err(DecodeError(format!("field {field_id} not found")))
    }
}

/// Builds a pack value from field bytes.
pub fn pack_fields(fields: &[&[u8]]) -> Vec<u8> {
    let total: usize = fields.iter().map(|f| 4 + f.len()).sum();
    let mut out = Vec::with_capacity(2 + total);
    // Writes into a Vec cannot fail.
    let _ = out.write_u16::<LittleEndian>(fields.len() as u16);
    for f in fields {
        let _ = out.write_u32::<LittleEndian>(f.len() as u32);
        out.extend_from_slice(f);
    }
    out
}

/// Decides whether a record is expired by configuration alone.
pub trait TtlDecider: Send + Sync {
    fn is_expired(&self, region_id: i32, ts: u32, now: u32) -> bool;
}

/// Applies each region's configured TTL: expired once `ts + ttl < now`.
/// Regions without a TTL never expire here.
#[derive(Debug, Clone, Default)]
pub struct RegionTtlDecider {
    ttls: Vec<(i32, u32)>,
}

impl RegionTtlDecider {
    pub fn from_schema(schema: &Schema) -> Self {
        Self {
            ttls: schema
                .regions()
                .filter_map(|r| r.ttl_seconds.map(|ttl| (r.region_id, ttl)))
                .collect(),
        }
    }

    fn ttl(&self, region_id: i32) -> Option<u32> {
        self.ttls
            .iter()
            .find(|(id, _)| *id == region_id)
            .map(|(_, ttl)| *ttl)
    }
}

impl TtlDecider for RegionTtlDecider {
    fn is_expired(&self, region_id: i32, ts: u32, now: u32) -> bool {
        match self.ttl(region_id) {
            Some(ttl) => u64::from(ts) + u64::from(ttl) < u64::from(now),
            None => false,
        }
    }
}
