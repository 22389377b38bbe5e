use byteorder::{ByteOrder, LittleEndian};
use memtable::NO_EXPIRE_TIME;

use crate::format::{CHAIN_PKEY_DELETED, MAX_VALUE_BYTES, RECORD_DELETED, RECORD_HAS_EXPIRE};
use crate::{SegmentError, SkeyCodec};

/// Sequential reader over the suffix-key records of one prefix key.
///
/// Implemented by the single-segment chain reader and by the cross-segment
/// merged iterator, so consumers never care which one they hold.
pub trait SinglePrefixKeyIterator<'a> {
    fn is_valid(&self) -> bool;

    /// Current suffix key and its deleted flag.
    fn current_skey(&self) -> (u64, bool);

    /// Current value bytes. Empty for tombstones.
    fn current_value(&self) -> &'a [u8];

    fn current_ts(&self) -> u32;

    /// Absolute expire time, or [`NO_EXPIRE_TIME`].
    fn current_expire_time(&self) -> u32;

    /// Whether the current record's explicit expire time has passed.
    ///
    /// # Errors
    ///
    /// [`SegmentError::InvalidState`] if the iterator is exhausted.
    fn current_skey_expired(&self, now: u32) -> Result<bool, SegmentError> {
        if !self.is_valid() {
            return Err(SegmentError::InvalidState);
        }
        let expire = self.current_expire_time();
        Ok(expire != NO_EXPIRE_TIME && expire <= now)
    }

    fn has_pkey_deleted(&self) -> bool;

    /// Timestamp of the prefix-key tombstone; 0 when there is none.
    fn pkey_deleted_ts(&self) -> u32;

    fn move_to_next(&mut self) -> Result<(), SegmentError>;
}

#[derive(Debug, Clone, Copy)]
struct ChainRecordRef<'a> {
    skey: u64,
    deleted: bool,
    ts: u32,
    expire_time: u32,
    value: &'a [u8],
}

/// Reads one chain out of a segment's `skey.dat`, resolving out-of-line
/// values through `value.dat`.
#[derive(Debug)]
pub struct SegmentChainIter<'a> {
    data: &'a [u8],
    values: Option<&'a [u8]>,
    codec: SkeyCodec,
    store_ts: bool,
    default_ts: u32,
    pkey_deleted_ts: Option<u32>,
    remaining: u32,
    pos: usize,
    current: Option<ChainRecordRef<'a>>,
    /// Records already decoded by [`into_key_order`](Self::into_key_order).
    buffered: Option<std::vec::IntoIter<ChainRecordRef<'a>>>,
}

impl<'a> SegmentChainIter<'a> {
    /// Parses the chain header at `offset` and positions on the first record.
    pub(crate) fn open(
        data: &'a [u8],
        values: Option<&'a [u8]>,
        offset: u64,
        codec: SkeyCodec,
        store_ts: bool,
        default_ts: u32,
    ) -> Result<Self, SegmentError> {
        let pos = usize::try_from(offset)
            .ok()
            .filter(|&p| p <= data.len())
            .ok_or_else(|| SegmentError::Corrupt(format!("chain offset {offset} out of range")))?;

        let mut iter = Self {
            data,
            values,
            codec,
            store_ts,
            default_ts,
            pkey_deleted_ts: None,
            remaining: 0,
            pos,
            current: None,
            buffered: None,
        };
        let flags = iter.take(1)?[0];
        let deleted_ts = iter.read_u32()?;
        if flags & CHAIN_PKEY_DELETED != 0 {
            iter.pkey_deleted_ts = Some(deleted_ts);
        }
        iter.remaining = iter.read_u32()?;
        iter.advance()?;
        Ok(iter)
    }

    /// Codec used to decode this chain's suffix keys.
    pub fn codec(&self) -> SkeyCodec {
        self.codec
    }

    /// Reorders the remaining records by the codec's suffix-key order.
    ///
    /// Chains from `keep_sort_sequence` segments are stored in write order
    /// and must pass through here before they can be merged by key.
    ///
    /// # Errors
    ///
    /// Corruption in any remaining record.
    pub fn into_key_order(mut self) -> Result<Self, SegmentError> {
        let mut records = Vec::with_capacity(self.remaining as usize + 1);
        while let Some(record) = self.current {
            records.push(record);
            self.advance()?;
        }
        let codec = self.codec;
        records.sort_by(|a, b| codec.compare(a.skey, b.skey));
        let mut buffered = records.into_iter();
        self.current = buffered.next();
        self.buffered = Some(buffered);
        Ok(self)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SegmentError> {
        let data = self.data;
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                SegmentError::Corrupt(format!("chain truncated at byte {}", self.pos))
            })?;
        let out = &data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, SegmentError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn read_value(&mut self) -> Result<&'a [u8], SegmentError> {
        match self.values {
            None => {
                let len = self.read_u32()? as usize;
                check_value_len(len)?;
                self.take(len)
            }
            Some(store) => {
                let offset = LittleEndian::read_u64(self.take(8)?);
                value_at(store, offset)
            }
        }
    }

    /// Decodes the next record into `current`, or clears it at chain end.
    fn advance(&mut self) -> Result<(), SegmentError> {
        if let Some(buffered) = self.buffered.as_mut() {
            self.current = buffered.next();
            return Ok(());
        }
        if self.remaining == 0 {
            self.current = None;
            return Ok(());
        }
        let width = self.codec.width();
        let raw = self.take(width)?;
        let skey = self.codec.decode(raw);
        let flags = self.take(1)?[0];
        let ts = if self.store_ts {
            self.read_u32()?
        } else {
            self.default_ts
        };
        let expire_time = if flags & RECORD_HAS_EXPIRE != 0 {
            self.read_u32()?
        } else {
            NO_EXPIRE_TIME
        };
        let deleted = flags & RECORD_DELETED != 0;
        let value = if deleted { &[][..] } else { self.read_value()? };

        self.remaining -= 1;
        self.current = Some(ChainRecordRef {
            skey,
            deleted,
            ts,
            expire_time,
            value,
        });
        Ok(())
    }
}

fn check_value_len(len: usize) -> Result<(), SegmentError> {
    if len > MAX_VALUE_BYTES {
        return Err(SegmentError::Corrupt(format!(
            "value length {len} exceeds maximum {MAX_VALUE_BYTES}"
        )));
    }
    Ok(())
}

fn value_at(store: &[u8], offset: u64) -> Result<&[u8], SegmentError> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|&s| s.checked_add(4).is_some_and(|end| end <= store.len()))
        .ok_or_else(|| SegmentError::Corrupt(format!("value offset {offset} out of range")))?;
    let len = LittleEndian::read_u32(&store[start..start + 4]) as usize;
    check_value_len(len)?;
    store
        .get(start + 4..start + 4 + len)
        .ok_or_else(|| SegmentError::Corrupt(format!("value at {offset} truncated")))
}

impl<'a> SinglePrefixKeyIterator<'a> for SegmentChainIter<'a> {
    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn current_skey(&self) -> (u64, bool) {
        self.current.map_or((0, false), |r| (r.skey, r.deleted))
    }

    fn current_value(&self) -> &'a [u8] {
        self.current.map_or(&[][..], |r| r.value)
    }

    fn current_ts(&self) -> u32 {
        self.current.map_or(0, |r| r.ts)
    }

    fn current_expire_time(&self) -> u32 {
        self.current.map_or(NO_EXPIRE_TIME, |r| r.expire_time)
    }

    fn has_pkey_deleted(&self) -> bool {
        self.pkey_deleted_ts.is_some()
    }

    fn pkey_deleted_ts(&self) -> u32 {
        self.pkey_deleted_ts.unwrap_or(0)
    }

    fn move_to_next(&mut self) -> Result<(), SegmentError> {
        if self.current.is_none() {
            return Ok(());
        }
        self.advance()
    }
}
