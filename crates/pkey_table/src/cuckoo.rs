//! Cuckoo table: two hash functions, each selecting a bucket of `ways` slots.
//!
//! ```text
//! body: [bucket_count: u64][ways: u8][pad: 7][key_count: u64][slot; bucket_count * ways]
//! bucket 1 = key % bucket_count
//! bucket 2 = mix64(key) % bucket_count
//! ```
//!
//! A key lives in one of its two buckets, so lookups touch at most
//! `2 * ways` slots.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::format::{mix64, read_header, write_header, TableFormat, TABLE_HEADER_BYTES};
use crate::slots::{live_slots, read_slot, write_slot, SlotArrayIter, SLOT_BYTES};
use crate::{PrefixKeyEntry, PrefixKeyTable, PrefixKeyTableIterator, TableError};

/// Slots per bucket written by [`encode`].
pub(crate) const DEFAULT_WAYS: usize = 4;
const MAX_WAYS: usize = 16;
const MAX_KICKS: usize = 500;
const MAX_GROWTHS: usize = 32;

const META_BYTES: usize = 8 + 1 + 7 + 8;
const SLOTS_BASE: usize = TABLE_HEADER_BYTES + META_BYTES;

/// Two-choice bucketized cuckoo hash table.
#[derive(Debug)]
pub struct CuckooTable {
    data: Vec<u8>,
    bucket_count: usize,
    ways: usize,
    key_count: usize,
}

impl CuckooTable {
    /// Decodes and validates a cuckoo table.
    pub fn open(data: Vec<u8>) -> Result<Self, TableError> {
        if read_header(&data)? != TableFormat::Cuckoo {
            return Err(TableError::Corrupt("not a cuckoo table".to_string()));
        }
        if data.len() < SLOTS_BASE {
            return Err(TableError::TooSmall(data.len()));
        }
        let meta = &data[TABLE_HEADER_BYTES..SLOTS_BASE];
        let bucket_count = LittleEndian::read_u64(&meta[0..8]) as usize;
        let ways = meta[8] as usize;
        let key_count = LittleEndian::read_u64(&meta[16..24]) as usize;

        if ways == 0 || ways > MAX_WAYS {
            return Err(TableError::Corrupt(format!("invalid bucket ways {ways}")));
        }
        let slot_count = bucket_count
            .checked_mul(ways)
            .filter(|n| n.checked_mul(SLOT_BYTES).is_some())
            .ok_or_else(|| TableError::Corrupt(format!("{bucket_count} buckets overflow")))?;
        if data.len() - SLOTS_BASE != slot_count * SLOT_BYTES {
            return Err(TableError::Corrupt(format!(
                "cuckoo table with {} slots needs {} bytes, found {}",
                slot_count,
                slot_count * SLOT_BYTES,
                data.len() - SLOTS_BASE
            )));
        }
        live_slots(&data, SLOTS_BASE, slot_count, key_count)?;

        Ok(Self {
            data,
            bucket_count,
            ways,
            key_count,
        })
    }

    fn slot(&self, idx: usize) -> Option<PrefixKeyEntry> {
        read_slot(&self.data, SLOTS_BASE + idx * SLOT_BYTES).ok().flatten()
    }
}

impl PrefixKeyTable for CuckooTable {
    fn format(&self) -> TableFormat {
        TableFormat::Cuckoo
    }

    fn len(&self) -> usize {
        self.key_count
    }

    fn find(&self, key: u64) -> Option<PrefixKeyEntry> {
        if self.bucket_count == 0 {
            return None;
        }
        let (b1, b2) = buckets(key, self.bucket_count);
        [b1, b2].into_iter().find_map(|bucket| {
            (0..self.ways)
                .filter_map(|way| self.slot(bucket * self.ways + way))
                .find(|e| e.key == key)
        })
    }

    fn iter(&self) -> Box<dyn PrefixKeyTableIterator + '_> {
        let live = (0..self.bucket_count * self.ways)
            .filter_map(|i| self.slot(i))
            .collect();
        Box::new(SlotArrayIter::new(live))
    }
}

fn buckets(key: u64, bucket_count: usize) -> (usize, usize) {
    let n = bucket_count as u64;
    ((key % n) as usize, (mix64(key) % n) as usize)
}

pub(crate) fn encode(entries: &[PrefixKeyEntry], load_factor: f64) -> Result<Vec<u8>, TableError> {
    let ways = DEFAULT_WAYS;
    let mut bucket_count =
        ((entries.len() as f64 / (ways as f64 * load_factor)).ceil() as usize).max(1);

    let mut growths = 0;
    let slots = loop {
        if let Some(slots) = place_all(entries, bucket_count, ways) {
            break slots;
        }
        growths += 1;
        if growths > MAX_GROWTHS {
            return Err(TableError::Corrupt(
                "cuckoo placement did not converge".to_string(),
            ));
        }
        bucket_count *= 2;
    };

    let mut out = Vec::with_capacity(SLOTS_BASE + slots.len() * SLOT_BYTES);
    write_header(&mut out, TableFormat::Cuckoo)?;
    out.write_u64::<LittleEndian>(bucket_count as u64)?;
    out.write_u8(ways as u8)?;
    out.extend_from_slice(&[0u8; 7]);
    out.write_u64::<LittleEndian>(entries.len() as u64)?;
    for slot in &slots {
        write_slot(&mut out, slot.as_ref())?;
    }
    Ok(out)
}

/// Places every entry or gives up (`None`) so the caller can grow the table.
fn place_all(
    entries: &[PrefixKeyEntry],
    bucket_count: usize,
    ways: usize,
) -> Option<Vec<Option<PrefixKeyEntry>>> {
    let mut slots = vec![None; bucket_count * ways];
    for e in entries {
        insert(&mut slots, bucket_count, ways, *e)?;
    }
    Some(slots)
}

fn insert(
    slots: &mut [Option<PrefixKeyEntry>],
    bucket_count: usize,
    ways: usize,
    entry: PrefixKeyEntry,
) -> Option<()> {
    let mut cur = entry;
    let mut bucket = buckets(cur.key, bucket_count).0;
    for kick in 0..MAX_KICKS {
        let (b1, b2) = buckets(cur.key, bucket_count);
        for b in [b1, b2] {
            if let Some(way) = (0..ways).find(|&w| slots[b * ways + w].is_none()) {
                slots[b * ways + way] = Some(cur);
                return Some(());
            }
        }
        // Both buckets full: evict a victim and move it to its other bucket.
        let idx = bucket * ways + kick % ways;
        let victim = slots[idx].replace(cur)?;
        let (v1, v2) = buckets(victim.key, bucket_count);
        bucket = if v1 == bucket { v2 } else { v1 };
        cur = victim;
    }
    None
}
