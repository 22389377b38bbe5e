//! Slot codec and iterator shared by the open-addressed formats.
//!
//! ```text
//! slot: [key: u64][region_id: i32][offset: u64][state: u8]   (21 bytes)
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::{PKeyOffset, PrefixKeyEntry, PrefixKeyTableIterator, TableError};

pub(crate) const SLOT_BYTES: usize = 8 + 4 + 8 + 1;

const SLOT_EMPTY: u8 = 0;
const SLOT_USED: u8 = 1;

pub(crate) fn write_slot(out: &mut Vec<u8>, slot: Option<&PrefixKeyEntry>) -> Result<(), TableError> {
    match slot {
        Some(e) => {
            out.write_u64::<LittleEndian>(e.key)?;
            out.write_i32::<LittleEndian>(e.region_id)?;
            out.write_u64::<LittleEndian>(e.offset.0)?;
            out.write_u8(SLOT_USED)?;
        }
        None => out.extend_from_slice(&[0u8; SLOT_BYTES]),
    }
    Ok(())
}

/// Decodes the slot starting at `data[pos..]`. The caller guarantees
/// `pos + SLOT_BYTES <= data.len()`.
pub(crate) fn read_slot(data: &[u8], pos: usize) -> Result<Option<PrefixKeyEntry>, TableError> {
    let raw = &data[pos..pos + SLOT_BYTES];
    match raw[20] {
        SLOT_EMPTY => Ok(None),
        SLOT_USED => Ok(Some(PrefixKeyEntry {
            key: LittleEndian::read_u64(&raw[0..8]),
            region_id: LittleEndian::read_i32(&raw[8..12]),
            offset: PKeyOffset(LittleEndian::read_u64(&raw[12..20])),
        })),
        state => Err(TableError::Corrupt(format!(
            "invalid slot state {state} at byte {pos}"
        ))),
    }
}

/// Collects the live slots of `slot_count` slots starting at `base` and
/// checks them against the header's key count.
pub(crate) fn live_slots(
    data: &[u8],
    base: usize,
    slot_count: usize,
    key_count: usize,
) -> Result<Vec<PrefixKeyEntry>, TableError> {
    let mut live = Vec::with_capacity(key_count);
    for i in 0..slot_count {
        if let Some(e) = read_slot(data, base + i * SLOT_BYTES)? {
            live.push(e);
        }
    }
    if live.len() != key_count {
        return Err(TableError::Corrupt(format!(
            "header says {} keys, found {} live slots",
            key_count,
            live.len()
        )));
    }
    Ok(live)
}

/// Iterator over a snapshot of live slots.
///
/// Slots are yielded in physical order until [`sort_by_key`] is called.
///
/// [`sort_by_key`]: PrefixKeyTableIterator::sort_by_key
pub(crate) struct SlotArrayIter {
    entries: Vec<PrefixKeyEntry>,
    pos: usize,
    sorted: bool,
}

impl SlotArrayIter {
    pub(crate) fn new(entries: Vec<PrefixKeyEntry>) -> Self {
        Self {
            entries,
            pos: 0,
            sorted: false,
        }
    }
}

impl PrefixKeyTableIterator for SlotArrayIter {
    fn is_valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn move_to_next(&mut self) {
        if self.is_valid() {
            self.pos += 1;
        }
    }

    fn sort_by_key(&mut self) {
        if self.sorted {
            return;
        }
        self.entries[self.pos..].sort_unstable_by_key(|e| e.key);
        self.sorted = true;
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self) -> Option<PrefixKeyEntry> {
        self.entries.get(self.pos).copied()
    }
}
