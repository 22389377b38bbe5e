//! Dense table: open addressing with linear probing.
//!
//! ```text
//! body: [slot_count: u64][key_count: u64][slot; slot_count]
//! home slot = key % slot_count
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::format::{capacity_for, read_header, write_header, TableFormat, TABLE_HEADER_BYTES};
use crate::slots::{live_slots, read_slot, write_slot, SlotArrayIter, SLOT_BYTES};
use crate::{PrefixKeyEntry, PrefixKeyTable, PrefixKeyTableIterator, TableError};

const META_BYTES: usize = 8 + 8;
const SLOTS_BASE: usize = TABLE_HEADER_BYTES + META_BYTES;

/// Linear-probing prefix-key table.
#[derive(Debug)]
pub struct DenseTable {
    data: Vec<u8>,
    slot_count: usize,
    key_count: usize,
}

impl DenseTable {
    /// Decodes and validates a dense table.
    pub fn open(data: Vec<u8>) -> Result<Self, TableError> {
        if read_header(&data)? != TableFormat::Dense {
            return Err(TableError::Corrupt("not a dense table".to_string()));
        }
        if data.len() < SLOTS_BASE {
            return Err(TableError::TooSmall(data.len()));
        }
        let slot_count = LittleEndian::read_u64(&data[TABLE_HEADER_BYTES..]) as usize;
        let key_count = LittleEndian::read_u64(&data[TABLE_HEADER_BYTES + 8..]) as usize;

        let expected = slot_count
            .checked_mul(SLOT_BYTES)
            .ok_or_else(|| TableError::Corrupt(format!("slot count {slot_count} overflows")))?;
        if data.len() - SLOTS_BASE != expected {
            return Err(TableError::Corrupt(format!(
                "dense table with {} slots needs {} bytes, found {}",
                slot_count,
                expected,
                data.len() - SLOTS_BASE
            )));
        }
        if key_count > slot_count {
            return Err(TableError::Corrupt(format!(
                "{key_count} keys cannot fit {slot_count} slots"
            )));
        }
        live_slots(&data, SLOTS_BASE, slot_count, key_count)?;

        Ok(Self {
            data,
            slot_count,
            key_count,
        })
    }

    fn slot(&self, idx: usize) -> Option<PrefixKeyEntry> {
        read_slot(&self.data, SLOTS_BASE + idx * SLOT_BYTES).ok().flatten()
    }
}

impl PrefixKeyTable for DenseTable {
    fn format(&self) -> TableFormat {
        TableFormat::Dense
    }

    fn len(&self) -> usize {
        self.key_count
    }

    fn find(&self, key: u64) -> Option<PrefixKeyEntry> {
        if self.slot_count == 0 {
            return None;
        }
        let home = (key % self.slot_count as u64) as usize;
        for probe in 0..self.slot_count {
            match self.slot((home + probe) % self.slot_count) {
                None => return None,
                Some(e) if e.key == key => return Some(e),
                Some(_) => {}
            }
        }
        None
    }

    fn iter(&self) -> Box<dyn PrefixKeyTableIterator + '_> {
        let live = (0..self.slot_count).filter_map(|i| self.slot(i)).collect();
        Box::new(SlotArrayIter::new(live))
    }
}

pub(crate) fn encode(entries: &[PrefixKeyEntry], load_factor: f64) -> Result<Vec<u8>, TableError> {
    let slot_count = capacity_for(entries.len(), load_factor);
    let mut slots: Vec<Option<&PrefixKeyEntry>> = vec![None; slot_count];
    for e in entries {
        let home = (e.key % slot_count as u64) as usize;
        let free = (0..slot_count)
            .map(|probe| (home + probe) % slot_count)
            .find(|&idx| slots[idx].is_none())
            .ok_or_else(|| TableError::Corrupt("dense table overflow".to_string()))?;
        slots[free] = Some(e);
    }

    let mut out = Vec::with_capacity(SLOTS_BASE + slot_count * SLOT_BYTES);
    write_header(&mut out, TableFormat::Dense)?;
    out.write_u64::<LittleEndian>(slot_count as u64)?;
    out.write_u64::<LittleEndian>(entries.len() as u64)?;
    for slot in &slots {
        write_slot(&mut out, *slot)?;
    }
    Ok(out)
}
