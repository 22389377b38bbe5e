//! Separate-chaining table: bucket heads linking into a flat node array.
//!
//! ```text
//! body: [bucket_count: u64][node_count: u64]
//!       [head: u32; bucket_count]                       (u32::MAX = empty)
//!       [node: key u64 | region i32 | offset u64 | next u32; node_count]
//! ```
//!
//! Nodes are stored in the order the writer appended them and iteration
//! walks that array directly. Keys are **not** sorted on disk and
//! `sort_by_key` leaves the order untouched.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::format::{capacity_for, read_header, write_header, TableFormat, TABLE_HEADER_BYTES};
use crate::{PKeyOffset, PrefixKeyEntry, PrefixKeyTable, PrefixKeyTableIterator, TableError};

const NO_NODE: u32 = u32::MAX;
const META_BYTES: usize = 8 + 8;
const HEAD_BYTES: usize = 4;
const NODE_BYTES: usize = 8 + 4 + 8 + 4;

/// Bucket-index-plus-node-array prefix-key table.
#[derive(Debug)]
pub struct SeparateChainTable {
    data: Vec<u8>,
    bucket_count: usize,
    node_count: usize,
    nodes_base: usize,
}

impl SeparateChainTable {
    /// Decodes and validates a separate-chaining table, including every
    /// bucket list.
    pub fn open(data: Vec<u8>) -> Result<Self, TableError> {
        if read_header(&data)? != TableFormat::SeparateChain {
            return Err(TableError::Corrupt("not a separate-chain table".to_string()));
        }
        let heads_base = TABLE_HEADER_BYTES + META_BYTES;
        if data.len() < heads_base {
            return Err(TableError::TooSmall(data.len()));
        }
        let bucket_count = LittleEndian::read_u64(&data[TABLE_HEADER_BYTES..]) as usize;
        let node_count = LittleEndian::read_u64(&data[TABLE_HEADER_BYTES + 8..]) as usize;

        let sizes = bucket_count
            .checked_mul(HEAD_BYTES)
            .zip(node_count.checked_mul(NODE_BYTES))
            .and_then(|(h, n)| h.checked_add(n));
        let nodes_base = heads_base + bucket_count.saturating_mul(HEAD_BYTES);
        if sizes != Some(data.len() - heads_base) {
            return Err(TableError::Corrupt(format!(
                "separate-chain table with {} buckets / {} nodes has {} body bytes",
                bucket_count,
                node_count,
                data.len() - heads_base
            )));
        }
        if node_count > 0 && bucket_count == 0 {
            return Err(TableError::Corrupt("nodes without buckets".to_string()));
        }
        if node_count >= NO_NODE as usize {
            return Err(TableError::Corrupt(format!("too many nodes: {node_count}")));
        }

        let table = Self {
            data,
            bucket_count,
            node_count,
            nodes_base,
        };
        table.validate_links()?;
        Ok(table)
    }

    /// Every node must be reachable from exactly the bucket its key hashes to.
    fn validate_links(&self) -> Result<(), TableError> {
        let mut reached = 0usize;
        for bucket in 0..self.bucket_count {
            let mut link = self.head(bucket);
            while link != NO_NODE {
                let idx = link as usize;
                if idx >= self.node_count || reached >= self.node_count {
                    return Err(TableError::Corrupt(format!(
                        "bad link {link} in bucket {bucket}"
                    )));
                }
                let (entry, next) = self.node(idx);
                if (entry.key % self.bucket_count as u64) as usize != bucket {
                    return Err(TableError::Corrupt(format!(
                        "key {:#x} linked from wrong bucket {}",
                        entry.key, bucket
                    )));
                }
                reached += 1;
                link = next;
            }
        }
        if reached != self.node_count {
            return Err(TableError::Corrupt(format!(
                "{} of {} nodes reachable",
                reached, self.node_count
            )));
        }
        Ok(())
    }

    fn head(&self, bucket: usize) -> u32 {
        let pos = TABLE_HEADER_BYTES + META_BYTES + bucket * HEAD_BYTES;
        LittleEndian::read_u32(&self.data[pos..pos + HEAD_BYTES])
    }

    fn node(&self, idx: usize) -> (PrefixKeyEntry, u32) {
        let pos = self.nodes_base + idx * NODE_BYTES;
        let raw = &self.data[pos..pos + NODE_BYTES];
        let entry = PrefixKeyEntry {
            key: LittleEndian::read_u64(&raw[0..8]),
            region_id: LittleEndian::read_i32(&raw[8..12]),
            offset: PKeyOffset(LittleEndian::read_u64(&raw[12..20])),
        };
        (entry, LittleEndian::read_u32(&raw[20..24]))
    }
}

impl PrefixKeyTable for SeparateChainTable {
    fn format(&self) -> TableFormat {
        TableFormat::SeparateChain
    }

    fn len(&self) -> usize {
        self.node_count
    }

    fn find(&self, key: u64) -> Option<PrefixKeyEntry> {
        if self.bucket_count == 0 {
            return None;
        }
        let mut link = self.head((key % self.bucket_count as u64) as usize);
        while link != NO_NODE {
            let (entry, next) = self.node(link as usize);
            if entry.key == key {
                return Some(entry);
            }
            link = next;
        }
        None
    }

    fn iter(&self) -> Box<dyn PrefixKeyTableIterator + '_> {
        Box::new(NodeIter { table: self, pos: 0 })
    }
}

/// Walks the node array in append order.
struct NodeIter<'a> {
    table: &'a SeparateChainTable,
    pos: usize,
}

impl PrefixKeyTableIterator for NodeIter<'_> {
    fn is_valid(&self) -> bool {
        self.pos < self.table.node_count
    }

    fn move_to_next(&mut self) {
        if self.is_valid() {
            self.pos += 1;
        }
    }

    fn sort_by_key(&mut self) {
        // Append order is kept as the iteration order.
    }

    fn size(&self) -> usize {
        self.table.node_count
    }

    fn entry(&self) -> Option<PrefixKeyEntry> {
        self.is_valid().then(|| self.table.node(self.pos).0)
    }
}

pub(crate) fn encode(entries: &[PrefixKeyEntry], load_factor: f64) -> Result<Vec<u8>, TableError> {
    let bucket_count = capacity_for(entries.len(), load_factor);
    let mut heads = vec![NO_NODE; bucket_count];
    let mut nexts = vec![NO_NODE; entries.len()];
    for (idx, e) in entries.iter().enumerate() {
        let bucket = (e.key % bucket_count as u64) as usize;
        nexts[idx] = heads[bucket];
        heads[bucket] = idx as u32;
    }

    let mut out = Vec::with_capacity(
        TABLE_HEADER_BYTES + META_BYTES + bucket_count * HEAD_BYTES + entries.len() * NODE_BYTES,
    );
    write_header(&mut out, TableFormat::SeparateChain)?;
    out.write_u64::<LittleEndian>(bucket_count as u64)?;
    out.write_u64::<LittleEndian>(entries.len() as u64)?;
    for head in &heads {
        out.write_u32::<LittleEndian>(*head)?;
    }
    for (e, next) in entries.iter().zip(&nexts) {
        out.write_u64::<LittleEndian>(e.key)?;
        out.write_i32::<LittleEndian>(e.region_id)?;
        out.write_u64::<LittleEndian>(e.offset.0)?;
        out.write_u32::<LittleEndian>(*next)?;
    }
    Ok(out)
}
