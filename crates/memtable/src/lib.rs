//! # Memtable - In-Memory KKV Write Buffer
//!
//! Buffers prefix-key / suffix-key writes before they are dumped to an
//! immutable segment by `segment::SegmentWriter`.
//!
//! ```text
//! pkey 42 ──► PkeyChain { region, pkey_deleted_ts, entries }
//!                 skey 1 → SkeyEntry { ts, expire_time, deleted, value }
//!                 skey 7 → SkeyEntry { ... }
//! pkey 9  ──► PkeyChain { ... }
//! ```
//!
//! Prefix keys are remembered in **insertion order**. Table formats that
//! keep append order on disk (separate chaining) therefore see the keys in
//! the order they were first written.
use std::collections::{BTreeMap, HashMap};

/// Sentinel expire time meaning "no explicit expiry".
pub const NO_EXPIRE_TIME: u32 = u32::MAX;

/// One suffix-key record buffered in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeyEntry {
    pub skey: u64,
    pub ts: u32,
    /// Absolute expire time in seconds, or [`NO_EXPIRE_TIME`].
    pub expire_time: u32,
    /// `true` for a suffix-key tombstone. Tombstones carry no value.
    pub deleted: bool,
    pub value: Vec<u8>,
    /// Memtable-wide write counter, used to reproduce write order.
    pub write_seq: u64,
}

/// All buffered state for one prefix key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkeyChain {
    pub region_id: i32,
    /// Timestamp of the newest whole-prefix-key delete, if any.
    pub pkey_deleted_ts: Option<u32>,
    entries: BTreeMap<u64, SkeyEntry>,
}

impl PkeyChain {
    fn new(region_id: i32) -> Self {
        Self {
            region_id,
            pkey_deleted_ts: None,
            entries: BTreeMap::new(),
        }
    }

    /// Entries ordered by raw suffix-key bits.
    pub fn entries(&self) -> impl Iterator<Item = &SkeyEntry> {
        self.entries.values()
    }

    pub fn get(&self, skey: u64) -> Option<&SkeyEntry> {
        self.entries.get(&skey)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory KKV table for one segment's worth of writes.
#[derive(Debug, Default)]
pub struct KkvMemtable {
    order: Vec<u64>,
    chains: HashMap<u64, PkeyChain>,
    doc_count: usize,
    approx_size: usize,
    next_write_seq: u64,
}

impl KkvMemtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record without explicit expiry.
    pub fn put(&mut self, region_id: i32, pkey: u64, skey: u64, value: Vec<u8>, ts: u32) -> bool {
        self.put_with_expire(region_id, pkey, skey, value, ts, NO_EXPIRE_TIME)
    }

    /// Inserts a record. Returns `false` if the write was stale (an existing
    /// entry for the suffix key is strictly newer, or the prefix key was
    /// deleted after `ts`) or if the prefix key is buffered under another
    /// region.
    pub fn put_with_expire(
        &mut self,
        region_id: i32,
        pkey: u64,
        skey: u64,
        value: Vec<u8>,
        ts: u32,
        expire_time: u32,
    ) -> bool {
        let size = value.len();
        let accepted = self.upsert(region_id, pkey, skey, ts, expire_time, false, value);
        if accepted {
            self.approx_size += size;
        }
        accepted
    }

    /// Buffers a suffix-key tombstone.
    pub fn delete_skey(&mut self, region_id: i32, pkey: u64, skey: u64, ts: u32) -> bool {
        self.upsert(region_id, pkey, skey, ts, NO_EXPIRE_TIME, true, Vec::new())
    }

    /// Deletes the whole prefix key as of `ts`. Buffered records older than
    /// `ts` are discarded; newer ones stay.
    pub fn delete_pkey(&mut self, region_id: i32, pkey: u64, ts: u32) -> bool {
        let Some(chain) = self.chain_mut(region_id, pkey) else {
            return false;
        };
        if matches!(chain.pkey_deleted_ts, Some(old) if old > ts) {
            return false;
        }
        chain.pkey_deleted_ts = Some(ts);
        let mut freed = 0;
        chain.entries.retain(|_, e| {
            let keep = e.ts >= ts;
            if !keep {
                freed += e.value.len();
            }
            keep
        });
        self.approx_size = self.approx_size.saturating_sub(freed);
        self.doc_count += 1;
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn upsert(
        &mut self,
        region_id: i32,
        pkey: u64,
        skey: u64,
        ts: u32,
        expire_time: u32,
        deleted: bool,
        value: Vec<u8>,
    ) -> bool {
        let write_seq = self.next_write_seq;
        let Some(chain) = self.chain_mut(region_id, pkey) else {
            return false;
        };
        if matches!(chain.pkey_deleted_ts, Some(del_ts) if ts < del_ts) {
            return false;
        }
        let mut freed = 0;
        match chain.entries.get(&skey) {
            Some(old) if old.ts > ts => return false,
            Some(old) => freed = old.value.len(),
            None => {}
        }
        chain.entries.insert(
            skey,
            SkeyEntry {
                skey,
                ts,
                expire_time,
                deleted,
                value,
                write_seq,
            },
        );
        self.approx_size = self.approx_size.saturating_sub(freed);
        self.next_write_seq += 1;
        self.doc_count += 1;
        true
    }

    /// Chain for `pkey`, created on first use. `None` if the prefix key is
    /// already buffered under another region.
    fn chain_mut(&mut self, region_id: i32, pkey: u64) -> Option<&mut PkeyChain> {
        let order = &mut self.order;
        let chain = self.chains.entry(pkey).or_insert_with(|| {
            order.push(pkey);
            PkeyChain::new(region_id)
        });
        (chain.region_id == region_id).then_some(chain)
    }

    /// Buffered chain for `pkey`, if any.
    pub fn chain(&self, pkey: u64) -> Option<&PkeyChain> {
        self.chains.get(&pkey)
    }

    /// Chains in prefix-key insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &PkeyChain)> {
        self.order
            .iter()
            .filter_map(move |pkey| self.chains.get(pkey).map(|c| (*pkey, c)))
    }

    /// Number of distinct prefix keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of accepted write operations (puts, skey deletes, pkey deletes).
    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    /// Number of buffered suffix-key records, tombstones included.
    pub fn record_count(&self) -> usize {
        self.chains.values().map(PkeyChain::len).sum()
    }

    pub fn approx_size(&self) -> usize {
        self.approx_size
    }
}
