mod format_tests;

use crate::{PKeyOffset, PrefixKeyEntry, PrefixKeyTableIterator};

pub(crate) fn entry(key: u64, region_id: i32, offset: u64) -> PrefixKeyEntry {
    PrefixKeyEntry {
        key,
        region_id,
        offset: PKeyOffset(offset),
    }
}

/// Drains an iterator into its keys.
pub(crate) fn drain_keys<I: PrefixKeyTableIterator + ?Sized>(iter: &mut I) -> Vec<u64> {
    let mut keys = Vec::new();
    while iter.is_valid() {
        keys.push(iter.key());
        iter.move_to_next();
    }
    keys
}

/// `n` distinct random keys with arbitrary regions and offsets.
pub(crate) fn random_entries(rng: &mut fastrand::Rng, n: usize) -> Vec<PrefixKeyEntry> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let key = rng.u64(..);
        if seen.insert(key) {
            out.push(entry(key, rng.i32(0..4), rng.u64(..1 << 40)));
        }
    }
    out
}
