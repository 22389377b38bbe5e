//! Suffix-key merge of one prefix key's chains across segments.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use memtable::NO_EXPIRE_TIME;
use segment::{SegmentChainIter, SegmentError, SinglePrefixKeyIterator, SkeyCodec};

/// One segment's chain cursor. Only valid cursors live in the heap.
struct ChainCursor<'a> {
    segment_idx: usize,
    codec: SkeyCodec,
    iter: SegmentChainIter<'a>,
}

impl ChainCursor<'_> {
    fn skey(&self) -> u64 {
        self.iter.current_skey().0
    }
}

impl PartialEq for ChainCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ChainCursor<'_> {}

impl PartialOrd for ChainCursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChainCursor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: the smallest suffix key must compare greatest. On a tie
        // the newer segment (larger index) wins.
        self.codec
            .compare(other.skey(), self.skey())
            .then_with(|| self.segment_idx.cmp(&other.segment_idx))
    }
}

/// Merged view of the chains a prefix key has across segments.
///
/// Yields each suffix key once, taking the record of the newest segment
/// holding it. Older duplicates are skipped without being surfaced.
pub struct MergedChainIter<'a> {
    heap: BinaryHeap<ChainCursor<'a>>,
    pkey_deleted_ts: Option<u32>,
}

impl<'a> MergedChainIter<'a> {
    /// `chains` pairs each chain with its segment index. `pkey_deleted_ts`
    /// is the group's resolved prefix-key tombstone.
    pub fn new(
        chains: Vec<(usize, SegmentChainIter<'a>)>,
        codec: SkeyCodec,
        pkey_deleted_ts: Option<u32>,
    ) -> Self {
        let heap = chains
            .into_iter()
            .filter(|(_, iter)| iter.is_valid())
            .map(|(segment_idx, iter)| ChainCursor {
                segment_idx,
                codec,
                iter,
            })
            .collect();
        Self {
            heap,
            pkey_deleted_ts,
        }
    }

    /// Segment index of the record under the cursor.
    pub fn current_segment_idx(&self) -> Option<usize> {
        self.heap.peek().map(|c| c.segment_idx)
    }
}

impl<'a> SinglePrefixKeyIterator<'a> for MergedChainIter<'a> {
    fn is_valid(&self) -> bool {
        !self.heap.is_empty()
    }

    fn current_skey(&self) -> (u64, bool) {
        self.heap.peek().map_or((0, false), |c| c.iter.current_skey())
    }

    fn current_value(&self) -> &'a [u8] {
        self.heap.peek().map_or(&[][..], |c| c.iter.current_value())
    }

    fn current_ts(&self) -> u32 {
        self.heap.peek().map_or(0, |c| c.iter.current_ts())
    }

    fn current_expire_time(&self) -> u32 {
        self.heap
            .peek()
            .map_or(NO_EXPIRE_TIME, |c| c.iter.current_expire_time())
    }

    fn has_pkey_deleted(&self) -> bool {
        self.pkey_deleted_ts.is_some()
    }

    fn pkey_deleted_ts(&self) -> u32 {
        self.pkey_deleted_ts.unwrap_or(0)
    }

    fn move_to_next(&mut self) -> Result<(), SegmentError> {
        let Some(mut top) = self.heap.pop() else {
            return Ok(());
        };
        let skey = top.skey();
        top.iter.move_to_next()?;
        if top.iter.is_valid() {
            self.heap.push(top);
        }

        // Older records for the same suffix key lose.
        while self.heap.peek().is_some_and(|c| c.skey() == skey) {
            if let Some(mut dup) = self.heap.pop() {
                dup.iter.move_to_next()?;
                if dup.iter.is_valid() {
                    self.heap.push(dup);
                }
            }
        }
        Ok(())
    }
}
