//! Prefix-key merge across segments.
//!
//! ```text
//!  seg 0 scanner ─┐
//!  seg 1 scanner ─┼─► min-heap (pkey asc, newer segment first)
//!  seg 2 scanner ─┘        │ pop every entry sharing the top key
//!                          ▼
//!                 MergeGroup { pkey, region, MergedChainIter }
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use config::{EstimateMode, Schema};
use segment::{Segment, SegmentError, SegmentScanner, SinglePrefixKeyIterator, SkeyCodec};
use tracing::{debug, warn};

use crate::{MergedChainIter, ScanError};

struct ScannerEntry<'a> {
    key: u64,
    segment_idx: usize,
    scanner: SegmentScanner<'a>,
}

impl PartialEq for ScannerEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.segment_idx == other.segment_idx
    }
}

impl Eq for ScannerEntry<'_> {}

impl PartialOrd for ScannerEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScannerEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse the key so the smallest comes
        // first. Equal keys pop the newest segment first.
        other
            .key
            .cmp(&self.key)
            .then_with(|| self.segment_idx.cmp(&other.segment_idx))
    }
}

/// All segments' view of the current prefix key.
pub struct MergeGroup<'a> {
    pub pkey: u64,
    pub region_id: i32,
    pub chains: MergedChainIter<'a>,
    /// Segments whose entry for `pkey` was consumed, in pop order.
    pub segments: Vec<usize>,
}

/// k-way merge of segment scanners by ascending prefix key.
pub struct CrossSegmentMerger<'a> {
    segments: &'a [Segment],
    schema: &'a Schema,
    heap: BinaryHeap<ScannerEntry<'a>>,
    current: Option<MergeGroup<'a>>,
    visited: usize,
    total: usize,
}

impl<'a> CrossSegmentMerger<'a> {
    /// Builds the heap and positions on the first group.
    ///
    /// A segment's index is its position in `segments`: later entries are
    /// newer and win ties. Segments without documents are skipped.
    pub fn new(segments: &'a [Segment], schema: &'a Schema) -> Result<Self, ScanError> {
        let heap = build_heap(segments, schema);
        let total = heap.iter().map(|e| e.scanner.pkey_count()).sum();
        debug!(
            segments = segments.len(),
            active = heap.len(),
            total_pkeys = total,
            "cross-segment merger initialised"
        );

        let mut merger = Self {
            segments,
            schema,
            heap,
            current: None,
            visited: 0,
            total,
        };
        merger.advance_to_next_group()?;
        Ok(merger)
    }

    /// `true` while a group is positioned.
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&MergeGroup<'a>> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut MergeGroup<'a>> {
        self.current.as_mut()
    }

    /// Replaces the current group with the next prefix key.
    ///
    /// Every heap entry sharing the smallest key is consumed. The first one
    /// popped decides the group's region; entries under another region are
    /// a hash collision and only logged. Chains are opened in pop order
    /// until one carries a prefix-key tombstone, which becomes the group's
    /// tombstone and hides every older segment.
    ///
    /// # Errors
    ///
    /// Corruption while opening a chain, or a region missing from the
    /// schema.
    pub fn advance_to_next_group(&mut self) -> Result<(), ScanError> {
        self.current = None;
        let Some(first) = self.heap.pop() else {
            return Ok(());
        };
        let (pkey, region_id) = first.scanner.prefix_key();
        let mut popped = vec![first];
        while self.heap.peek().is_some_and(|e| e.key == pkey) {
            if let Some(entry) = self.heap.pop() {
                popped.push(entry);
            }
        }

        let region = self
            .schema
            .region(region_id)
            .ok_or(SegmentError::UnknownRegion(region_id))?;
        let codec = SkeyCodec::for_field(region.skey_field_type);

        let mut chains = Vec::with_capacity(popped.len());
        let mut segments = Vec::with_capacity(popped.len());
        let mut pkey_deleted_ts = None;
        for entry in &popped {
            segments.push(entry.segment_idx);
            let (_, entry_region) = entry.scanner.prefix_key();
            if entry_region != region_id {
                warn!(
                    pkey,
                    region = region_id,
                    colliding_region = entry_region,
                    segment_idx = entry.segment_idx,
                    "prefix key hash collides across regions; keeping first region"
                );
                continue;
            }
            if pkey_deleted_ts.is_some() {
                continue;
            }
            let mut chain = entry.scanner.materialize_chain(region)?;
            if entry.scanner.segment().keep_sort_sequence() {
                chain = chain.into_key_order()?;
            }
            if chain.has_pkey_deleted() {
                pkey_deleted_ts = Some(chain.pkey_deleted_ts());
            }
            chains.push((entry.segment_idx, chain));
        }

        self.visited += popped.len();
        for mut entry in popped {
            entry.scanner.move_to_next();
            if entry.scanner.is_valid() {
                entry.key = entry.scanner.prefix_key().0;
                self.heap.push(entry);
            }
        }

        self.current = Some(MergeGroup {
            pkey,
            region_id,
            chains: MergedChainIter::new(chains, codec, pkey_deleted_ts),
            segments,
        });
        Ok(())
    }

    /// Number of prefix keys in the merged set.
    ///
    /// `Fast` sums the segment headers and overcounts keys present in more
    /// than one segment. `Precise` runs a key-only merge over fresh
    /// scanners and counts groups.
    pub fn estimate_pkey_count(&self, mode: EstimateMode) -> usize {
        match mode {
            EstimateMode::Fast => self.segments.iter().map(Segment::pkey_count).sum(),
            EstimateMode::Precise => {
                let mut heap = build_heap(self.segments, self.schema);
                let mut groups = 0;
                while let Some(first) = heap.pop() {
                    groups += 1;
                    let mut popped = vec![first];
                    while heap.peek().is_some_and(|e| e.key == popped[0].key) {
                        if let Some(entry) = heap.pop() {
                            popped.push(entry);
                        }
                    }
                    for mut entry in popped {
                        entry.scanner.move_to_next();
                        if entry.scanner.is_valid() {
                            entry.key = entry.scanner.prefix_key().0;
                            heap.push(entry);
                        }
                    }
                }
                groups
            }
        }
    }

    /// Heap entries consumed so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Sum of the active segments' prefix-key counts.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Fraction of entries consumed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.visited as f64 / self.total as f64
        }
    }
}

fn build_heap<'a>(segments: &'a [Segment], schema: &Schema) -> BinaryHeap<ScannerEntry<'a>> {
    let mut heap = BinaryHeap::with_capacity(segments.len());
    for (segment_idx, segment) in segments.iter().enumerate() {
        if segment.doc_count() == 0 {
            debug!(segment_idx, dir = %segment.dir().display(), "skipping empty segment");
            continue;
        }
        let scanner = SegmentScanner::new(segment, schema);
        if scanner.is_valid() {
            heap.push(ScannerEntry {
                key: scanner.prefix_key().0,
                segment_idx,
                scanner,
            });
        }
    }
    heap
}
