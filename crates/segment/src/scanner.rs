use config::{RegionConfig, Schema};
use pkey_table::PrefixKeyTableIterator;

use crate::{Segment, SegmentChainIter, SegmentError, SkeyCodec};

/// Walks one segment's prefix keys in iteration order and opens chains on
/// demand.
///
/// The table iterator is sorted on construction. For separate-chaining
/// tables that is a no-op, so keys come out in append order.
pub struct SegmentScanner<'a> {
    segment: &'a Segment,
    iter: Box<dyn PrefixKeyTableIterator + 'a>,
    codecs: Vec<(i32, SkeyCodec)>,
}

impl<'a> SegmentScanner<'a> {
    pub fn new(segment: &'a Segment, schema: &Schema) -> Self {
        let mut iter = segment.table().iter();
        iter.sort_by_key();
        let codecs = schema
            .regions()
            .map(|r| (r.region_id, SkeyCodec::for_field(r.skey_field_type)))
            .collect();
        Self {
            segment,
            iter,
            codecs,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.iter.is_valid()
    }

    /// Current `(prefix key, region id)`. Meaningless once exhausted.
    pub fn prefix_key(&self) -> (u64, i32) {
        (self.iter.key(), self.iter.region_id())
    }

    pub fn move_to_next(&mut self) {
        self.iter.move_to_next();
    }

    pub fn segment(&self) -> &'a Segment {
        self.segment
    }

    pub fn pkey_count(&self) -> usize {
        self.iter.size()
    }

    /// Opens the chain of the current prefix key.
    ///
    /// # Errors
    ///
    /// The stored region must be `region` and must be part of the schema the
    /// scanner was built with; anything else is corruption.
    pub fn materialize_chain(
        &self,
        region: &RegionConfig,
    ) -> Result<SegmentChainIter<'a>, SegmentError> {
        let entry = self.iter.entry().ok_or(SegmentError::InvalidState)?;
        if entry.region_id != region.region_id {
            return Err(SegmentError::RegionMismatch {
                expected: region.region_id,
                found: entry.region_id,
            });
        }
        let codec = self
            .codecs
            .iter()
            .find(|(id, _)| *id == entry.region_id)
            .map(|(_, c)| *c)
            .ok_or(SegmentError::UnknownRegion(entry.region_id))?;
        self.segment.chain_at(entry.offset, codec)
    }
}
