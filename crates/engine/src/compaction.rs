/// Compaction rewrite pass: merges a segment set into one segment.
///
/// Streams the [`CrossSegmentMerger`] straight into
/// [`SegmentWriter::write_from_iterator`], so only the output's prefix-key
/// index is held in memory. This is a full compaction: every input takes
/// part, so tombstones have nothing left to shadow and are dropped along
/// with the records they hide.
use anyhow::Result;
use config::Schema;
use segment::{ChainInput, ChainRecord, Segment, SegmentWriteOptions, SegmentWriter, SinglePrefixKeyIterator};
use std::path::Path;
use tracing::debug;

use crate::{CrossSegmentMerger, MergeGroup, RegionTtlDecider, TtlDecider};

/// Counts re-derived by [`compact_segments`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Prefix keys written.
    pub pkeys: usize,
    /// Records written.
    pub records: usize,
    /// Merged records dropped as deleted, shadowed or expired.
    pub dropped: usize,
}

/// Rewrites `segments` into a single segment at `out_dir`.
///
/// Records are dropped when they are suffix-key tombstones, older than the
/// group's prefix-key tombstone, expired by the region TTL, or past their
/// own expire time as of `now`. Prefix keys left without records are
/// dropped entirely. Nothing is written when no record survives.
///
/// # Errors
///
/// Returns an error on corruption in any input or on I/O failure while
/// writing. A partially written output is removed.
pub fn compact_segments(
    segments: &[Segment],
    schema: &Schema,
    out_dir: &Path,
    opts: &SegmentWriteOptions,
    now: u32,
) -> Result<CompactionStats> {
    let ttl = RegionTtlDecider::from_schema(schema);
    let mut merger = CrossSegmentMerger::new(segments, schema)?;
    let mut stats = CompactionStats::default();
    let mut merge_error: Option<anyhow::Error> = None;

    // Merger errors cannot cross the writer's iterator, so they are parked
    // here and end the stream.
    let stats_ref = &mut stats;
    let error_ref = &mut merge_error;
    let chains = std::iter::from_fn(|| loop {
        let group = merger.current_mut()?;
        let chain = match surviving_chain(group, &ttl, now) {
            Ok(chain) => chain,
            Err(e) => {
                *error_ref = Some(e);
                return None;
            }
        };
        stats_ref.dropped += chain.1;
        if let Err(e) = merger.advance_to_next_group() {
            *error_ref = Some(e.into());
            return None;
        }
        if let Some(chain) = chain.0 {
            stats_ref.pkeys += 1;
            stats_ref.records += chain.records.len();
            return Some(chain);
        }
    });
    let mut chains = chains.peekable();

    if chains.peek().is_none() {
        drop(chains);
        if let Some(e) = merge_error {
            return Err(e);
        }
        debug!(dropped = stats.dropped, "compaction produced no records");
        return Ok(stats);
    }

    let write_result = SegmentWriter::write_from_iterator(out_dir, schema, opts, &mut chains);
    drop(chains);

    if let Some(e) = merge_error {
        let _ = std::fs::remove_dir_all(out_dir);
        return Err(e);
    }
    write_result?;

    debug!(
        pkeys = stats.pkeys,
        records = stats.records,
        dropped = stats.dropped,
        out = %out_dir.display(),
        "compaction finished"
    );
    Ok(stats)
}

/// Drains the group, returning its surviving chain (if any) and the number
/// of records dropped.
fn surviving_chain(
    group: &mut MergeGroup<'_>,
    ttl: &dyn TtlDecider,
    now: u32,
) -> Result<(Option<ChainInput>, usize)> {
    let chains = &mut group.chains;
    let mut records = Vec::new();
    let mut dropped = 0;
    while chains.is_valid() {
        let (skey, deleted) = chains.current_skey();
        let ts = chains.current_ts();
        let dead = deleted
            || (chains.has_pkey_deleted() && ts < chains.pkey_deleted_ts())
            || ttl.is_expired(group.region_id, ts, now)
            || chains.current_skey_expired(now)?;
        if dead {
            dropped += 1;
        } else {
            records.push(ChainRecord {
                skey,
                ts,
                expire_time: chains.current_expire_time(),
                deleted: false,
                value: chains.current_value().to_vec(),
            });
        }
        chains.move_to_next()?;
    }

    let chain = (!records.is_empty()).then(|| ChainInput {
        pkey: group.pkey,
        region_id: group.region_id,
        pkey_deleted_ts: None,
        records,
    });
    Ok((chain, dropped))
}
