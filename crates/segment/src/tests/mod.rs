mod reader_tests;
mod scanner_tests;

use crate::*;
use anyhow::Result;
use config::{RegionConfig, Schema, SkeyFieldType};
use memtable::KkvMemtable;
use std::path::Path;

pub(crate) fn region(id: i32, ty: SkeyFieldType) -> RegionConfig {
    RegionConfig::builder(id, format!("region_{id}"))
        .skey_field_type(ty)
        .value_field("v")
        .build()
}

pub(crate) fn default_schema() -> Schema {
    Schema::single(region(0, SkeyFieldType::UInt64))
}

/// Writes `mem` as segment `idx` under `root` and opens it.
pub(crate) fn write_and_open(
    root: &Path,
    idx: usize,
    mem: &KkvMemtable,
    schema: &Schema,
    opts: &SegmentWriteOptions,
) -> Result<Segment> {
    let dir = root.join(format!("segment_{idx:06}"));
    SegmentWriter::write_from_memtable(&dir, mem, schema, opts)?;
    Ok(Segment::open(&dir)?)
}

/// Drains a chain into `(skey, deleted, ts, value)` tuples.
pub(crate) fn collect_chain<'a, I>(iter: &mut I) -> Result<Vec<(u64, bool, u32, Vec<u8>)>>
where
    I: SinglePrefixKeyIterator<'a>,
{
    let mut out = Vec::new();
    while iter.is_valid() {
        let (skey, deleted) = iter.current_skey();
        out.push((skey, deleted, iter.current_ts(), iter.current_value().to_vec()));
        iter.move_to_next()?;
    }
    Ok(out)
}
