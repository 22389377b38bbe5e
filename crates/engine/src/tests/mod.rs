mod collab_tests;
mod separate_chain_tests;

use crate::*;
use anyhow::Result;
use config::{RegionConfig, ScanOptions, Schema};
use memtable::KkvMemtable;
use segment::{Segment, SegmentWriteOptions, SegmentWriter};
use tempfile::TempDir;

/// `(pkey, skey, ts, field "v")` of one returned document.
pub(crate) type Row = (u64, u64, u32, String);

/// A temp directory holding segments written in creation order.
pub(crate) struct Fixture {
    pub dir: TempDir,
    pub schema: Schema,
    pub segments: Vec<Segment>,
}

impl Fixture {
    pub fn new(schema: Schema) -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            schema,
            segments: Vec::new(),
        })
    }

    /// Writes `mem` as the next (newest) segment.
    pub fn add(&mut self, mem: &KkvMemtable) -> Result<()> {
        self.add_with(mem, &SegmentWriteOptions::default())
    }

    pub fn add_with(&mut self, mem: &KkvMemtable, opts: &SegmentWriteOptions) -> Result<()> {
        let idx = self.segments.len();
        let dir = self.dir.path().join(format!("segment_{idx:06}"));
        SegmentWriter::write_from_memtable(&dir, mem, &self.schema, opts)?;
        self.segments.push(Segment::open(&dir)?);
        Ok(())
    }

    pub fn reader(&self, options: ScanOptions) -> Result<ScanReader<'_>> {
        Ok(ScanReader::open(&self.segments, &self.schema, options)?)
    }
}

/// Single region 0, `UInt64` suffix keys, one value field `v`.
pub(crate) fn schema() -> Schema {
    Schema::single(RegionConfig::builder(0, "default").value_field("v").build())
}

pub(crate) fn val(s: &str) -> Vec<u8> {
    pack_fields(&[s.as_bytes()])
}

pub(crate) fn at(now: u32) -> ScanOptions {
    ScanOptions {
        now_seconds: Some(now),
        ..ScanOptions::default()
    }
}

pub(crate) fn scan_all(reader: &mut ScanReader<'_>) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let mut doc = Document::new();
    while reader.read(&mut doc)? {
        rows.push(row(&doc));
    }
    Ok(rows)
}

pub(crate) fn row(doc: &Document) -> Row {
    (
        doc.pkey,
        doc.skey,
        doc.ts,
        doc.field("v").unwrap_or_default().to_string(),
    )
}

pub(crate) fn pkeys(rows: &[Row]) -> Vec<u64> {
    let mut out: Vec<u64> = Vec::new();
    for r in rows {
        if out.last() != Some(&r.0) {
            out.push(r.0);
        }
    }
    out
}
