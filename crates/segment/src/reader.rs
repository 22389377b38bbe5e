use config::RegionConfig;
use pkey_table::{open_table, PKeyOffset, PrefixKeyTable, TableFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::format::{SegmentMeta, META_FILE, PKEY_FILE, SKEY_FILE, VALUE_FILE};
use crate::{SegmentChainIter, SegmentError, SkeyCodec};

/// An opened, immutable segment.
///
/// All four files are read into memory on [`open`](Segment::open); chain
/// iterators borrow from the segment and never touch the filesystem.
#[derive(Debug)]
pub struct Segment {
    dir: PathBuf,
    meta: SegmentMeta,
    table: Box<dyn PrefixKeyTable>,
    skeys: Vec<u8>,
    values: Option<Vec<u8>>,
}

impl Segment {
    /// Opens the segment directory at `dir`.
    ///
    /// # Validation
    ///
    /// - The meta file must carry the right magic, version and CRC32.
    /// - The prefix-key table must decode and hold `pkey_count` keys.
    /// - `value.dat` must exist unless values are inlined.
    ///
    /// # Errors
    ///
    /// Any of the above failing is reported as corruption; missing files
    /// surface as I/O errors.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, SegmentError> {
        let dir = dir.as_ref().to_path_buf();
        let meta = SegmentMeta::decode(&fs::read(dir.join(META_FILE))?)?;
        let table = open_table(fs::read(dir.join(PKEY_FILE))?)?;
        if table.len() as u64 != meta.pkey_count {
            return Err(SegmentError::Corrupt(format!(
                "meta says {} prefix keys, table holds {}",
                meta.pkey_count,
                table.len()
            )));
        }
        let skeys = fs::read(dir.join(SKEY_FILE))?;
        let values = if meta.inline_values {
            None
        } else {
            Some(fs::read(dir.join(VALUE_FILE))?)
        };

        debug!(
            dir = %dir.display(),
            format = ?table.format(),
            pkeys = meta.pkey_count,
            docs = meta.doc_count,
            "opened segment"
        );
        Ok(Self {
            dir,
            meta,
            table,
            skeys,
            values,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn table_format(&self) -> TableFormat {
        self.table.format()
    }

    pub fn table(&self) -> &dyn PrefixKeyTable {
        self.table.as_ref()
    }

    pub fn doc_count(&self) -> u64 {
        self.meta.doc_count
    }

    /// Prefix-key count from the segment header.
    pub fn pkey_count(&self) -> usize {
        self.table.len()
    }

    pub fn store_ts(&self) -> bool {
        self.meta.store_ts
    }

    pub fn keep_sort_sequence(&self) -> bool {
        self.meta.keep_sort_sequence
    }

    pub fn default_ts(&self) -> u32 {
        self.meta.default_ts
    }

    /// Opens the chain stored at `offset`.
    pub fn chain_at(
        &self,
        offset: PKeyOffset,
        codec: SkeyCodec,
    ) -> Result<SegmentChainIter<'_>, SegmentError> {
        SegmentChainIter::open(
            &self.skeys,
            self.values.as_deref(),
            offset.0,
            codec,
            self.meta.store_ts,
            self.meta.default_ts,
        )
    }

    /// Point read of one prefix key's chain within `region`.
    ///
    /// Returns `None` when the key is absent or indexed under another region.
    pub fn lookup(
        &self,
        pkey: u64,
        region: &RegionConfig,
    ) -> Result<Option<SegmentChainIter<'_>>, SegmentError> {
        let Some(entry) = self.table.find(pkey) else {
            return Ok(None);
        };
        if entry.region_id != region.region_id {
            trace!(
                pkey,
                stored = entry.region_id,
                requested = region.region_id,
                "pkey indexed under another region"
            );
            return Ok(None);
        }
        let codec = SkeyCodec::for_field(region.skey_field_type);
        self.chain_at(entry.offset, codec).map(Some)
    }
}
