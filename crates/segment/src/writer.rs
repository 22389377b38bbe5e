use byteorder::{LittleEndian, WriteBytesExt};
use config::Schema;
use memtable::{KkvMemtable, SkeyEntry, NO_EXPIRE_TIME};
use pkey_table::{
    encode_table, PKeyOffset, PrefixKeyEntry, TableFormat, DEFAULT_LOAD_FACTOR,
};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::format::{
    SegmentMeta, CHAIN_PKEY_DELETED, MAX_VALUE_BYTES, META_FILE, PKEY_FILE, RECORD_DELETED,
    RECORD_HAS_EXPIRE, SKEY_FILE, VALUE_FILE,
};
use crate::{SegmentError, SkeyCodec};

/// Layout choices for a new segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentWriteOptions {
    pub table_format: TableFormat,
    /// Persist per-record timestamps. When off, readers report
    /// `default_ts` for every record.
    pub store_ts: bool,
    /// Write each chain in write order instead of suffix-key order.
    pub keep_sort_sequence: bool,
    /// Store values inside the chains instead of a separate `value.dat`.
    pub inline_values: bool,
    pub default_ts: u32,
    pub load_factor: f64,
}

impl Default for SegmentWriteOptions {
    fn default() -> Self {
        Self {
            table_format: TableFormat::Dense,
            store_ts: true,
            keep_sort_sequence: false,
            inline_values: true,
            default_ts: 0,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

/// One suffix-key record handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRecord {
    pub skey: u64,
    pub ts: u32,
    pub expire_time: u32,
    pub deleted: bool,
    pub value: Vec<u8>,
}

impl From<&SkeyEntry> for ChainRecord {
    fn from(e: &SkeyEntry) -> Self {
        Self {
            skey: e.skey,
            ts: e.ts,
            expire_time: e.expire_time,
            deleted: e.deleted,
            value: e.value.clone(),
        }
    }
}

/// One prefix key's chain handed to the writer. Records are written in the
/// order given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInput {
    pub pkey: u64,
    pub region_id: i32,
    pub pkey_deleted_ts: Option<u32>,
    pub records: Vec<ChainRecord>,
}

/// Writes immutable segment directories.
///
/// Like the rest of the write path the writer is stateless. Every file is
/// written into `<dir>.tmp`, fsynced, and the directory is then renamed into
/// place, so a crash leaves at most a stale temp directory behind.
pub struct SegmentWriter {}

impl SegmentWriter {
    /// Dumps `mem` into a new segment at `dir`.
    ///
    /// Prefix keys are indexed in memtable insertion order. Each chain is
    /// sorted by the region's suffix-key order, or by write order when
    /// `keep_sort_sequence` is set.
    ///
    /// # Errors
    ///
    /// Fails if `dir` exists, a chain's region is missing from `schema`, a
    /// suffix key does not fit its field width, or on I/O failure.
    pub fn write_from_memtable(
        dir: &Path,
        mem: &KkvMemtable,
        schema: &Schema,
        opts: &SegmentWriteOptions,
    ) -> Result<SegmentMeta, SegmentError> {
        let mut chains = Vec::with_capacity(mem.len());
        for (pkey, chain) in mem.iter() {
            let region = schema
                .region(chain.region_id)
                .ok_or(SegmentError::UnknownRegion(chain.region_id))?;
            let codec = SkeyCodec::for_field(region.skey_field_type);

            let mut entries: Vec<&SkeyEntry> = chain.entries().collect();
            if opts.keep_sort_sequence {
                entries.sort_by_key(|e| e.write_seq);
            } else {
                entries.sort_by(|a, b| codec.compare(a.skey, b.skey));
            }
            chains.push(ChainInput {
                pkey,
                region_id: chain.region_id,
                pkey_deleted_ts: chain.pkey_deleted_ts,
                records: entries.into_iter().map(ChainRecord::from).collect(),
            });
        }
        Self::write_internal(dir, schema, opts, chains.into_iter())
    }

    /// Streams chains into a new segment at `dir`.
    ///
    /// This is the compaction entry point: chains are written as they
    /// arrive, only the prefix-key index is held in memory. The caller
    /// decides chain and record order.
    pub fn write_from_iterator<I>(
        dir: &Path,
        schema: &Schema,
        opts: &SegmentWriteOptions,
        chains: I,
    ) -> Result<SegmentMeta, SegmentError>
    where
        I: Iterator<Item = ChainInput>,
    {
        Self::write_internal(dir, schema, opts, chains)
    }

    fn write_internal<I>(
        dir: &Path,
        schema: &Schema,
        opts: &SegmentWriteOptions,
        chains: I,
    ) -> Result<SegmentMeta, SegmentError>
    where
        I: Iterator<Item = ChainInput>,
    {
        if dir.exists() {
            return Err(SegmentError::AlreadyExists(dir.display().to_string()));
        }
        let tmp_dir = tmp_path(dir);
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        let result = Self::write_files(&tmp_dir, schema, opts, chains);
        let meta = match result {
            Ok(meta) => meta,
            Err(e) => {
                let _ = fs::remove_dir_all(&tmp_dir);
                return Err(e);
            }
        };

        fs::rename(&tmp_dir, dir)?;
        if let Some(parent) = dir.parent() {
            if let Ok(d) = File::open(parent) {
                let _ = d.sync_all();
            }
        }
        debug!(
            dir = %dir.display(),
            pkeys = meta.pkey_count,
            docs = meta.doc_count,
            "wrote segment"
        );
        Ok(meta)
    }

    fn write_files<I>(
        tmp_dir: &Path,
        schema: &Schema,
        opts: &SegmentWriteOptions,
        chains: I,
    ) -> Result<SegmentMeta, SegmentError>
    where
        I: Iterator<Item = ChainInput>,
    {
        let mut skeys = BufWriter::new(create(&tmp_dir.join(SKEY_FILE))?);
        let mut values = if opts.inline_values {
            None
        } else {
            Some(BufWriter::new(create(&tmp_dir.join(VALUE_FILE))?))
        };

        let mut index: Vec<PrefixKeyEntry> = Vec::new();
        let mut chain_buf: Vec<u8> = Vec::with_capacity(256);
        let mut skey_offset = 0u64;
        let mut value_offset = 0u64;
        let mut doc_count = 0u64;

        for chain in chains {
            let region = schema
                .region(chain.region_id)
                .ok_or(SegmentError::UnknownRegion(chain.region_id))?;
            let codec = SkeyCodec::for_field(region.skey_field_type);

            chain_buf.clear();
            match chain.pkey_deleted_ts {
                Some(ts) => {
                    chain_buf.write_u8(CHAIN_PKEY_DELETED)?;
                    chain_buf.write_u32::<LittleEndian>(ts)?;
                    doc_count += 1;
                }
                None => {
                    chain_buf.write_u8(0)?;
                    chain_buf.write_u32::<LittleEndian>(0)?;
                }
            }
            let count = u32::try_from(chain.records.len()).map_err(|_| {
                SegmentError::Corrupt(format!("chain of pkey {:#x} is too long", chain.pkey))
            })?;
            chain_buf.write_u32::<LittleEndian>(count)?;

            for rec in &chain.records {
                if !codec.fits(rec.skey) {
                    return Err(SegmentError::SkeyOutOfRange {
                        skey: rec.skey,
                        width: codec.width(),
                    });
                }
                codec.encode(rec.skey, &mut chain_buf);

                let has_expire = rec.expire_time != NO_EXPIRE_TIME;
                let mut flags = 0u8;
                if rec.deleted {
                    flags |= RECORD_DELETED;
                }
                if has_expire {
                    flags |= RECORD_HAS_EXPIRE;
                }
                chain_buf.write_u8(flags)?;
                if opts.store_ts {
                    chain_buf.write_u32::<LittleEndian>(rec.ts)?;
                }
                if has_expire {
                    chain_buf.write_u32::<LittleEndian>(rec.expire_time)?;
                }
                if !rec.deleted {
                    if rec.value.len() > MAX_VALUE_BYTES {
                        return Err(SegmentError::ValueTooLarge(rec.value.len()));
                    }
                    match values.as_mut() {
                        None => {
                            chain_buf.write_u32::<LittleEndian>(rec.value.len() as u32)?;
                            chain_buf.extend_from_slice(&rec.value);
                        }
                        Some(w) => {
                            chain_buf.write_u64::<LittleEndian>(value_offset)?;
                            w.write_u32::<LittleEndian>(rec.value.len() as u32)?;
                            w.write_all(&rec.value)?;
                            value_offset += 4 + rec.value.len() as u64;
                        }
                    }
                }
                doc_count += 1;
            }

            index.push(PrefixKeyEntry {
                key: chain.pkey,
                region_id: chain.region_id,
                offset: PKeyOffset(skey_offset),
            });
            skeys.write_all(&chain_buf)?;
            skey_offset += chain_buf.len() as u64;
        }

        finish(skeys)?;
        if let Some(w) = values {
            finish(w)?;
        }

        let table = encode_table(opts.table_format, &index, opts.load_factor)?;
        write_file(&tmp_dir.join(PKEY_FILE), &table)?;

        let meta = SegmentMeta {
            store_ts: opts.store_ts,
            keep_sort_sequence: opts.keep_sort_sequence,
            inline_values: opts.inline_values,
            default_ts: opts.default_ts,
            doc_count,
            pkey_count: index.len() as u64,
        };
        write_file(&tmp_dir.join(META_FILE), &meta.encode()?)?;
        Ok(meta)
    }
}

fn tmp_path(dir: &Path) -> PathBuf {
    let mut name = dir.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dir.with_file_name(name)
}

fn create(path: &Path) -> Result<File, SegmentError> {
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}

fn finish(mut w: BufWriter<File>) -> Result<(), SegmentError> {
    w.flush()?;
    w.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), SegmentError> {
    let mut f = create(path)?;
    f.write_all(data)?;
    f.sync_all()?;
    Ok(())
}
