use super::{collect_chain, default_schema, region, write_and_open};
use crate::*;
use anyhow::Result;
use config::SkeyFieldType;
use memtable::KkvMemtable;
use std::fs;
use tempfile::tempdir;

fn sample_mem() -> KkvMemtable {
    let mut mem = KkvMemtable::new();
    mem.put(0, 1, 1, b"one".to_vec(), 10);
    mem.put_with_expire(0, 1, 2, b"two".to_vec(), 10, 100);
    mem.put(0, 2, 1, b"x".to_vec(), 3);
    mem.delete_pkey(0, 2, 5);
    mem.put(0, 2, 9, b"after".to_vec(), 6);
    mem
}

#[test]
fn lookup_hit_and_miss() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    let r0 = region(0, SkeyFieldType::UInt64);

    let mut chain = seg.lookup(1, &r0)?.expect("pkey 1");
    assert!(!chain.has_pkey_deleted());
    assert_eq!(
        collect_chain(&mut chain)?,
        vec![(1, false, 10, b"one".to_vec()), (2, false, 10, b"two".to_vec())]
    );
    assert!(seg.lookup(42, &r0)?.is_none());
    Ok(())
}

#[test]
fn lookup_under_other_region_is_none() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    assert!(seg.lookup(1, &region(5, SkeyFieldType::UInt64))?.is_none());
    Ok(())
}

#[test]
fn pkey_tombstone_is_exposed() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    let mut chain = seg.lookup(2, &region(0, SkeyFieldType::UInt64))?.expect("pkey 2");
    assert!(chain.has_pkey_deleted());
    assert_eq!(chain.pkey_deleted_ts(), 5);
    // The record older than the tombstone was dropped by the memtable.
    assert_eq!(collect_chain(&mut chain)?, vec![(9, false, 6, b"after".to_vec())]);
    Ok(())
}

#[test]
fn explicit_expiry() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    let mut chain = seg.lookup(1, &region(0, SkeyFieldType::UInt64))?.expect("pkey 1");

    assert_eq!(chain.current_expire_time(), memtable::NO_EXPIRE_TIME);
    assert!(!chain.current_skey_expired(u32::MAX - 1)?);

    chain.move_to_next()?;
    assert_eq!(chain.current_expire_time(), 100);
    assert!(!chain.current_skey_expired(99)?);
    assert!(chain.current_skey_expired(100)?);

    chain.move_to_next()?;
    assert!(!chain.is_valid());
    assert!(matches!(chain.current_skey_expired(0), Err(SegmentError::InvalidState)));
    // Moving an exhausted chain is a no-op.
    chain.move_to_next()?;
    assert!(!chain.is_valid());
    Ok(())
}

#[test]
fn corrupt_meta_checksum() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    let meta_path = seg.dir().join(META_FILE);
    let mut meta = fs::read(&meta_path)?;
    meta[12] ^= 0x01;
    fs::write(&meta_path, &meta)?;

    let err = Segment::open(seg.dir()).unwrap_err();
    assert!(matches!(err, SegmentError::Corrupt(_)));
    assert!(err.is_corruption());
    Ok(())
}

#[test]
fn bad_meta_magic() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    let meta_path = seg.dir().join(META_FILE);
    let mut meta = fs::read(&meta_path)?;
    meta[0] = b'X';
    fs::write(&meta_path, &meta)?;
    assert!(Segment::open(seg.dir()).unwrap_err().is_corruption());
    Ok(())
}

#[test]
fn unknown_table_tag_is_corruption() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    let idx_path = seg.dir().join(PKEY_FILE);
    let mut idx = fs::read(&idx_path)?;
    idx[4] = 99;
    fs::write(&idx_path, &idx)?;

    let err = Segment::open(seg.dir()).unwrap_err();
    assert!(matches!(
        err,
        SegmentError::Table(pkey_table::TableError::UnknownFormat(99))
    ));
    assert!(err.is_corruption());
    Ok(())
}

#[test]
fn missing_value_store_is_io_error() -> Result<()> {
    let dir = tempdir()?;
    let opts = SegmentWriteOptions {
        inline_values: false,
        ..Default::default()
    };
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &opts)?;
    fs::remove_file(seg.dir().join(VALUE_FILE))?;
    assert!(matches!(Segment::open(seg.dir()), Err(SegmentError::Io(_))));
    Ok(())
}

#[test]
fn truncated_chain_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &sample_mem(), &default_schema(), &SegmentWriteOptions::default())?;
    let skey_path = seg.dir().join(SKEY_FILE);
    let data = fs::read(&skey_path)?;
    fs::write(&skey_path, &data[..data.len() - 2])?;

    let seg = Segment::open(seg.dir())?;
    // pkey 2 was written last, so its chain is the one cut short.
    let err = seg.lookup(2, &region(0, SkeyFieldType::UInt64)).unwrap_err();
    assert!(matches!(err, SegmentError::Corrupt(_)));
    Ok(())
}
