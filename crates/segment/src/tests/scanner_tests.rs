use super::{collect_chain, default_schema, region, write_and_open};
use crate::*;
use anyhow::Result;
use config::{Schema, SkeyFieldType};
use memtable::KkvMemtable;
use pkey_table::TableFormat;
use tempfile::tempdir;

fn keys_in_scan_order(seg: &Segment, schema: &Schema) -> Vec<u64> {
    let mut scanner = SegmentScanner::new(seg, schema);
    let mut keys = Vec::new();
    while scanner.is_valid() {
        keys.push(scanner.prefix_key().0);
        scanner.move_to_next();
    }
    keys
}

fn mem_with_pkeys(pkeys: &[u64]) -> KkvMemtable {
    let mut mem = KkvMemtable::new();
    for &pkey in pkeys {
        mem.put(0, pkey, 1, pkey.to_le_bytes().to_vec(), 1);
    }
    mem
}

#[test]
fn open_addressed_formats_scan_ascending() -> Result<()> {
    let dir = tempdir()?;
    let schema = default_schema();
    for (idx, format) in [TableFormat::Dense, TableFormat::Cuckoo].into_iter().enumerate() {
        let opts = SegmentWriteOptions {
            table_format: format,
            ..Default::default()
        };
        let seg = write_and_open(dir.path(), idx, &mem_with_pkeys(&[40, 7, 19, 3]), &schema, &opts)?;
        assert_eq!(keys_in_scan_order(&seg, &schema), vec![3, 7, 19, 40]);
    }
    Ok(())
}

#[test]
fn separate_chain_scans_in_append_order() -> Result<()> {
    let dir = tempdir()?;
    let schema = default_schema();
    let opts = SegmentWriteOptions {
        table_format: TableFormat::SeparateChain,
        ..Default::default()
    };
    let seg = write_and_open(dir.path(), 0, &mem_with_pkeys(&[40, 7, 19, 3]), &schema, &opts)?;
    assert_eq!(keys_in_scan_order(&seg, &schema), vec![40, 7, 19, 3]);
    Ok(())
}

#[test]
fn scanner_reports_header_counts() -> Result<()> {
    let dir = tempdir()?;
    let schema = default_schema();
    let seg = write_and_open(dir.path(), 4, &mem_with_pkeys(&[1, 2, 3]), &schema, &SegmentWriteOptions::default())?;
    let scanner = SegmentScanner::new(&seg, &schema);
    assert_eq!(scanner.pkey_count(), 3);
    assert_eq!(scanner.segment().pkey_count(), 3);
    Ok(())
}

#[test]
fn materialize_chain_reads_current_key() -> Result<()> {
    let dir = tempdir()?;
    let schema = default_schema();
    let seg = write_and_open(dir.path(), 0, &mem_with_pkeys(&[5, 6]), &schema, &SegmentWriteOptions::default())?;
    let mut scanner = SegmentScanner::new(&seg, &schema);
    scanner.move_to_next();
    let mut chain = scanner.materialize_chain(&region(0, SkeyFieldType::UInt64))?;
    assert_eq!(collect_chain(&mut chain)?, vec![(1, false, 1, 6u64.to_le_bytes().to_vec())]);
    Ok(())
}

#[test]
fn materialize_chain_region_mismatch() -> Result<()> {
    let dir = tempdir()?;
    let schema = default_schema();
    let seg = write_and_open(dir.path(), 0, &mem_with_pkeys(&[5]), &schema, &SegmentWriteOptions::default())?;
    let scanner = SegmentScanner::new(&seg, &schema);
    let err = scanner
        .materialize_chain(&region(1, SkeyFieldType::UInt64))
        .unwrap_err();
    assert!(matches!(err, SegmentError::RegionMismatch { expected: 1, found: 0 }));
    assert!(err.is_corruption());
    Ok(())
}

#[test]
fn materialize_chain_unknown_region() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_and_open(dir.path(), 0, &mem_with_pkeys(&[5]), &default_schema(), &SegmentWriteOptions::default())?;
    // Scanner built against a schema lacking region 0.
    let other = Schema::single(region(3, SkeyFieldType::UInt64));
    let scanner = SegmentScanner::new(&seg, &other);
    let err = scanner
        .materialize_chain(&region(0, SkeyFieldType::UInt64))
        .unwrap_err();
    assert!(matches!(err, SegmentError::UnknownRegion(0)));
    Ok(())
}

#[test]
fn materialize_on_exhausted_scanner() -> Result<()> {
    let dir = tempdir()?;
    let schema = default_schema();
    let seg = write_and_open(dir.path(), 0, &KkvMemtable::new(), &schema, &SegmentWriteOptions::default())?;
    let scanner = SegmentScanner::new(&seg, &schema);
    assert!(!scanner.is_valid());
    assert!(matches!(
        scanner.materialize_chain(&region(0, SkeyFieldType::UInt64)),
        Err(SegmentError::InvalidState)
    ));
    Ok(())
}

#[test]
fn signed_skeys_sort_signed() -> Result<()> {
    let dir = tempdir()?;
    let r = region(0, SkeyFieldType::Int32);
    let schema = Schema::single(r.clone());
    let mut mem = KkvMemtable::new();
    for skey in [3i64, -5, -1, 0] {
        mem.put(0, 1, skey as u64, Vec::new(), 1);
    }
    let seg = write_and_open(dir.path(), 0, &mem, &schema, &SegmentWriteOptions::default())?;
    let mut chain = seg.lookup(1, &r)?.expect("pkey 1");
    let skeys: Vec<i64> = collect_chain(&mut chain)?
        .into_iter()
        .map(|rec| rec.0 as i64)
        .collect();
    assert_eq!(skeys, vec![-5, -1, 0, 3]);
    Ok(())
}
