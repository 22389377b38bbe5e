use super::{at, pkeys, scan_all, schema, val, Fixture};
use crate::*;
use anyhow::Result;
use config::{EstimateMode, ScanOptions};
use memtable::KkvMemtable;
use pkey_table::TableFormat;
use segment::SegmentWriteOptions;

fn chained() -> SegmentWriteOptions {
    SegmentWriteOptions {
        table_format: TableFormat::SeparateChain,
        ..SegmentWriteOptions::default()
    }
}

#[test]
fn append_order_is_kept() -> Result<()> {
    let mut fx = Fixture::new(schema())?;
    let mut mem = KkvMemtable::new();
    for pkey in [30u64, 10, 20] {
        mem.put(0, pkey, 1, val("x"), 1);
    }
    fx.add_with(&mem, &chained())?;

    let rows = scan_all(&mut fx.reader(at(0))?)?;
    assert_eq!(pkeys(&rows), vec![30, 10, 20]);
    Ok(())
}

#[test]
fn unsorted_stream_interleaves_with_sorted_one() -> Result<()> {
    let mut fx = Fixture::new(schema())?;
    let mut m0 = KkvMemtable::new();
    m0.put(0, 15, 1, val("dense"), 1);
    fx.add(&m0)?;

    let mut m1 = KkvMemtable::new();
    m1.put(0, 30, 1, val("chain"), 2);
    m1.put(0, 10, 1, val("chain"), 2);
    fx.add_with(&m1, &chained())?;

    let rows = scan_all(&mut fx.reader(at(0))?)?;
    assert_eq!(pkeys(&rows), vec![15, 30, 10]);

    let precise = ScanOptions {
        estimate_mode: EstimateMode::Precise,
        ..at(0)
    };
    assert_eq!(fx.reader(precise)?.estimate_pkey_count(), 3);
    Ok(())
}

#[test]
fn resume_follows_append_order() -> Result<()> {
    let mut fx = Fixture::new(schema())?;
    let mut mem = KkvMemtable::new();
    for pkey in [9u64, 3, 7, 1] {
        for skey in 0..3u64 {
            mem.put(0, pkey, skey, val(&format!("{pkey}/{skey}")), 1);
        }
    }
    fx.add_with(&mem, &chained())?;

    let full = scan_all(&mut fx.reader(at(0))?)?;
    assert_eq!(pkeys(&full), vec![9, 3, 7, 1]);

    for cut in [1usize, 3, 4, 11] {
        let mut reader = fx.reader(at(0))?;
        let mut doc = Document::new();
        for _ in 0..cut {
            assert!(reader.read(&mut doc)?);
        }
        let offset = reader.current_offset();

        let mut resumed = fx.reader(at(0))?;
        resumed.seek(offset)?;
        assert_eq!(scan_all(&mut resumed)?, full[cut..]);
        // A second seek to the same offset gives the same tail.
        resumed.seek(offset)?;
        assert_eq!(scan_all(&mut resumed)?, full[cut..]);
    }
    Ok(())
}
