use super::entry;
use crate::*;
use anyhow::Result;

#[test]
fn format_tags_round_trip() -> Result<()> {
    for format in [TableFormat::Dense, TableFormat::Cuckoo, TableFormat::SeparateChain] {
        assert_eq!(TableFormat::from_tag(format.tag())?, format);
    }
    assert!(matches!(TableFormat::from_tag(7), Err(TableError::UnknownFormat(7))));
    Ok(())
}

#[test]
fn open_dispatches_on_tag() -> Result<()> {
    let entries = [entry(1, 0, 0), entry(2, 0, 0)];
    for format in [TableFormat::Dense, TableFormat::Cuckoo, TableFormat::SeparateChain] {
        let table = open_table(encode_table(format, &entries, 0.75)?)?;
        assert_eq!(table.format(), format);
    }
    Ok(())
}

#[test]
fn unknown_tag_rejected() -> Result<()> {
    let mut data = encode_table(TableFormat::Dense, &[entry(1, 0, 0)], 0.75)?;
    data[4] = 42;
    assert!(matches!(open_table(data), Err(TableError::UnknownFormat(42))));
    Ok(())
}

#[test]
fn bad_magic_rejected() -> Result<()> {
    let mut data = encode_table(TableFormat::Cuckoo, &[entry(1, 0, 0)], 0.75)?;
    data[0] ^= 0xff;
    assert!(matches!(open_table(data), Err(TableError::BadMagic(_))));
    Ok(())
}

#[test]
fn unsupported_version_rejected() -> Result<()> {
    let mut data = encode_table(TableFormat::Dense, &[], 0.75)?;
    data[5] = TABLE_VERSION + 1;
    assert!(matches!(
        open_table(data),
        Err(TableError::UnsupportedVersion(_))
    ));
    Ok(())
}

#[test]
fn short_buffer_rejected() {
    assert!(matches!(open_table(vec![0x54, 0x4B]), Err(TableError::TooSmall(2))));
    assert!(matches!(open_table(Vec::new()), Err(TableError::TooSmall(0))));
}

#[test]
fn header_only_body_is_too_small() {
    let mut data = TABLE_MAGIC.to_le_bytes().to_vec();
    data.extend_from_slice(&[0, TABLE_VERSION, 0, 0]);
    assert!(matches!(open_table(data), Err(TableError::TooSmall(8))));
}

#[test]
fn duplicate_keys_rejected() {
    let entries = [entry(5, 0, 0), entry(5, 1, 1)];
    assert!(matches!(
        encode_table(TableFormat::SeparateChain, &entries, 0.75),
        Err(TableError::DuplicateKey(5))
    ));
}

#[test]
fn load_factor_bounds() {
    for lf in [0.0, -1.0, 1.5, f64::NAN] {
        assert!(matches!(
            encode_table(TableFormat::Dense, &[], lf),
            Err(TableError::InvalidLoadFactor(_))
        ));
    }
}
