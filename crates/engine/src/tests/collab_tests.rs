use crate::*;
use config::{RegionConfig, Schema};

#[test]
fn pack_formatter_reads_fields_by_position() {
    let packed = pack_fields(&[b"alpha", b"", b"gamma"]);
    let f = PackValueFormatter;
    assert_eq!(f.extract_field(0, &packed), Ok("alpha".to_string()));
    assert_eq!(f.extract_field(1, &packed), Ok(String::new()));
    assert_eq!(f.extract_field(2, &packed), Ok("gamma".to_string()));
    assert!(f.extract_field(3, &packed).is_err());
}

#[test]
fn pack_formatter_rejects_truncation() {
    let mut packed = pack_fields(&[b"alpha"]);
    packed.truncate(packed.len() - 1);
    assert!(PackValueFormatter.extract_field(0, &packed).is_err());
    assert!(PackValueFormatter.extract_field(0, &[]).is_err());
}

#[test]
fn pack_formatter_rejects_invalid_utf8() {
    let packed = pack_fields(&[&[0xff, 0xfe]]);
    assert!(PackValueFormatter.extract_field(0, &packed).is_err());
}

#[test]
fn passthrough_appends() {
    let mut out = b"pre".to_vec();
    PassthroughDecoder.decode(b"fix", &mut out).unwrap();
    assert_eq!(out, b"prefix");
}

#[test]
fn region_ttl_decider_uses_per_region_ttl() {
    let schema = Schema::new(vec![
        RegionConfig::builder(0, "short").ttl_seconds(10).build(),
        RegionConfig::builder(1, "none").build(),
    ])
    .unwrap();
    let ttl = RegionTtlDecider::from_schema(&schema);

    assert!(!ttl.is_expired(0, 100, 110));
    assert!(ttl.is_expired(0, 100, 111));
    assert!(!ttl.is_expired(1, 0, u32::MAX));
    assert!(!ttl.is_expired(7, 0, u32::MAX));
    // No overflow near the top of the range.
    assert!(!ttl.is_expired(0, u32::MAX, u32::MAX));
}

#[test]
fn scratch_decode_failure_leaves_no_bytes() {
    struct Half;
    impl ValueDecoder for Half {
        fn decode(&self, raw: &[u8], out: &mut Vec<u8>) -> Result<(), DecodeError> {
            out.extend_from_slice(&raw[..raw.len() / 2]);
            Err(DecodeError("half".to_string()))
        }
    }

    let mut scratch = ScanScratch::new(1024, 4096);
    let range = scratch.decode(&PassthroughDecoder, b"abc").unwrap();
    assert_eq!(scratch.get(range), b"abc");
    assert!(scratch.decode(&Half, b"abcd").is_err());
    assert_eq!(scratch.used(), 3);
}
