use super::*;
use std::collections::HashMap;

fn region(id: i32) -> RegionConfig {
    RegionConfig::builder(id, format!("region{id}"))
        .skey_field_type(SkeyFieldType::Int32)
        .value_field("title")
        .value_field("price")
        .ttl_seconds(60)
        .build()
}

// -------------------- Schema --------------------

#[test]
fn schema_looks_up_regions_by_id() {
    let schema = Schema::new(vec![region(0), region(7)]).unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(schema.region(7).unwrap().name, "region7");
    assert!(schema.region(3).is_none());
}

#[test]
fn schema_rejects_duplicates_and_empty() {
    assert_eq!(
        Schema::new(vec![region(1), region(1)]),
        Err(ConfigError::DuplicateRegion(1))
    );
    assert_eq!(Schema::new(Vec::new()), Err(ConfigError::EmptySchema));
}

#[test]
fn region_builder_defaults() {
    let r = RegionConfig::builder(2, "plain").build();
    assert_eq!(r.skey_field_type, SkeyFieldType::UInt64);
    assert!(r.value_fields.is_empty());
    assert_eq!(r.ttl_seconds, None);

    let r = region(0);
    assert_eq!(r.value_fields, vec!["title".to_string(), "price".to_string()]);
    assert_eq!(r.ttl_seconds, Some(60));
}

#[test]
fn skey_widths_and_signedness() {
    assert_eq!(SkeyFieldType::Int8.width(), 1);
    assert_eq!(SkeyFieldType::UInt16.width(), 2);
    assert_eq!(SkeyFieldType::Int32.width(), 4);
    assert_eq!(SkeyFieldType::String.width(), 8);
    assert!(SkeyFieldType::Int64.is_signed());
    assert!(!SkeyFieldType::UInt64.is_signed());
    assert!(!SkeyFieldType::String.is_signed());
}

// -------------------- ScanOptions --------------------

#[test]
fn scan_options_defaults_are_valid() {
    let opts = ScanOptions::default();
    assert!(opts.validate().is_ok());
    assert_eq!(opts.estimate_mode, EstimateMode::Fast);
    assert!(opts.scratch_release_bytes >= opts.scratch_reset_bytes);
}

#[test]
fn scan_options_builder_rejects_inverted_thresholds() {
    let err = ScanOptions::builder()
        .scratch_reset_bytes(1024)
        .scratch_release_bytes(512)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidOption {
            name: "scratch_release_bytes",
            ..
        }
    ));

    assert!(ScanOptions::builder().scratch_reset_bytes(0).build().is_err());
}

#[test]
fn estimate_mode_parses_case_insensitively() {
    assert_eq!("FAST".parse::<EstimateMode>().unwrap(), EstimateMode::Fast);
    assert_eq!("precise".parse::<EstimateMode>().unwrap(), EstimateMode::Precise);
    assert!("exact".parse::<EstimateMode>().is_err());
}

#[test]
fn scan_options_from_lookup() {
    let mut vars = HashMap::new();
    vars.insert("KKV_SCAN_ESTIMATE", "precise");
    vars.insert("KKV_SCAN_PLAIN_FORMAT", "true");
    vars.insert("KKV_SCAN_SKEY_FIELD", "skey");
    vars.insert("KKV_SCAN_TTL_FIELD", "ttl");
    vars.insert("KKV_SCAN_NOW", "1000");
    vars.insert("KKV_SCAN_SCRATCH_RESET_KB", "8");
    vars.insert("KKV_SCAN_SCRATCH_RELEASE_KB", "16");

    let opts = ScanOptions::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    assert_eq!(opts.estimate_mode, EstimateMode::Precise);
    assert!(opts.plain_format);
    assert_eq!(opts.skey_field_name.as_deref(), Some("skey"));
    assert_eq!(opts.pkey_field_name, None);
    assert_eq!(opts.ttl_field_name.as_deref(), Some("ttl"));
    assert_eq!(opts.now_seconds, Some(1000));
    assert_eq!(opts.scratch_reset_bytes, 8 * 1024);
    assert_eq!(opts.scratch_release_bytes, 16 * 1024);
}

#[test]
fn scan_options_from_lookup_reports_bad_values() {
    let err = ScanOptions::from_lookup(|k| {
        (k == "KKV_SCAN_NOW").then(|| "yesterday".to_string())
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidOption { name: "KKV_SCAN_NOW", .. }));

    let too_big = (usize::MAX / 1024 + 1).to_string();
    for name in ["KKV_SCAN_SCRATCH_RESET_KB", "KKV_SCAN_SCRATCH_RELEASE_KB"] {
        let err = ScanOptions::from_lookup(|k| (k == name).then(|| too_big.clone())).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidOption { name: n, .. } if n == name),
            "{name}: {err:?}"
        );
    }
}
