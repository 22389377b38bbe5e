use crate::ConfigError;

/// Declared type of a region's suffix-key field.
///
/// The type fixes how many bytes a suffix key occupies inside a chain record
/// and whether keys order as signed or unsigned integers. String suffix keys
/// are stored as their 64-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeyFieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// Hashed string key.
    String,
}

impl SkeyFieldType {
    /// On-disk width of the suffix key in bytes.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            SkeyFieldType::Int8 | SkeyFieldType::UInt8 => 1,
            SkeyFieldType::Int16 | SkeyFieldType::UInt16 => 2,
            SkeyFieldType::Int32 | SkeyFieldType::UInt32 => 4,
            SkeyFieldType::Int64 | SkeyFieldType::UInt64 | SkeyFieldType::String => 8,
        }
    }

    /// Returns `true` if keys of this type order as two's complement values.
    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            SkeyFieldType::Int8 | SkeyFieldType::Int16 | SkeyFieldType::Int32 | SkeyFieldType::Int64
        )
    }
}

/// Per-region schema: suffix-key typing, value fields and TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    pub region_id: i32,
    pub name: String,
    pub skey_field_type: SkeyFieldType,
    /// Names of the packed value fields, in pack order.
    pub value_fields: Vec<String>,
    /// Config-level time-to-live. `None` disables the TTL decider for the
    /// region (explicit per-record expiry still applies).
    pub ttl_seconds: Option<u32>,
}

impl RegionConfig {
    /// Starts a builder for a region. Defaults to a `UInt64` suffix key, no
    /// value fields and no TTL.
    pub fn builder(region_id: i32, name: impl Into<String>) -> RegionConfigBuilder {
        RegionConfigBuilder {
            config: RegionConfig {
                region_id,
                name: name.into(),
                skey_field_type: SkeyFieldType::UInt64,
                value_fields: Vec::new(),
                ttl_seconds: None,
            },
        }
    }
}

/// Builder for [`RegionConfig`].
pub struct RegionConfigBuilder {
    config: RegionConfig,
}

impl RegionConfigBuilder {
    pub fn skey_field_type(mut self, ty: SkeyFieldType) -> Self {
        self.config.skey_field_type = ty;
        self
    }

    /// Appends one value field name.
    pub fn value_field(mut self, name: impl Into<String>) -> Self {
        self.config.value_fields.push(name.into());
        self
    }

    pub fn ttl_seconds(mut self, ttl: u32) -> Self {
        self.config.ttl_seconds = Some(ttl);
        self
    }

    pub fn build(self) -> RegionConfig {
        self.config
    }
}

/// The set of regions a table was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    regions: Vec<RegionConfig>,
}

impl Schema {
    /// Creates a schema, rejecting empty region lists and duplicate ids.
    pub fn new(regions: Vec<RegionConfig>) -> Result<Self, ConfigError> {
        if regions.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        for (i, region) in regions.iter().enumerate() {
            if regions[..i].iter().any(|r| r.region_id == region.region_id) {
                return Err(ConfigError::DuplicateRegion(region.region_id));
            }
        }
        Ok(Self { regions })
    }

    /// Convenience constructor for single-region tables.
    pub fn single(region: RegionConfig) -> Self {
        Self {
            regions: vec![region],
        }
    }

    /// Looks up a region by id.
    #[must_use]
    pub fn region(&self, region_id: i32) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.region_id == region_id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionConfig> {
        self.regions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
