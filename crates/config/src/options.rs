use std::str::FromStr;

use crate::ConfigError;

/// Default cumulative scratch usage that triggers a reset (4 MiB).
pub const DEFAULT_SCRATCH_RESET_BYTES: usize = 4 * 1024 * 1024;
/// Default scratch capacity above which the buffer is released (64 MiB).
pub const DEFAULT_SCRATCH_RELEASE_BYTES: usize = 64 * 1024 * 1024;

/// How [`ScanOptions`]-driven readers estimate the number of prefix keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EstimateMode {
    /// Sum of per-segment header counts. Overcounts keys present in several
    /// segments.
    #[default]
    Fast,
    /// Dry-run heap merge over all segments counting distinct keys.
    Precise,
}

impl FromStr for EstimateMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(EstimateMode::Fast),
            "precise" => Ok(EstimateMode::Precise),
            other => Err(ConfigError::InvalidOption {
                name: "estimate_mode",
                reason: format!("expected fast|precise, got {other:?}"),
            }),
        }
    }
}

/// Options for one scan over a segment set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub estimate_mode: EstimateMode,
    /// Run the value decoder before projecting fields.
    pub plain_format: bool,
    /// Emit the raw suffix-key hash under this field name.
    pub skey_field_name: Option<String>,
    /// Emit the prefix-key hash under this field name.
    pub pkey_field_name: Option<String>,
    /// Emit remaining seconds to live under this field name when a record
    /// carries an explicit expire time.
    pub ttl_field_name: Option<String>,
    /// Fixed "now" in seconds. `None` samples the wall clock when the
    /// reader is opened; the value then stays fixed for the whole scan.
    pub now_seconds: Option<u32>,
    pub scratch_reset_bytes: usize,
    pub scratch_release_bytes: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            estimate_mode: EstimateMode::Fast,
            plain_format: false,
            skey_field_name: None,
            pkey_field_name: None,
            ttl_field_name: None,
            now_seconds: None,
            scratch_reset_bytes: DEFAULT_SCRATCH_RESET_BYTES,
            scratch_release_bytes: DEFAULT_SCRATCH_RELEASE_BYTES,
        }
    }
}

impl ScanOptions {
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scratch_reset_bytes == 0 {
            return Err(ConfigError::InvalidOption {
                name: "scratch_reset_bytes",
                reason: "must be > 0".to_string(),
            });
        }
        if self.scratch_release_bytes < self.scratch_reset_bytes {
            return Err(ConfigError::InvalidOption {
                name: "scratch_release_bytes",
                reason: format!(
                    "{} is below scratch_reset_bytes {}",
                    self.scratch_release_bytes, self.scratch_reset_bytes
                ),
            });
        }
        Ok(())
    }

    /// Builds options from the process environment.
    ///
    /// ```text
    /// KKV_SCAN_ESTIMATE          fast | precise            (default: fast)
    /// KKV_SCAN_PLAIN_FORMAT      true | false              (default: false)
    /// KKV_SCAN_SKEY_FIELD        field name for skey hash  (default: unset)
    /// KKV_SCAN_PKEY_FIELD        field name for pkey hash  (default: unset)
    /// KKV_SCAN_TTL_FIELD         field name for TTL        (default: unset)
    /// KKV_SCAN_NOW               fixed now, unix seconds   (default: wall clock)
    /// KKV_SCAN_SCRATCH_RESET_KB  scratch reset threshold   (default: 4096)
    /// KKV_SCAN_SCRATCH_RELEASE_KB scratch release threshold (default: 65536)
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a caller supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ScanOptions::builder();
        if let Some(v) = lookup("KKV_SCAN_ESTIMATE") {
            builder = builder.estimate_mode(v.parse()?);
        }
        if let Some(v) = lookup("KKV_SCAN_PLAIN_FORMAT") {
            builder = builder.plain_format(parse_option("KKV_SCAN_PLAIN_FORMAT", &v)?);
        }
        if let Some(v) = lookup("KKV_SCAN_SKEY_FIELD") {
            builder = builder.skey_field_name(v);
        }
        if let Some(v) = lookup("KKV_SCAN_PKEY_FIELD") {
            builder = builder.pkey_field_name(v);
        }
        if let Some(v) = lookup("KKV_SCAN_TTL_FIELD") {
            builder = builder.ttl_field_name(v);
        }
        if let Some(v) = lookup("KKV_SCAN_NOW") {
            builder = builder.now_seconds(parse_option("KKV_SCAN_NOW", &v)?);
        }
        if let Some(v) = lookup("KKV_SCAN_SCRATCH_RESET_KB") {
            builder = builder.scratch_reset_bytes(parse_kib("KKV_SCAN_SCRATCH_RESET_KB", &v)?);
        }
        if let Some(v) = lookup("KKV_SCAN_SCRATCH_RELEASE_KB") {
            builder = builder.scratch_release_bytes(parse_kib("KKV_SCAN_SCRATCH_RELEASE_KB", &v)?);
        }
        builder.build()
    }
}

fn parse_option<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidOption {
        name,
        reason: format!("{raw:?}: {e}"),
    })
}

/// Parses a KiB count and returns it in bytes.
fn parse_kib(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    let kb: usize = parse_option(name, raw)?;
    kb.checked_mul(1024).ok_or_else(|| ConfigError::InvalidOption {
        name,
        reason: format!("{kb} KiB overflows a byte count"),
    })
}

/// Builder for [`ScanOptions`].
#[derive(Default)]
pub struct ScanOptionsBuilder {
    options: ScanOptions,
}

impl ScanOptionsBuilder {
    pub fn estimate_mode(mut self, mode: EstimateMode) -> Self {
        self.options.estimate_mode = mode;
        self
    }

    pub fn plain_format(mut self, enabled: bool) -> Self {
        self.options.plain_format = enabled;
        self
    }

    pub fn skey_field_name(mut self, name: impl Into<String>) -> Self {
        self.options.skey_field_name = Some(name.into());
        self
    }

    pub fn pkey_field_name(mut self, name: impl Into<String>) -> Self {
        self.options.pkey_field_name = Some(name.into());
        self
    }

    pub fn ttl_field_name(mut self, name: impl Into<String>) -> Self {
        self.options.ttl_field_name = Some(name.into());
        self
    }

    pub fn now_seconds(mut self, now: u32) -> Self {
        self.options.now_seconds = Some(now);
        self
    }

    pub fn scratch_reset_bytes(mut self, bytes: usize) -> Self {
        self.options.scratch_reset_bytes = bytes;
        self
    }

    pub fn scratch_release_bytes(mut self, bytes: usize) -> Self {
        self.options.scratch_release_bytes = bytes;
        self
    }

    /// Validates and returns the options.
    pub fn build(self) -> Result<ScanOptions, ConfigError> {
        self.options.validate()?;
        Ok(self.options)
    }
}
