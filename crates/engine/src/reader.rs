use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use config::{RegionConfig, ScanOptions, Schema};
use memtable::NO_EXPIRE_TIME;
use segment::{Segment, SegmentError, SinglePrefixKeyIterator};
use tracing::debug;

use crate::{
    CrossSegmentMerger, DecodeError, FieldFormatter, PackValueFormatter, PassthroughDecoder,
    RegionTtlDecider, ScanError, ScanScratch, TtlDecider, ValueDecoder,
};

const CHECKPOINT_PREFIX: &str = "kkv-ckpt";

/// Logical scan position: groups advanced and chain moves made within the
/// current group.
///
/// Offsets are exclusive: [`ScanReader::current_offset`] reports the
/// position just past the last record returned, so `skey_ordinal` is that
/// record's own ordinal plus one. Seeking to it resumes with the following
/// record; do not add one before persisting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checkpoint {
    pub pkey_ordinal: i64,
    pub skey_ordinal: i64,
}

impl Checkpoint {
    pub fn new(pkey_ordinal: i64, skey_ordinal: i64) -> Self {
        Self {
            pkey_ordinal,
            skey_ordinal,
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            CHECKPOINT_PREFIX, self.pkey_ordinal, self.skey_ordinal
        )
    }
}

impl FromStr for Checkpoint {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScanError::InvalidCheckpoint(s.to_string());
        let mut parts = s.split(':');
        if parts.next() != Some(CHECKPOINT_PREFIX) {
            return Err(invalid());
        }
        let mut ordinal = || -> Result<i64, ScanError> {
            let n: i64 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)?;
            if n < 0 {
                return Err(invalid());
            }
            Ok(n)
        };
        let pkey_ordinal = ordinal()?;
        let skey_ordinal = ordinal()?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(pkey_ordinal, skey_ordinal))
    }
}

/// One logical record produced by a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub pkey: u64,
    pub skey: u64,
    pub ts: u32,
    pub region_id: i32,
    fields: Vec<(String, String)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn clear(&mut self) {
        self.pkey = 0;
        self.skey = 0;
        self.ts = 0;
        self.region_id = 0;
        self.fields.clear();
    }
}

/// Builder for [`ScanReader`]. Collaborators default to
/// [`PassthroughDecoder`], [`PackValueFormatter`] and a
/// [`RegionTtlDecider`] built from the schema.
pub struct ScanReaderBuilder<'a> {
    segments: &'a [Segment],
    schema: &'a Schema,
    options: ScanOptions,
    decoder: Option<Box<dyn ValueDecoder + 'a>>,
    formatter: Option<Box<dyn FieldFormatter + 'a>>,
    ttl: Option<Box<dyn TtlDecider + 'a>>,
}

impl<'a> ScanReaderBuilder<'a> {
    pub fn options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn decoder(mut self, decoder: impl ValueDecoder + 'a) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn formatter(mut self, formatter: impl FieldFormatter + 'a) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }

    pub fn ttl_decider(mut self, ttl: impl TtlDecider + 'a) -> Self {
        self.ttl = Some(Box::new(ttl));
        self
    }

    /// Validates the options and positions the reader on the first group.
    pub fn open(self) -> Result<ScanReader<'a>, ScanError> {
        self.options.validate()?;
        let now = self.options.now_seconds.unwrap_or_else(wall_clock_seconds);
        let merger = CrossSegmentMerger::new(self.segments, self.schema)?;
        let scratch = ScanScratch::new(
            self.options.scratch_reset_bytes,
            self.options.scratch_release_bytes,
        );
        debug!(segments = self.segments.len(), now, "scan reader opened");
        Ok(ScanReader {
            segments: self.segments,
            schema: self.schema,
            decoder: self
                .decoder
                .unwrap_or_else(|| Box::new(PassthroughDecoder) as Box<dyn ValueDecoder + 'a>),
            formatter: self
                .formatter
                .unwrap_or_else(|| Box::new(PackValueFormatter) as Box<dyn FieldFormatter + 'a>),
            ttl: self.ttl.unwrap_or_else(|| {
                Box::new(RegionTtlDecider::from_schema(self.schema)) as Box<dyn TtlDecider + 'a>
            }),
            options: self.options,
            merger,
            pkey_ordinal: 0,
            skey_ordinal: 0,
            last_valid: Checkpoint::default(),
            advance_pending: false,
            now,
            scratch,
        })
    }
}

fn wall_clock_seconds() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Merged, filtered, checkpointable scan over a segment set.
///
/// # Filtering
///
/// A record is skipped when it is a suffix-key tombstone, when the group
/// carries a prefix-key tombstone newer than the record, when the region
/// TTL says it expired, or when its own expire time has passed.
///
/// # Checkpoints
///
/// [`current_offset`](Self::current_offset) names the position just past
/// the last returned record. [`seek`](Self::seek) replays group advances
/// and chain moves without filtering to reach it again on a fresh merger.
pub struct ScanReader<'a> {
    segments: &'a [Segment],
    schema: &'a Schema,
    options: ScanOptions,
    decoder: Box<dyn ValueDecoder + 'a>,
    formatter: Box<dyn FieldFormatter + 'a>,
    ttl: Box<dyn TtlDecider + 'a>,
    merger: CrossSegmentMerger<'a>,
    pkey_ordinal: i64,
    skey_ordinal: i64,
    last_valid: Checkpoint,
    /// The last returned record is still under the cursor.
    advance_pending: bool,
    now: u32,
    scratch: ScanScratch,
}

impl<'a> ScanReader<'a> {
    pub fn builder(segments: &'a [Segment], schema: &'a Schema) -> ScanReaderBuilder<'a> {
        ScanReaderBuilder {
            segments,
            schema,
            options: ScanOptions::default(),
            decoder: None,
            formatter: None,
            ttl: None,
        }
    }

    /// Opens a reader with default collaborators.
    pub fn open(
        segments: &'a [Segment],
        schema: &'a Schema,
        options: ScanOptions,
    ) -> Result<Self, ScanError> {
        Self::builder(segments, schema).options(options).open()
    }

    /// Fills `doc` with the next surviving record. Returns `false` at the
    /// end of the scan.
    ///
    /// # Errors
    ///
    /// Corruption is fatal. A decode failure leaves the cursor on the
    /// failing record, so calling `read` again retries it.
    pub fn read(&mut self, doc: &mut Document) -> Result<bool, ScanError> {
        if self.advance_pending {
            if let Some(group) = self.merger.current_mut() {
                group.chains.move_to_next()?;
                self.skey_ordinal += 1;
            }
            self.advance_pending = false;
        }

        loop {
            let Some(group) = self.merger.current_mut() else {
                return Ok(false);
            };
            let chains = &mut group.chains;
            if !chains.is_valid() {
                self.merger.advance_to_next_group()?;
                self.pkey_ordinal += 1;
                self.skey_ordinal = 0;
                continue;
            }

            let (skey, deleted) = chains.current_skey();
            let ts = chains.current_ts();
            let skip = deleted
                || (chains.has_pkey_deleted() && ts < chains.pkey_deleted_ts())
                || self.ttl.is_expired(group.region_id, ts, self.now)
                || chains.current_skey_expired(self.now)?;
            if skip {
                chains.move_to_next()?;
                self.skey_ordinal += 1;
                continue;
            }

            let pkey = group.pkey;
            let region_id = group.region_id;
            let value = chains.current_value();
            let expire_time = chains.current_expire_time();

            doc.clear();
            doc.pkey = pkey;
            doc.skey = skey;
            doc.ts = ts;
            doc.region_id = region_id;

            let region = self
                .schema
                .region(region_id)
                .ok_or(SegmentError::UnknownRegion(region_id))?;
            let projected = if self.options.plain_format {
                self.scratch
                    .decode(self.decoder.as_ref(), value)
                    .and_then(|range| {
                        project(self.formatter.as_ref(), region, self.scratch.get(range), doc)
                    })
            } else {
                project(self.formatter.as_ref(), region, value, doc)
            };
            projected.map_err(|source| ScanError::Decode { pkey, skey, source })?;

            if let Some(name) = &self.options.skey_field_name {
                doc.set_field(name.clone(), skey.to_string());
            }
            if let Some(name) = &self.options.pkey_field_name {
                doc.set_field(name.clone(), pkey.to_string());
            }
            if let Some(name) = &self.options.ttl_field_name {
                if expire_time != NO_EXPIRE_TIME {
                    doc.set_field(name.clone(), expire_time.saturating_sub(self.now).to_string());
                }
            }

            self.advance_pending = true;
            self.last_valid = Checkpoint::new(self.pkey_ordinal, self.skey_ordinal + 1);
            return Ok(true);
        }
    }

    /// Repositions on `checkpoint` by replaying it on a fresh merger.
    ///
    /// # Errors
    ///
    /// [`ScanError::SeekPastEnd`] if the scan runs out of groups or chain
    /// records before the checkpoint is reached. The reader is left
    /// untouched in that case.
    pub fn seek(&mut self, checkpoint: Checkpoint) -> Result<(), ScanError> {
        if checkpoint.pkey_ordinal < 0 || checkpoint.skey_ordinal < 0 {
            return Err(ScanError::InvalidCheckpoint(checkpoint.to_string()));
        }
        let mut merger = CrossSegmentMerger::new(self.segments, self.schema)?;
        for _ in 0..checkpoint.pkey_ordinal {
            if !merger.is_valid() {
                return Err(ScanError::SeekPastEnd(checkpoint));
            }
            merger.advance_to_next_group()?;
        }
        for _ in 0..checkpoint.skey_ordinal {
            match merger.current_mut() {
                Some(group) if group.chains.is_valid() => group.chains.move_to_next()?,
                _ => return Err(ScanError::SeekPastEnd(checkpoint)),
            }
        }

        debug!(%checkpoint, "scan reader repositioned");
        self.merger = merger;
        self.pkey_ordinal = checkpoint.pkey_ordinal;
        self.skey_ordinal = checkpoint.skey_ordinal;
        self.last_valid = checkpoint;
        self.advance_pending = false;
        Ok(())
    }

    /// Exclusive resume position: the last returned record's
    /// `(pkey_ordinal, skey_ordinal + 1)`, or `(0, 0)` before the first
    /// read. Passing it to [`seek`](Self::seek) continues with the next
    /// record and never replays the last one.
    pub fn current_offset(&self) -> Checkpoint {
        self.last_valid
    }

    /// `true` once the merger has no group left.
    pub fn is_eof(&self) -> bool {
        !self.merger.is_valid()
    }

    /// Prefix-key estimate using the configured [`EstimateMode`](config::EstimateMode).
    pub fn estimate_pkey_count(&self) -> usize {
        self.merger.estimate_pkey_count(self.options.estimate_mode)
    }

    pub fn progress(&self) -> f64 {
        self.merger.progress()
    }

    /// "Now" used for TTL decisions, fixed for the reader's lifetime.
    pub fn now(&self) -> u32 {
        self.now
    }

    pub fn scratch(&self) -> &ScanScratch {
        &self.scratch
    }
}

fn project(
    formatter: &dyn FieldFormatter,
    region: &RegionConfig,
    value: &[u8],
    doc: &mut Document,
) -> Result<(), DecodeError> {
    for (field_id, name) in region.value_fields.iter().enumerate() {
        let text = formatter.extract_field(field_id, value)?;
        doc.set_field(name.clone(), text);
    }
    Ok(())
}
