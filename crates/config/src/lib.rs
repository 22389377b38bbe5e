//! # Config - KKV Table Schema and Scan Options
//!
//! Everything the read path needs to know that is not stored in the
//! segments themselves:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Schema                                       │
//! │   RegionConfig (region_id = 0)               │
//! │     skey field type  → suffix-key codec      │
//! │     value fields     → document projection   │
//! │     ttl_seconds      → config-level TTL      │
//! │   RegionConfig (region_id = 1) ...           │
//! ├──────────────────────────────────────────────┤
//! │ ScanOptions                                  │
//! │   estimate mode, emitted meta fields,        │
//! │   plain-format decode, scratch thresholds    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Both are built in code through builders. [`ScanOptions::from_env`] reads
//! overrides from `KKV_SCAN_*` environment variables for tools that drive a
//! scan from the shell.

mod options;
mod schema;

pub use options::{EstimateMode, ScanOptions, ScanOptionsBuilder};
pub use schema::{RegionConfig, RegionConfigBuilder, Schema, SkeyFieldType};

use thiserror::Error;

/// Errors produced while assembling a schema or scan options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Two regions were registered under the same id.
    #[error("duplicate region id {0}")]
    DuplicateRegion(i32),

    /// A schema must describe at least one region.
    #[error("schema has no regions")]
    EmptySchema,

    /// An option value failed validation.
    #[error("invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name as it appears in the builder / environment.
        name: &'static str,
        /// Human readable reason.
        reason: String,
    },
}

#[cfg(test)]
mod tests;
