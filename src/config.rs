//! Configuration for label initialization.
//!
//! Two layers:
//! - `PostConfig` - protocol-level parameters shared by the whole lifetime of a
//!   data directory (changing them invalidates previously written labels);
//! - `InitOpts` - per-run options (where to write, how much, how many files,
//!   which compute provider).
//!
//! `PostConfig::from_env()` reads the same knobs from environment variables:
//! - POST_BITS_PER_LABEL      (default 8)
//! - POST_LABELS_PER_UNIT     (default 1024)
//! - POST_COMPUTE_BATCH_SIZE  (default 16384)
//!
//! `validate()` is the single aggregate check, run once when an Initializer is built.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::consts::{
    DEFAULT_BITS_PER_LABEL, DEFAULT_COMPUTE_BATCH_SIZE, DEFAULT_LABELS_PER_UNIT,
    MAX_BITS_PER_LABEL, MIN_BITS_PER_LABEL,
};
use crate::error::{InitError, Result};

/// Protocol parameters for a data directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostConfig {
    /// Width of a single label in bits.
    /// Env: POST_BITS_PER_LABEL
    pub bits_per_label: u32,

    /// Number of labels in one unit.
    /// Env: POST_LABELS_PER_UNIT
    pub labels_per_unit: u64,

    /// Labels per compute-oracle call. Not part of the persisted metadata:
    /// it only decides how often cancellation is checked and data is appended.
    /// Env: POST_COMPUTE_BATCH_SIZE
    pub compute_batch_size: u64,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            bits_per_label: DEFAULT_BITS_PER_LABEL,
            labels_per_unit: DEFAULT_LABELS_PER_UNIT,
            compute_batch_size: DEFAULT_COMPUTE_BATCH_SIZE,
        }
    }
}

impl PostConfig {
    /// Load configuration from environment variables on top of defaults.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("POST_BITS_PER_LABEL") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.bits_per_label = n;
            }
        }

        if let Ok(v) = std::env::var("POST_LABELS_PER_UNIT") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.labels_per_unit = n;
            }
        }

        if let Ok(v) = std::env::var("POST_COMPUTE_BATCH_SIZE") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.compute_batch_size = n;
            }
        }

        cfg
    }

    pub fn with_bits_per_label(mut self, bits: u32) -> Self {
        self.bits_per_label = bits;
        self
    }

    pub fn with_labels_per_unit(mut self, n: u64) -> Self {
        self.labels_per_unit = n;
        self
    }

    pub fn with_compute_batch_size(mut self, n: u64) -> Self {
        self.compute_batch_size = n;
        self
    }
}

impl fmt::Display for PostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PostConfig {{ bits_per_label: {}, labels_per_unit: {}, compute_batch_size: {} }}",
            self.bits_per_label, self.labels_per_unit, self.compute_batch_size
        )
    }
}

/// Options of a single initialization run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitOpts {
    pub data_dir: PathBuf,
    pub num_units: u32,
    pub num_files: u32,
    /// Compute provider to dispatch batches to; None = CPU provider.
    pub provider_id: Option<u32>,
}

impl InitOpts {
    pub fn builder<P: Into<PathBuf>>(data_dir: P) -> InitOptsBuilder {
        InitOptsBuilder::new(data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl fmt::Display for InitOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InitOpts {{ data_dir: {}, num_units: {}, num_files: {}, provider_id: {} }}",
            self.data_dir.display(),
            self.num_units,
            self.num_files,
            self.provider_id
                .map(|v| v.to_string())
                .unwrap_or_else(|| "default(cpu)".to_string()),
        )
    }
}

/// Builder for `InitOpts` (defaults: 1 unit, 1 file, CPU provider).
#[derive(Clone, Debug)]
pub struct InitOptsBuilder {
    opts: InitOpts,
}

impl InitOptsBuilder {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            opts: InitOpts {
                data_dir: data_dir.into(),
                num_units: 1,
                num_files: 1,
                provider_id: None,
            },
        }
    }

    pub fn num_units(mut self, n: u32) -> Self {
        self.opts.num_units = n;
        self
    }

    pub fn num_files(mut self, n: u32) -> Self {
        self.opts.num_files = n;
        self
    }

    pub fn provider_id(mut self, id: Option<u32>) -> Self {
        self.opts.provider_id = id;
        self
    }

    pub fn build(self) -> InitOpts {
        self.opts
    }
}

/// Total number of labels requested by (cfg, opts); None on u64 overflow.
pub fn total_labels(cfg: &PostConfig, opts: &InitOpts) -> Option<u64> {
    (opts.num_units as u64).checked_mul(cfg.labels_per_unit)
}

/// Cross-field validation of config + options.
pub fn validate(cfg: &PostConfig, opts: &InitOpts) -> Result<()> {
    if cfg.bits_per_label < MIN_BITS_PER_LABEL || cfg.bits_per_label > MAX_BITS_PER_LABEL {
        return Err(invalid(format!(
            "bits_per_label must be in [{} .. {}], got {}",
            MIN_BITS_PER_LABEL, MAX_BITS_PER_LABEL, cfg.bits_per_label
        )));
    }
    if cfg.labels_per_unit == 0 {
        return Err(invalid("labels_per_unit must be > 0"));
    }
    if cfg.compute_batch_size == 0 {
        return Err(invalid("compute_batch_size must be > 0"));
    }
    // Каждый неполный батч должен заканчиваться на границе байта.
    if (cfg.compute_batch_size as u128 * cfg.bits_per_label as u128) % 8 != 0 {
        return Err(invalid(format!(
            "compute_batch_size * bits_per_label must be a multiple of 8, got {} * {}",
            cfg.compute_batch_size, cfg.bits_per_label
        )));
    }

    if opts.data_dir.as_os_str().is_empty() {
        return Err(invalid("data_dir must not be empty"));
    }
    if opts.num_units == 0 {
        return Err(invalid("num_units must be > 0"));
    }
    if opts.num_files == 0 {
        return Err(invalid("num_files must be > 0"));
    }

    let num_labels = total_labels(cfg, opts).ok_or_else(|| {
        invalid(format!(
            "num_units * labels_per_unit overflows u64 ({} * {})",
            opts.num_units, cfg.labels_per_unit
        ))
    })?;
    if num_labels % opts.num_files as u64 != 0 {
        return Err(invalid(format!(
            "total number of labels ({}) must be divisible by num_files ({})",
            num_labels, opts.num_files
        )));
    }

    let file_num_labels = num_labels / opts.num_files as u64;
    if (file_num_labels as u128 * cfg.bits_per_label as u128).div_ceil(8) > u64::MAX as u128 {
        return Err(invalid("label file size overflows u64"));
    }
    // Below 8 bits the zero padding of the last byte could hold whole labels,
    // so the file length would no longer tell the label count.
    if cfg.bits_per_label < 8 && (file_num_labels as u128 * cfg.bits_per_label as u128) % 8 != 0 {
        return Err(invalid(format!(
            "labels per file ({}) * bits_per_label ({}) must be a multiple of 8",
            file_num_labels, cfg.bits_per_label
        )));
    }

    Ok(())
}

fn invalid<S: Into<String>>(msg: S) -> InitError {
    InitError::InvalidConfig(msg.into())
}
