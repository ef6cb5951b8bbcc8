//! init/core - Initializer: configuration, exclusivity token, session progress.
//!
//! Concurrency:
//! - initialize()/reset() hold the exclusivity token for the whole call;
//!   a second caller fails immediately instead of waiting.
//! - status() only *tries* the token: held means `Initializing`.
//! - session_progress() is a lock-free atomic load, safe from any thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::{total_labels, validate, InitOpts, PostConfig};
use crate::consts::COMMITMENT_SIZE;
use crate::error::{InitError, Result};
use crate::lock::ExclusiveLock;
use crate::oracle::{ComputeProvider, ProviderInfo, ProviderRegistry};
use crate::persistence::DiskState;

// u64::MAX не может быть позицией: позиции < num_labels <= u64::MAX.
const NO_NONCE: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Started,
    Initializing,
    Completed,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::NotStarted => "not started",
            Status::Started => "started",
            Status::Initializing => "initializing",
            Status::Completed => "completed",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}

pub struct Initializer {
    pub(crate) cfg: PostConfig,
    pub(crate) opts: InitOpts,
    pub(crate) commitment: [u8; COMMITMENT_SIZE],
    pub(crate) provider: Arc<dyn ComputeProvider>,
    pub(crate) disk_state: DiskState,
    pub(crate) lock: ExclusiveLock,

    // absolute position reached in this process' lifetime
    pub(crate) num_labels_written: AtomicU64,
    pub(crate) first_nonce: AtomicU64,
}

impl Initializer {
    /// Build an initializer using the built-in providers.
    pub fn new(commitment: &[u8], cfg: PostConfig, opts: InitOpts) -> Result<Self> {
        Self::with_registry(commitment, cfg, opts, &ProviderRegistry::default())
    }

    /// Build an initializer resolving `opts.provider_id` in `registry`.
    ///
    /// All validation happens here: commitment length, config/options
    /// cross-checks and the provider id.
    pub fn with_registry(
        commitment: &[u8],
        cfg: PostConfig,
        opts: InitOpts,
        registry: &ProviderRegistry,
    ) -> Result<Self> {
        let commitment: [u8; COMMITMENT_SIZE] = commitment
            .try_into()
            .map_err(|_| InitError::InvalidCommitment {
                len: commitment.len(),
            })?;
        validate(&cfg, &opts)?;
        let provider = registry.resolve(opts.provider_id)?;

        let disk_state = DiskState::new(&opts.data_dir, cfg.bits_per_label, opts.num_files);
        Ok(Self {
            cfg,
            opts,
            commitment,
            provider,
            disk_state,
            lock: ExclusiveLock::new(),
            num_labels_written: AtomicU64::new(0),
            first_nonce: AtomicU64::new(NO_NONCE),
        })
    }

    pub fn config(&self) -> &PostConfig {
        &self.cfg
    }

    pub fn opts(&self) -> &InitOpts {
        &self.opts
    }

    pub fn commitment(&self) -> &[u8; COMMITMENT_SIZE] {
        &self.commitment
    }

    pub fn provider(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.provider.id(),
            model: self.provider.model().to_string(),
            kind: self.provider.kind(),
        }
    }

    /// Target number of labels of the whole data set.
    pub fn num_labels(&self) -> u64 {
        // validated at construction
        total_labels(&self.cfg, &self.opts).unwrap_or(0)
    }

    pub fn file_num_labels(&self) -> u64 {
        self.num_labels() / self.opts.num_files as u64
    }

    /// Labels position reached by this process (not the on-disk total).
    pub fn session_progress(&self) -> u64 {
        self.num_labels_written.load(Ordering::Acquire)
    }

    /// First PoW nonce seen in this process, if any. Not persisted.
    pub fn session_nonce(&self) -> Option<u64> {
        match self.first_nonce.load(Ordering::Acquire) {
            NO_NONCE => None,
            n => Some(n),
        }
    }

    pub(crate) fn set_progress(&self, position: u64) {
        self.num_labels_written.store(position, Ordering::Release);
    }

    /// Keep the first nonce only.
    pub(crate) fn observe_nonce(&self, nonce: u64) -> bool {
        self.first_nonce
            .compare_exchange(NO_NONCE, nonce, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Derived state: token held -> Initializing, otherwise from disk.
    pub fn status(&self) -> Status {
        let Some(_guard) = self.lock.try_acquire() else {
            return Status::Initializing;
        };

        let counts = match self.disk_state.num_labels_written() {
            Ok(c) => c,
            Err(_) => return Status::Error,
        };

        if counts.total == self.num_labels() {
            Status::Completed
        } else if counts.total > 0 {
            Status::Started
        } else {
            Status::NotStarted
        }
    }
}
