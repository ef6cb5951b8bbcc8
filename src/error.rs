//! Error types for the initialization core.
//!
//! Taxonomy:
//! - validation (commitment length, config cross-checks) - raised at construction;
//! - contention (`AlreadyInitializing`, `CannotResetWhileInitializing`) - caller may retry;
//! - consistency (`ConfigMismatch`, `MetadataMissing`, `MetadataCorrupt`) - need operator action;
//! - I/O and compute-oracle failures - propagated as is;
//! - cancellation - resumable, not a failure of the data set.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid commitment length; expected: 32, given: {len}")]
    InvalidCommitment { len: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("already initializing")]
    AlreadyInitializing,

    #[error("cannot reset while initializing")]
    CannotResetWhileInitializing,

    #[error(
        "`{param}` is not compatible with the data in {}; expected: {expected}, found: {found}",
        .data_dir.display()
    )]
    ConfigMismatch {
        param: &'static str,
        expected: String,
        found: String,
        data_dir: PathBuf,
    },

    #[error("metadata file is missing: {}", .path.display())]
    MetadataMissing { path: PathBuf },

    #[error("metadata file is corrupt: {}: {source}", .path.display())]
    MetadataCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("initialization cancelled")]
    Cancelled,

    #[error("compute oracle error: {0}")]
    Oracle(String),

    #[error("compute provider stop error: {0}")]
    StopFailed(String),

    #[error("unknown compute provider id {0}")]
    UnknownProvider(u32),

    // Shared with the proving phase.
    #[error("not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("proof doesn't exist")]
    ProofNotExist,
}

impl InitError {
    /// Contention errors: nothing is wrong with the data, try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InitError::AlreadyInitializing | InitError::CannotResetWhileInitializing
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InitError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, InitError>;

/// `with_context`-style helper for io::Result, mirroring anyhow's ergonomics
/// while keeping the typed error.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| InitError::Io {
            context: f().into(),
            source,
        })
    }
}
