//! init - the initialization orchestrator.
//!
//! Разделение по подмодулям:
//! - core.rs   - Initializer, Status, construction (validation), status(), progress
//! - run.rs    - initialize(): reconciliation with disk + the per-file write loop
//! - verify.rs - metadata consistency check (field-by-field ConfigMismatch) and save
//! - reset.rs  - reset(): delete label files and metadata

pub mod core;
pub mod reset;
pub mod run;
pub mod verify;

pub use self::core::{Initializer, Status};
