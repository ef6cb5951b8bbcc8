//! init/verify - consistency between the requested run and persisted metadata.
//!
//! Checked in a fixed order, first mismatch wins:
//! Commitment, BitsPerLabel, LabelsPerUnit, NumFiles, NumUnits.
//! `NumUnits` may change while there is a single file (the file is grown or
//! truncated); with several files the shard boundaries would move, so it may not.

use std::fmt::Display;

use crate::error::{InitError, Result};
use crate::meta::{load_metadata, save_metadata, Metadata};

use super::core::Initializer;

impl Initializer {
    pub(crate) fn verify_metadata(&self, m: &Metadata) -> Result<()> {
        if self.commitment[..] != m.commitment[..] {
            return Err(self.mismatch(
                "Commitment",
                hex::encode(self.commitment),
                hex::encode(&m.commitment),
            ));
        }

        if self.cfg.bits_per_label != m.bits_per_label {
            return Err(self.mismatch("BitsPerLabel", self.cfg.bits_per_label, m.bits_per_label));
        }

        if self.cfg.labels_per_unit != m.labels_per_unit {
            return Err(self.mismatch(
                "LabelsPerUnit",
                self.cfg.labels_per_unit,
                m.labels_per_unit,
            ));
        }

        if self.opts.num_files != m.num_files {
            return Err(self.mismatch("NumFiles", self.opts.num_files, m.num_files));
        }

        if self.opts.num_units != m.num_units && self.opts.num_files > 1 {
            return Err(self.mismatch("NumUnits", self.opts.num_units, m.num_units));
        }

        Ok(())
    }

    fn mismatch<E: Display, F: Display>(&self, param: &'static str, expected: E, found: F) -> InitError {
        InitError::ConfigMismatch {
            param,
            expected: expected.to_string(),
            found: found.to_string(),
            data_dir: self.opts.data_dir.clone(),
        }
    }

    pub(crate) fn current_metadata(&self) -> Metadata {
        Metadata {
            commitment: self.commitment.to_vec(),
            bits_per_label: self.cfg.bits_per_label,
            labels_per_unit: self.cfg.labels_per_unit,
            num_units: self.opts.num_units,
            num_files: self.opts.num_files,
        }
    }

    pub(crate) fn save_metadata(&self) -> Result<()> {
        save_metadata(&self.opts.data_dir, &self.current_metadata())
    }

    pub(crate) fn load_metadata(&self) -> Result<Metadata> {
        load_metadata(&self.opts.data_dir)
    }
}
