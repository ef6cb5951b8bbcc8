//! init/run - Initialize: reconcile with disk, then fill files one by one.
//!
//! Порядок:
//! 1) exclusivity token (fail fast);
//! 2) labels on disk > 0 -> load + verify metadata;
//! 3) save metadata (before any label is written);
//! 4) files in index order, each resumed from its own length.
//!
//! Every exit from the per-file loop flushes the writer first, so on-disk
//! state always ends on a batch boundary.

use std::fs;

use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::difficulty::{difficulty, Difficulty};
use crate::error::{InitError, IoContext, Result};
use crate::metrics;
use crate::oracle::WorkRequest;
use crate::persistence::{aligned_label_count, LabelsWriter};
use crate::util::bytes_for_labels;

use super::core::Initializer;

impl Initializer {
    /// Commit storage: fill `num_units * labels_per_unit` labels bound to the
    /// commitment. Long-running; returns `Cancelled` if `cancel` fires, and a
    /// later call continues from the last flushed batch.
    pub fn initialize(&self, cancel: &CancelToken) -> Result<()> {
        let _guard = self
            .lock
            .try_acquire()
            .ok_or(InitError::AlreadyInitializing)?;

        let dir = &self.opts.data_dir;
        let on_disk = self.disk_state.num_labels_written()?;
        if on_disk.total > 0 {
            let m = self.load_metadata()?;
            self.verify_metadata(&m)?;
        }

        fs::create_dir_all(dir)
            .io_context(|| format!("create data dir {}", dir.display()))?;
        self.save_metadata()?;

        let num_labels = self.num_labels();
        let file_num_labels = self.file_num_labels();
        let difficulty = difficulty(num_labels)?;

        info!(
            "initialization: starting to write {} file(s); number of units: {}, number of labels per unit: {}, number of bits per label: {}, datadir: {}",
            self.opts.num_files,
            self.opts.num_units,
            self.cfg.labels_per_unit,
            self.cfg.bits_per_label,
            dir.display()
        );

        for index in 0..self.opts.num_files {
            self.init_file(cancel, index, file_num_labels, &difficulty)?;
        }

        Ok(())
    }

    fn init_file(
        &self,
        cancel: &CancelToken,
        index: u32,
        file_num_labels: u64,
        difficulty: &Difficulty,
    ) -> Result<()> {
        let bits = self.cfg.bits_per_label;
        let file_offset = index as u64 * file_num_labels;
        let file_target_position = file_offset + file_num_labels;

        let mut writer = LabelsWriter::open(&self.opts.data_dir, index, bits)?;
        let mut num_labels_written = writer.num_labels_written()?;
        let file_bytes = writer.len_bytes()?;
        let target_bytes = bytes_for_labels(file_num_labels, bits);

        if file_bytes > 0 {
            if file_bytes == target_bytes {
                info!(
                    "initialization: file #{} already initialized; number of labels: {}, start position: {}",
                    index, num_labels_written, file_offset
                );
                self.set_progress(file_target_position);
                return Ok(());
            }

            if file_bytes > target_bytes {
                info!(
                    "initialization: truncating file #{}; current number of labels: {}, target number of labels: {}, start position: {}",
                    index, num_labels_written, file_num_labels, file_offset
                );
                writer.truncate(file_num_labels)?;
                metrics::record_file_truncated();
                self.set_progress(file_target_position);
                return Ok(());
            }

            // Дописывать можно только с границы байта; хвост за ней отбрасываем.
            let aligned = aligned_label_count(num_labels_written, bits);
            if file_bytes != bytes_for_labels(aligned, bits) {
                warn!(
                    "initialization: file #{} has a torn tail ({} bytes); rewinding from {} to {} labels",
                    index, file_bytes, num_labels_written, aligned
                );
                writer.truncate(aligned)?;
                num_labels_written = aligned;
            }

            info!(
                "initialization: continuing to write file #{}; current number of labels: {}, target number of labels: {}, start position: {}",
                index, num_labels_written, file_num_labels, file_offset
            );
        } else {
            info!(
                "initialization: starting to write file #{}; target number of labels: {}, start position: {}",
                index, file_num_labels, file_offset
            );
        }

        if let Err(e) = self.write_batches(
            &mut writer,
            cancel,
            index,
            file_offset,
            num_labels_written,
            file_num_labels,
            difficulty,
        ) {
            let flushed = writer.flush();
            if e.is_cancelled() {
                // отмена - не ошибка данных, но сброс буфера обязан пройти
                flushed?;
                metrics::record_flush();
                metrics::record_cancellation();
            } else if let Err(fe) = flushed {
                warn!(
                    "initialization: file #{}: flush after error failed: {}",
                    index, fe
                );
            }
            return Err(e);
        }

        writer.flush()?;
        metrics::record_flush();

        let num_labels_written = writer.num_labels_written()?;
        if num_labels_written != file_num_labels {
            return Err(InitError::Io {
                context: format!(
                    "label file {} holds {} labels after initialization, expected {}",
                    writer.path().display(),
                    num_labels_written,
                    file_num_labels
                ),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "length mismatch"),
            });
        }
        writer.close()?;

        metrics::record_file_completed();
        info!(
            "initialization: file #{} completed; number of labels written: {}",
            index, num_labels_written
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_batches(
        &self,
        writer: &mut LabelsWriter,
        cancel: &CancelToken,
        index: u32,
        file_offset: u64,
        from: u64,
        file_num_labels: u64,
        difficulty: &Difficulty,
    ) -> Result<()> {
        let bits = self.cfg.bits_per_label;
        let mut batch_size = self.cfg.compute_batch_size;
        let mut current_position = from;

        while current_position < file_num_labels {
            if cancel.is_cancelled() {
                info!("initialization: stopped");
                self.provider
                    .stop()
                    .map_err(|e| InitError::StopFailed(e.to_string()))?;
                return Err(InitError::Cancelled);
            }

            // The last batch might need to be smaller.
            let remaining = file_num_labels - current_position;
            if remaining < batch_size {
                batch_size = remaining;
            }

            debug!(
                "initialization: file #{} current position: {}, remaining: {}",
                index, current_position, remaining
            );

            let start_position = file_offset + current_position;
            let end_position = start_position + batch_size - 1;
            let res = self.provider.compute(&WorkRequest {
                commitment: &self.commitment,
                start: start_position,
                end: end_position,
                bits_per_label: bits,
                difficulty,
            })?;

            let expected = bytes_for_labels(batch_size, bits);
            if res.output.len() as u64 != expected {
                return Err(InitError::Oracle(format!(
                    "provider {} returned {} bytes for positions {}..={}, expected {}",
                    self.provider.id(),
                    res.output.len(),
                    start_position,
                    end_position,
                    expected
                )));
            }

            if let Some(nonce) = res.nonce {
                debug!("initialization: file #{}, found nonce: {}", index, nonce);
                metrics::record_nonce_found();
                self.observe_nonce(nonce);
            }

            writer.write(&res.output)?;
            metrics::record_batch(batch_size, res.output.len());

            current_position += batch_size;
            self.set_progress(file_offset + current_position);
        }

        Ok(())
    }
}
