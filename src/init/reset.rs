//! init/reset - delete label files and metadata of the data directory.

use std::fs;
use std::io::ErrorKind;

use log::{debug, info};

use crate::consts::{METADATA_FILE, METADATA_TMP_FILE};
use crate::error::{InitError, IoContext, Result};
use crate::util::is_init_file;

use super::core::Initializer;

impl Initializer {
    /// Remove every label file and the metadata file. Other files in the
    /// directory are left alone. A missing directory is already reset.
    pub fn reset(&self) -> Result<()> {
        let _guard = self
            .lock
            .try_acquire()
            .ok_or(InitError::CannotResetWhileInitializing)?;

        let dir = &self.opts.data_dir;
        let entries = match fs::read_dir(dir) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("reset: data dir {} does not exist", dir.display());
                return Ok(());
            }
            Err(e) => {
                return Err(InitError::Io {
                    context: format!("list data dir {}", dir.display()),
                    source: e,
                })
            }
        };

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.io_context(|| format!("list data dir {}", dir.display()))?;
            let path = entry.path();
            let name = entry.file_name();
            let is_meta = name == METADATA_FILE || name == METADATA_TMP_FILE;
            if is_meta || is_init_file(&path) {
                fs::remove_file(&path)
                    .io_context(|| format!("failed to delete file ({})", path.display()))?;
                removed += 1;
            }
        }

        info!("reset: removed {} file(s) from {}", removed, dir.display());
        Ok(())
    }
}
