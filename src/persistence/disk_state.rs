//! DiskState - how many labels are on disk right now.
//!
//! Nothing is cached: every call stats the expected label files again.
//! Metadata is never consulted.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{InitError, Result};
use crate::util::{label_file_name, labels_for_bytes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCounts {
    /// Labels per expected file, indexed by file index.
    pub per_file: Vec<u64>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct DiskState {
    data_dir: PathBuf,
    bits_per_label: u32,
    num_files: u32,
}

impl DiskState {
    pub fn new(data_dir: &Path, bits_per_label: u32, num_files: u32) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            bits_per_label,
            num_files,
        }
    }

    /// Per-file and aggregate label counts. Absent files (or an absent
    /// directory) count as zero; any other stat failure is an error.
    pub fn num_labels_written(&self) -> Result<LabelCounts> {
        let mut per_file = Vec::with_capacity(self.num_files as usize);
        for index in 0..self.num_files {
            let path = self.data_dir.join(label_file_name(index));
            let len = match fs::metadata(&path) {
                Ok(m) => m.len(),
                Err(e) if e.kind() == ErrorKind::NotFound => 0,
                Err(e) => {
                    return Err(InitError::Io {
                        context: format!("stat label file {}", path.display()),
                        source: e,
                    })
                }
            };
            per_file.push(labels_for_bytes(len, self.bits_per_label));
        }
        let total = per_file.iter().sum();
        Ok(LabelCounts { per_file, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_from_file_lengths() {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("postinit-ds-{}-{}", std::process::id(), t));

        // каталога ещё нет - ноль
        let ds = DiskState::new(&root, 12, 3);
        assert_eq!(ds.num_labels_written().unwrap().total, 0);

        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("postdata_0.bin"), [0u8; 6]).unwrap(); // 4 labels
        fs::write(root.join("postdata_2.bin"), [0u8; 2]).unwrap(); // 1 label
        fs::write(root.join("postdata_7.bin"), [0u8; 60]).unwrap(); // not expected
        fs::write(root.join("unrelated.txt"), b"hello").unwrap();

        let counts = ds.num_labels_written().unwrap();
        assert_eq!(counts.per_file, vec![4, 0, 1]);
        assert_eq!(counts.total, 5);
        fs::remove_dir_all(&root).unwrap();
    }
}
