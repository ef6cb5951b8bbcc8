//! LabelsWriter - append/flush/truncate over one label file.
//!
//! Источник истины для количества меток - длина файла:
//!   labels = floor(len * 8 / bits_per_label)
//! Buffered bytes do not count until `flush()`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::consts::WRITER_BUF_SIZE;
use crate::error::{InitError, IoContext, Result};
use crate::util::{bytes_for_labels, label_file_name, labels_for_bytes};

pub struct LabelsWriter {
    path: PathBuf,
    file: BufWriter<File>,
    bits_per_label: u32,
    // байты, принятые write() с момента последнего flush()
    pending: u64,
}

impl LabelsWriter {
    /// Open (or create) label file `index` in `dir`. Existing content is kept.
    pub fn open(dir: &Path, index: u32, bits_per_label: u32) -> Result<Self> {
        let path = dir.join(label_file_name(index));
        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .io_context(|| format!("open label file {}", path.display()))?;
        f.seek(SeekFrom::End(0))
            .io_context(|| format!("seek label file {}", path.display()))?;

        Ok(Self {
            path,
            file: BufWriter::with_capacity(WRITER_BUF_SIZE, f),
            bits_per_label,
            pending: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted length in bytes (buffered bytes excluded).
    pub fn len_bytes(&self) -> Result<u64> {
        Ok(self
            .file
            .get_ref()
            .metadata()
            .io_context(|| format!("stat label file {}", self.path.display()))?
            .len())
    }

    /// Labels persisted in the file, derived from its length.
    pub fn num_labels_written(&self) -> Result<u64> {
        Ok(labels_for_bytes(self.len_bytes()?, self.bits_per_label))
    }

    /// Append packed label bytes. Not durable until `flush()`.
    pub fn write(&mut self, labels: &[u8]) -> Result<()> {
        self.file
            .write_all(labels)
            .io_context(|| format!("write label file {}", self.path.display()))?;
        self.pending += labels.len() as u64;
        Ok(())
    }

    /// Push buffered bytes to the file and sync them to stable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .io_context(|| format!("flush label file {}", self.path.display()))?;
        self.file
            .get_ref()
            .sync_data()
            .io_context(|| format!("sync label file {}", self.path.display()))?;
        self.pending = 0;
        Ok(())
    }

    /// Bytes accepted by `write()` but not yet flushed.
    pub fn pending_bytes(&self) -> u64 {
        self.pending
    }

    /// Shrink the file to exactly `target` labels.
    ///
    /// Padding bits of a partially used last byte are cleared, so the result
    /// matches a file written straight to `target` labels.
    pub fn truncate(&mut self, target: u64) -> Result<()> {
        self.flush()?;
        let current = self.num_labels_written()?;
        if target > current {
            return Err(InitError::Io {
                context: format!(
                    "truncate label file {} to {} labels (has {})",
                    self.path.display(),
                    target,
                    current
                ),
                source: std::io::Error::new(
                    ErrorKind::InvalidInput,
                    "label files grow only by writing",
                ),
            });
        }

        let new_len = bytes_for_labels(target, self.bits_per_label);
        let f = self.file.get_mut();
        f.set_len(new_len)
            .io_context(|| format!("truncate label file {}", self.path.display()))?;

        let used_bits = (target as u128 * self.bits_per_label as u128 % 8) as u32;
        if used_bits != 0 {
            let mut last = [0u8; 1];
            f.seek(SeekFrom::Start(new_len - 1))
                .and_then(|_| f.read_exact(&mut last))
                .io_context(|| format!("read last byte of {}", self.path.display()))?;
            last[0] &= (1u8 << used_bits) - 1;
            f.seek(SeekFrom::Start(new_len - 1))
                .and_then(|_| f.write_all(&last))
                .io_context(|| format!("clear padding of {}", self.path.display()))?;
        }

        f.sync_all()
            .io_context(|| format!("sync label file {}", self.path.display()))?;
        f.seek(SeekFrom::End(0))
            .io_context(|| format!("seek label file {}", self.path.display()))?;
        Ok(())
    }

    /// Flush and release the file handle.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

/// Largest label count <= `labels` whose packed size ends on a byte boundary.
/// Appending is only possible from such a position.
pub fn aligned_label_count(labels: u64, bits_per_label: u32) -> u64 {
    let step = 8 / gcd(bits_per_label, 8) as u64;
    labels - labels % step
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn unique_root(prefix: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!(
            "postinit-writer-{}-{}-{}",
            prefix,
            std::process::id(),
            t
        ));
        fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn write_flush_reopen() {
        let root = unique_root("append");
        let mut w = LabelsWriter::open(&root, 0, 8).unwrap();
        assert_eq!(w.num_labels_written().unwrap(), 0);

        w.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(w.pending_bytes(), 4);
        w.flush().unwrap();
        assert_eq!(w.pending_bytes(), 0);
        assert_eq!(w.num_labels_written().unwrap(), 4);
        w.close().unwrap();

        // reopen does not truncate and appends at the end
        let mut w = LabelsWriter::open(&root, 0, 8).unwrap();
        assert_eq!(w.num_labels_written().unwrap(), 4);
        w.write(&[5, 6]).unwrap();
        w.close().unwrap();
        assert_eq!(fs::read(root.join("postdata_0.bin")).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn truncate_shrinks_and_refuses_growth() {
        let root = unique_root("trunc");
        let mut w = LabelsWriter::open(&root, 3, 8).unwrap();
        w.write(&[9; 10]).unwrap();
        w.truncate(6).unwrap();
        assert_eq!(w.num_labels_written().unwrap(), 6);
        assert!(w.truncate(7).is_err());

        // appending after truncate continues from the new end
        w.write(&[1]).unwrap();
        w.close().unwrap();
        assert_eq!(
            fs::read(root.join("postdata_3.bin")).unwrap(),
            vec![9, 9, 9, 9, 9, 9, 1]
        );
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn truncate_clears_padding_bits() {
        let root = unique_root("pad");
        // 12-bit labels: 4 labels = 6 bytes; 3 labels = 36 bits -> 5 bytes, 4 bits used
        let mut w = LabelsWriter::open(&root, 0, 12).unwrap();
        w.write(&[0xff; 6]).unwrap();
        w.truncate(3).unwrap();
        assert_eq!(w.num_labels_written().unwrap(), 3);
        w.close().unwrap();
        assert_eq!(
            fs::read(root.join("postdata_0.bin")).unwrap(),
            vec![0xff, 0xff, 0xff, 0xff, 0x0f]
        );
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn aligned_counts() {
        assert_eq!(aligned_label_count(7, 8), 7);
        assert_eq!(aligned_label_count(3, 12), 2);
        assert_eq!(aligned_label_count(4, 12), 4);
        assert_eq!(aligned_label_count(13, 1), 8);
        assert_eq!(aligned_label_count(13, 4), 12);
        assert_eq!(aligned_label_count(13, 5), 8);
    }
}
