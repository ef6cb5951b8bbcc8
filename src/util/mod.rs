//! util - общие утилиты.
//!
//! Содержит:
//! - label_file_name()/parse_label_file_index()/is_init_file(): naming of label files;
//! - bytes_for_labels()/labels_for_bytes(): packed-size arithmetic.

use std::path::Path;

use crate::consts::{LABEL_FILE_EXT, LABEL_FILE_PREFIX};

/// Имя файла меток с данным индексом: postdata_<index>.bin
pub fn label_file_name(index: u32) -> String {
    format!("{}{}.{}", LABEL_FILE_PREFIX, index, LABEL_FILE_EXT)
}

/// Parse the index out of a label file name; None for anything else.
pub fn parse_label_file_index(name: &str) -> Option<u32> {
    let rest = name.strip_prefix(LABEL_FILE_PREFIX)?;
    let digits = rest.strip_suffix(LABEL_FILE_EXT)?.strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // "postdata_01.bin" is not a name we would ever produce.
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse::<u32>().ok()
}

/// Regular file whose name is a label file name.
pub fn is_init_file(path: &Path) -> bool {
    let is_file = path.metadata().map(|m| m.is_file()).unwrap_or(false);
    is_file
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_label_file_index)
            .is_some()
}

/// Bytes needed to hold `labels` labels of `bits_per_label` bits (rounded up).
#[inline]
pub fn bytes_for_labels(labels: u64, bits_per_label: u32) -> u64 {
    ((labels as u128 * bits_per_label as u128).div_ceil(8)) as u64
}

/// Whole labels stored in `bytes` bytes.
#[inline]
pub fn labels_for_bytes(bytes: u64, bits_per_label: u32) -> u64 {
    ((bytes as u128 * 8) / bits_per_label as u128) as u64
}
