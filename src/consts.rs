//! Общие константы форматов (metadata, label files, compute batches).

// -------- Commitment --------
pub const COMMITMENT_SIZE: usize = 32;

// -------- Metadata --------
pub const METADATA_FILE: &str = "postdata_metadata.json";
pub const METADATA_TMP_FILE: &str = "postdata_metadata.json.tmp";

// -------- Label files --------
// Имя файла: postdata_<index>.bin, index - десятичный без ведущих нулей.
pub const LABEL_FILE_PREFIX: &str = "postdata_";
pub const LABEL_FILE_EXT: &str = "bin";

// Размер буфера записи LabelsWriter (байт).
pub const WRITER_BUF_SIZE: usize = 1 << 20;

// -------- Labels --------
pub const MIN_BITS_PER_LABEL: u32 = 1;
// Label is a prefix of a SHA-256 digest in the CPU provider.
pub const MAX_BITS_PER_LABEL: u32 = 256;

// -------- Defaults --------
pub const DEFAULT_BITS_PER_LABEL: u32 = 8;
pub const DEFAULT_LABELS_PER_UNIT: u64 = 1024;
pub const DEFAULT_COMPUTE_BATCH_SIZE: u64 = 1 << 14;

// -------- Difficulty --------
// Порог PoW: 256-битное big-endian значение.
pub const DIFFICULTY_SIZE: usize = 32;
