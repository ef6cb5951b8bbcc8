//! persistence - on-disk label files and their derived state.
//!
//! - `writer`: LabelsWriter (append / flush / truncate over one file);
//! - `disk_state`: label counts recomputed from file lengths.

pub mod disk_state;
pub mod writer;

pub use disk_state::{DiskState, LabelCounts};
pub use writer::{aligned_label_count, LabelsWriter};
