// src/meta.rs - consistency record of a data directory
//
// Формат <data_dir>/postdata_metadata.json (pretty JSON):
// {
//   "Commitment":    "<64 hex chars>",
//   "BitsPerLabel":  8,
//   "LabelsPerUnit": 1024,
//   "NumUnits":      4,
//   "NumFiles":      2
// }
//
// Политика:
// - Атомарная запись: tmp+rename, затем fsync родительского каталога (best‑effort на Windows).
// - Запись целиком при каждом запуске Initialize; на месте не модифицируется.
// - Удаляется только Reset.

use std::fs::{self, OpenOptions};
#[cfg(unix)]
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{METADATA_FILE, METADATA_TMP_FILE};
use crate::error::{InitError, IoContext, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metadata {
    #[serde(with = "hex_bytes")]
    pub commitment: Vec<u8>,
    pub bits_per_label: u32,
    pub labels_per_unit: u64,
    pub num_units: u32,
    pub num_files: u32,
}

#[inline]
pub fn metadata_path(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE)
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Записать метаданные через tmp+rename. Перезаписывает существующие.
pub fn save_metadata(dir: &Path, m: &Metadata) -> Result<()> {
    let path = metadata_path(dir);
    let tmp = dir.join(METADATA_TMP_FILE);
    let _ = fs::remove_file(&tmp); // best‑effort

    let json = serde_json::to_string_pretty(m).map_err(|e| InitError::Io {
        context: "serialize metadata".into(),
        source: e.into(),
    })?;

    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .io_context(|| format!("open metadata tmp {}", tmp.display()))?;
        f.write_all(json.as_bytes())
            .io_context(|| format!("write metadata tmp {}", tmp.display()))?;
        f.sync_all()
            .io_context(|| format!("sync metadata tmp {}", tmp.display()))?;
    }

    fs::rename(&tmp, &path)
        .io_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    fsync_dir(&path).io_context(|| format!("fsync dir of {}", path.display()))?;
    Ok(())
}

/// Прочитать метаданные.
///
/// Absent file -> `MetadataMissing`, unparsable file -> `MetadataCorrupt`.
pub fn load_metadata(dir: &Path) -> Result<Metadata> {
    let path = metadata_path(dir);
    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(InitError::MetadataMissing { path });
        }
        Err(e) => {
            return Err(InitError::Io {
                context: format!("read metadata {}", path.display()),
                source: e,
            })
        }
    };
    serde_json::from_slice(&bytes).map_err(|source| InitError::MetadataCorrupt { path, source })
}

/// serde helper: Vec<u8> <-> hex string.
mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}
