//! On-disk snapshot formats.
//!
//! Two encodings are supported, chosen by file extension:
//!
//! - `.csv`: header `path,size,hash_fast,hash_full,alg`, one row per
//!   record, an empty cell for an absent field
//! - `.json`: an object keyed by path whose values carry `size` and the
//!   optional fields, omitted (or `null`) when absent
//!
//! Writes go to a temporary sibling file that is renamed over the
//! destination once complete.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::record::InventoryRecord;
use super::InventoryError;
use crate::scanner::{Digest, HashAlgorithm};

const CSV_HEADER: [&str; 5] = ["path", "size", "hash_fast", "hash_full", "alg"];

/// Snapshot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Comma-separated rows
    Csv,
    /// JSON object keyed by path
    Json,
}

impl SnapshotFormat {
    /// Pick the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Format`] for any extension other than
    /// `csv` or `json`.
    pub fn from_path(path: &Path) -> Result<Self, InventoryError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            _ => Err(InventoryError::Format {
                path: path.to_path_buf(),
                reason: "expected a .csv or .json extension".to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    path: String,
    size: u64,
    hash_fast: Option<String>,
    hash_full: Option<String>,
    alg: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonEntry {
    size: JsonSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash_fast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
}

/// Sizes are written as numbers; older snapshots converted from CSV may
/// carry them as strings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonSize {
    Number(u64),
    Text(String),
}

/// Read a snapshot. A missing file yields an empty map.
pub(crate) fn read(path: &Path) -> Result<BTreeMap<String, InventoryRecord>, InventoryError> {
    let format = SnapshotFormat::from_path(path)?;
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("No inventory at {}, starting empty", path.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => {
            return Err(InventoryError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let records = match format {
        SnapshotFormat::Csv => read_csv(path, &bytes)?,
        SnapshotFormat::Json => read_json(path, &bytes)?,
    };
    log::debug!("Loaded {} record(s) from {}", records.len(), path.display());
    Ok(records)
}

fn read_csv(path: &Path, bytes: &[u8]) -> Result<BTreeMap<String, InventoryRecord>, InventoryError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = BTreeMap::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| format_error(path, e.to_string()))?;
        let record = sanitize(&row.path, row.size, row.hash_fast, row.hash_full, row.alg);
        insert_row(&mut records, row.path, record);
    }
    Ok(records)
}

fn read_json(path: &Path, bytes: &[u8]) -> Result<BTreeMap<String, InventoryRecord>, InventoryError> {
    let entries: BTreeMap<String, JsonEntry> =
        serde_json::from_slice(bytes).map_err(|e| format_error(path, e.to_string()))?;

    let mut records = BTreeMap::new();
    for (key, entry) in entries {
        let size = match entry.size {
            JsonSize::Number(n) => n,
            JsonSize::Text(text) => text.trim().parse().map_err(|_| {
                format_error(path, format!("invalid size {text:?} for {key}"))
            })?,
        };
        let record = sanitize(&key, size, entry.hash_fast, entry.hash_full, entry.alg);
        insert_row(&mut records, key, record);
    }
    Ok(records)
}

fn insert_row(records: &mut BTreeMap<String, InventoryRecord>, key: String, record: InventoryRecord) {
    if records.insert(key.clone(), record).is_some() {
        log::warn!("Duplicate inventory entry for {key}; keeping the last one");
    }
}

/// Turn raw fields into a record that satisfies the digest invariants.
fn sanitize(
    key: &str,
    size: u64,
    hash_fast: Option<String>,
    hash_full: Option<String>,
    alg: Option<String>,
) -> InventoryRecord {
    let mut record = InventoryRecord {
        size,
        hash_fast: non_empty(hash_fast).map(Digest::new),
        hash_full: non_empty(hash_full).map(Digest::new),
        alg: None,
    };

    if let Some(id) = non_empty(alg) {
        match id.parse::<HashAlgorithm>() {
            Ok(alg) => record.alg = Some(alg),
            Err(e) => {
                if record.is_hashed() {
                    log::warn!("{key}: {e}; cached digests discarded");
                }
                return InventoryRecord::new(size);
            }
        }
    }

    if record.alg.is_none() && record.is_hashed() {
        log::warn!("{key}: digests recorded without an algorithm; discarded");
        return InventoryRecord::new(size);
    }
    if record.hash_full.is_some() && record.hash_fast.is_none() {
        log::warn!("{key}: full hash without a fast hash; discarded");
        record.hash_full = None;
    }
    record
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn format_error(path: &Path, reason: String) -> InventoryError {
    InventoryError::Format {
        path: path.to_path_buf(),
        reason,
    }
}

/// Write a snapshot, replacing `path` atomically.
pub(crate) fn write(path: &Path, records: &BTreeMap<String, InventoryRecord>) -> Result<(), InventoryError> {
    let format = SnapshotFormat::from_path(path)?;
    let io_error = |source: io::Error| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = match format {
        SnapshotFormat::Csv => encode_csv(records).map_err(io_error)?,
        SnapshotFormat::Json => encode_json(records).map_err(io_error)?,
    };

    let tmp = temp_sibling(path);
    if let Err(e) = fs::write(&tmp, &bytes).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(e));
    }
    log::debug!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

fn encode_csv(records: &BTreeMap<String, InventoryRecord>) -> io::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for (key, record) in records {
        writer.serialize(CsvRow {
            path: key.clone(),
            size: record.size,
            hash_fast: record.hash_fast.as_ref().map(ToString::to_string),
            hash_full: record.hash_full.as_ref().map(ToString::to_string),
            alg: record.alg.map(|a| a.as_str().to_string()),
        })?;
    }
    writer.into_inner().map_err(|e| e.into_error())
}

fn encode_json(records: &BTreeMap<String, InventoryRecord>) -> io::Result<Vec<u8>> {
    let entries: BTreeMap<&str, JsonEntry> = records
        .iter()
        .map(|(key, record)| {
            let entry = JsonEntry {
                size: JsonSize::Number(record.size),
                hash_fast: record.hash_fast.as_ref().map(ToString::to_string),
                hash_full: record.hash_full.as_ref().map(ToString::to_string),
                alg: record.alg.map(|a| a.as_str().to_string()),
            };
            (key.as_str(), entry)
        })
        .collect();
    let mut bytes = serde_json::to_vec_pretty(&entries)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// File a snapshot is written to before it is renamed over `path`.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
