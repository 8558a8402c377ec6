//! Whole-file JSON persistence.
//!
//! Every mutation rewrites the entire file. Writes go to a temp file in the
//! same directory which is then renamed over the target, so a crash never
//! leaves a truncated file behind. There is no locking: one writer per file.

use scrivener_core::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Load a JSON array of records, skipping records that fail to decode.
///
/// A missing file yields an empty list. A file that is not a JSON array, or
/// one holding records that fail to decode, is copied aside to
/// `<file>.corrupt` first, so the next write does not destroy what was
/// skipped.
pub(crate) fn load_records<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(), // Missing file, start empty
    };

    if content.trim().is_empty() {
        return Vec::new();
    }

    let values: Vec<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file is not a JSON array, starting empty");
            preserve_aside(path);
            return Vec::new();
        }
    };

    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), index = i, error = %e, "Skipping corrupted record");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(
            path = %path.display(),
            skipped = total - records.len(),
            "Some records could not be read"
        );
        preserve_aside(path);
    }
    records
}

/// Copy `path` to `<file>.corrupt`.
fn preserve_aside(path: &Path) {
    let aside = corrupt_path(path);
    match std::fs::copy(path, &aside) {
        Ok(_) => warn!(aside = %aside.display(), "Original store file preserved"),
        Err(e) => warn!(error = %e, "Failed to preserve corrupt store file"),
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Storage(format!("Failed to serialize {}: {e}", path.display())))?;
    write_text(path, &json)
}

/// Atomically replace `path` with `text`.
pub(crate) fn write_text(path: &Path, text: &str) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(parent).map_err(|e| {
        StoreError::Storage(format!("Failed to create directory {}: {e}", parent.display()))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| StoreError::Storage(format!("Temp file creation failed in {}: {e}", parent.display())))?;

    temp.write_all(text.as_bytes())
        .map_err(|e| StoreError::Storage(format!("Write failed for {}: {e}", path.display())))?;

    temp.persist(path)
        .map_err(|e| StoreError::Storage(format!("Rename failed for {}: {e}", path.display())))?;

    debug!(path = %path.display(), bytes = text.len(), "File written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u64,
        name: String,
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<Row> = load_records(&dir.path().join("nope.json"));
        assert!(rows.is_empty());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rows.json");
        let rows = vec![Row { id: 1, name: "北京".into() }];
        write_json(&path, &rows).unwrap();

        // Non-ASCII is written as-is, not escaped.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("北京"));

        let loaded: Vec<Row> = load_records(&path);
        assert_eq!(loaded, rows);
    }

    #[test]
    fn bad_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, r#"[{"id":1,"name":"a"},{"id":"x"},{"id":3,"name":"c"}]"#).unwrap();
        let loaded: Vec<Row> = load_records(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].id, 3);
    }

    #[test]
    fn skipped_records_keep_a_copy_of_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let raw = r#"[{"id":1,"name":"a"},{"id":"x","name":"legacy"}]"#;
        std::fs::write(&path, raw).unwrap();

        let loaded: Vec<Row> = load_records(&path);
        assert_eq!(loaded, vec![Row { id: 1, name: "a".into() }]);

        // A rewrite after load must not lose the skipped record.
        write_json(&path, &loaded).unwrap();
        let aside = std::fs::read_to_string(dir.path().join("rows.json.corrupt")).unwrap();
        assert_eq!(aside, raw);
    }

    #[test]
    fn clean_file_leaves_nothing_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, r#"[{"id":1,"name":"a"}]"#).unwrap();
        let loaded: Vec<Row> = load_records(&path);
        assert_eq!(loaded.len(), 1);
        assert!(!dir.path().join("rows.json.corrupt").exists());
    }

    #[test]
    fn corrupt_file_is_preserved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, "this is not json").unwrap();
        let loaded: Vec<Row> = load_records(&path);
        assert!(loaded.is_empty());
        let aside = dir.path().join("rows.json.corrupt");
        assert_eq!(std::fs::read_to_string(aside).unwrap(), "this is not json");
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        write_text(&path, "[]").unwrap();
        write_text(&path, "[1]").unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("rows.json")]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1]");
    }
}
