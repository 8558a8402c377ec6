//! Append-only outline log.
//!
//! Records get store-assigned ids, strictly increasing. Readers usually
//! want only the last few outlines as context for the next chapter.

use crate::persist;
use scrivener_core::Stamp;
use scrivener_core::stamp::one_or_many;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One chapter outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineRecord {
    pub id: u64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    #[serde(rename = "entity", default)]
    pub linked_entities: Vec<String>,
    #[serde(rename = "update_time", deserialize_with = "one_or_many")]
    pub timestamps: Vec<Stamp>,
}

impl OutlineRecord {
    /// When the record was written. Older files may carry several stamps;
    /// the last one wins.
    pub fn timestamp(&self) -> Option<&Stamp> {
        self.timestamps.last()
    }

    pub fn summary_view(&self) -> OutlineSummary {
        OutlineSummary {
            id: self.id,
            title: self.title.clone(),
            summary: self.summary.clone(),
        }
    }
}

/// Trimmed projection returned by [`OutlineLog::get_recent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineSummary {
    pub id: u64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
}

pub struct OutlineLog {
    path: Option<PathBuf>,
    records: Vec<OutlineRecord>,
}

impl OutlineLog {
    /// Open the log backed by `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records: Vec<OutlineRecord> = persist::load_records(&path);
        debug!(path = %path.display(), count = records.len(), "Outline log loaded");
        Self {
            path: Some(path),
            records,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a record and return its id.
    pub fn append(
        &mut self,
        title: &str,
        summary: &str,
        linked_entities: Vec<String>,
        stamp: Stamp,
    ) -> u64 {
        // Equals count + 1 until something is deleted.
        let id = self.records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        self.records.push(OutlineRecord {
            id,
            title: title.to_string(),
            summary: summary.to_string(),
            linked_entities,
            timestamps: vec![stamp],
        });
        info!(id, title, "Outline appended");
        self.flush();
        id
    }

    /// The last `min(k, len)` records in ascending id order, as trimmed
    /// projections and their linked entity lists.
    pub fn get_recent(&self, k: usize) -> (Vec<OutlineSummary>, Vec<Vec<String>>) {
        let start = self.records.len().saturating_sub(k);
        self.records[start..]
            .iter()
            .map(|r| (r.summary_view(), r.linked_entities.clone()))
            .unzip()
    }

    pub fn get_by_id(&self, id: u64) -> Option<&OutlineRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// First record with exactly this title.
    pub fn get_by_title(&self, title: &str) -> Option<&OutlineRecord> {
        self.records.iter().find(|r| r.title == title)
    }

    pub fn latest(&self) -> Option<&OutlineRecord> {
        self.records.last()
    }

    /// Remove the record with `id`. Returns false if there is none.
    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let deleted = self.records.len() < before;
        if deleted {
            info!(id, "Outline deleted");
            self.flush();
        }
        deleted
    }

    pub fn all(&self) -> &[OutlineRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = persist::write_json(path, &self.records) {
            warn!(path = %path.display(), error = %e, "Failed to persist outline log, keeping in-memory state");
        }
    }
}
