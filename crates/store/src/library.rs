//! A project directory: synopsis, entities, outlines and saved chapters.
//!
//! ```text
//! <dir>/
//!   synopsis.txt
//!   entities.json
//!   outline.json
//!   chapter_<YYYYMMDDHHMM>.txt
//! ```
//!
//! Single writer only. Every mutation rewrites its file in full; two
//! processes working on the same directory will lose each other's writes.

use crate::entities::EntityStore;
use crate::outline::OutlineLog;
use crate::persist;
use scrivener_core::{Stamp, StoreError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SYNOPSIS_FILE: &str = "synopsis.txt";
pub const ENTITIES_FILE: &str = "entities.json";
pub const OUTLINE_FILE: &str = "outline.json";

pub struct Library {
    dir: PathBuf,
    synopsis: String,
    entities: EntityStore,
    outline: OutlineLog,
}

impl Library {
    /// Open (creating if needed) the library at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Storage(format!("Failed to create library directory {}: {e}", dir.display()))
        })?;

        let synopsis_path = dir.join(SYNOPSIS_FILE);
        let synopsis = match std::fs::read_to_string(&synopsis_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    synopsis_path.display()
                )));
            }
        };

        let entities = EntityStore::open(dir.join(ENTITIES_FILE))?;
        let outline = OutlineLog::open(dir.join(OUTLINE_FILE));

        info!(
            dir = %dir.display(),
            entities = entities.len(),
            outlines = outline.len(),
            has_synopsis = !synopsis.trim().is_empty(),
            "Library opened"
        );

        Ok(Self {
            dir,
            synopsis,
            entities,
            outline,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn synopsis(&self) -> &str {
        &self.synopsis
    }

    pub fn has_synopsis(&self) -> bool {
        !self.synopsis.trim().is_empty()
    }

    /// Replace the synopsis. The new text is kept in memory even if the
    /// write fails.
    pub fn save_synopsis(&mut self, text: &str) {
        self.synopsis = text.to_string();
        let path = self.dir.join(SYNOPSIS_FILE);
        if let Err(e) = persist::write_text(&path, text) {
            warn!(path = %path.display(), error = %e, "Failed to persist synopsis");
        }
    }

    /// Save a chapter as `chapter_<stamp>.txt`, adding a numeric suffix if a
    /// chapter was already saved in the same minute. Returns the path
    /// written, or `None` if the write failed.
    pub fn save_chapter(&self, text: &str, stamp: &Stamp) -> Option<PathBuf> {
        let mut path = self.dir.join(format!("chapter_{stamp}.txt"));
        let mut n = 1;
        while path.exists() {
            n += 1;
            path = self.dir.join(format!("chapter_{stamp}_{n}.txt"));
        }

        match persist::write_text(&path, text) {
            Ok(()) => {
                info!(path = %path.display(), "Chapter saved");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to save chapter");
                None
            }
        }
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    pub fn outline(&self) -> &OutlineLog {
        &self.outline
    }

    pub fn outline_mut(&mut self) -> &mut OutlineLog {
        &mut self.outline
    }
}
