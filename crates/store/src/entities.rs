//! Versioned entity store.
//!
//! Each entity is a named fact with an append-only timeline of
//! `(summary, stamp, tag)` triples, newest last. The name is the unique key:
//! inserting under an existing name appends to that entity's timeline
//! instead of creating a second one.
//!
//! Storage: one JSON array, rewritten wholesale after every mutation.

use crate::persist;
use scrivener_core::stamp::one_or_many;
use scrivener_core::{OneOrMany, Stamp, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A named fact with its full history.
///
/// Fields are private so the co-indexing invariant
/// (`summaries`, `timestamps` and `tags` always have the same length, and
/// `timestamps` never decreases) can only be changed through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: u64,
    name: String,
    #[serde(rename = "summary", deserialize_with = "one_or_many")]
    summaries: Vec<String>,
    #[serde(rename = "update_time", deserialize_with = "one_or_many")]
    timestamps: Vec<Stamp>,
    #[serde(default, deserialize_with = "one_or_many")]
    tags: Vec<String>,
}

impl Entity {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summaries(&self) -> &[String] {
        &self.summaries
    }

    pub fn timestamps(&self) -> &[Stamp] {
        &self.timestamps
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Most recent fact, if any survive.
    pub fn latest(&self) -> Option<&Stamp> {
        self.timestamps.last()
    }

    /// Read-only projection handed out by [`EntityStore::search`].
    pub fn view(&self) -> EntityView {
        let mut tags: Vec<String> = Vec::new();
        for tag in &self.tags {
            if !tag.is_empty() && !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        EntityView {
            name: self.name.clone(),
            summary: self.summaries.concat(),
            tags,
        }
    }

    fn push(&mut self, summary: String, tag: String, stamp: Stamp) {
        self.summaries.push(summary);
        self.tags.push(tag);
        self.timestamps.push(stamp);
    }

    /// Truncate to facts stamped at or before `cutoff`. Returns how many were dropped.
    fn truncate_after(&mut self, cutoff: &Stamp) -> usize {
        // Rightmost index with timestamp <= cutoff, plus one.
        let keep = self.timestamps.partition_point(|t| t <= cutoff);
        let dropped = self.timestamps.len() - keep;
        self.summaries.truncate(keep);
        self.timestamps.truncate(keep);
        self.tags.truncate(keep);
        dropped
    }

    /// Repair an entity read from disk so the co-indexing invariant holds.
    fn normalize(&mut self) {
        let n = self.summaries.len();

        // Older files store a single tag for the whole entity, or none.
        match self.tags.len() {
            0 if n > 0 => {
                debug!(name = %self.name, "Entity has no tags, filling blanks");
                self.tags = vec![String::new(); n];
            }
            1 if n > 1 => {
                let tag = self.tags[0].clone();
                self.tags = vec![tag; n];
            }
            _ => {}
        }

        let len = n.min(self.timestamps.len()).min(self.tags.len());
        if len != n || len != self.timestamps.len() || len != self.tags.len() {
            warn!(
                name = %self.name,
                summaries = n,
                timestamps = self.timestamps.len(),
                tags = self.tags.len(),
                "Entity history lengths differ, truncating to the shortest"
            );
            self.summaries.truncate(len);
            self.timestamps.truncate(len);
            self.tags.truncate(len);
        }

        if !self.timestamps.is_sorted() {
            warn!(name = %self.name, "Entity timestamps are out of order, rollback may keep too little");
        }
    }
}

/// What callers see of an entity: name, all summaries joined, distinct tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityView {
    pub name: String,
    pub summary: String,
    pub tags: Vec<String>,
}

/// Column-oriented batch of facts, the shape entity extraction produces.
///
/// `update_time` may be empty (stamp every row with now), a single stamp
/// (shared by every row) or one stamp per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityBatch {
    #[serde(rename = "name")]
    pub names: Vec<String>,
    #[serde(rename = "summary")]
    pub summaries: Vec<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub update_time: OneOrMany<Stamp>,
}

impl EntityBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, summary: impl Into<String>, tag: impl Into<String>) {
        self.names.push(name.into());
        self.summaries.push(summary.into());
        self.tags.push(tag.into());
    }

    /// Stamp every row with the same time.
    pub fn stamped(mut self, stamp: Stamp) -> Self {
        self.update_time = OneOrMany::One(stamp);
        self
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Split into rows, resolving the shared or missing stamp.
    fn into_rows(self) -> Result<Vec<(String, String, String, Stamp)>, StoreError> {
        let n = self.names.len();
        if self.summaries.len() != n || self.tags.len() != n {
            return Err(StoreError::MalformedBatch(format!(
                "{} names, {} summaries, {} tags",
                n,
                self.summaries.len(),
                self.tags.len()
            )));
        }

        let stamps = if self.update_time.is_empty() {
            vec![Stamp::now(); n]
        } else {
            let given = match &self.update_time {
                OneOrMany::Many(v) => v.len(),
                OneOrMany::One(_) => 1,
            };
            self.update_time.broadcast(n).ok_or_else(|| {
                StoreError::MalformedBatch(format!("{n} rows but {given} timestamps"))
            })?
        };

        Ok(self
            .names
            .into_iter()
            .zip(self.summaries)
            .zip(self.tags)
            .zip(stamps)
            .map(|(((name, summary), tag), stamp)| (name, summary, tag, stamp))
            .collect())
    }
}

/// Keyed collection of entities with append-only histories.
///
/// Loaded into memory on open and flushed to disk after every mutation.
/// A failed flush is logged and the in-memory state stays authoritative.
pub struct EntityStore {
    path: Option<PathBuf>,
    entities: Vec<Entity>,
}

impl EntityStore {
    /// Open the store backed by `path`, loading existing entities.
    ///
    /// A missing file starts empty. Two entities sharing a name is an
    /// integrity violation and fails the open.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut entities: Vec<Entity> = persist::load_records(&path);
        for entity in &mut entities {
            entity.normalize();
        }

        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.name.as_str()) {
                return Err(StoreError::DuplicateKey(entity.name.clone()));
            }
        }

        debug!(path = %path.display(), count = entities.len(), "Entity store loaded");
        Ok(Self {
            path: Some(path),
            entities,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entities: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one fact. Creates the entity if the name is new, otherwise
    /// appends to its history. Returns the entity id.
    pub fn insert_or_merge(
        &mut self,
        name: &str,
        summary: &str,
        tag: &str,
        stamp: Stamp,
    ) -> Result<u64, StoreError> {
        let id = self.merge_one(name.to_string(), summary.to_string(), tag.to_string(), stamp)?;
        self.flush();
        Ok(id)
    }

    /// Record every row of `batch`, then persist once.
    ///
    /// Rows are validated against the current store before anything is
    /// applied, so a bad row leaves the store untouched.
    pub fn insert_batch(&mut self, batch: EntityBatch) -> Result<Vec<u64>, StoreError> {
        let rows = batch.into_rows()?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut latest: HashMap<&str, &Stamp> = HashMap::new();
        for (name, _, _, stamp) in &rows {
            let prev = match latest.get(name.as_str()) {
                Some(prev) => Some(*prev),
                None => self.find_for_write(name)?.and_then(Entity::latest),
            };
            if let Some(prev) = prev
                && stamp < prev
            {
                return Err(out_of_order(name, prev, stamp));
            }
            latest.insert(name, stamp);
        }

        let mut ids = Vec::with_capacity(rows.len());
        for (name, summary, tag, stamp) in rows {
            ids.push(self.merge_one(name, summary, tag, stamp)?);
        }
        info!(rows = ids.len(), "Entity batch recorded");
        self.flush();
        Ok(ids)
    }

    fn merge_one(
        &mut self,
        name: String,
        summary: String,
        tag: String,
        stamp: Stamp,
    ) -> Result<u64, StoreError> {
        let matches: Vec<usize> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name == name)
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => {
                let id = self.next_id();
                debug!(id, name = %name, "New entity");
                self.entities.push(Entity {
                    id,
                    name,
                    summaries: vec![summary],
                    timestamps: vec![stamp],
                    tags: vec![tag],
                });
                Ok(id)
            }
            [i] => {
                let entity = &mut self.entities[*i];
                if let Some(latest) = entity.latest()
                    && stamp < *latest
                {
                    return Err(out_of_order(&name, latest, &stamp));
                }
                entity.push(summary, tag, stamp);
                debug!(id = entity.id, name = %name, facts = entity.summaries.len(), "Entity merged");
                Ok(entity.id)
            }
            _ => Err(StoreError::DuplicateKey(name)),
        }
    }

    /// Projections of every entity, or only those named in `names`, in
    /// insertion order.
    pub fn search(&self, names: Option<&HashSet<String>>) -> Vec<EntityView> {
        self.entities
            .iter()
            .filter(|e| names.is_none_or(|set| set.contains(&e.name)))
            .map(Entity::view)
            .collect()
    }

    /// Truncate every entity's history to facts stamped at or before
    /// `cutoff`. Entities keep their name even when the history empties.
    /// Returns the number of facts dropped.
    pub fn rollback(&mut self, cutoff: &Stamp) -> usize {
        let dropped: usize = self
            .entities
            .iter_mut()
            .map(|e| e.truncate_after(cutoff))
            .sum();
        info!(cutoff = %cutoff, dropped, "Entity store rolled back");
        self.flush();
        dropped
    }

    /// Remove the entity called `name`. Returns false if there is none.
    pub fn delete(&mut self, name: &str) -> Result<bool, StoreError> {
        if self.find_unique(name)?.is_none() {
            return Ok(false);
        }
        self.entities.retain(|e| e.name != name);
        info!(name, "Entity deleted");
        self.flush();
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Result<Option<&Entity>, StoreError> {
        self.find_unique(name)
    }

    pub fn all(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn find_unique(&self, name: &str) -> Result<Option<&Entity>, StoreError> {
        let mut found = self.entities.iter().filter(|e| e.name == name);
        let first = found.next();
        if found.next().is_some() {
            return Err(StoreError::AmbiguousKey(name.to_string()));
        }
        Ok(first)
    }

    /// Lookup on the write path: a second match is a broken uniqueness
    /// invariant, reported as `DuplicateKey`.
    fn find_for_write(&self, name: &str) -> Result<Option<&Entity>, StoreError> {
        self.find_unique(name).map_err(|e| match e {
            StoreError::AmbiguousKey(name) => StoreError::DuplicateKey(name),
            other => other,
        })
    }

    fn next_id(&self) -> u64 {
        self.entities.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }

    fn flush(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = persist::write_json(path, &self.entities) {
            warn!(path = %path.display(), error = %e, "Failed to persist entity store, keeping in-memory state");
        }
    }
}

fn out_of_order(name: &str, latest: &Stamp, given: &Stamp) -> StoreError {
    StoreError::OutOfOrder {
        name: name.to_string(),
        latest: latest.to_string(),
        given: given.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(s: &str) -> Stamp {
        Stamp::parse(s).unwrap()
    }

    fn store_with_history() -> EntityStore {
        let mut store = EntityStore::in_memory();
        store.insert_or_merge("Zhang", "s10", "person", stamp("202501010010")).unwrap();
        store.insert_or_merge("Zhang", "s20", "person", stamp("202501010020")).unwrap();
        store.insert_or_merge("Zhang", "s30", "person", stamp("202501010030")).unwrap();
        store
    }

    fn zhang(store: &EntityStore) -> &Entity {
        store.get("Zhang").unwrap().unwrap()
    }

    #[test]
    fn merge_by_name_keeps_one_entity() {
        let mut store = EntityStore::in_memory();
        let a = store.insert_or_merge("Zhang", "s1", "person", stamp("202501010000")).unwrap();
        let b = store.insert_or_merge("Zhang", "s2", "person", stamp("202501010001")).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(zhang(&store).summaries(), ["s1", "s2"]);
        assert_eq!(zhang(&store).tags().len(), 2);
    }

    #[test]
    fn rollback_to_middle_keeps_prefix() {
        let mut store = store_with_history();
        assert_eq!(store.rollback(&stamp("202501010020")), 1);
        assert_eq!(zhang(&store).summaries(), ["s10", "s20"]);
    }

    #[test]
    fn rollback_before_everything_empties_history() {
        let mut store = store_with_history();
        store.rollback(&stamp("202501010005"));
        let e = zhang(&store);
        assert!(e.summaries().is_empty());
        assert!(e.timestamps().is_empty());
        assert!(e.tags().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rollback_at_last_keeps_everything() {
        let mut store = store_with_history();
        assert_eq!(store.rollback(&stamp("202501010030")), 0);
        assert_eq!(zhang(&store).summaries().len(), 3);
    }

    #[test]
    fn rollback_between_stamps() {
        let mut store = store_with_history();
        store.rollback(&stamp("202501010025"));
        assert_eq!(zhang(&store).summaries(), ["s10", "s20"]);
    }

    #[test]
    fn rollback_keeps_equal_stamps_together() {
        let mut store = EntityStore::in_memory();
        let t = stamp("202501010010");
        store.insert_or_merge("Li", "a", "person", t.clone()).unwrap();
        store.insert_or_merge("Li", "b", "person", t.clone()).unwrap();
        store.insert_or_merge("Li", "c", "person", stamp("202501010011")).unwrap();
        store.rollback(&t);
        assert_eq!(store.get("Li").unwrap().unwrap().summaries(), ["a", "b"]);
    }

    #[test]
    fn older_fact_is_rejected() {
        let mut store = store_with_history();
        let err = store
            .insert_or_merge("Zhang", "late", "person", stamp("202501010015"))
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { .. }));
        assert_eq!(zhang(&store).summaries().len(), 3);
    }

    #[test]
    fn search_filters_in_store_order() {
        let mut store = EntityStore::in_memory();
        let t = stamp("202501010000");
        store.insert_or_merge("北京", "capital", "location", t.clone()).unwrap();
        store.insert_or_merge("张三", "hero", "person", t.clone()).unwrap();
        store.insert_or_merge("上海", "port", "location", t.clone()).unwrap();

        let all = store.search(None);
        assert_eq!(all.len(), 3);

        let wanted: HashSet<String> = ["上海".to_string(), "北京".to_string(), "nobody".to_string()].into();
        let names: Vec<_> = store.search(Some(&wanted)).into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["北京", "上海"]);
    }

    #[test]
    fn view_joins_summaries_and_dedupes_tags() {
        let mut store = EntityStore::in_memory();
        store.insert_or_merge("Zhang", "a swordsman.", "person", stamp("202501010000")).unwrap();
        store.insert_or_merge("Zhang", "now a monk.", "person", stamp("202501010001")).unwrap();
        let view = &store.search(None)[0];
        assert_eq!(view.summary, "a swordsman.now a monk.");
        assert_eq!(view.tags, vec!["person"]);
    }

    #[test]
    fn delete_missing_returns_false() {
        let mut store = store_with_history();
        assert!(!store.delete("nobody").unwrap());
        assert!(store.delete("Zhang").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn ids_stay_unique_after_delete() {
        let mut store = EntityStore::in_memory();
        let t = stamp("202501010000");
        store.insert_or_merge("a", "", "item", t.clone()).unwrap();
        let b = store.insert_or_merge("b", "", "item", t.clone()).unwrap();
        store.delete("a").unwrap();
        let c = store.insert_or_merge("c", "", "item", t).unwrap();
        assert!(c > b);
    }

    #[test]
    fn batch_broadcasts_single_stamp() {
        let mut store = EntityStore::in_memory();
        let mut batch = EntityBatch::new();
        batch.push("北京", "city", "location");
        batch.push("张三", "hero", "person");
        let t = stamp("202504011230");
        let ids = store.insert_batch(batch.stamped(t.clone())).unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert!(store.all().iter().all(|e| e.latest() == Some(&t)));
    }

    #[test]
    fn batch_without_stamp_uses_now() {
        let mut store = EntityStore::in_memory();
        let mut batch = EntityBatch::new();
        batch.push("x", "y", "item");
        store.insert_batch(batch).unwrap();
        assert_eq!(store.all()[0].timestamps().len(), 1);
    }

    #[test]
    fn malformed_batch_changes_nothing() {
        let mut store = EntityStore::in_memory();
        let batch = EntityBatch {
            names: vec!["a".into(), "b".into()],
            summaries: vec!["only one".into()],
            tags: vec!["item".into(), "item".into()],
            update_time: OneOrMany::default(),
        };
        assert!(matches!(
            store.insert_batch(batch),
            Err(StoreError::MalformedBatch(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn batch_with_stale_row_is_rejected_whole() {
        let mut store = store_with_history();
        let batch = EntityBatch {
            names: vec!["new".into(), "Zhang".into()],
            summaries: vec!["n".into(), "z".into()],
            tags: vec!["item".into(), "person".into()],
            update_time: OneOrMany::Many(vec![stamp("202601010000"), stamp("202401010000")]),
        };
        assert!(store.insert_batch(batch).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        {
            let mut store = EntityStore::open(&path).unwrap();
            store.insert_or_merge("北京", "capital", "location", stamp("202501010000")).unwrap();
            store.insert_or_merge("北京", "old city", "location", stamp("202501020000")).unwrap();
        }
        let store = EntityStore::open(&path).unwrap();
        let e = store.get("北京").unwrap().unwrap();
        assert_eq!(e.summaries(), ["capital", "old city"]);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["update_time"][1], "202501020000");
        assert_eq!(raw[0]["summary"][0], "capital");
    }

    #[test]
    fn loads_single_tag_and_scalar_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "name": "北京", "summary": ["a", "b"], "update_time": ["202501010000", "202501020000"], "tags": "城市"},
                {"id": 2, "name": "张三", "summary": "hero", "update_time": "202501010000", "tags": ["人物"]}
            ]"#,
        )
        .unwrap();
        let store = EntityStore::open(&path).unwrap();
        assert_eq!(store.get("北京").unwrap().unwrap().tags(), ["城市", "城市"]);
        assert_eq!(store.get("张三").unwrap().unwrap().summaries(), ["hero"]);
    }

    #[test]
    fn missing_tags_keep_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "name": "Zhang", "summary": ["s1", "s2"], "update_time": ["202501010000", "202501020000"]}]"#,
        )
        .unwrap();
        let store = EntityStore::open(&path).unwrap();
        let e = store.get("Zhang").unwrap().unwrap();
        assert_eq!(e.summaries(), ["s1", "s2"]);
        assert_eq!(e.timestamps().len(), 2);
        assert_eq!(e.tags(), ["", ""]);
        assert!(store.search(None)[0].tags.is_empty());
    }

    fn store_with_duplicates() -> EntityStore {
        let li = Entity {
            id: 1,
            name: "Li".into(),
            summaries: vec!["a".into()],
            timestamps: vec![stamp("202501010000")],
            tags: vec!["person".into()],
        };
        let mut twin = li.clone();
        twin.id = 2;
        EntityStore {
            path: None,
            entities: vec![li, twin],
        }
    }

    #[test]
    fn merge_into_duplicated_name_fails() {
        let mut store = store_with_duplicates();
        let before = store.all().to_vec();
        let err = store
            .insert_or_merge("Li", "b", "person", stamp("202501020000"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(name) if name == "Li"));
        assert_eq!(store.all(), before.as_slice());
    }

    #[test]
    fn batch_into_duplicated_name_fails() {
        let mut store = store_with_duplicates();
        let before = store.all().to_vec();
        let mut batch = EntityBatch::new();
        batch.push("Li", "b", "person");
        let err = store
            .insert_batch(batch.stamped(stamp("202501020000")))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(name) if name == "Li"));
        assert_eq!(store.all(), before.as_slice());
    }

    #[test]
    fn delete_of_duplicated_name_is_ambiguous() {
        let mut store = store_with_duplicates();
        let err = store.delete("Li").unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousKey(name) if name == "Li"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_names_on_disk_fail_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "name": "Li", "summary": ["a"], "update_time": ["202501010000"], "tags": ["person"]},
                {"id": 2, "name": "Li", "summary": ["b"], "update_time": ["202501010000"], "tags": ["person"]}
            ]"#,
        )
        .unwrap();
        assert!(matches!(
            EntityStore::open(&path),
            Err(StoreError::DuplicateKey(name)) if name == "Li"
        ));
    }

    #[test]
    fn persistence_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail.
        let path = dir.path().join("entities.json");
        std::fs::create_dir(&path).unwrap();
        let mut store = EntityStore {
            path: Some(path),
            entities: Vec::new(),
        };
        store.insert_or_merge("a", "b", "item", stamp("202501010000")).unwrap();
        assert_eq!(store.len(), 1);
    }
}
