//! Local snippet store.
//!
//! The authoritative in-process collection. It is shared between ordinary
//! user edits and the sync engine: edits may land while a sync is in flight,
//! so the engine works against a frozen [`StoreSnapshot`] and the
//! [`SnippetStore::apply_merged`] step re-applies any interim edits on top
//! of the merge result before swapping the collection in atomically.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{LabelIndex, Snippet, SnippetDraft, SnippetId, SnippetPatch};
use crate::util::timestamp_ms_now;

/// Change notification emitted after a mutation commits.
///
/// Consumed by whatever presentation layer exists; the store itself carries
/// no reactive-framework dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Added(SnippetId),
    Updated(SnippetId),
    Removed(SnippetId),
    /// The whole collection was replaced by a merge result
    Replaced,
}

type Listener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Point-in-time frozen copy of the store, taken at the start of a sync
/// cycle. Further edits to the live store do not affect it.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub snippets: HashMap<SnippetId, Snippet>,
    pub tombstones: HashMap<SnippetId, i64>,
    pub checkpoint: Option<i64>,
    pub taken_at: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreData {
    snippets: HashMap<SnippetId, Snippet>,
    /// Ids deleted locally since the last successful sync, with the deletion
    /// instant; forgotten once a sync confirms the deletion converged
    tombstones: HashMap<SnippetId, i64>,
    /// Instant of the last successful sync completion for this device
    checkpoint: Option<i64>,
}

/// The local snippet collection with CRUD, labeling, and sync support.
pub struct SnippetStore {
    inner: Mutex<StoreData>,
    listeners: Mutex<Vec<Listener>>,
    path: Option<PathBuf>,
}

impl Default for SnippetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnippetStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreData::default()),
            listeners: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Open a store persisted at `path`, starting empty when the file does
    /// not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        let data = if path.exists() {
            let body = fs::read_to_string(&path)?;
            serde_json::from_str(&body)?
        } else {
            StoreData::default()
        };

        Ok(Self {
            inner: Mutex::new(data),
            listeners: Mutex::new(Vec::new()),
            path: Some(path),
        })
    }

    /// Write the collection, tombstones, and checkpoint back to disk.
    ///
    /// No-op for in-memory stores.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = {
            let data = self.lock();
            serde_json::to_string_pretty(&*data)?
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        Ok(())
    }

    /// Register a change listener.
    pub fn on_change(&self, listener: impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        self.lock_listeners().push(Box::new(listener));
    }

    /// Create a snippet from a draft, assigning a fresh id and timestamp.
    pub fn add(&self, draft: SnippetDraft) -> Result<Snippet> {
        let snippet = Snippet::from_draft(draft);
        {
            let mut data = self.lock();
            if data.snippets.contains_key(&snippet.id) {
                return Err(Error::LocalState(format!(
                    "duplicate snippet id {}",
                    snippet.id
                )));
            }
            data.snippets.insert(snippet.id, snippet.clone());
        }
        self.notify(&ChangeEvent::Added(snippet.id));
        Ok(snippet)
    }

    /// Apply a partial edit to an existing snippet, bumping its timestamp.
    pub fn update(&self, id: SnippetId, patch: SnippetPatch) -> Result<Snippet> {
        let updated = {
            let mut data = self.lock();
            let snippet = data
                .snippets
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            snippet.apply_patch(patch);
            snippet.clone()
        };
        self.notify(&ChangeEvent::Updated(id));
        Ok(updated)
    }

    /// Get a snippet by id.
    #[must_use]
    pub fn get(&self, id: SnippetId) -> Option<Snippet> {
        self.lock().snippets.get(&id).cloned()
    }

    /// All snippets, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<Snippet> {
        let mut snippets: Vec<Snippet> = self.lock().snippets.values().cloned().collect();
        snippets.sort_by(|a, b| b.datetime.cmp(&a.datetime).then(a.id.cmp(&b.id)));
        snippets
    }

    /// Case-insensitive substring search over title, content, and lang.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Snippet> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.list();
        }
        self.list()
            .into_iter()
            .filter(|snippet| {
                snippet.title.to_lowercase().contains(&needle)
                    || snippet.content.to_lowercase().contains(&needle)
                    || snippet.lang.to_lowercase() == needle
            })
            .collect()
    }

    /// Starred snippets, newest first.
    #[must_use]
    pub fn starred(&self) -> Vec<Snippet> {
        self.list()
            .into_iter()
            .filter(|snippet| snippet.starred)
            .collect()
    }

    /// Snippets carrying the given label, newest first.
    #[must_use]
    pub fn by_label(&self, label: &str) -> Vec<Snippet> {
        self.list()
            .into_iter()
            .filter(|snippet| snippet.labels.contains(label))
            .collect()
    }

    /// Delete a snippet and record a tombstone for the next sync.
    ///
    /// Label references disappear with the snippet since the label index is
    /// derived from the live collection.
    pub fn remove(&self, id: SnippetId) -> Result<()> {
        {
            let mut data = self.lock();
            if data.snippets.remove(&id).is_none() {
                return Err(Error::NotFound(id.to_string()));
            }
            data.tombstones.insert(id, timestamp_ms_now());
        }
        self.notify(&ChangeEvent::Removed(id));
        Ok(())
    }

    /// Remove a single label from a snippet.
    pub fn remove_label(&self, id: SnippetId, label: &str) -> Result<Snippet> {
        let (snippet, changed) = {
            let mut data = self.lock();
            let snippet = data
                .snippets
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let changed = snippet.labels.remove(label);
            if changed {
                snippet.bump_datetime();
            }
            (snippet.clone(), changed)
        };
        if changed {
            self.notify(&ChangeEvent::Updated(id));
        }
        Ok(snippet)
    }

    /// Delete a label entirely, stripping it from every snippet that
    /// references it. Returns the number of snippets touched.
    pub fn delete_label(&self, label: &str) -> usize {
        let mut touched = Vec::new();
        {
            let mut data = self.lock();
            for snippet in data.snippets.values_mut() {
                if snippet.labels.remove(label) {
                    snippet.bump_datetime();
                    touched.push(snippet.id);
                }
            }
        }
        for id in &touched {
            self.notify(&ChangeEvent::Updated(*id));
        }
        touched.len()
    }

    /// Derived label index over the live collection.
    #[must_use]
    pub fn label_index(&self) -> LabelIndex {
        LabelIndex::build(self.lock().snippets.values())
    }

    /// Number of live snippets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().snippets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().snippets.is_empty()
    }

    /// Instant of the last successful sync completion, if any.
    #[must_use]
    pub fn checkpoint(&self) -> Option<i64> {
        self.lock().checkpoint
    }

    /// Take a point-in-time copy usable by the sync engine without blocking
    /// further local edits.
    #[must_use]
    pub fn snapshot_copy(&self) -> StoreSnapshot {
        let data = self.lock();
        StoreSnapshot {
            snippets: data.snippets.clone(),
            tombstones: data.tombstones.clone(),
            checkpoint: data.checkpoint,
            taken_at: timestamp_ms_now(),
        }
    }

    /// Atomically replace the collection with a merge result.
    ///
    /// `frozen` must be the copy the merge ran against. Edits committed after
    /// the copy was taken are detected by diffing the live collection against
    /// it and win over the merge result; deletions from the same window stay
    /// deleted. Readers never observe a state mixing pre- and post-merge
    /// data: validation happens before the swap and the swap is a single
    /// assignment under the lock.
    pub fn apply_merged(
        &self,
        mut merged: HashMap<SnippetId, Snippet>,
        frozen: &StoreSnapshot,
    ) -> Result<()> {
        for (id, snippet) in &merged {
            if snippet.id != *id {
                return Err(Error::LocalState(format!(
                    "merged record keyed {id} carries id {}",
                    snippet.id
                )));
            }
        }

        {
            let mut data = self.lock();

            // Interim edits: ids added or bumped since the copy was taken.
            for (id, live) in &data.snippets {
                let superseded = frozen
                    .snippets
                    .get(id)
                    .is_none_or(|old| live.datetime > old.datetime);
                if superseded {
                    merged.insert(*id, live.clone());
                }
            }

            // Interim deletions must not be resurrected by the merge.
            for id in data.tombstones.keys() {
                if !frozen.tombstones.contains_key(id) {
                    merged.remove(id);
                }
            }

            data.snippets = merged;
        }
        self.notify(&ChangeEvent::Replaced);
        Ok(())
    }

    /// Advance the sync checkpoint and forget resolved tombstones.
    ///
    /// Called only after the remote write succeeded. Exactly the tombstones
    /// the frozen copy carried are cleared; ids deleted during the sync
    /// window keep theirs for the next cycle.
    pub fn complete_sync(&self, frozen: &StoreSnapshot, completed_at: i64) {
        let mut data = self.lock();
        data.tombstones
            .retain(|id, _| !frozen.tombstones.contains_key(id));
        data.checkpoint = Some(completed_at);
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: &ChangeEvent) {
        for listener in self.lock_listeners().iter() {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn draft(title: &str) -> SnippetDraft {
        SnippetDraft::new(title, "body", "text")
    }

    #[test]
    fn test_add_and_get() {
        let store = SnippetStore::new();
        let snippet = store.add(draft("hello")).unwrap();

        let fetched = store.get(snippet.id).unwrap();
        assert_eq!(fetched, snippet);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_bumps_datetime() {
        let store = SnippetStore::new();
        let snippet = store.add(draft("a")).unwrap();

        let updated = store
            .update(
                snippet.id,
                SnippetPatch {
                    content: Some("new body".to_string()),
                    ..SnippetPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.content, "new body");
        assert!(updated.datetime > snippet.datetime);
    }

    #[test]
    fn test_update_missing_snippet() {
        let store = SnippetStore::new();
        let error = store
            .update(SnippetId::new(), SnippetPatch::default())
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_list_newest_first() {
        let store = SnippetStore::new();
        let first = store.add(draft("first")).unwrap();
        let second = store.add(draft("second")).unwrap();

        // Bump the first one so ordering flips.
        store
            .update(
                first.id,
                SnippetPatch {
                    title: Some("first, edited".to_string()),
                    ..SnippetPatch::default()
                },
            )
            .unwrap();

        let listed = store.list();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn test_remove_records_tombstone() {
        let store = SnippetStore::new();
        let snippet = store.add(draft("doomed")).unwrap();

        store.remove(snippet.id).unwrap();
        assert!(store.get(snippet.id).is_none());

        let frozen = store.snapshot_copy();
        assert!(frozen.tombstones.contains_key(&snippet.id));
    }

    #[test]
    fn test_remove_missing_snippet() {
        let store = SnippetStore::new();
        assert!(matches!(
            store.remove(SnippetId::new()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_labels_are_derived() {
        let store = SnippetStore::new();
        let mut d = draft("tagged");
        d.labels.insert("rust".to_string());
        let snippet = store.add(d).unwrap();

        assert_eq!(store.label_index().len(), 1);
        assert_eq!(store.by_label("rust").len(), 1);

        store.remove(snippet.id).unwrap();
        assert!(store.label_index().is_empty());
    }

    #[test]
    fn test_delete_label_strips_every_snippet() {
        let store = SnippetStore::new();
        for title in ["a", "b"] {
            let mut d = draft(title);
            d.labels.insert("shared".to_string());
            store.add(d).unwrap();
        }

        assert_eq!(store.delete_label("shared"), 2);
        assert!(store.label_index().is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_label_bumps_only_when_present() {
        let store = SnippetStore::new();
        let mut d = draft("tagged");
        d.labels.insert("rust".to_string());
        let snippet = store.add(d).unwrap();

        let after = store.remove_label(snippet.id, "missing").unwrap();
        assert_eq!(after.datetime, snippet.datetime);

        let after = store.remove_label(snippet.id, "rust").unwrap();
        assert!(after.labels.is_empty());
        assert!(after.datetime > snippet.datetime);
    }

    #[test]
    fn test_search_matches_title_content_lang() {
        let store = SnippetStore::new();
        store
            .add(SnippetDraft::new("http client", "reqwest::get", "rust"))
            .unwrap();
        store
            .add(SnippetDraft::new("greeting", "print('hi')", "python"))
            .unwrap();

        assert_eq!(store.search("http").len(), 1);
        assert_eq!(store.search("reqwest").len(), 1);
        assert_eq!(store.search("python").len(), 1);
        assert_eq!(store.search("  ").len(), 2);
        assert!(store.search("absent").is_empty());
    }

    #[test]
    fn test_change_events() {
        let store = SnippetStore::new();
        let events = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&events);
        store.on_change(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let snippet = store.add(draft("a")).unwrap();
        store
            .update(snippet.id, SnippetPatch::default())
            .unwrap();
        store.remove(snippet.id).unwrap();

        assert_eq!(events.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_apply_merged_replaces_collection() {
        let store = SnippetStore::new();
        let stale = store.add(draft("stale")).unwrap();
        let frozen = store.snapshot_copy();

        let replacement = Snippet::from_draft(draft("fresh"));
        let merged = HashMap::from([(replacement.id, replacement.clone())]);
        store.apply_merged(merged, &frozen).unwrap();

        assert!(store.get(stale.id).is_none());
        assert_eq!(store.get(replacement.id).unwrap(), replacement);
    }

    #[test]
    fn test_apply_merged_keeps_interim_edits() {
        let store = SnippetStore::new();
        let kept = store.add(draft("kept")).unwrap();
        let frozen = store.snapshot_copy();

        // Edits after the freeze: one update, one addition, one deletion.
        let edited = store
            .update(
                kept.id,
                SnippetPatch {
                    content: Some("edited during sync".to_string()),
                    ..SnippetPatch::default()
                },
            )
            .unwrap();
        let added = store.add(draft("added during sync")).unwrap();

        let doomed = Snippet::from_draft(draft("doomed"));
        let merged = HashMap::from([
            (kept.id, kept.clone()),
            (doomed.id, doomed.clone()),
        ]);

        // Simulate the doomed snippet being deleted during the window: it is
        // live (merge adopted it) but locally tombstoned after the freeze.
        // Build that state by inserting and removing it through the store.
        // Note the tombstone is absent from `frozen`.
        store.apply_merged(merged.clone(), &frozen).unwrap();
        store.remove(doomed.id).unwrap();
        store.apply_merged(merged, &frozen).unwrap();

        assert_eq!(
            store.get(kept.id).unwrap().content,
            edited.content,
            "interim update must win over the merge result"
        );
        assert!(store.get(added.id).is_some());
        assert!(
            store.get(doomed.id).is_none(),
            "interim deletion must not be resurrected"
        );
    }

    #[test]
    fn test_apply_merged_rejects_mismatched_keys() {
        let store = SnippetStore::new();
        let frozen = store.snapshot_copy();

        let snippet = Snippet::from_draft(draft("a"));
        let merged = HashMap::from([(SnippetId::new(), snippet)]);
        let error = store.apply_merged(merged, &frozen).unwrap_err();
        assert!(matches!(error, Error::LocalState(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_complete_sync_clears_only_frozen_tombstones() {
        let store = SnippetStore::new();
        let old = store.add(draft("old")).unwrap();
        store.remove(old.id).unwrap();

        let frozen = store.snapshot_copy();

        let newer = store.add(draft("newer")).unwrap();
        store.remove(newer.id).unwrap();

        store.complete_sync(&frozen, 42);

        let after = store.snapshot_copy();
        assert!(!after.tombstones.contains_key(&old.id));
        assert!(after.tombstones.contains_key(&newer.id));
        assert_eq!(store.checkpoint(), Some(42));
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = SnippetStore::load(&path).unwrap();
        let snippet = store.add(draft("persisted")).unwrap();
        let removed = store.add(draft("removed")).unwrap();
        store.remove(removed.id).unwrap();
        store.persist().unwrap();

        let reloaded = SnippetStore::load(&path).unwrap();
        assert_eq!(reloaded.get(snippet.id).unwrap(), snippet);
        let frozen = reloaded.snapshot_copy();
        assert!(frozen.tombstones.contains_key(&removed.id));
    }
}
