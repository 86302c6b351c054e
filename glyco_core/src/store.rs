//! Per-user entry store.
//!
//! Entries live in `<data_dir>/users/<user>/entries.jsonl`, one JSON entry
//! per line in insertion order. New entries are appended under a file lock;
//! edits and deletions rewrite the file atomically. Callers always receive
//! entries newest-first.

use crate::persist;
use crate::{Entry, EntryPatch, Error, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ENTRIES_FILE: &str = "entries.jsonl";
const LAST_USER_FILE: &str = "last_user";

/// Directory holding one user's files
///
/// User names become directory names, so anything that could escape
/// `<data_dir>/users` is rejected.
pub fn user_dir(data_dir: &Path, user: &str) -> Result<PathBuf> {
    let name = user.trim();
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(Error::InvalidUser(user.to_string()));
    }
    Ok(data_dir.join("users").join(name))
}

/// Load/save/add/update/delete entries for one user
#[derive(Clone, Debug)]
pub struct EntryStore {
    path: PathBuf,
}

impl EntryStore {
    /// Store for `user` under `data_dir`
    pub fn for_user(data_dir: &Path, user: &str) -> Result<Self> {
        Ok(Self {
            path: user_dir(data_dir, user)?.join(ENTRIES_FILE),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, newest first
    ///
    /// Lines that cannot be parsed are skipped with a warning.
    pub fn load(&self) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = persist::load_json_lines(&self.path)?;
        entries.reverse();
        Ok(entries)
    }

    /// Replace the whole collection; `entries` is newest first
    pub fn save(&self, entries: &[Entry]) -> Result<()> {
        let oldest_first: Vec<&Entry> = entries.iter().rev().collect();
        persist::save_json_lines(&self.path, &oldest_first)?;
        tracing::debug!("Saved {} entries to {:?}", entries.len(), self.path);
        Ok(())
    }

    /// Append a new entry, stamping its creation time
    pub fn add(&self, mut entry: Entry) -> Result<Entry> {
        let now = Utc::now();
        entry.created_at = now;
        entry.updated_at = now;
        persist::append_json_line(&self.path, &entry)?;
        tracing::info!("Added entry {} for {}", entry.id, entry.date);
        Ok(entry)
    }

    /// Look up one entry by id
    pub fn get(&self, id: Uuid) -> Result<Option<Entry>> {
        Ok(self.load()?.into_iter().find(|e| e.id == id))
    }

    /// Merge `patch` into the entry with `id`
    ///
    /// Returns the updated entry, or `None` if no entry has that id. The
    /// journal stays locked from load to rewrite.
    pub fn update(&self, id: Uuid, patch: EntryPatch) -> Result<Option<Entry>> {
        let updated = persist::update_json_lines(&self.path, |entries: &mut Vec<Entry>| {
            let entry = entries.iter_mut().find(|e| e.id == id)?;
            patch.apply(entry);
            Some(entry.clone())
        })?;

        match &updated {
            Some(_) => tracing::info!("Updated entry {}", id),
            None => tracing::debug!("No entry {} to update", id),
        }
        Ok(updated)
    }

    /// Remove the entry with `id`; false if it did not exist
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = persist::update_json_lines(&self.path, |entries: &mut Vec<Entry>| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            (entries.len() != before).then_some(())
        })?;

        if removed.is_some() {
            tracing::info!("Deleted entry {}", id);
        }
        Ok(removed.is_some())
    }
}

/// Most recently used profile, if one was recorded
pub fn load_last_user(data_dir: &Path) -> Result<Option<String>> {
    let path = data_dir.join(LAST_USER_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let name = std::fs::read_to_string(&path)?;
    let name = name.trim();
    if name.is_empty() || user_dir(data_dir, name).is_err() {
        tracing::warn!("Ignoring unusable last user in {:?}", path);
        return Ok(None);
    }
    Ok(Some(name.to_string()))
}

/// Remember `user` as the most recently used profile
pub fn save_last_user(data_dir: &Path, user: &str) -> Result<()> {
    user_dir(data_dir, user)?;
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(data_dir.join(LAST_USER_FILE), user.trim())?;
    tracing::debug!("Remembered last user {}", user.trim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, MedicationSnapshot};
    use chrono::{NaiveDate, NaiveTime};

    fn entry(day: u32, gly: f64) -> Entry {
        Entry::new(
            NaiveDate::from_ymd_opt(2026, 4, day).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            Category::Morning,
        )
        .with_glycemia(gly)
    }

    #[test]
    fn test_add_returns_newest_first() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();

        let first = store.add(entry(1, 1.0)).unwrap();
        let second = store.add(entry(2, 1.2)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, second.id);
        assert_eq!(loaded[1].id, first.id);
        assert!(store.path().ends_with("users/alice/entries.jsonl"));
    }

    #[test]
    fn test_update_merges_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        let added = store.add(entry(1, 1.0)).unwrap();
        store.add(entry(2, 1.4)).unwrap();

        let updated = store
            .update(
                added.id,
                EntryPatch {
                    glycemia: Some(Some(0.9)),
                    notes: Some(Some("fasting".into())),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.glycemia, Some(0.9));
        assert_eq!(updated.created_at, added.created_at);
        assert!(updated.updated_at >= added.updated_at);

        let reloaded = store.get(added.id).unwrap().unwrap();
        assert_eq!(reloaded.notes.as_deref(), Some("fasting"));
        assert_eq!(reloaded.date, added.date);

        // Order is preserved by the rewrite
        let loaded = store.load().unwrap();
        assert_eq!(loaded[1].id, added.id);
    }

    #[test]
    fn test_update_clears_reading() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        let mut typo = entry(3, 11.0);
        typo.basal_insulin = Some(12.0);
        let typo = store.add(typo).unwrap();

        let updated = store
            .update(
                typo.id,
                EntryPatch {
                    glycemia: Some(None),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.glycemia, None);

        let reloaded = store.get(typo.id).unwrap().unwrap();
        assert_eq!(reloaded.glycemia, None);
        assert_eq!(reloaded.basal_insulin, Some(12.0));
    }

    #[test]
    fn test_add_after_rewrite_is_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        let first = store.add(entry(1, 1.0)).unwrap();

        // A second handle, as another process would hold
        let other = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        store
            .update(
                first.id,
                EntryPatch {
                    glycemia: Some(Some(1.3)),
                    ..Default::default()
                },
            )
            .unwrap();
        other.add(entry(2, 1.1)).unwrap();
        assert!(store.delete(first.id).unwrap());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].reading(), Some(1.1));
    }

    #[test]
    fn test_update_unknown_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        store.add(entry(1, 1.0)).unwrap();

        let result = store.update(Uuid::new_v4(), EntryPatch::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        let keep = store.add(entry(1, 1.0)).unwrap();
        let gone = store.add(entry(2, 1.1)).unwrap();

        assert!(store.delete(gone.id).unwrap());
        assert!(!store.delete(gone.id).unwrap());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, keep.id);
    }

    #[test]
    fn test_users_are_isolated() {
        let temp_dir = tempfile::tempdir().unwrap();
        let alice = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        let bob = EntryStore::for_user(temp_dir.path(), "bob").unwrap();

        alice.add(entry(1, 1.0)).unwrap();
        assert!(bob.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();
        store.add(entry(1, 1.0)).unwrap();

        let mut raw = std::fs::read_to_string(store.path()).unwrap();
        raw.push_str("{ not an entry }\n{\"id\":\"x\"}\n");
        std::fs::write(store.path(), raw).unwrap();
        store.add(entry(2, 1.1)).unwrap();

        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_survives_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = EntryStore::for_user(temp_dir.path(), "alice").unwrap();

        let mut e = entry(1, 1.0);
        e.medications.push(MedicationSnapshot {
            id: Uuid::new_v4(),
            name: "Metformin".into(),
            dose: "500mg".into(),
            taken: true,
        });
        store.add(e.clone()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded[0].medications, e.medications);
    }

    #[test]
    fn test_invalid_user_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        for name in ["", "  ", "..", "a/b", "a\\b"] {
            assert!(
                matches!(
                    EntryStore::for_user(temp_dir.path(), name),
                    Err(Error::InvalidUser(_))
                ),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_last_user_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(load_last_user(temp_dir.path()).unwrap(), None);

        save_last_user(temp_dir.path(), "brahim").unwrap();
        assert_eq!(
            load_last_user(temp_dir.path()).unwrap(),
            Some("brahim".to_string())
        );

        assert!(save_last_user(temp_dir.path(), "../etc").is_err());
    }
}
