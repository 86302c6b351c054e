//! Backup and restore of a user's journal and medication catalog.
//!
//! A backup is a single pretty-printed JSON envelope:
//! `{version, user, entries, medications, exported_at}`.

use crate::meds::{MedicationCatalog, MedicationStore};
use crate::store::{self, EntryStore};
use crate::{Entry, Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format version written into new backups
pub const BACKUP_VERSION: u32 = 9;

/// Self-contained copy of one user's data
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub user: Option<String>,
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub medications: Option<MedicationCatalog>,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
}

impl Backup {
    /// Snapshot the current files of `user`
    pub fn capture(data_dir: &Path, user: &str) -> Result<Self> {
        let entries = EntryStore::for_user(data_dir, user)?.load()?;
        let medications = MedicationStore::for_user(data_dir, user)?.load()?;
        Ok(Self {
            version: BACKUP_VERSION,
            user: Some(user.trim().to_string()),
            entries,
            medications: Some(medications),
            exported_at: Utc::now(),
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        tracing::info!("Wrote backup of {} entries to {:?}", self.entries.len(), path);
        Ok(())
    }

    /// Read a backup file; an envelope without `entries` is rejected
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let backup: Backup = serde_json::from_str(&contents)
            .map_err(|e| Error::Backup(format!("invalid backup file {:?}: {}", path, e)))?;
        if backup.version > BACKUP_VERSION {
            tracing::warn!(
                "Backup version {} is newer than supported version {}",
                backup.version,
                BACKUP_VERSION
            );
        }
        Ok(backup)
    }

    /// Replace the stored data of the backup's user (or `fallback_user`)
    ///
    /// The medication catalog is only overwritten when the backup carries
    /// one. The restored user becomes the last user. Returns that user.
    pub fn restore(&self, data_dir: &Path, fallback_user: &str) -> Result<String> {
        let user = self
            .user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(fallback_user)
            .to_string();

        EntryStore::for_user(data_dir, &user)?.save(&self.entries)?;
        if let Some(medications) = &self.medications {
            MedicationStore::for_user(data_dir, &user)?.save(medications)?;
        }
        store::save_last_user(data_dir, &user)?;

        tracing::info!("Restored {} entries for {}", self.entries.len(), user);
        Ok(user)
    }
}

/// Default backup file name for a user on a given day
pub fn default_backup_file_name(user: &str, today: NaiveDate) -> String {
    format!("backup_{}_{}.json", user, today.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use chrono::NaiveTime;

    fn seed(data_dir: &Path, user: &str) {
        let entries = EntryStore::for_user(data_dir, user).unwrap();
        for day in 1..=3 {
            let entry = Entry::new(
                NaiveDate::from_ymd_opt(2026, 6, day).unwrap(),
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                Category::Morning,
            )
            .with_glycemia(1.0 + f64::from(day) / 10.0);
            entries.add(entry).unwrap();
        }
        MedicationStore::for_user(data_dir, user)
            .unwrap()
            .update(|c| c.add(&Category::Evening, "Lantus", "12U", true))
            .unwrap();
    }

    #[test]
    fn test_capture_and_restore_elsewhere() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        seed(source.path(), "alice");

        let path = source.path().join("backup.json");
        Backup::capture(source.path(), "alice").unwrap().write_to(&path).unwrap();

        let backup = Backup::read_from(&path).unwrap();
        assert_eq!(backup.version, BACKUP_VERSION);
        let user = backup.restore(target.path(), "default").unwrap();
        assert_eq!(user, "alice");

        let original = EntryStore::for_user(source.path(), "alice").unwrap().load().unwrap();
        let restored = EntryStore::for_user(target.path(), "alice").unwrap().load().unwrap();
        assert_eq!(original, restored);

        let meds = MedicationStore::for_user(target.path(), "alice").unwrap().load().unwrap();
        assert_eq!(meds.evening[0].name, "Lantus");
        assert_eq!(store::load_last_user(target.path()).unwrap(), Some("alice".into()));
    }

    #[test]
    fn test_restore_without_user_uses_fallback() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("backup.json");
        std::fs::write(
            &path,
            r#"{"version":9,"entries":[{"id":"6f1c1f3e-0000-4000-8000-000000000003","date":"2026-06-01","time":"09:15","category":"Matin","glycemia":1.2}]}"#,
        )
        .unwrap();

        let backup = Backup::read_from(&path).unwrap();
        assert!(backup.medications.is_none());
        let user = backup.restore(temp_dir.path(), "bob").unwrap();
        assert_eq!(user, "bob");

        let loaded = EntryStore::for_user(temp_dir.path(), "bob").unwrap().load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].reading(), Some(1.2));
    }

    #[test]
    fn test_backup_without_entries_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("backup.json");
        std::fs::write(&path, r#"{"version":9,"user":"alice"}"#).unwrap();

        let err = Backup::read_from(&path).unwrap_err();
        assert!(matches!(err, Error::Backup(_)));
    }

    #[test]
    fn test_default_file_name() {
        let day = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        assert_eq!(default_backup_file_name("alice", day), "backup_alice_2026-06-30.json");
    }
}
