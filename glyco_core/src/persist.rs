//! File primitives shared by the entry store and the medication catalog.
//!
//! Reads take a shared lock, appends take an exclusive lock, and whole-file
//! rewrites go through a temp file in the same directory that is renamed over
//! the target.
//!
//! Line journals are locked through a sidecar `<name>.lock` file. The journal
//! itself is replaced on every rewrite, so a lock on its inode would not keep
//! a concurrent append out of a load-modify-save cycle.

use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Read a JSON document under a shared lock
///
/// Returns `Ok(None)` if the file is missing, unreadable or unparsable; the
/// problem is logged and the caller falls back to its defaults.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("Unable to open {:?}: {}. Using defaults.", path, e);
            return Ok(None);
        }
    };

    if let Err(e) = file.lock_shared() {
        tracing::warn!("Unable to lock {:?}: {}. Using defaults.", path, e);
        return Ok(None);
    }

    let mut contents = String::new();
    let mut reader = BufReader::new(&file);
    if let Err(e) = reader.read_to_string(&mut contents) {
        let _ = file.unlock();
        tracing::warn!("Failed to read {:?}: {}. Using defaults.", path, e);
        return Ok(None);
    }

    file.unlock()?;

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => {
            tracing::debug!("Loaded {:?}", path);
            Ok(Some(value))
        }
        Err(e) => {
            tracing::warn!("Failed to parse {:?}: {}. Using defaults.", path, e);
            Ok(None)
        }
    }
}

/// Atomically replace `path` with the JSON form of `value`
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer(writer, value)?;
        Ok(())
    })
}

/// Atomically replace `path` with one JSON document per line
pub fn save_json_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    ensure_parent_dir(path)?;
    let _lock = JournalLock::exclusive(path)?;
    write_lines(path, items)
}

/// Append one JSON line under an exclusive lock
pub fn append_json_line<T: Serialize>(path: &Path, item: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let _lock = JournalLock::exclusive(path)?;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = std::io::BufWriter::new(&file);
    let line = serde_json::to_string(item)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read every parsable JSON line, in file order
///
/// Blank lines are ignored; lines that fail to parse are logged and skipped.
pub fn load_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let _lock = JournalLock::shared(path)?;
    read_lines(path)
}

/// Load, modify and rewrite a journal under one exclusive lock
///
/// `modify` returns `None` to leave the file as it was; appends from other
/// processes wait until the rewrite has landed.
pub fn update_json_lines<T, R, F>(path: &Path, modify: F) -> Result<Option<R>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut Vec<T>) -> Option<R>,
{
    ensure_parent_dir(path)?;
    let _lock = JournalLock::exclusive(path)?;

    let mut items = read_lines(path)?;
    let Some(out) = modify(&mut items) else {
        return Ok(None);
    };
    write_lines(path, &items)?;
    Ok(Some(out))
}

/// Advisory lock on the sidecar file of a journal, released on drop
struct JournalLock {
    file: File,
}

impl JournalLock {
    fn open(path: &Path) -> Result<File> {
        let mut name = path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".lock");
        let lock_path: PathBuf = path.with_file_name(name);
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)?)
    }

    fn exclusive(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    fn shared(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        file.lock_shared()?;
        Ok(Self { file })
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!("Skipping {:?} line {}: {}", path, line_num + 1, e);
            }
        }
    }

    tracing::debug!("Read {} records from {:?}", items.len(), path);
    Ok(items)
}

fn write_lines<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    write_atomic(path, |writer| {
        for item in items {
            serde_json::to_writer(&mut *writer, item)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    })
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    ensure_parent_dir(path)?;

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "path missing parent")
    })?;
    let temp = NamedTempFile::new_in(parent)?;

    // Serializes concurrent writers
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    tracing::debug!("Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        n: u32,
    }

    #[test]
    fn test_append_and_read_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/records.jsonl");

        for n in 0..3 {
            append_json_line(&path, &Record { n }).unwrap();
        }

        let records: Vec<Record> = load_json_lines(&path).unwrap();
        assert_eq!(records, vec![Record { n: 0 }, Record { n: 1 }, Record { n: 2 }]);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"n\":1}\n{ broken\n\n{\"n\":2}\n{\"n\":").unwrap();

        let records: Vec<Record> = load_json_lines(&path).unwrap();
        assert_eq!(records, vec![Record { n: 1 }, Record { n: 2 }]);
    }

    #[test]
    fn test_missing_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("missing.json");

        assert!(load_json::<Record>(&path).unwrap().is_none());
        assert!(load_json_lines::<Record>(&path).unwrap().is_empty());
    }

    #[test]
    fn test_save_json_is_atomic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("doc.json");

        save_json(&path, &Record { n: 7 }).unwrap();
        save_json(&path, &Record { n: 8 }).unwrap();

        assert_eq!(load_json::<Record>(&path).unwrap(), Some(Record { n: 8 }));
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "doc.json")
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }

    #[test]
    fn test_corrupted_json_falls_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("doc.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert!(load_json::<Record>(&path).unwrap().is_none());
    }

    #[test]
    fn test_update_lines_in_place() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        for n in 0..3 {
            append_json_line(&path, &Record { n }).unwrap();
        }

        let removed = update_json_lines(&path, |records: &mut Vec<Record>| {
            let before = records.len();
            records.retain(|r| r.n != 1);
            (records.len() != before).then_some(before - records.len())
        })
        .unwrap();
        assert_eq!(removed, Some(1));

        // Nothing matched: the file is left alone
        let untouched = update_json_lines(&path, |records: &mut Vec<Record>| {
            records.iter().position(|r| r.n == 9)
        })
        .unwrap();
        assert_eq!(untouched, None);

        let records: Vec<Record> = load_json_lines(&path).unwrap();
        assert_eq!(records, vec![Record { n: 0 }, Record { n: 2 }]);
    }

    #[test]
    fn test_appends_wait_for_rewrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        append_json_line(&path, &Record { n: 0 }).unwrap();

        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let appender_path = path.clone();
        let mut appender = None;

        update_json_lines(&path, |records: &mut Vec<Record>| {
            // The append starts while this rewrite holds the lock
            let handle = std::thread::spawn(move || {
                started_tx.send(()).unwrap();
                append_json_line(&appender_path, &Record { n: 2 }).unwrap();
            });
            started_rx.recv().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(50));
            appender = Some(handle);
            records.push(Record { n: 1 });
            Some(())
        })
        .unwrap();
        appender.unwrap().join().unwrap();

        let records: Vec<Record> = load_json_lines(&path).unwrap();
        assert_eq!(records, vec![Record { n: 0 }, Record { n: 1 }, Record { n: 2 }]);
    }

    #[test]
    fn test_rewrite_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        save_json_lines(&path, &[Record { n: 4 }, Record { n: 5 }]).unwrap();
        let records: Vec<Record> = load_json_lines(&path).unwrap();
        assert_eq!(records.len(), 2);

        save_json_lines::<Record>(&path, &[]).unwrap();
        assert!(load_json_lines::<Record>(&path).unwrap().is_empty());
    }
}
