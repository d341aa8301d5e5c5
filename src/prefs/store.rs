//! Keyed persistence of [`AlarmPrefs`] records.
//!
//! Stores are pure data access: an upsert, a lookup and a delete keyed by the
//! alarm identifier. Business rules (status resets, per-alarm serialization of
//! read-modify-write cycles) live in [`super::PreferenceManager`].

use anyhow::{Context, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tempfile::NamedTempFile;

use super::AlarmPrefs;
use super::record::{AlarmRecord, PrefsDocument};
use crate::constants::{PREFS_LOCK_SUFFIX, PREFS_SCHEMA_VERSION};
use crate::logger::Log;

/// Persistence contract for alarm preferences.
///
/// Each call is atomic: no caller may ever observe a partially written record.
pub trait PreferenceStore: Send + Sync {
    /// Look up a record. A missing record is `Ok(None)`, not an error.
    fn get(&self, alarm_id: &str) -> Result<Option<AlarmPrefs>>;

    /// Insert or replace the record keyed by `prefs.alarm_id()`.
    fn save(&self, prefs: &AlarmPrefs) -> Result<()>;

    /// Remove a record. Deleting a missing record is not an error.
    fn delete(&self, alarm_id: &str) -> Result<()>;

    /// Every stored record.
    fn all(&self) -> Result<Vec<AlarmPrefs>>;
}

/// In-process store, used by embedding hosts that persist elsewhere and in tests.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    records: RwLock<BTreeMap<String, AlarmPrefs>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, alarm_id: &str) -> Result<Option<AlarmPrefs>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(alarm_id).cloned())
    }

    fn save(&self, prefs: &AlarmPrefs) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(prefs.alarm_id().to_string(), prefs.clone());
        Ok(())
    }

    fn delete(&self, alarm_id: &str) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.remove(alarm_id);
        Ok(())
    }

    fn all(&self) -> Result<Vec<AlarmPrefs>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }
}

/// TOML file store.
///
/// The whole document is rewritten on every change through a temporary file in
/// the same directory, then renamed over the original. An exclusive `flock` on
/// `<file>.lock` keeps other processes out for the duration of each operation.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    lock_path: PathBuf,
    // Serializes threads of this process; the flock covers other processes.
    document: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".");
        lock_name.push(PREFS_LOCK_SUFFIX);
        let lock_path = path.with_file_name(lock_name);

        Self {
            path,
            lock_path,
            document: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_document<T>(&self, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        let _local = self.document.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preference directory {}", parent.display())
            })?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .with_context(|| format!("Failed to open lock file {}", self.lock_path.display()))?;
        lock_file
            .lock_exclusive()
            .with_context(|| format!("Failed to lock {}", self.lock_path.display()))?;

        let result = f(&self.path);

        if let Err(e) = FileExt::unlock(&lock_file) {
            Log::log_warning(&format!("Failed to release preference lock: {}", e));
        }
        result
    }

    fn read_document(path: &Path) -> Result<PrefsDocument> {
        if !path.exists() {
            return Ok(PrefsDocument::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(PrefsDocument::default());
        }

        let document: PrefsDocument = toml::from_str(&content)
            .with_context(|| format!("Failed to parse preferences from {}", path.display()))?;

        if document.version > PREFS_SCHEMA_VERSION {
            Log::log_warning(&format!(
                "Preference file version {} is newer than supported version {}; unknown keys are ignored",
                document.version, PREFS_SCHEMA_VERSION
            ));
        }
        Ok(document)
    }

    fn write_document(path: &Path, mut document: PrefsDocument) -> Result<()> {
        document.version = PREFS_SCHEMA_VERSION;
        let content =
            toml::to_string(&document).context("Failed to serialize alarm preferences")?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        temp.write_all(content.as_bytes())
            .context("Failed to write alarm preferences")?;
        temp.as_file().sync_all().context("Failed to flush alarm preferences")?;
        temp.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn find(document: &PrefsDocument, alarm_id: &str) -> Option<usize> {
        document.alarms.iter().position(|r| r.alarm_id == alarm_id)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, alarm_id: &str) -> Result<Option<AlarmPrefs>> {
        self.with_document(|path| {
            let document = Self::read_document(path)?;
            Ok(Self::find(&document, alarm_id)
                .map(|idx| document.alarms[idx].clone().into_prefs()))
        })
    }

    fn save(&self, prefs: &AlarmPrefs) -> Result<()> {
        self.with_document(|path| {
            let mut document = Self::read_document(path)?;
            let record = AlarmRecord::from_prefs(prefs);
            match Self::find(&document, prefs.alarm_id()) {
                Some(idx) => document.alarms[idx] = record,
                None => document.alarms.push(record),
            }
            Self::write_document(path, document)
        })
    }

    fn delete(&self, alarm_id: &str) -> Result<()> {
        self.with_document(|path| {
            let mut document = Self::read_document(path)?;
            let before = document.alarms.len();
            document.alarms.retain(|r| r.alarm_id != alarm_id);
            if document.alarms.len() == before {
                return Ok(());
            }
            Self::write_document(path, document)
        })
    }

    fn all(&self) -> Result<Vec<AlarmPrefs>> {
        self.with_document(|path| {
            let document = Self::read_document(path)?;
            Ok(document
                .alarms
                .into_iter()
                .map(AlarmRecord::into_prefs)
                .collect())
        })
    }
}
