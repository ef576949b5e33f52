//! JSON file mapping store
//!
//! The whole state is one JSON document, loaded eagerly on open and
//! rewritten after every mutation. Writes go to a temporary file in the same
//! directory which is then renamed over the target, so a crash leaves either
//! the old or the new document on disk, never a partial one.
//!
//! Documents in the legacy layout (`mapping_github_to_jira`,
//! `mapping_jira_to_github`, naive ISO timestamps) load as well. Anything
//! else, including `{}`, is rejected rather than read as an empty store.

use super::mapping::MappingSnapshot;
use super::{default_last_sync_time, MappingStore, MappingTable};
use crate::{Result, SyncError};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StateDocument {
    #[serde(alias = "mapping_github_to_jira", deserialize_with = "id_map")]
    source_to_dest: BTreeMap<String, String>,
    #[serde(
        default,
        alias = "mapping_jira_to_github",
        deserialize_with = "id_map"
    )]
    dest_to_source: BTreeMap<String, String>,
    #[serde(default = "default_last_sync_time", deserialize_with = "sync_time")]
    last_sync_time: DateTime<Utc>,
}

/// Id map whose values may be JSON strings or numbers (issue numbers)
fn id_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(id) => Ok((key, id)),
            serde_json::Value::Number(n) => Ok((key, n.to_string())),
            other => Err(D::Error::custom(format!(
                "mapping for '{}' must be a string or number, got {}",
                key, other
            ))),
        })
        .collect()
}

/// RFC 3339 timestamp, or a naive ISO timestamp taken as UTC
fn sync_time<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|t| Utc.from_utc_datetime(&t))
        })
        .map_err(|e| D::Error::custom(format!("invalid last_sync_time '{}': {}", raw, e)))
}

/// Mapping store persisted to a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: MappingTable,
    last_sync_time: DateTime<Utc>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store (nothing is written until the
    /// first mutation). A file that cannot be parsed is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            tracing::info!(path = %path.display(), "No state file found, starting fresh");
            return Ok(Self {
                path,
                table: MappingTable::new(),
                last_sync_time: default_last_sync_time(),
            });
        }

        tracing::info!(path = %path.display(), "Loading mapping state");

        let content = fs::read_to_string(&path)?;
        let document: StateDocument = serde_json::from_str(&content).map_err(|e| {
            SyncError::State(format!("Corrupt state file {}: {}", path.display(), e))
        })?;

        let snapshot = MappingSnapshot {
            source_to_dest: document.source_to_dest,
            dest_to_source: document.dest_to_source,
        };
        let (table, repaired) = snapshot.into_table();
        if repaired {
            tracing::warn!(
                path = %path.display(),
                "Reverse mapping disagreed with forward mapping, rebuilt from forward"
            );
        }

        tracing::debug!(
            mappings = table.len(),
            last_sync_time = %document.last_sync_time,
            "Mapping state loaded"
        );

        Ok(Self {
            path,
            table,
            last_sync_time: document.last_sync_time,
        })
    }

    /// Get the default state path (~/.issues-sync/mapping.state.json)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".issues-sync");
        path.push("mapping.state.json");
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    fn save(&self, table: &MappingTable, last_sync_time: DateTime<Utc>) -> Result<()> {
        let snapshot = MappingSnapshot::from(table);
        let document = StateDocument {
            source_to_dest: snapshot.source_to_dest,
            dest_to_source: snapshot.dest_to_source,
            last_sync_time,
        };
        let json = serde_json::to_string_pretty(&document)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SyncError::Io(e.error))?;

        tracing::trace!(path = %self.path.display(), mappings = table.len(), "State saved");
        Ok(())
    }
}

impl MappingStore for FileStore {
    fn get_dest(&self, source_id: &str) -> Option<String> {
        self.table.get_dest(source_id).map(str::to_string)
    }

    fn get_source(&self, dest_id: &str) -> Option<String> {
        self.table.get_source(dest_id).map(str::to_string)
    }

    fn put(&mut self, source_id: &str, dest_id: &str) -> Result<()> {
        // Memory is updated only after the write succeeded
        let mut next = self.table.clone();
        if !next.insert(source_id, dest_id) {
            return Ok(());
        }
        self.save(&next, self.last_sync_time)?;
        self.table = next;
        Ok(())
    }

    fn last_sync_time(&self) -> DateTime<Utc> {
        self.last_sync_time
    }

    fn set_last_sync_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        self.save(&self.table, time)?;
        self.last_sync_time = time;
        Ok(())
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_put_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.put("1", "PROJ-1").unwrap();
        store.put("2", "PROJ-2").unwrap();
        assert!(path.exists());

        let reloaded = FileStore::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get_dest("1").as_deref(), Some("PROJ-1"));
        assert_eq!(reloaded.get_source("PROJ-2").as_deref(), Some("2"));
    }

    #[test]
    fn test_last_sync_time_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let mut store = FileStore::open(&path).unwrap();
        store.set_last_sync_time(time).unwrap();

        let reloaded = FileStore::open(&path).unwrap();
        assert_eq!(reloaded.last_sync_time(), time);
    }

    #[test]
    fn test_document_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.put("12", "VDK-7").unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["source_to_dest"]["12"], "VDK-7");
        assert_eq!(value["dest_to_source"]["VDK-7"], "12");
        assert!(value["last_sync_time"].is_string());
    }

    #[test]
    fn test_corrupt_file_fails_fast() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(SyncError::State(_))));
    }

    #[test]
    fn test_loads_document_without_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"source_to_dest": {"3": "X-3"}, "dest_to_source": {"X-3": "3"}}"#,
        )
        .unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get_dest("3").as_deref(), Some("X-3"));
        assert!(store.last_sync_time() < Utc::now());
    }

    #[test]
    fn test_empty_object_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{}").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(SyncError::State(_))));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"source_to_dest": {"3": "X-3"}, "mappings": {"4": "X-4"}}"#,
        )
        .unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(SyncError::State(_))));
    }

    #[test]
    fn test_loads_legacy_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.state.json");
        fs::write(
            &path,
            r#"{
                "mapping_github_to_jira": {"12": "VDK-7", "15": "VDK-9"},
                "mapping_jira_to_github": {"VDK-7": 12, "VDK-9": "15"},
                "last_sync_time": "2024-03-01T12:30:00.250000"
            }"#,
        )
        .unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_dest("12").as_deref(), Some("VDK-7"));
        assert_eq!(store.get_source("VDK-9").as_deref(), Some("15"));
        assert_eq!(
            store.last_sync_time(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_default_path() {
        let path = FileStore::default_path();
        assert!(path.ends_with(".issues-sync/mapping.state.json"));
    }
}
