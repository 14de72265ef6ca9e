//! Per-account record store: wholesale JSON documents under the data root.
//!
//! Layout per profile:
//! `{DATA_DIR}/{username}/index.json`: canonical record store
//! `{DATA_DIR}/{username}/videos.jsonl`: one record per line
//! `{DATA_DIR}/{username}/unified.json`: deduplicated + enriched dataset
//! `{DATA_DIR}/{username}/audio/`: captured audio and caption files
//! `{DATA_DIR}/{username}/transcripts/`: per-item transcript JSON
//! `{DATA_DIR}/{username}/items/`: per-item record JSON
//! `{DATA_DIR}/{username}/rag/`, `docs/`: derived exports

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::error::ClipVaultError;
use crate::types::{sort_records_desc, ProfileIndex, Transcript, UnifiedDataset, VideoRecord};

/// Root data directory, controlled by the `DATA_DIR` env var (default: `"data"`).
pub fn data_dir() -> PathBuf {
    PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

pub struct ProfileStore {
    profile_dir: PathBuf,
}

impl ProfileStore {
    pub fn new(data_root: &Path, username: &str) -> Self {
        Self {
            profile_dir: data_root.join(username),
        }
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.profile_dir.join("audio")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.profile_dir.join("transcripts")
    }

    pub fn items_dir(&self) -> PathBuf {
        self.profile_dir.join("items")
    }

    pub fn rag_dir(&self) -> PathBuf {
        self.profile_dir.join("rag")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.profile_dir.join("docs")
    }

    pub fn index_path(&self) -> PathBuf {
        self.profile_dir.join("index.json")
    }

    pub fn jsonl_path(&self) -> PathBuf {
        self.profile_dir.join("videos.jsonl")
    }

    pub fn unified_path(&self) -> PathBuf {
        self.profile_dir.join("unified.json")
    }

    pub fn transcript_path(&self, id: &str) -> PathBuf {
        self.transcripts_dir().join(format!("{id}.json"))
    }

    /// A path under the profile directory, expressed relative to it
    /// (the form stored in `audio_path`).
    pub fn relative_to_profile(&self, path: &Path) -> String {
        path.strip_prefix(&self.profile_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    // -----------------------------------------------------------------------
    // Record store
    // -----------------------------------------------------------------------

    /// Load the persisted record store. `Ok(None)` when no store exists yet;
    /// unreadable or malformed JSON is a fatal store error, never silently
    /// treated as empty.
    pub fn load_index(&self) -> Result<Option<ProfileIndex>, ClipVaultError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?;
        let index: ProfileIndex = serde_json::from_str(&raw)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?;
        Ok(Some(index))
    }

    /// Write the canonical record store: `index.json` plus the line-delimited
    /// `videos.jsonl`. Records are sorted by descending timestamp.
    pub fn save_index(
        &self,
        profile: &str,
        username: &str,
        mut records: Vec<VideoRecord>,
    ) -> Result<ProfileIndex, ClipVaultError> {
        sort_records_desc(&mut records);

        let index = ProfileIndex {
            profile: profile.to_string(),
            username: username.to_string(),
            count: records.len(),
            generated_at: Utc::now(),
            records,
        };

        write_json(&self.index_path(), &index)?;
        write_jsonl(&self.jsonl_path(), &index.records)?;

        info!(
            path = %self.index_path().display(),
            count = index.count,
            "Record store saved"
        );

        Ok(index)
    }

    // -----------------------------------------------------------------------
    // Unified dataset
    // -----------------------------------------------------------------------

    /// Load the unified dataset, failing with a remediation hint when the
    /// build step has not run yet.
    pub fn load_unified(&self) -> Result<UnifiedDataset, ClipVaultError> {
        let path = self.unified_path();
        if !path.exists() {
            return Err(ClipVaultError::DatasetMissing(path));
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))
    }

    pub fn save_unified(&self, unified: &UnifiedDataset) -> Result<(), ClipVaultError> {
        write_json(&self.unified_path(), unified)
    }

    /// Write one record to `items/<id>.json`.
    pub fn save_item(&self, record: &VideoRecord) -> Result<(), ClipVaultError> {
        write_json(&self.items_dir().join(format!("{}.json", record.id)), record)
    }

    // -----------------------------------------------------------------------
    // Transcripts
    // -----------------------------------------------------------------------

    pub fn load_transcript(&self, id: &str) -> Result<Option<Transcript>, ClipVaultError> {
        let path = self.transcript_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?;
        let transcript = serde_json::from_str(&raw)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?;
        Ok(Some(transcript))
    }

    pub fn save_transcript(&self, id: &str, transcript: &Transcript) -> Result<(), ClipVaultError> {
        write_json(&self.transcript_path(id), transcript)
    }
}

/// Serialize a value as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ClipVaultError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", parent.display())))?;
    }
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| ClipVaultError::Store(e.to_string()))?;
    std::fs::write(path, raw).map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))
}

/// Write records as line-delimited JSON for streaming consumption.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ClipVaultError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", parent.display())))?;
    }
    let mut out = String::new();
    for row in rows {
        let line =
            serde_json::to_string(row).map_err(|e| ClipVaultError::Store(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))
}

/// Write plain text, creating parent directories as needed.
pub fn write_text(path: &Path, text: &str) -> Result<(), ClipVaultError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ClipVaultError::Store(format!("{}: {e}", parent.display())))?;
    }
    std::fs::write(path, text)
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, ts: Option<i64>) -> VideoRecord {
        VideoRecord {
            timestamp: ts,
            ..VideoRecord::new(id)
        }
    }

    #[test]
    fn index_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path(), "creator");

        let records = vec![record("1", Some(100)), record("2", Some(300))];
        store
            .save_index("https://example.com/@creator", "creator", records)
            .unwrap();

        let loaded = store.load_index().unwrap().unwrap();
        assert_eq!(loaded.count, 2);
        assert_eq!(loaded.username, "creator");
        // sorted by descending timestamp
        assert_eq!(loaded.records[0].id, "2");
        assert_eq!(loaded.records[1].id, "1");

        // jsonl mirror carries one line per record
        let jsonl = std::fs::read_to_string(store.jsonl_path()).unwrap();
        assert_eq!(jsonl.lines().count(), 2);
    }

    #[test]
    fn missing_index_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path(), "creator");
        assert!(store.load_index().unwrap().is_none());
    }

    #[test]
    fn malformed_index_is_a_fatal_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path(), "creator");
        std::fs::create_dir_all(store.profile_dir()).unwrap();
        std::fs::write(store.index_path(), "{not json").unwrap();

        match store.load_index() {
            Err(ClipVaultError::Store(_)) => {}
            other => panic!("expected store error, got {other:?}"),
        }
    }

    #[test]
    fn missing_unified_reports_remediation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path(), "creator");
        match store.load_unified() {
            Err(ClipVaultError::DatasetMissing(path)) => {
                assert!(path.ends_with("unified.json"));
            }
            other => panic!("expected dataset-missing error, got {other:?}"),
        }
    }

    #[test]
    fn transcript_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path(), "creator");

        assert!(store.load_transcript("7301").unwrap().is_none());

        let transcript = Transcript {
            text: "hello world".to_string(),
            model: "gpt-4o-transcribe".to_string(),
            provider: "openai".to_string(),
            created_at: Utc::now(),
        };
        store.save_transcript("7301", &transcript).unwrap();

        let loaded = store.load_transcript("7301").unwrap().unwrap();
        assert_eq!(loaded.text, "hello world");
        assert_eq!(loaded.provider, "openai");
    }
}
