use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform tag stamped on every record.
pub const SOURCE_TAG: &str = "tiktok";

/// One caption track attached to a record, keyed by language code or, when no
/// language is known, by the file path it was downloaded to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Caption {
    /// Dedup key: language code, else source path.
    pub fn key(&self) -> Option<&str> {
        self.lang.as_deref().or(self.path.as_deref())
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// A speech-to-text transcript with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub model: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

/// One catalog item. `id` is the only stable identity; every other field fills
/// in progressively across crawls and enrichment passes and must never be
/// replaced by emptier data (see the reconciler).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_id: Option<String>,
    /// Creation time, seconds since epoch. Absent when the feed omitted it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repost_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_play_url: Option<String>,
    /// Path of the captured audio file, relative to the profile directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ext: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captions: Vec<Caption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

impl VideoRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: Some(SOURCE_TAG.to_string()),
            ..Default::default()
        }
    }

    /// Export sort key: descending timestamp, missing timestamps last.
    pub fn sort_key(&self) -> i64 {
        self.timestamp.unwrap_or(-1)
    }

    /// Title, falling back to description.
    pub fn title_or_description(&self) -> Option<&str> {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.description.as_deref().filter(|d| !d.is_empty()))
    }

    pub fn transcript_text(&self) -> Option<&str> {
        self.transcript
            .as_ref()
            .map(|t| t.text.as_str())
            .filter(|t| !t.is_empty())
    }

    /// All non-empty caption texts, newline-joined.
    pub fn caption_text(&self) -> String {
        self.captions
            .iter()
            .filter_map(|c| c.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sort records for export: descending timestamp, missing timestamps last.
pub fn sort_records_desc(records: &mut [VideoRecord]) {
    records.sort_by_key(|r| std::cmp::Reverse(r.sort_key()));
}

/// The persisted per-account record store (`index.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileIndex {
    pub profile: String,
    pub username: String,
    pub count: usize,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<VideoRecord>,
}

/// Aggregate counts reported on dataset documents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub records: usize,
    pub audio: usize,
    pub captions: usize,
    pub transcripts: usize,
}

impl DatasetCounts {
    pub fn tally(records: &[VideoRecord]) -> Self {
        Self {
            records: records.len(),
            audio: records.iter().filter(|r| r.audio_path.is_some()).count(),
            captions: records.iter().filter(|r| !r.captions.is_empty()).count(),
            transcripts: records.iter().filter(|r| r.transcript.is_some()).count(),
        }
    }
}

/// The deduplicated, enriched dataset (`unified.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedDataset {
    pub profile: String,
    pub username: String,
    pub generated_at: DateTime<Utc>,
    pub counts: DatasetCounts,
    pub records: Vec<VideoRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_treats_missing_timestamp_as_last() {
        let mut records = vec![
            VideoRecord {
                timestamp: None,
                ..VideoRecord::new("none")
            },
            VideoRecord {
                timestamp: Some(100),
                ..VideoRecord::new("old")
            },
            VideoRecord {
                timestamp: Some(200),
                ..VideoRecord::new("new")
            },
        ];
        sort_records_desc(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "none"]);
    }

    #[test]
    fn caption_key_prefers_lang() {
        let c = Caption {
            path: Some("audio/1.eng.vtt".to_string()),
            ext: Some("vtt".to_string()),
            lang: Some("eng-US".to_string()),
            text: Some("hi".to_string()),
        };
        assert_eq!(c.key(), Some("eng-US"));

        let no_lang = Caption {
            lang: None,
            ..c.clone()
        };
        assert_eq!(no_lang.key(), Some("audio/1.eng.vtt"));
    }

    #[test]
    fn empty_optional_fields_are_not_serialized() {
        let rec = VideoRecord::new("7301");
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"id\":\"7301\""));
        assert!(!json.contains("transcript"));
        assert!(!json.contains("captions"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn title_falls_back_to_description() {
        let mut rec = VideoRecord::new("1");
        rec.description = Some("a description".to_string());
        assert_eq!(rec.title_or_description(), Some("a description"));
        rec.title = Some("a title".to_string());
        assert_eq!(rec.title_or_description(), Some("a title"));
    }
}
