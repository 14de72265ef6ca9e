//! Dataset documentation pass: per-record token statistics, optional model
//! summaries, and a dataset-level overview under `docs/`.
//!
//! Prior summaries are folded back in before anything runs, so reruns never
//! lose paid-for work.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::ChatAgent;
use clipvault_common::store::{write_json, write_jsonl, write_text};
use clipvault_common::types::sort_records_desc;
use clipvault_common::{ClipVaultError, DatasetCounts, ProfileStore, VideoRecord};

const ITEM_SUMMARY_SYSTEM: &str = "You are a precise content analyst. Reply with JSON only, \
fields: summary, topics, keywords. summary: 120-200 words, maximally descriptive. \
topics: 5-12 short topics. keywords: 8-15 keywords.";

const DATASET_SUMMARY_SYSTEM: &str = "You are a precise content analyst. Summarize a creator's \
video transcript corpus from its raw topic list. Reply with JSON only, fields: overview, \
top_themes, suggested_use_cases. overview: 200-300 words, descriptive. top_themes: 10-20 \
themes. suggested_use_cases: 5-10 use cases.";

/// Cap on raw topics fed to the dataset-level summary prompt.
const MAX_PROMPT_TOPICS: usize = 400;

#[derive(Debug, Clone)]
pub struct DescribeOptions {
    /// Skip records that already carry a summary and topics.
    pub skip_existing: bool,
    /// Summarization cap per run; 0 = unbounded.
    pub max: usize,
    /// Cooperative pacing between summary requests.
    pub sleep: Duration,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            skip_existing: false,
            max: 0,
            sleep: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct DescribeStats {
    pub records: usize,
    pub summarized: usize,
    pub failures: usize,
}

impl fmt::Display for DescribeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} summarized={} failures={}",
            self.records, self.summarized, self.failures
        )
    }
}

/// Approximate token count, ~4 chars per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Derived text statistics for one record. Recomputed on every run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TextStats {
    pub transcript_tokens: usize,
    pub captions_tokens: usize,
    pub total_tokens: usize,
    pub char_count: usize,
    pub word_count: usize,
}

pub fn text_stats(record: &VideoRecord) -> TextStats {
    let transcript = record.transcript_text().unwrap_or("");
    let captions = record.caption_text();

    let transcript_tokens = estimate_tokens(transcript);
    let captions_tokens = estimate_tokens(&captions);

    TextStats {
        transcript_tokens,
        captions_tokens,
        total_tokens: transcript_tokens + captions_tokens,
        char_count: transcript.len(),
        word_count: transcript.split_whitespace().count(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Parse a model's summary reply leniently: non-JSON output becomes the
/// summary text itself.
fn parse_summary(raw: &str) -> SummaryPayload {
    serde_json::from_str(raw).unwrap_or_else(|_| SummaryPayload {
        summary: raw.to_string(),
        ..SummaryPayload::default()
    })
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatasetSummary {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub top_themes: Vec<String>,
    #[serde(default)]
    pub suggested_use_cases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn parse_dataset_summary(raw: &str) -> DatasetSummary {
    serde_json::from_str(raw).unwrap_or_else(|_| DatasetSummary {
        overview: raw.to_string(),
        ..DatasetSummary::default()
    })
}

/// Record plus its derived statistics, as written to the docs files.
#[derive(Serialize)]
struct DocsRecord<'a> {
    #[serde(flatten)]
    record: &'a VideoRecord,
    #[serde(flatten)]
    stats: TextStats,
}

#[derive(Serialize)]
struct DocsRecords<'a> {
    records: Vec<DocsRecord<'a>>,
}

#[derive(Deserialize)]
struct DocsFile {
    #[serde(default)]
    records: Vec<VideoRecord>,
}

#[derive(Serialize)]
struct TokenStats {
    total_tokens: usize,
    avg_tokens_per_video: f64,
}

#[derive(Serialize)]
struct Overview<'a> {
    profile: &'a str,
    username: &'a str,
    generated_at: chrono::DateTime<Utc>,
    counts: DatasetCounts,
    token_stats: TokenStats,
    dataset_summary: &'a DatasetSummary,
}

/// Run the describe pass. Pass a summarizer to produce per-item and
/// dataset-level summaries; with `None` only statistics are computed.
pub async fn run_describe(
    store: &ProfileStore,
    summarizer: Option<&dyn ChatAgent>,
    opts: &DescribeOptions,
) -> Result<DescribeStats, ClipVaultError> {
    let unified = store.load_unified()?;
    let mut records = unified.records;
    sort_records_desc(&mut records);

    restore_prior_summaries(store, &mut records)?;

    let mut stats = DescribeStats {
        records: records.len(),
        ..DescribeStats::default()
    };

    for record in &mut records {
        let Some(summarizer) = summarizer else {
            break;
        };
        if opts.skip_existing && record.summary.is_some() && !record.topics.is_empty() {
            continue;
        }
        if opts.max > 0 && stats.summarized >= opts.max {
            continue;
        }

        let title = record.title_or_description().unwrap_or("");
        let transcript = record.transcript_text().unwrap_or("");
        let user = format!("TITLE/DESCRIPTION: {title}\n\nTRANSCRIPT:\n{transcript}");

        info!(id = %record.id, "Summarizing item");

        match summarizer.answer(ITEM_SUMMARY_SYSTEM, &user).await {
            Ok(raw) => {
                let payload = parse_summary(&raw);
                record.summary = Some(payload.summary);
                record.topics = payload.topics;
                record.keywords = payload.keywords;
                record.summary_error = None;
                stats.summarized += 1;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "Summary failed");
                record.summary_error = Some(e.to_string());
                stats.failures += 1;
            }
        }

        if !opts.sleep.is_zero() {
            tokio::time::sleep(opts.sleep).await;
        }
    }

    let dataset_summary = match summarizer {
        Some(summarizer) => summarize_dataset(summarizer, &records).await,
        None => DatasetSummary::default(),
    };

    write_docs(store, &unified.profile, &unified.username, &records, &dataset_summary)?;

    info!(%stats, "Describe pass complete");
    Ok(stats)
}

/// Fold summaries from a prior docs run back into the records.
fn restore_prior_summaries(
    store: &ProfileStore,
    records: &mut [VideoRecord],
) -> Result<(), ClipVaultError> {
    let path = store.docs_dir().join("records.json");
    if !path.exists() {
        return Ok(());
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?;
    let prior: DocsFile = serde_json::from_str(&raw)
        .map_err(|e| ClipVaultError::Store(format!("{}: {e}", path.display())))?;

    let by_id: std::collections::HashMap<&str, &VideoRecord> =
        prior.records.iter().map(|r| (r.id.as_str(), r)).collect();

    for record in records {
        let Some(old) = by_id.get(record.id.as_str()) else {
            continue;
        };
        if old.summary.is_some() {
            record.summary = old.summary.clone();
        }
        if !old.topics.is_empty() {
            record.topics = old.topics.clone();
        }
        if !old.keywords.is_empty() {
            record.keywords = old.keywords.clone();
        }
        if old.summary_error.is_some() {
            record.summary_error = old.summary_error.clone();
        }
    }
    Ok(())
}

async fn summarize_dataset(summarizer: &dyn ChatAgent, records: &[VideoRecord]) -> DatasetSummary {
    let topics: Vec<&str> = records
        .iter()
        .flat_map(|r| r.topics.iter().map(String::as_str))
        .take(MAX_PROMPT_TOPICS)
        .collect();
    let user = format!("THEMES (raw): {}", topics.join(", "));

    match summarizer.answer(DATASET_SUMMARY_SYSTEM, &user).await {
        Ok(raw) => parse_dataset_summary(&raw),
        Err(e) => {
            warn!(error = %e, "Dataset summary failed");
            DatasetSummary {
                error: Some(e.to_string()),
                ..DatasetSummary::default()
            }
        }
    }
}

fn write_docs(
    store: &ProfileStore,
    profile: &str,
    username: &str,
    records: &[VideoRecord],
    dataset_summary: &DatasetSummary,
) -> Result<(), ClipVaultError> {
    let out_dir = store.docs_dir();
    let items_dir = out_dir.join("items");

    let all_stats: Vec<TextStats> = records.iter().map(text_stats).collect();

    let docs_records: Vec<DocsRecord> = records
        .iter()
        .zip(&all_stats)
        .map(|(record, stats)| DocsRecord {
            record,
            stats: *stats,
        })
        .collect();

    for doc in &docs_records {
        write_json(&items_dir.join(format!("{}.json", doc.record.id)), doc)?;
        write_text(
            &items_dir.join(format!("{}.md", doc.record.id)),
            &build_item_md(doc.record, &doc.stats),
        )?;
    }

    write_jsonl(&out_dir.join("records.jsonl"), &docs_records)?;
    write_json(&out_dir.join("records.json"), &DocsRecords { records: docs_records })?;

    let total_tokens: usize = all_stats.iter().map(|s| s.total_tokens).sum();
    let overview = Overview {
        profile,
        username,
        generated_at: Utc::now(),
        counts: DatasetCounts::tally(records),
        token_stats: TokenStats {
            total_tokens,
            avg_tokens_per_video: total_tokens as f64 / records.len().max(1) as f64,
        },
        dataset_summary,
    };
    write_json(&out_dir.join("overview.json"), &overview)?;
    write_text(&out_dir.join("overview.md"), &build_overview_md(&overview))?;

    Ok(())
}

fn build_item_md(record: &VideoRecord, stats: &TextStats) -> String {
    let mut md = vec![
        format!("# {}", record.id),
        String::new(),
        "```yaml".to_string(),
        format!("id: {}", record.id),
        format!("url: {}", record.url.as_deref().unwrap_or("")),
        format!(
            "timestamp: {}",
            record.timestamp.map(|t| t.to_string()).unwrap_or_default()
        ),
        format!(
            "duration: {}",
            record.duration.map(|d| d.to_string()).unwrap_or_default()
        ),
        format!("transcript_tokens: {}", stats.transcript_tokens),
        format!("captions_tokens: {}", stats.captions_tokens),
        format!("total_tokens: {}", stats.total_tokens),
        "```".to_string(),
        String::new(),
    ];

    if let Some(title) = record.title_or_description() {
        md.extend([
            "## Title/Description".to_string(),
            String::new(),
            title.to_string(),
            String::new(),
        ]);
    }
    if let Some(summary) = record.summary.as_deref().filter(|s| !s.is_empty()) {
        md.extend([
            "## Summary".to_string(),
            String::new(),
            summary.to_string(),
            String::new(),
        ]);
    }
    if !record.topics.is_empty() {
        md.extend([
            "## Topics".to_string(),
            String::new(),
            record.topics.join(", "),
            String::new(),
        ]);
    }
    if let Some(transcript) = record.transcript_text() {
        md.extend([
            "## Transcript".to_string(),
            String::new(),
            transcript.to_string(),
            String::new(),
        ]);
    }

    let mut out = md.join("\n").trim().to_string();
    out.push('\n');
    out
}

fn build_overview_md(overview: &Overview) -> String {
    let mut md = vec![
        format!("# Dataset Overview ({})", overview.username),
        String::new(),
        format!("Generated at: {}", overview.generated_at.to_rfc3339()),
        String::new(),
        "## Counts".to_string(),
        format!("- Records: {}", overview.counts.records),
        format!("- Audio: {}", overview.counts.audio),
        format!("- Captions: {}", overview.counts.captions),
        format!("- Transcripts: {}", overview.counts.transcripts),
        String::new(),
        "## Token Stats".to_string(),
        format!(
            "- Total tokens (transcripts + captions): {}",
            overview.token_stats.total_tokens
        ),
        format!(
            "- Avg tokens per video: {:.2}",
            overview.token_stats.avg_tokens_per_video
        ),
        String::new(),
    ];

    let summary = overview.dataset_summary;
    if !summary.overview.is_empty() {
        md.extend([
            "## Summary".to_string(),
            String::new(),
            summary.overview.clone(),
            String::new(),
        ]);
    }
    if !summary.top_themes.is_empty() {
        md.extend([
            "## Top Themes".to_string(),
            String::new(),
            summary.top_themes.join(", "),
            String::new(),
        ]);
    }
    if !summary.suggested_use_cases.is_empty() {
        let cases: Vec<String> = summary
            .suggested_use_cases
            .iter()
            .map(|u| format!("- {u}"))
            .collect();
        md.extend([
            "## Suggested Use Cases".to_string(),
            String::new(),
            cases.join("\n"),
            String::new(),
        ]);
    }

    let mut out = md.join("\n").trim().to_string();
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use clipvault_common::{Transcript, UnifiedDataset};

    struct FakeSummarizer;

    #[async_trait]
    impl ChatAgent for FakeSummarizer {
        async fn answer(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(r#"{"summary": "a tight summary", "topics": ["hooks"], "keywords": ["attention"]}"#
                .to_string())
        }

        fn provider(&self) -> &str {
            "fake"
        }
    }

    fn record_with_transcript(id: &str) -> VideoRecord {
        let mut rec = VideoRecord::new(id);
        rec.title = Some("Title".to_string());
        rec.transcript = Some(Transcript {
            text: "twelve chars".to_string(),
            model: "m".to_string(),
            provider: "openai".to_string(),
            created_at: Utc::now(),
        });
        rec
    }

    fn seeded_store(dir: &std::path::Path) -> ProfileStore {
        let store = ProfileStore::new(dir, "creator");
        let records = vec![record_with_transcript("1")];
        let unified = UnifiedDataset {
            profile: "https://example.com/@creator".to_string(),
            username: "creator".to_string(),
            generated_at: Utc::now(),
            counts: DatasetCounts::tally(&records),
            records,
        };
        store.save_unified(&unified).unwrap();
        store
    }

    #[test]
    fn token_estimate_is_four_chars_per_token() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn text_stats_count_transcript_and_captions() {
        let rec = record_with_transcript("1");
        let stats = text_stats(&rec);
        assert_eq!(stats.transcript_tokens, 3);
        assert_eq!(stats.captions_tokens, 0);
        assert_eq!(stats.total_tokens, 3);
        assert_eq!(stats.char_count, 12);
        assert_eq!(stats.word_count, 2);
    }

    #[test]
    fn summary_parse_falls_back_to_raw_text() {
        let parsed = parse_summary("not json at all");
        assert_eq!(parsed.summary, "not json at all");
        assert!(parsed.topics.is_empty());

        let parsed = parse_summary(r#"{"summary": "s", "topics": ["t"], "keywords": []}"#);
        assert_eq!(parsed.summary, "s");
        assert_eq!(parsed.topics, vec!["t"]);
    }

    #[tokio::test]
    async fn describe_summarizes_and_writes_docs() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());

        let stats = run_describe(&store, Some(&FakeSummarizer), &DescribeOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.records, 1);
        assert_eq!(stats.summarized, 1);

        let docs = store.docs_dir();
        assert!(docs.join("overview.json").exists());
        assert!(docs.join("overview.md").exists());
        assert!(docs.join("records.json").exists());
        assert!(docs.join("records.jsonl").exists());
        assert!(docs.join("items/1.json").exists());
        assert!(docs.join("items/1.md").exists());

        let md = std::fs::read_to_string(docs.join("items/1.md")).unwrap();
        assert!(md.contains("## Summary"));
        assert!(md.contains("a tight summary"));
        assert!(md.contains("transcript_tokens: 3"));
    }

    #[tokio::test]
    async fn describe_without_summarizer_computes_stats_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());

        let stats = run_describe(&store, None, &DescribeOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.summarized, 0);
        let raw = std::fs::read_to_string(store.docs_dir().join("records.json")).unwrap();
        assert!(raw.contains("total_tokens"));
        assert!(!raw.contains("a tight summary"));
    }

    #[tokio::test]
    async fn prior_summaries_survive_a_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());

        // first run writes summaries
        run_describe(&store, Some(&FakeSummarizer), &DescribeOptions::default())
            .await
            .unwrap();

        // second run without a summarizer still carries them
        run_describe(&store, None, &DescribeOptions::default())
            .await
            .unwrap();

        let raw = std::fs::read_to_string(store.docs_dir().join("records.json")).unwrap();
        assert!(raw.contains("a tight summary"));
    }
}
