//! RAG-friendly dataset export: per-item markdown documents, a line-delimited
//! record stream, and the concatenated transcript corpus used by full-context
//! answering.

use std::fmt;

use chrono::Utc;
use tracing::info;

use clipvault_common::store::{write_json, write_jsonl, write_text};
use clipvault_common::types::sort_records_desc;
use clipvault_common::{ClipVaultError, DatasetCounts, ProfileStore, UnifiedDataset, VideoRecord};

pub struct ExportStats {
    pub records: usize,
    pub rendered: usize,
}

impl fmt::Display for ExportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} rendered={}",
            self.records, self.rendered
        )
    }
}

/// Render one record as a markdown document with a YAML metadata block.
pub fn render_markdown(rec: &VideoRecord) -> String {
    let mut md = vec![
        format!("# {}", rec.id),
        String::new(),
        "```yaml".to_string(),
        format!("id: {}", rec.id),
        format!("url: {}", opt_str(&rec.url)),
        format!("timestamp: {}", opt_i64(rec.timestamp)),
        format!("uploader: {}", opt_str(&rec.uploader)),
        format!("duration: {}", opt_i64(rec.duration)),
        format!("view_count: {}", opt_i64(rec.view_count)),
        format!("like_count: {}", opt_i64(rec.like_count)),
        format!("comment_count: {}", opt_i64(rec.comment_count)),
        format!("repost_count: {}", opt_i64(rec.repost_count)),
        "```".to_string(),
        String::new(),
    ];

    if let Some(title) = rec.title_or_description() {
        md.extend([
            "## Title/Description".to_string(),
            String::new(),
            title.to_string(),
            String::new(),
        ]);
    }

    md.extend([
        "## Transcript".to_string(),
        String::new(),
        rec.transcript_text().unwrap_or("").to_string(),
        String::new(),
    ]);

    let captions = rec.caption_text();
    if !captions.is_empty() {
        md.extend([
            "## Captions".to_string(),
            String::new(),
            captions,
            String::new(),
        ]);
    }

    let mut out = md.join("\n").trim().to_string();
    out.push('\n');
    out
}

/// Export the unified dataset into `rag/`: refreshed `unified.json`,
/// `records.jsonl`, per-item `items/<id>.{json,md}`, and `all_transcripts.md`.
pub fn run_export(store: &ProfileStore) -> Result<ExportStats, ClipVaultError> {
    let unified = store.load_unified()?;
    let mut records = unified.records;
    sort_records_desc(&mut records);

    let rag_dir = store.rag_dir();
    let items_dir = rag_dir.join("items");

    let out = UnifiedDataset {
        profile: unified.profile,
        username: unified.username,
        generated_at: Utc::now(),
        counts: DatasetCounts::tally(&records),
        records: records.clone(),
    };
    write_json(&rag_dir.join("unified.json"), &out)?;
    write_jsonl(&rag_dir.join("records.jsonl"), &records)?;

    let mut all_md = Vec::with_capacity(records.len());
    for rec in &records {
        write_json(&items_dir.join(format!("{}.json", rec.id)), rec)?;
        let md = render_markdown(rec);
        write_text(&items_dir.join(format!("{}.md", rec.id)), &md)?;
        all_md.push(md);
    }
    write_text(&rag_dir.join("all_transcripts.md"), &all_md.join("\n\n"))?;

    let stats = ExportStats {
        records: records.len(),
        rendered: all_md.len(),
    };
    info!(dir = %rag_dir.display(), %stats, "RAG export complete");
    Ok(stats)
}

fn opt_str(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("")
}

fn opt_i64(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}
