//! Crawl orchestration: walk the feed, enrich each item (embed page, audio,
//! captions), and reconcile into the persisted record store.
//!
//! Strictly sequential: one page, one item at a time. Each page's cursor
//! depends on the prior page, and the upstream tolerates little concurrency.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use clipvault_common::{Caption, ProfileStore, VideoRecord};
use feed_client::{normalize_profile, FeedClient, FeedItem};

use crate::captions::vtt_to_text;
use crate::media::extract_audio;
use crate::reconcile::{dedupe, reconcile};
use crate::walker::{walk, CreatorFeed, WalkerConfig};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Profile URL, @handle, or bare username.
    pub profile: String,
    /// Item cap; 0 = unbounded.
    pub max_items: usize,
    /// Reuse stored records that already captured audio.
    pub skip_existing: bool,
    /// Download and parse caption tracks.
    pub write_captions: bool,
    /// Capture audio via ffmpeg.
    pub download_audio: bool,
    /// Cooperative pacing between item enrichments.
    pub sleep: Duration,
    pub walker: WalkerConfig,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            profile: String::new(),
            max_items: 0,
            skip_existing: false,
            write_captions: false,
            download_audio: true,
            sleep: Duration::ZERO,
            walker: WalkerConfig::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub pages_fetched: u32,
    pub items_found: usize,
    pub items_reused: usize,
    pub audio_captured: usize,
    pub captions_captured: usize,
    pub item_failures: usize,
    pub total_records: usize,
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pages={} found={} reused={} audio={} captions={} failures={} total={}",
            self.pages_fetched,
            self.items_found,
            self.items_reused,
            self.audio_captured,
            self.captions_captured,
            self.item_failures,
            self.total_records
        )
    }
}

/// Run one crawl for a profile and fold the result into its record store.
pub async fn run_crawl(
    client: &FeedClient,
    data_root: &Path,
    opts: &CrawlOptions,
) -> Result<CrawlStats> {
    let profile = normalize_profile(&opts.profile);
    let store = ProfileStore::new(data_root, &profile.username);

    info!(
        username = %profile.username,
        url = %profile.url,
        "Crawl starting"
    );

    let sec_uid = client
        .resolve_sec_uid(&profile.url)
        .await
        .context("Failed to resolve account id")?;

    let feed = CreatorFeed::new(client, sec_uid);
    let outcome = walk(
        &feed,
        &opts.walker,
        opts.max_items,
        Utc::now().timestamp_millis(),
    )
    .await
    .context("Feed walk failed")?;

    let prior: Vec<VideoRecord> = store
        .load_index()?
        .map(|idx| idx.records)
        .unwrap_or_default();
    let prior_by_id: HashMap<String, VideoRecord> =
        prior.iter().map(|r| (r.id.clone(), r.clone())).collect();

    let mut stats = CrawlStats {
        pages_fetched: outcome.pages_fetched,
        items_found: outcome.items.len(),
        ..CrawlStats::default()
    };

    let total = outcome.items.len();
    let mut records: Vec<VideoRecord> = Vec::with_capacity(total);

    for (i, item) in outcome.items.into_iter().enumerate() {
        let Some(id) = item.id.clone() else {
            continue;
        };

        // Items with audio already on disk don't need another network pass.
        if opts.skip_existing {
            if let Some(existing) = prior_by_id.get(&id) {
                if existing.audio_path.is_some() {
                    records.push(existing.clone());
                    stats.items_reused += 1;
                    continue;
                }
            }
        }

        info!(item = i + 1, total, id = %id, "Processing item");

        let mut record = record_from_item(&item, &profile.username);
        enrich_from_embed(client, &mut record, opts.download_audio, &store, &mut stats).await;

        if opts.write_captions {
            capture_captions(client, &item, &mut record, &store, &mut stats).await;
        }

        if record.error.is_some() || record.captions_error.is_some() {
            stats.item_failures += 1;
        }

        records.push(record);

        if !opts.sleep.is_zero() {
            tokio::time::sleep(opts.sleep).await;
        }
    }

    // Collapse intra-run duplicates, then fold in everything previously known.
    let canonical = reconcile(dedupe(records), prior);
    stats.total_records = canonical.len();

    store.save_index(&profile.url, &profile.username, canonical)?;

    info!(%stats, "Crawl complete");
    Ok(stats)
}

/// Seed a record from the feed item's own metadata.
fn record_from_item(item: &FeedItem, username: &str) -> VideoRecord {
    let id = item.id.clone().unwrap_or_default();
    let mut record = VideoRecord::new(id.clone());
    record.url = Some(feed_client::video_url(username, &id));
    record.description = item.desc.clone();
    record.timestamp = item.create_time;
    record.extracted_at = Some(Utc::now());

    if let Some(stats) = &item.stats {
        record.view_count = stats.play_count;
        record.like_count = stats.digg_count;
        record.comment_count = stats.comment_count;
        record.repost_count = stats.share_count;
    }
    if let Some(author) = &item.author {
        record.uploader = author.unique_id.clone();
        record.uploader_id = author.id.clone();
    }
    record
}

/// Pull title, duration, author, and media URLs from the embed page, and
/// capture audio when a source URL is available. Failures land on the
/// record's diagnostic field; the run continues.
async fn enrich_from_embed(
    client: &FeedClient,
    record: &mut VideoRecord,
    download_audio: bool,
    store: &ProfileStore,
    stats: &mut CrawlStats,
) {
    let embed_url = feed_client::embed_url(&record.id);

    let embed = match client.fetch_embed(&record.id).await {
        Ok(Some(embed)) => embed,
        Ok(None) => {
            record.error = Some("No embed data found".to_string());
            return;
        }
        Err(e) => {
            warn!(id = %record.id, error = %e, "Embed fetch failed");
            record.error = Some(e.to_string());
            return;
        }
    };

    if let Some(title) = embed.title() {
        record.title = Some(title.to_string());
    }
    record.duration = embed.duration().or(record.duration);
    if let Some(uploader) = embed.author_unique_id() {
        record.uploader = Some(uploader.to_string());
    }
    if let Some(uploader_id) = embed.author_user_id() {
        record.uploader_id = Some(uploader_id.to_string());
    }
    record.embed_url = Some(embed_url.clone());
    record.embed_video_url = embed.video_url().map(str::to_string);
    record.music_play_url = embed.music_url().map(str::to_string);

    if !download_audio {
        return;
    }

    // Prefer the video stream; music-only is the fallback for slideshows.
    let source_url = embed.video_url().or(embed.music_url());
    let Some(source_url) = source_url else {
        record.error = Some("No video URLs found in embed data".to_string());
        return;
    };

    let out_mp3 = store.audio_dir().join(format!("{}.mp3", record.id));
    match extract_audio(source_url, &embed_url, &out_mp3).await {
        Ok(()) => {
            record.audio_path = Some(store.relative_to_profile(&out_mp3));
            record.audio_ext = Some("mp3".to_string());
            stats.audio_captured += 1;
        }
        Err(e) => {
            warn!(id = %record.id, error = %e, "Audio capture failed");
            record.error = Some(e.to_string());
        }
    }
}

/// Download the item's caption tracks and attach parsed text. A failure on
/// any track records a diagnostic and keeps whatever was captured.
async fn capture_captions(
    client: &FeedClient,
    item: &FeedItem,
    record: &mut VideoRecord,
    store: &ProfileStore,
    stats: &mut CrawlStats,
) {
    let subs = item
        .video
        .as_ref()
        .and_then(|v| v.subtitle_infos.as_deref())
        .unwrap_or_default();
    if subs.is_empty() {
        return;
    }

    let mut captured: Vec<Caption> = Vec::new();
    for sub in subs {
        let Some(url) = sub.url.as_deref() else {
            continue;
        };
        let lang = sub.lang().unwrap_or("unknown").to_string();
        let out_vtt = store.audio_dir().join(format!("{}.{lang}.vtt", record.id));

        let result = async {
            let bytes = client.fetch_caption(url).await?;
            if let Some(parent) = out_vtt.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out_vtt, &bytes)?;
            Ok::<_, anyhow::Error>(String::from_utf8_lossy(&bytes).into_owned())
        }
        .await;

        match result {
            Ok(raw) => captured.push(Caption {
                path: Some(store.relative_to_profile(&out_vtt)),
                ext: Some("vtt".to_string()),
                lang: Some(lang),
                text: Some(vtt_to_text(&raw)),
            }),
            Err(e) => {
                warn!(id = %record.id, lang = %lang, error = %e, "Caption download failed");
                record.captions_error = Some(e.to_string());
            }
        }
    }

    if !captured.is_empty() {
        stats.captions_captured += 1;
        record.captions = captured;
    }
}
