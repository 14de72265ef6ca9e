//! Record reconciliation.
//!
//! Records for the same id show up on overlapping pages within a run and
//! across independent runs. Merging never regresses a populated field to
//! empty, so expensive work from prior runs (captured audio, transcripts,
//! captions, summaries) survives a fresh crawl that saw less.

use std::collections::{HashMap, HashSet};

use tracing::info;

use clipvault_common::{Caption, VideoRecord};

/// Merge two versions of the same logical record. `primary` wins wherever it
/// is populated; `secondary` fills the gaps. Captions union by key instead of
/// whole-field replacement.
pub fn merge(primary: &VideoRecord, secondary: &VideoRecord) -> VideoRecord {
    VideoRecord {
        id: primary.id.clone(),
        url: pick_str(&primary.url, &secondary.url),
        title: pick_str(&primary.title, &secondary.title),
        description: pick_str(&primary.description, &secondary.description),
        uploader: pick_str(&primary.uploader, &secondary.uploader),
        uploader_id: pick_str(&primary.uploader_id, &secondary.uploader_id),
        timestamp: primary.timestamp.or(secondary.timestamp),
        duration: primary.duration.or(secondary.duration),
        view_count: primary.view_count.or(secondary.view_count),
        like_count: primary.like_count.or(secondary.like_count),
        comment_count: primary.comment_count.or(secondary.comment_count),
        repost_count: primary.repost_count.or(secondary.repost_count),
        source: pick_str(&primary.source, &secondary.source),
        extracted_at: primary.extracted_at.or(secondary.extracted_at),
        embed_url: pick_str(&primary.embed_url, &secondary.embed_url),
        embed_video_url: pick_str(&primary.embed_video_url, &secondary.embed_video_url),
        music_play_url: pick_str(&primary.music_play_url, &secondary.music_play_url),
        audio_path: pick_str(&primary.audio_path, &secondary.audio_path),
        audio_ext: pick_str(&primary.audio_ext, &secondary.audio_ext),
        captions: merge_captions(&primary.captions, &secondary.captions),
        transcript: primary
            .transcript
            .clone()
            .or_else(|| secondary.transcript.clone()),
        summary: pick_str(&primary.summary, &secondary.summary),
        topics: pick_vec(&primary.topics, &secondary.topics),
        keywords: pick_vec(&primary.keywords, &secondary.keywords),
        error: pick_str(&primary.error, &secondary.error),
        captions_error: pick_str(&primary.captions_error, &secondary.captions_error),
        transcript_error: pick_str(&primary.transcript_error, &secondary.transcript_error),
        summary_error: pick_str(&primary.summary_error, &secondary.summary_error),
    }
}

/// Collapse duplicate ids within one run. The first sighting is primary;
/// later duplicates merge into it. First-sighting order is preserved.
pub fn dedupe(records: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, VideoRecord> = HashMap::new();

    for rec in records {
        if rec.id.is_empty() {
            continue;
        }
        match by_id.get(&rec.id) {
            Some(existing) => {
                let merged = merge(existing, &rec);
                by_id.insert(rec.id.clone(), merged);
            }
            None => {
                order.push(rec.id.clone());
                by_id.insert(rec.id.clone(), rec);
            }
        }
    }

    order
        .into_iter()
        .map(|id| by_id.remove(&id).expect("id recorded on first sighting"))
        .collect()
}

/// Reconcile a fresh crawl against the previously persisted store. Fresh
/// records are primary and absorb prior data; records present only in the
/// prior store are retained unchanged.
pub fn reconcile(fresh: Vec<VideoRecord>, prior: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut prior_by_id: HashMap<String, VideoRecord> =
        prior.into_iter().map(|r| (r.id.clone(), r)).collect();

    let mut merged: Vec<VideoRecord> = Vec::with_capacity(fresh.len());
    for rec in fresh {
        match prior_by_id.remove(&rec.id) {
            Some(old) => merged.push(merge(&rec, &old)),
            None => merged.push(rec),
        }
    }

    let retained = prior_by_id.len();
    if retained > 0 {
        info!(retained, "Retaining records absent from this crawl");
    }
    // whatever the crawl didn't see survives as-is
    merged.extend(prior_by_id.into_values());
    merged
}

fn pick_str(primary: &Option<String>, secondary: &Option<String>) -> Option<String> {
    match primary.as_deref() {
        Some(s) if !s.is_empty() => primary.clone(),
        _ => secondary.clone().filter(|s| !s.is_empty()),
    }
}

fn pick_vec(primary: &[String], secondary: &[String]) -> Vec<String> {
    if primary.is_empty() {
        secondary.to_vec()
    } else {
        primary.to_vec()
    }
}

/// Union captions by key (language code, else source path). Primary entries
/// keep their order; secondary contributes only keys not already present.
fn merge_captions(primary: &[Caption], secondary: &[Caption]) -> Vec<Caption> {
    let mut out: Vec<Caption> = primary.to_vec();
    let mut keys: HashSet<String> = primary
        .iter()
        .filter_map(|c| c.key().map(str::to_string))
        .collect();

    for cap in secondary {
        let Some(key) = cap.key() else {
            continue;
        };
        if keys.insert(key.to_string()) {
            out.push(cap.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clipvault_common::Transcript;

    fn caption(lang: Option<&str>, path: Option<&str>, text: &str) -> Caption {
        Caption {
            path: path.map(str::to_string),
            ext: Some("vtt".to_string()),
            lang: lang.map(str::to_string),
            text: Some(text.to_string()),
        }
    }

    fn stored_record() -> VideoRecord {
        let mut rec = VideoRecord::new("1");
        rec.audio_path = Some("audio/1.mp3".to_string());
        rec.audio_ext = Some("mp3".to_string());
        rec.timestamp = Some(100);
        rec.transcript = Some(Transcript {
            text: "old transcript".to_string(),
            model: "gpt-4o-transcribe".to_string(),
            provider: "openai".to_string(),
            created_at: Utc::now(),
        });
        rec
    }

    #[test]
    fn merge_is_idempotent_and_self_merge_is_noop() {
        let rec = stored_record();
        assert_eq!(merge(&rec, &rec), rec);

        let mut other = VideoRecord::new("1");
        other.title = Some("New Title".to_string());
        let once = merge(&rec, &other);
        let twice = merge(&once, &other);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_never_regresses_populated_fields() {
        // stored {id:1, audio_path:"a.mp3"} vs fresh {id:1, audio_path:None,
        // title:"New Title"} keeps the audio and gains the title
        let stored = stored_record();
        let mut fresh = VideoRecord::new("1");
        fresh.title = Some("New Title".to_string());

        let merged = merge(&fresh, &stored);
        assert_eq!(merged.audio_path.as_deref(), Some("audio/1.mp3"));
        assert_eq!(merged.title.as_deref(), Some("New Title"));
        assert_eq!(merged.timestamp, Some(100));
        assert!(merged.transcript.is_some());
    }

    #[test]
    fn merge_prefers_primary_on_conflicts() {
        let mut a = VideoRecord::new("1");
        a.title = Some("primary title".to_string());
        let mut b = VideoRecord::new("1");
        b.title = Some("secondary title".to_string());

        assert_eq!(merge(&a, &b).title.as_deref(), Some("primary title"));
    }

    #[test]
    fn merge_is_commutative_on_non_conflicting_fields() {
        let mut a = VideoRecord::new("1");
        a.title = Some("a title".to_string());
        let mut b = VideoRecord::new("1");
        b.audio_path = Some("audio/1.mp3".to_string());

        let ab = merge(&a, &b);
        let ba = merge(&b, &a);
        assert_eq!(ab.title, ba.title);
        assert_eq!(ab.audio_path, ba.audio_path);
    }

    #[test]
    fn empty_string_does_not_overwrite() {
        let mut a = VideoRecord::new("1");
        a.title = Some(String::new());
        let mut b = VideoRecord::new("1");
        b.title = Some("real title".to_string());

        assert_eq!(merge(&a, &b).title.as_deref(), Some("real title"));
    }

    #[test]
    fn captions_union_by_key() {
        let mut a = VideoRecord::new("1");
        a.captions = vec![
            caption(Some("eng-US"), Some("audio/1.eng.vtt"), "english first"),
            caption(None, Some("audio/1.vtt"), "pathless lang"),
        ];
        let mut b = VideoRecord::new("1");
        b.captions = vec![
            caption(Some("eng-US"), Some("audio/1.eng2.vtt"), "english second"),
            caption(Some("deu-DE"), Some("audio/1.deu.vtt"), "german"),
        ];

        let merged = merge(&a, &b);
        let keys: Vec<&str> = merged.captions.iter().filter_map(|c| c.key()).collect();
        assert_eq!(keys, vec!["eng-US", "audio/1.vtt", "deu-DE"]);
        // overlapping key keeps the first side's value
        assert_eq!(
            merged.captions[0].text.as_deref(),
            Some("english first")
        );
    }

    #[test]
    fn dedupe_collapses_repeated_ids_in_first_seen_order() {
        let mut second_sighting = VideoRecord::new("a");
        second_sighting.title = Some("later title".to_string());

        let records = vec![
            VideoRecord::new("a"),
            VideoRecord::new("b"),
            second_sighting,
        ];
        let deduped = dedupe(records);

        let ids: Vec<&str> = deduped.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        // duplicate's data folded into the first sighting
        assert_eq!(deduped[0].title.as_deref(), Some("later title"));
    }

    #[test]
    fn reconcile_retains_prior_only_records() {
        let mut fresh = VideoRecord::new("1");
        fresh.title = Some("New Title".to_string());

        let prior_kept = stored_record();
        let mut prior_unseen = VideoRecord::new("2");
        prior_unseen.audio_path = Some("audio/2.mp3".to_string());

        let result = reconcile(vec![fresh], vec![prior_kept, prior_unseen]);

        assert_eq!(result.len(), 2);
        let one = result.iter().find(|r| r.id == "1").unwrap();
        assert_eq!(one.title.as_deref(), Some("New Title"));
        assert_eq!(one.audio_path.as_deref(), Some("audio/1.mp3"));
        let two = result.iter().find(|r| r.id == "2").unwrap();
        assert_eq!(two.audio_path.as_deref(), Some("audio/2.mp3"));
    }
}
