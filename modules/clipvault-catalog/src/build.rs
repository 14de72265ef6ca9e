//! Dataset build: dedupe the crawled store, transcribe captured audio, and
//! write the unified dataset plus per-item files.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use ai_client::TranscribeAgent;
use clipvault_common::{
    types::sort_records_desc, ClipVaultError, DatasetCounts, ProfileStore, Transcript,
    UnifiedDataset,
};

use crate::reconcile::dedupe;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Reuse persisted transcripts instead of re-transcribing.
    pub skip_existing: bool,
    /// Transcription cap per run; 0 = unbounded.
    pub max: usize,
    /// Cooperative pacing between transcription requests.
    pub sleep: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            skip_existing: false,
            max: 0,
            sleep: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildStats {
    pub records: usize,
    pub transcribed: usize,
    pub reused: usize,
    pub failures: usize,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} transcribed={} reused={} failures={}",
            self.records, self.transcribed, self.reused, self.failures
        )
    }
}

/// Build the unified dataset from the crawled store. Pass a transcriber to
/// fill missing transcripts; with `None`, existing transcripts are attached
/// but no new ones are produced.
pub async fn run_build(
    store: &ProfileStore,
    transcriber: Option<&dyn TranscribeAgent>,
    opts: &BuildOptions,
) -> Result<BuildStats, ClipVaultError> {
    let index = store
        .load_index()?
        .ok_or_else(|| ClipVaultError::DatasetMissing(store.index_path()))?;

    let mut records = dedupe(index.records);
    sort_records_desc(&mut records);

    let mut stats = BuildStats {
        records: records.len(),
        ..BuildStats::default()
    };

    for record in &mut records {
        let Some(audio_rel) = record.audio_path.clone() else {
            continue;
        };
        let audio_path = store.profile_dir().join(&audio_rel);
        if !audio_path.exists() {
            record.error = Some("audio_missing".to_string());
            continue;
        }

        if let Some(transcript) = store.load_transcript(&record.id)? {
            if opts.skip_existing {
                record.transcript = Some(transcript);
                stats.reused += 1;
                continue;
            }
        }

        let Some(transcriber) = transcriber else {
            continue;
        };

        if opts.max > 0 && stats.transcribed >= opts.max {
            break;
        }

        info!(id = %record.id, "Transcribing audio");

        let result = async {
            let audio = std::fs::read(&audio_path).map_err(|e| {
                ClipVaultError::Store(format!("{}: {e}", audio_path.display()))
            })?;
            let text = transcriber
                .transcribe(audio, &format!("{}.mp3", record.id))
                .await
                .map_err(|e| ClipVaultError::Transcription(e.to_string()))?;
            Ok::<_, ClipVaultError>(Transcript {
                text,
                model: transcriber.transcription_model().to_string(),
                provider: transcriber.transcription_provider().to_string(),
                created_at: Utc::now(),
            })
        }
        .await;

        match result {
            Ok(transcript) => {
                store.save_transcript(&record.id, &transcript)?;
                record.transcript = Some(transcript);
                record.transcript_error = None;
                stats.transcribed += 1;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "Transcription failed");
                record.transcript_error = Some(e.to_string());
                stats.failures += 1;
            }
        }

        if !opts.sleep.is_zero() {
            tokio::time::sleep(opts.sleep).await;
        }
    }

    for record in &records {
        store.save_item(record)?;
    }

    let unified = UnifiedDataset {
        profile: index.profile,
        username: index.username,
        generated_at: Utc::now(),
        counts: DatasetCounts::tally(&records),
        records,
    };
    store.save_unified(&unified)?;

    info!(%stats, "Dataset build complete");
    Ok(stats)
}
