//! Audio capture via ffmpeg.
//!
//! The embed CDN serves media only with the browser user agent and the embed
//! page as referer, so both ride along as raw headers.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Must match the user agent the feed client browses with.
const MEDIA_USER_AGENT: &str = "Mozilla/5.0";

/// Hard cap per extraction; source videos are short-form.
const FFMPEG_TIMEOUT: Duration = Duration::from_secs(120);

/// Extract the audio track of a remote video into an mp3 file.
/// The ffmpeg binary is overridable via `FFMPEG_BIN`.
pub async fn extract_audio(video_url: &str, referer: &str, out_mp3: &Path) -> Result<()> {
    if let Some(parent) = out_mp3.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let ffmpeg_bin = std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string());
    let headers = format!("User-Agent: {MEDIA_USER_AGENT}\r\nReferer: {referer}\r\n");

    let result = tokio::time::timeout(
        FFMPEG_TIMEOUT,
        tokio::process::Command::new(&ffmpeg_bin)
            .args([
                "-y",
                "-headers",
                &headers,
                "-i",
                video_url,
                "-vn",
                "-af",
                "aformat=sample_fmts=s16p",
                "-acodec",
                "libmp3lame",
                "-q:a",
                "2",
            ])
            .arg(out_mp3)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            info!(path = %out_mp3.display(), "Audio extracted");
            Ok(())
        }
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(video_url, stderr = %stderr, "ffmpeg exited with error");
            anyhow::bail!("ffmpeg failed for {video_url}: {}", last_line(&stderr))
        }
        Ok(Err(e)) => anyhow::bail!("Failed to run ffmpeg for {video_url}: {e}"),
        Err(_) => anyhow::bail!(
            "ffmpeg timed out after {}s for {video_url}",
            FFMPEG_TIMEOUT.as_secs()
        ),
    }
}

fn last_line(stderr: &str) -> &str {
    stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}
