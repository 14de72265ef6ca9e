pub mod error;
pub mod types;

pub use error::{FeedError, Result};
pub use types::{EmbedData, FeedItem, ItemListResponse, SubtitleInfo};

use rand::Rng;
use tracing::{debug, info};

const BASE_URL: &str = "https://www.tiktok.com";

/// Browser user agent sent on every request. The web API rejects requests
/// without one.
const USER_AGENT: &str = "Mozilla/5.0";

/// A profile reference resolved from user input (handle, @handle, or URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRef {
    pub username: String,
    pub url: String,
}

/// Normalize a profile argument into a username + canonical profile URL.
/// Accepts `@name`, a full profile URL, or a bare username.
pub fn normalize_profile(input: &str) -> ProfileRef {
    let profile_re = regex::Regex::new(r"tiktok\.com/@([A-Za-z0-9_.-]+)").expect("valid regex");
    let input = input.trim();

    if let Some(username) = input.strip_prefix('@') {
        return ProfileRef {
            username: username.to_string(),
            url: format!("{BASE_URL}/@{username}"),
        };
    }

    if input.contains("tiktok.com") {
        if let Some(cap) = profile_re.captures(input) {
            let username = cap[1].to_string();
            let url = format!("{BASE_URL}/@{username}");
            return ProfileRef { username, url };
        }
        // URL that doesn't match the profile pattern: keep it as-is
        return ProfileRef {
            username: "unknown".to_string(),
            url: input.to_string(),
        };
    }

    ProfileRef {
        username: input.to_string(),
        url: format!("{BASE_URL}/@{input}"),
    }
}

pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Resolve the opaque account id (secUid) by scraping the profile page.
    pub async fn resolve_sec_uid(&self, profile_url: &str) -> Result<String> {
        info!(profile_url, "Resolving account id from profile page");

        let html = self.get_text(profile_url).await?;

        let sec_uid_re = regex::Regex::new(r#""secUid"\s*:\s*"(.*?)""#).expect("valid regex");
        sec_uid_re
            .captures(&html)
            .map(|cap| cap[1].to_string())
            .ok_or_else(|| FeedError::ProfileNotResolved(profile_url.to_string()))
    }

    /// Fetch one page of the creator feed at the given cursor.
    /// Returns an empty vec when the feed reports no items for this window.
    pub async fn fetch_item_page(
        &self,
        sec_uid: &str,
        cursor_ms: i64,
        count: u32,
    ) -> Result<Vec<FeedItem>> {
        let url = format!("{BASE_URL}/api/creator/item_list/");
        let device_id = random_device_id();
        let verify_fp = random_verify_fp();
        let count = count.to_string();
        let cursor = cursor_ms.to_string();

        // The endpoint refuses requests that don't look like a full web client,
        // so the whole browser parameter set rides along.
        let params: Vec<(&str, &str)> = vec![
            ("aid", "1988"),
            ("app_language", "en"),
            ("app_name", "tiktok_web"),
            ("browser_language", "en-US"),
            ("browser_name", "Mozilla"),
            ("browser_online", "true"),
            ("browser_platform", "Win32"),
            ("browser_version", "5.0 (Windows)"),
            ("channel", "tiktok_web"),
            ("cookie_enabled", "true"),
            ("count", &count),
            ("cursor", &cursor),
            ("device_id", &device_id),
            ("device_platform", "web_pc"),
            ("focus_state", "true"),
            ("from_page", "user"),
            ("history_len", "2"),
            ("is_fullscreen", "false"),
            ("is_page_visible", "true"),
            ("language", "en"),
            ("os", "windows"),
            ("priority_region", ""),
            ("referer", ""),
            ("region", "US"),
            ("screen_height", "1080"),
            ("screen_width", "1920"),
            ("secUid", sec_uid),
            ("type", "1"),
            ("tz_name", "UTC"),
            ("verifyFp", &verify_fp),
            ("webcast_language", "en"),
        ];

        debug!(cursor_ms, count = %count, "Fetching feed page");

        let resp = self.client.get(&url).query(&params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw = resp.text().await?;
        let envelope: ItemListResponse = serde_json::from_str(&raw)?;
        Ok(envelope.item_list.unwrap_or_default())
    }

    /// Fetch a video's embed page and extract its state payload.
    /// Returns `None` when the page carries no state for this video.
    pub async fn fetch_embed(&self, video_id: &str) -> Result<Option<EmbedData>> {
        let embed_url = embed_url(video_id);
        debug!(video_id, "Fetching embed page");

        let html = self.get_text(&embed_url).await?;

        let frontity_re = regex::Regex::new(
            r#"<script id="__FRONTITY_CONNECT_STATE__" type="application/json">(.*?)</script>"#,
        )
        .expect("valid regex");

        let Some(cap) = frontity_re.captures(&html) else {
            return Ok(None);
        };

        let state: serde_json::Value = serde_json::from_str(&cap[1])?;
        let key = format!("/embed/v2/{video_id}");
        match state
            .get("source")
            .and_then(|s| s.get("data"))
            .and_then(|d| d.get(&key))
        {
            Some(payload) => Ok(Some(serde_json::from_value(payload.clone())?)),
            None => Ok(None),
        }
    }

    /// Download a caption track (VTT) as raw bytes.
    pub async fn fetch_caption(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.text().await?)
    }
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical embed page URL for a video. Doubles as the referer for media
/// downloads.
pub fn embed_url(video_id: &str) -> String {
    format!("{BASE_URL}/embed/v2/{video_id}")
}

/// Canonical watch URL for a video under a profile.
pub fn video_url(username: &str, video_id: &str) -> String {
    format!("{BASE_URL}/@{username}/video/{video_id}")
}

fn random_device_id() -> String {
    rand::rng()
        .random_range(7_250_000_000_000_000_000_i64..7_351_147_085_025_500_000)
        .to_string()
}

fn random_verify_fp() -> String {
    let mut rng = rand::rng();
    let hex: String = (0..7)
        .map(|_| {
            let digits = b"0123456789abcdef";
            digits[rng.random_range(0..digits.len())] as char
        })
        .collect();
    format!("verify_{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_at_prefix() {
        let p = normalize_profile("@somecreator");
        assert_eq!(p.username, "somecreator");
        assert_eq!(p.url, "https://www.tiktok.com/@somecreator");
    }

    #[test]
    fn normalize_handles_full_url() {
        let p = normalize_profile("https://www.tiktok.com/@some.creator_1?lang=en");
        assert_eq!(p.username, "some.creator_1");
        assert_eq!(p.url, "https://www.tiktok.com/@some.creator_1");
    }

    #[test]
    fn normalize_handles_bare_username() {
        let p = normalize_profile("somecreator");
        assert_eq!(p.username, "somecreator");
        assert_eq!(p.url, "https://www.tiktok.com/@somecreator");
    }

    #[test]
    fn normalize_keeps_unmatched_urls() {
        let p = normalize_profile("https://www.tiktok.com/discover/x");
        assert_eq!(p.username, "unknown");
        assert_eq!(p.url, "https://www.tiktok.com/discover/x");
    }

    #[test]
    fn verify_fp_shape() {
        let fp = random_verify_fp();
        assert!(fp.starts_with("verify_"));
        assert_eq!(fp.len(), "verify_".len() + 7);
    }
}
