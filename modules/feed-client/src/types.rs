use serde::Deserialize;

/// Response envelope for the creator item_list endpoint.
///
/// `has_more` is advisory at best; the feed routinely returns empty pages in
/// the middle of a catalog, so the walker treats emptiness heuristically
/// instead of trusting this flag.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemListResponse {
    #[serde(rename = "itemList")]
    pub item_list: Option<Vec<FeedItem>>,
    #[serde(rename = "hasMore")]
    pub has_more: Option<bool>,
    pub cursor: Option<String>,
}

/// A single feed item as returned by the item_list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
    pub id: Option<String>,
    pub desc: Option<String>,
    /// Creation time in seconds since epoch.
    #[serde(rename = "createTime")]
    pub create_time: Option<i64>,
    pub stats: Option<FeedStats>,
    pub author: Option<FeedAuthor>,
    pub video: Option<FeedVideo>,
}

impl FeedItem {
    /// Creation time converted to the cursor's unit (milliseconds).
    pub fn create_time_ms(&self) -> Option<i64> {
        self.create_time.map(|t| t * 1000)
    }
}

/// Engagement counters on a feed item.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedStats {
    #[serde(rename = "playCount")]
    pub play_count: Option<i64>,
    #[serde(rename = "diggCount")]
    pub digg_count: Option<i64>,
    #[serde(rename = "commentCount")]
    pub comment_count: Option<i64>,
    #[serde(rename = "shareCount")]
    pub share_count: Option<i64>,
}

/// Author info nested in a feed item.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedAuthor {
    pub id: Option<String>,
    #[serde(rename = "uniqueId")]
    pub unique_id: Option<String>,
}

/// Video metadata nested in a feed item. Only the caption tracks are used.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedVideo {
    #[serde(rename = "subtitleInfos")]
    pub subtitle_infos: Option<Vec<SubtitleInfo>>,
}

/// One caption track advertised by the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleInfo {
    #[serde(rename = "LanguageCodeName")]
    pub language_code_name: Option<String>,
    #[serde(rename = "LanguageID")]
    pub language_id: Option<String>,
    #[serde(rename = "Url")]
    pub url: Option<String>,
}

impl SubtitleInfo {
    /// Language key for this track, falling back to the numeric id.
    pub fn lang(&self) -> Option<&str> {
        self.language_code_name
            .as_deref()
            .or(self.language_id.as_deref())
    }
}

// --- Embed page state ---

/// Per-video payload extracted from the embed page's state JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedData {
    #[serde(rename = "videoData")]
    pub video_data: Option<VideoData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoData {
    #[serde(rename = "itemInfos")]
    pub item_infos: Option<ItemInfos>,
    #[serde(rename = "musicInfos")]
    pub music_infos: Option<MusicInfos>,
    #[serde(rename = "authorInfos")]
    pub author_infos: Option<AuthorInfos>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemInfos {
    pub text: Option<String>,
    pub video: Option<VideoInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub urls: Option<Vec<String>>,
    #[serde(rename = "videoMeta")]
    pub video_meta: Option<VideoMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoMeta {
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MusicInfos {
    #[serde(rename = "playUrl")]
    pub play_url: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorInfos {
    #[serde(rename = "uniqueId")]
    pub unique_id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl EmbedData {
    /// First playable video URL, if the embed page exposed any.
    pub fn video_url(&self) -> Option<&str> {
        self.video_data
            .as_ref()?
            .item_infos
            .as_ref()?
            .video
            .as_ref()?
            .urls
            .as_ref()?
            .first()
            .map(String::as_str)
    }

    /// Music-only play URL. Fallback audio source for slideshow posts.
    pub fn music_url(&self) -> Option<&str> {
        self.video_data
            .as_ref()?
            .music_infos
            .as_ref()?
            .play_url
            .as_ref()?
            .first()
            .map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.video_data
            .as_ref()?
            .item_infos
            .as_ref()?
            .text
            .as_deref()
    }

    pub fn duration(&self) -> Option<i64> {
        self.video_data
            .as_ref()?
            .item_infos
            .as_ref()?
            .video
            .as_ref()?
            .video_meta
            .as_ref()?
            .duration
    }

    pub fn author_unique_id(&self) -> Option<&str> {
        self.video_data
            .as_ref()?
            .author_infos
            .as_ref()?
            .unique_id
            .as_deref()
    }

    pub fn author_user_id(&self) -> Option<&str> {
        self.video_data
            .as_ref()?
            .author_infos
            .as_ref()?
            .user_id
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_list_deserializes_wire_names() {
        let raw = r#"{
            "itemList": [{
                "id": "7301",
                "desc": "a video",
                "createTime": 1700000000,
                "stats": {"playCount": 10, "diggCount": 2, "commentCount": 1, "shareCount": 0},
                "author": {"id": "u1", "uniqueId": "creator"},
                "video": {"subtitleInfos": [{"LanguageCodeName": "eng-US", "Url": "https://c/x.vtt"}]}
            }],
            "hasMore": true,
            "cursor": "1699000000000"
        }"#;

        let resp: ItemListResponse = serde_json::from_str(raw).unwrap();
        let items = resp.item_list.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_deref(), Some("7301"));
        assert_eq!(items[0].create_time_ms(), Some(1_700_000_000_000));
        assert_eq!(
            items[0].stats.as_ref().unwrap().play_count,
            Some(10)
        );
        let subs = items[0].video.as_ref().unwrap().subtitle_infos.as_ref().unwrap();
        assert_eq!(subs[0].lang(), Some("eng-US"));
    }

    #[test]
    fn embed_data_accessors_tolerate_missing_branches() {
        let empty: EmbedData = serde_json::from_str("{}").unwrap();
        assert!(empty.video_url().is_none());
        assert!(empty.music_url().is_none());
        assert!(empty.title().is_none());

        let raw = r#"{
            "videoData": {
                "itemInfos": {
                    "text": "hello",
                    "video": {"urls": ["https://v/1.mp4"], "videoMeta": {"duration": 31}}
                },
                "musicInfos": {"playUrl": ["https://m/1.mp3"]},
                "authorInfos": {"uniqueId": "creator", "userId": "u1"}
            }
        }"#;
        let data: EmbedData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.video_url(), Some("https://v/1.mp4"));
        assert_eq!(data.music_url(), Some("https://m/1.mp3"));
        assert_eq!(data.title(), Some("hello"));
        assert_eq!(data.duration(), Some(31));
        assert_eq!(data.author_unique_id(), Some("creator"));
    }
}
