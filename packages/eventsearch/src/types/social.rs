//! Social media content records, the common shape every platform
//! adapter returns.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::EventRecord;

/// Supported social platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Twitter,
    Facebook,
    Instagram,
    Google,
}

impl Platform {
    /// Wire name of the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Google => "google",
        }
    }

    /// Detect the platform from a URL by host substring.
    pub fn detect(url: &str) -> Option<Platform> {
        let lower = url.to_lowercase();
        if lower.contains("youtube.com") || lower.contains("youtu.be") {
            Some(Platform::Youtube)
        } else if lower.contains("twitter.com") || lower.contains("x.com") {
            Some(Platform::Twitter)
        } else if lower.contains("facebook.com") || lower.contains("fb.com") {
            Some(Platform::Facebook)
        } else if lower.contains("instagram.com") {
            Some(Platform::Instagram)
        } else if lower.contains("google.com") {
            Some(Platform::Google)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who posted the content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

/// Kind of attached media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Gif,
}

/// One attached media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Seconds, for video
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Engagement counters; platforms report different subsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(default)]
    pub comments: Option<u64>,
    #[serde(default)]
    pub shares: Option<u64>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub retweets: Option<u64>,
    #[serde(default)]
    pub replies: Option<u64>,
}

/// Full content of one social post/tweet/video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialContent {
    pub platform: Platform,
    /// "post", "tweet", "video", ...
    pub content_type: String,
    pub url: String,
    /// Platform-native identifier
    pub platform_id: String,
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: SocialAuthor,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub engagement: Engagement,
    /// Opaque platform-specific extras
    #[serde(default)]
    pub platform_data: HashMap<String, serde_json::Value>,
    /// Analysis attached from the cache, when present
    #[serde(default)]
    pub extracted_event: Option<EventRecord>,
    /// True when this record was served from the cache
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub cache_expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        assert_eq!(
            Platform::detect("https://www.youtube.com/watch?v=abc"),
            Some(Platform::Youtube)
        );
        assert_eq!(
            Platform::detect("https://youtu.be/abc"),
            Some(Platform::Youtube)
        );
        assert_eq!(
            Platform::detect("https://x.com/user/status/1"),
            Some(Platform::Twitter)
        );
        assert_eq!(
            Platform::detect("https://www.facebook.com/page/posts/1"),
            Some(Platform::Facebook)
        );
        assert_eq!(
            Platform::detect("https://www.instagram.com/p/abc/"),
            Some(Platform::Instagram)
        );
        assert_eq!(Platform::detect("https://example.com/article"), None);
    }

    #[test]
    fn test_media_type_wire_form() {
        let item = MediaItem {
            media_type: MediaType::Video,
            url: "https://example.com/v.mp4".to_string(),
            thumbnail: None,
            width: Some(1280),
            height: Some(720),
            duration: Some(12.5),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "video");
    }
}
