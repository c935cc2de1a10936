//! Normalized playable source descriptors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static QUALITY_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{3,4})p").expect("valid quality regex"));

// Height hints embedded in CDN urls: "/1080p/", "_720.mp4", "-480p.m3u8", "/360/".
static URL_HEIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[/_\-.=])(\d{3,4})p?(?:[/_\-.?&]|$)").expect("valid url height regex")
});

/// Container family of a source, driving renderer and selector decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerType {
    /// Plain progressive file (`video/mp4`).
    Progressive,
    /// HLS playlist (`application/x-mpegURL`).
    Playlist,
    /// DASH manifest (`application/dash+xml`).
    Manifest,
    /// Any other explicit MIME type.
    Other(String),
}

impl ContainerType {
    /// Classify an explicit MIME type.
    pub fn from_mime(mime: &str) -> Self {
        let lower = mime.trim().to_ascii_lowercase();
        match lower.as_str() {
            "video/mp4" | "video/webm" | "video/quicktime" | "mp4" => ContainerType::Progressive,
            "application/x-mpegurl" | "application/vnd.apple.mpegurl" | "audio/mpegurl" | "hls" => {
                ContainerType::Playlist
            }
            "application/dash+xml" | "dash" => ContainerType::Manifest,
            _ => ContainerType::Other(mime.trim().to_string()),
        }
    }

    /// Infer the container from a url extension.
    pub fn infer_from_url(url: &str) -> Self {
        if url.contains(".m3u8") {
            ContainerType::Playlist
        } else if url.contains(".mpd") {
            ContainerType::Manifest
        } else {
            ContainerType::Progressive
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            ContainerType::Progressive => "video/mp4",
            ContainerType::Playlist => "application/x-mpegURL",
            ContainerType::Manifest => "application/dash+xml",
            ContainerType::Other(mime) => mime,
        }
    }

    pub fn is_progressive(&self) -> bool {
        matches!(self, ContainerType::Progressive)
    }
}

/// One playable stream. Uniquely identified by its url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub url: String,
    /// Provider label such as `"1080p"` or `"Auto"`.
    pub quality: Option<String>,
    pub container: ContainerType,
    /// Vertical resolution hint from the delivery payload.
    pub height: Option<u32>,
}

impl SourceDescriptor {
    /// Build a descriptor, inferring the container from the url when no MIME
    /// type is given. Returns `None` for an empty url.
    pub fn new(url: &str, quality: Option<&str>, mime: Option<&str>) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        let container = match mime.map(str::trim).filter(|m| !m.is_empty()) {
            Some(mime) => ContainerType::from_mime(mime),
            None => ContainerType::infer_from_url(url),
        };
        Some(Self {
            url: url.to_string(),
            quality: quality
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(ToString::to_string),
            container,
            height: None,
        })
    }

    #[must_use]
    pub fn with_height(mut self, height: Option<u32>) -> Self {
        self.height = height.filter(|h| *h > 0);
        self
    }

    /// Best-effort vertical resolution: explicit hint, then the quality
    /// label (`"720p"`), then the url.
    pub fn resolved_height(&self) -> Option<u32> {
        self.height
            .or_else(|| self.quality.as_deref().and_then(parse_label_height))
            .or_else(|| parse_url_height(&self.url))
    }

    /// Label shown to the user.
    pub fn label(&self) -> String {
        match (&self.quality, self.resolved_height()) {
            (Some(q), _) => q.clone(),
            (None, Some(h)) => format!("{h}p"),
            (None, None) => self.container.mime().to_string(),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.quality
            .as_deref()
            .is_some_and(|q| q.to_ascii_lowercase().contains("auto"))
    }
}

fn parse_label_height(label: &str) -> Option<u32> {
    QUALITY_LABEL
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|h| *h > 0)
}

fn parse_url_height(url: &str) -> Option<u32> {
    // Query strings carry tokens and signatures, never resolution hints.
    let path = url.split('?').next().unwrap_or(url);
    URL_HEIGHT
        .captures_iter(path)
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .filter(|h| (144..=4320).contains(h))
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_inferred_from_extension() {
        assert_eq!(
            ContainerType::infer_from_url("https://cdn/x/master.m3u8?token=1"),
            ContainerType::Playlist
        );
        assert_eq!(
            ContainerType::infer_from_url("https://cdn/x/stream.mpd"),
            ContainerType::Manifest
        );
        assert_eq!(
            ContainerType::infer_from_url("https://cdn/x/a.mp4"),
            ContainerType::Progressive
        );
        assert_eq!(ContainerType::infer_from_url("a"), ContainerType::Progressive);
    }

    #[test]
    fn explicit_mime_wins() {
        let src = SourceDescriptor::new("https://cdn/a.mp4", None, Some("application/x-mpegURL")).unwrap();
        assert_eq!(src.container, ContainerType::Playlist);
        let other = SourceDescriptor::new("https://cdn/a", None, Some("video/x-matroska")).unwrap();
        assert_eq!(other.container, ContainerType::Other("video/x-matroska".into()));
    }

    #[test]
    fn empty_url_rejected() {
        assert!(SourceDescriptor::new("", Some("720p"), None).is_none());
        assert!(SourceDescriptor::new("   ", None, None).is_none());
    }

    #[test]
    fn height_resolution_order() {
        let explicit = SourceDescriptor::new("https://cdn/v_480.mp4", Some("720p"), None)
            .unwrap()
            .with_height(Some(1080));
        assert_eq!(explicit.resolved_height(), Some(1080));

        let label = SourceDescriptor::new("https://cdn/v_480.mp4", Some("720p"), None).unwrap();
        assert_eq!(label.resolved_height(), Some(720));

        let url = SourceDescriptor::new("https://cdn/v_480.mp4", Some("Medium"), None).unwrap();
        assert_eq!(url.resolved_height(), Some(480));

        let none = SourceDescriptor::new("https://cdn/video.mp4?sig=12345", Some("Auto"), None).unwrap();
        assert_eq!(none.resolved_height(), None);
        assert!(none.is_auto());
    }

    #[test]
    fn url_height_variants() {
        assert_eq!(parse_url_height("https://cdn/1080p/chunk.m3u8"), Some(1080));
        assert_eq!(parse_url_height("https://cdn/abc/360/index.m3u8"), Some(360));
        assert_eq!(parse_url_height("https://cdn/abc/video-720p.mp4"), Some(720));
        assert_eq!(parse_url_height("https://cdn/abc/video.mp4"), None);
    }

    #[test]
    fn label_falls_back_to_height() {
        let src = SourceDescriptor::new("https://cdn/720/a.mp4", None, None).unwrap();
        assert_eq!(src.label(), "720p");
    }
}
