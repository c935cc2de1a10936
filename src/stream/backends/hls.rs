//! HLS playlist parsing.
//!
//! Supports:
//! - Master playlists (variant ladder with bandwidth and resolution)
//! - Media playlists (VOD and live)
//! - `#EXT-X-KEY` encryption tags (method, key uri, explicit IV)

use std::collections::HashMap;
use std::str::FromStr;

/// Variant choice in a master playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantChoice {
    /// Highest bandwidth.
    #[default]
    Best,
    /// Lowest bandwidth.
    Worst,
    /// Closest match to the given height in pixels.
    Height(u32),
}

impl FromStr for VariantChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" | "" => Ok(VariantChoice::Best),
            "worst" => Ok(VariantChoice::Worst),
            other => other
                .trim_end_matches('p')
                .parse()
                .map(VariantChoice::Height)
                .map_err(|_| format!("invalid quality '{s}' (use best, worst or a height)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsVariant {
    pub bandwidth: u64,
    pub height: u32,
    pub codecs: Option<String>,
    pub uri: String,
}

/// Encryption applied to the segments that follow an `#EXT-X-KEY` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentKey {
    pub method: String,
    pub uri: String,
    pub iv: Option<[u8; 16]>,
}

impl SegmentKey {
    /// Explicit IV, else the media sequence number as a big-endian 128-bit value.
    pub fn iv_for(&self, sequence: u64) -> [u8; 16] {
        self.iv.unwrap_or_else(|| {
            let mut iv = [0u8; 16];
            iv[8..].copy_from_slice(&sequence.to_be_bytes());
            iv
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HlsSegment {
    pub sequence: u64,
    pub duration: f64,
    pub uri: String,
    pub key: Option<SegmentKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HlsPlaylist {
    pub segments: Vec<HlsSegment>,
    pub is_live: bool,
    pub target_duration: f64,
}

impl HlsPlaylist {
    pub fn is_encrypted(&self) -> bool {
        self.segments.iter().any(|s| s.key.is_some())
    }
}

pub fn is_master(content: &str) -> bool {
    content.contains("#EXT-X-STREAM-INF:")
}

/// Variants sorted by bandwidth, highest first.
pub fn parse_master_playlist(content: &str, playlist_url: &str) -> Vec<HlsVariant> {
    let mut variants = Vec::new();
    let mut lines = content.lines().map(str::trim);

    while let Some(line) = lines.next() {
        let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
            continue;
        };
        let attrs = parse_attributes(rest);
        let bandwidth = attrs
            .get("BANDWIDTH")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let height = attrs
            .get("RESOLUTION")
            .and_then(|r| r.split('x').nth(1))
            .and_then(|h| h.parse().ok())
            .unwrap_or(0);

        if let Some(uri_line) = lines.next() {
            if !uri_line.starts_with('#') && !uri_line.is_empty() {
                variants.push(HlsVariant {
                    bandwidth,
                    height,
                    codecs: attrs.get("CODECS").cloned(),
                    uri: resolve_url(playlist_url, uri_line),
                });
            }
        }
    }

    variants.sort_by(|a, b| b.bandwidth.cmp(&a.bandwidth));
    variants
}

/// Used when `#EXT-X-TARGETDURATION` is missing or not a positive number.
pub const DEFAULT_TARGET_DURATION: f64 = 10.0;

pub fn parse_media_playlist(content: &str, playlist_url: &str) -> HlsPlaylist {
    let mut segments = Vec::new();
    let mut is_live = true;
    let mut media_sequence = 0u64;
    let mut target_duration = DEFAULT_TARGET_DURATION;
    let mut current_duration = 0.0f64;
    let mut current_key: Option<SegmentKey> = None;

    for line in content.lines().map(str::trim) {
        if line.starts_with("#EXT-X-ENDLIST") {
            is_live = false;
        } else if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            media_sequence = rest.parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            target_duration = rest
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(DEFAULT_TARGET_DURATION);
        } else if let Some(rest) = line.strip_prefix("#EXT-X-KEY:") {
            current_key = parse_key(rest, playlist_url);
        } else if let Some(rest) = line.strip_prefix("#EXTINF:") {
            current_duration = rest
                .split(',')
                .next()
                .and_then(|d| d.parse().ok())
                .unwrap_or(target_duration);
        } else if !line.starts_with('#') && !line.is_empty() {
            segments.push(HlsSegment {
                sequence: media_sequence + segments.len() as u64,
                duration: current_duration,
                uri: resolve_url(playlist_url, line),
                key: current_key.clone(),
            });
        }
    }

    HlsPlaylist {
        segments,
        is_live,
        target_duration,
    }
}

pub fn select_variant(variants: &[HlsVariant], choice: VariantChoice) -> Option<&HlsVariant> {
    match choice {
        VariantChoice::Best => variants.first(),
        VariantChoice::Worst => variants.last(),
        VariantChoice::Height(height) => variants
            .iter()
            .min_by_key(|v| (i64::from(v.height) - i64::from(height)).abs()),
    }
}

fn parse_key(attrs: &str, playlist_url: &str) -> Option<SegmentKey> {
    let attrs = parse_attributes(attrs);
    let method = attrs.get("METHOD")?.clone();
    if method.eq_ignore_ascii_case("NONE") {
        return None;
    }
    Some(SegmentKey {
        method,
        uri: resolve_url(playlist_url, attrs.get("URI")?),
        iv: attrs.get("IV").and_then(|iv| parse_iv(iv)),
    })
}

fn parse_iv(value: &str) -> Option<[u8; 16]> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if hex.len() != 32 {
        return None;
    }
    let mut iv = [0u8; 16];
    for (i, byte) in iv.iter_mut().enumerate() {
        *byte = u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok()?;
    }
    Some(iv)
}

fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();
        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let v: String = chars.by_ref().take_while(|&c| c != '"').collect();
            // trailing comma
            chars.next();
            v
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key.trim().to_string(), value.trim().to_string());
    }

    attrs
}

/// Resolve a playlist entry against the playlist's own url.
pub fn resolve_url(playlist_url: &str, relative: &str) -> String {
    url::Url::parse(playlist_url)
        .and_then(|base| base.join(relative))
        .map_or_else(|_| relative.to_string(), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080,CODECS=\"avc1.640028,mp4a.40.2\"
1080/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720
https://other.cdn/720/index.m3u8
";

    #[test]
    fn resolve_relative_and_absolute() {
        assert_eq!(
            resolve_url("https://example.com/path/master.m3u8", "video.ts"),
            "https://example.com/path/video.ts"
        );
        assert_eq!(
            resolve_url("https://example.com/path/master.m3u8", "/video.ts"),
            "https://example.com/video.ts"
        );
        assert_eq!(
            resolve_url("https://example.com/path/master.m3u8", "https://cdn.example.com/video.ts"),
            "https://cdn.example.com/video.ts"
        );
    }

    #[test]
    fn attributes_with_quoted_values() {
        let attrs = parse_attributes("BANDWIDTH=1280000,RESOLUTION=720x480");
        assert_eq!(attrs.get("BANDWIDTH"), Some(&"1280000".to_string()));
        assert_eq!(attrs.get("RESOLUTION"), Some(&"720x480".to_string()));

        let attrs = parse_attributes("CODECS=\"avc1.4d401f,mp4a.40.2\",BANDWIDTH=2000000");
        assert_eq!(attrs.get("CODECS"), Some(&"avc1.4d401f,mp4a.40.2".to_string()));
        assert_eq!(attrs.get("BANDWIDTH"), Some(&"2000000".to_string()));
    }

    #[test]
    fn master_variants_sorted_and_selected() {
        let variants = parse_master_playlist(MASTER, "https://cdn/v/master.m3u8");
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].height, 1080);
        assert_eq!(variants[0].uri, "https://cdn/v/1080/index.m3u8");
        assert_eq!(variants[1].uri, "https://other.cdn/720/index.m3u8");

        assert_eq!(select_variant(&variants, VariantChoice::Best).unwrap().height, 1080);
        assert_eq!(select_variant(&variants, VariantChoice::Worst).unwrap().height, 360);
        assert_eq!(select_variant(&variants, VariantChoice::Height(700)).unwrap().height, 720);
        assert!(select_variant(&[], VariantChoice::Best).is_none());
    }

    #[test]
    fn media_playlist_with_keys() {
        let content = "#EXTM3U
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:10
#EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example/key/tok1\",IV=0x000102030405060708090a0b0c0d0e0f
#EXTINF:6.0,
seg10.ts
#EXT-X-KEY:METHOD=NONE
#EXTINF:5.5,
seg11.ts
#EXT-X-ENDLIST
";
        let playlist = parse_media_playlist(content, "https://cdn/v/720/index.m3u8");
        assert!(!playlist.is_live);
        assert!(playlist.is_encrypted());
        assert!((playlist.target_duration - 6.0).abs() < f64::EPSILON);
        assert_eq!(playlist.segments.len(), 2);

        let first = &playlist.segments[0];
        assert_eq!(first.sequence, 10);
        assert_eq!(first.uri, "https://cdn/v/720/seg10.ts");
        let key = first.key.as_ref().unwrap();
        assert_eq!(key.uri, "https://keys.example/key/tok1");
        assert_eq!(key.iv_for(10)[15], 0x0f);

        assert!(playlist.segments[1].key.is_none());
        assert!((playlist.segments[1].duration - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn bogus_target_duration_falls_back() {
        for value in ["-4", "NaN", "inf", "0", "soon"] {
            let content = format!("#EXTM3U\n#EXT-X-TARGETDURATION:{value}\n#EXTINF:4,\na.ts\n");
            let playlist = parse_media_playlist(&content, "https://cdn/live/index.m3u8");
            assert!(
                (playlist.target_duration - DEFAULT_TARGET_DURATION).abs() < f64::EPSILON,
                "{value}"
            );
            assert!(playlist.is_live);
        }
    }

    #[test]
    fn implicit_iv_from_sequence() {
        let key = SegmentKey {
            method: "AES-128".into(),
            uri: "k".into(),
            iv: None,
        };
        let iv = key.iv_for(0x0102);
        assert_eq!(&iv[..14], &[0u8; 14]);
        assert_eq!(&iv[14..], &[0x01, 0x02]);
    }

    #[test]
    fn live_playlist_without_endlist() {
        let playlist = parse_media_playlist("#EXTINF:2,\na.ts\n", "https://cdn/live.m3u8");
        assert!(playlist.is_live);
        assert_eq!(playlist.segments[0].sequence, 0);
    }

    #[test]
    fn variant_choice_parsing() {
        assert_eq!("best".parse::<VariantChoice>(), Ok(VariantChoice::Best));
        assert_eq!("Worst".parse::<VariantChoice>(), Ok(VariantChoice::Worst));
        assert_eq!("720p".parse::<VariantChoice>(), Ok(VariantChoice::Height(720)));
        assert!("ultra".parse::<VariantChoice>().is_err());
    }
}
