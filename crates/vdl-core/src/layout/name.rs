//! Names and extensions derived from source URLs.

use percent_encoding::percent_decode_str;

/// Extensions recognised as finished video artifacts.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "ts", "mkv", "webm", "mov", "flv", "avi", "m4v", "mp3", "m4a",
];

/// Extension for direct downloads whose URL carries no known video extension.
pub const DIRECT_FALLBACK_EXTENSION: &str = "mp4";

fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()?
        .to_string();
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment)
}

/// Known video extension of the URL path (lowercase), ignoring query strings.
pub fn extension_from_url(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Display-name hint from the URL: last path segment without its extension.
pub fn name_from_url(url: &str) -> Option<String> {
    let segment = last_path_segment(url)?;
    let decoded = percent_decode_str(&segment).decode_utf8_lossy().into_owned();
    let stem = match decoded.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => decoded,
    };
    let clean = super::sanitize_display_name(&stem);
    (!clean.is_empty()).then_some(clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_only_for_known_video_types() {
        assert_eq!(
            extension_from_url("https://cdn.example.com/a/clip.MP4?token=1").as_deref(),
            Some("mp4")
        );
        assert_eq!(extension_from_url("https://x/video.m3u8"), None);
        assert_eq!(extension_from_url("https://x/download"), None);
        assert_eq!(extension_from_url("https://x/"), None);
    }

    #[test]
    fn name_hint_strips_extension_and_decodes() {
        assert_eq!(
            name_from_url("https://x/shows/My%20Show%20E01.mp4").as_deref(),
            Some("My Show E01")
        );
        assert_eq!(name_from_url("https://x/index.m3u8").as_deref(), Some("index"));
        assert_eq!(name_from_url("https://x/"), None);
    }

    #[test]
    fn name_hint_keeps_query_like_characters() {
        assert_eq!(name_from_url("https://x/a&b.mp4").as_deref(), Some("a&b"));
        assert_eq!(name_from_url("https://x/k=v%26w.ts").as_deref(), Some("k=v&w"));
        assert_eq!(name_from_url("https://x/a+b.mp4").as_deref(), Some("a+b"));
    }
}
