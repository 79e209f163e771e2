//! Media playlist → ordered segment sources.

use std::collections::HashMap;

use m3u8_rs::{KeyMethod, MediaPlaylist};
use url::Url;

use super::PlanError;
use crate::transfer::ByteSpan;

/// One fetchable piece of a media playlist, in merge order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSource {
    pub url: String,
    pub byte_range: Option<ByteSpan>,
}

/// Segments of a media playlist plus whether an init section leads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSources {
    pub segments: Vec<SegmentSource>,
    /// `EXT-X-MAP` present: segment 0 is the fMP4 init section.
    pub has_init_section: bool,
}

/// Resolve a possibly relative playlist URI against the playlist's own URL.
pub fn resolve_uri(base: &Url, uri: &str) -> Result<String, PlanError> {
    base.join(uri.trim())
        .map(|u| u.to_string())
        .map_err(|e| PlanError::InvalidUrl(format!("{} (relative to {}): {}", uri, base, e)))
}

/// Tracks where the next implicit byte range starts for each resource.
#[derive(Default)]
struct RangeCursor {
    next_offset: HashMap<String, u64>,
}

impl RangeCursor {
    fn span(&mut self, url: &str, length: u64, offset: Option<u64>) -> Result<ByteSpan, PlanError> {
        let offset = offset.unwrap_or_else(|| self.next_offset.get(url).copied().unwrap_or(0));
        let span = ByteSpan { offset, length };
        let end = span.end().ok_or_else(|| {
            PlanError::Unparsable(format!("byte range {}@{} overflows", length, offset))
        })?;
        self.next_offset.insert(url.to_string(), end);
        Ok(span)
    }
}

/// Ordered segment sources of `playlist`, resolved against `base`.
///
/// Rejects encrypted playlists and playlists without segments.
pub fn media_segments(playlist: &MediaPlaylist, base: &Url) -> Result<MediaSources, PlanError> {
    if playlist.segments.is_empty() {
        return Err(PlanError::Empty);
    }

    let mut cursor = RangeCursor::default();
    let mut segments = Vec::with_capacity(playlist.segments.len() + 1);
    let mut has_init_section = false;

    for seg in &playlist.segments {
        if let Some(key) = &seg.key {
            if key.method != KeyMethod::None {
                return Err(PlanError::Unsupported(format!(
                    "encrypted playlist ({:?})",
                    key.method
                )));
            }
        }
        if let Some(map) = &seg.map {
            if has_init_section {
                return Err(PlanError::Unsupported(
                    "multiple EXT-X-MAP init sections".to_string(),
                ));
            }
            let url = resolve_uri(base, &map.uri)?;
            // Init section ranges have no implicit offset; they start at 0.
            let byte_range = map
                .byte_range
                .as_ref()
                .map(|r| cursor.span(&url, r.length, Some(r.offset.unwrap_or(0))))
                .transpose()?;
            segments.push(SegmentSource { url, byte_range });
            has_init_section = true;
        }

        let url = resolve_uri(base, &seg.uri)?;
        let byte_range = seg
            .byte_range
            .as_ref()
            .map(|r| cursor.span(&url, r.length, r.offset))
            .transpose()?;
        segments.push(SegmentSource { url, byte_range });
    }

    Ok(MediaSources {
        segments,
        has_init_section,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_media(text: &str) -> MediaPlaylist {
        match m3u8_rs::parse_playlist_res(text.as_bytes()).unwrap() {
            m3u8_rs::Playlist::MediaPlaylist(pl) => pl,
            m3u8_rs::Playlist::MasterPlaylist(_) => panic!("expected media playlist"),
        }
    }

    fn base() -> Url {
        Url::parse("https://cdn.example.com/show/ep1/index.m3u8").unwrap()
    }

    #[test]
    fn resolves_relative_and_absolute_uris() {
        let pl = parse_media(
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n\
             #EXTINF:10,\nseg0.ts\n\
             #EXTINF:10,\n../shared/seg1.ts\n\
             #EXTINF:10,\nhttps://other.example.com/seg2.ts\n\
             #EXT-X-ENDLIST\n",
        );
        let sources = media_segments(&pl, &base()).unwrap();
        let urls: Vec<&str> = sources.segments.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/show/ep1/seg0.ts",
                "https://cdn.example.com/show/shared/seg1.ts",
                "https://other.example.com/seg2.ts",
            ]
        );
        assert!(!sources.has_init_section);
    }

    #[test]
    fn byte_ranges_continue_from_previous() {
        let pl = parse_media(
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n\
             #EXTINF:10,\n#EXT-X-BYTERANGE:100@0\nall.ts\n\
             #EXTINF:10,\n#EXT-X-BYTERANGE:50\nall.ts\n\
             #EXTINF:10,\n#EXT-X-BYTERANGE:25@500\nall.ts\n\
             #EXT-X-ENDLIST\n",
        );
        let sources = media_segments(&pl, &base()).unwrap();
        let spans: Vec<ByteSpan> = sources
            .segments
            .iter()
            .map(|s| s.byte_range.unwrap())
            .collect();
        assert_eq!(
            spans,
            vec![
                ByteSpan { offset: 0, length: 100 },
                ByteSpan { offset: 100, length: 50 },
                ByteSpan { offset: 500, length: 25 },
            ]
        );
    }

    #[test]
    fn overflowing_byte_range_is_unparsable() {
        let pl = parse_media(
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n\
             #EXTINF:10,\n#EXT-X-BYTERANGE:10@18446744073709551610\nall.ts\n\
             #EXT-X-ENDLIST\n",
        );
        assert!(matches!(
            media_segments(&pl, &base()),
            Err(PlanError::Unparsable(msg)) if msg.contains("overflows")
        ));

        // The span itself fits, but the implicit offset of the next one would not.
        let pl = parse_media(
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n\
             #EXTINF:10,\n#EXT-X-BYTERANGE:5@18446744073709551610\nall.ts\n\
             #EXTINF:10,\n#EXT-X-BYTERANGE:5\nall.ts\n\
             #EXT-X-ENDLIST\n",
        );
        assert!(matches!(
            media_segments(&pl, &base()),
            Err(PlanError::Unparsable(_))
        ));
    }

    #[test]
    fn init_section_becomes_first_segment() {
        let pl = parse_media(
            "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXT-X-MAP:URI=\"init.mp4\"\n\
             #EXTINF:6,\nseg0.m4s\n#EXTINF:6,\nseg1.m4s\n#EXT-X-ENDLIST\n",
        );
        let sources = media_segments(&pl, &base()).unwrap();
        assert!(sources.has_init_section);
        assert_eq!(sources.segments.len(), 3);
        assert_eq!(
            sources.segments[0].url,
            "https://cdn.example.com/show/ep1/init.mp4"
        );
    }

    #[test]
    fn encrypted_playlists_are_unsupported() {
        let pl = parse_media(
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n\
             #EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n\
             #EXTINF:10,\nseg0.ts\n#EXT-X-ENDLIST\n",
        );
        assert!(matches!(
            media_segments(&pl, &base()),
            Err(PlanError::Unsupported(_))
        ));
    }

    #[test]
    fn empty_playlist_is_rejected() {
        let pl = parse_media("#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-ENDLIST\n");
        assert!(matches!(media_segments(&pl, &base()), Err(PlanError::Empty)));
    }
}
