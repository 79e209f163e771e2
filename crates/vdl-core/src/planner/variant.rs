//! Variant selection for master playlists.

use std::fmt;

use m3u8_rs::VariantStream;
use serde::{Deserialize, Serialize};

/// Which variant of a master playlist to download.
///
/// In config.toml: `quality = "highest"`, `quality = "lowest"` or
/// `quality = { closest_to = 1500000 }` (bits per second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantPreference {
    #[default]
    Highest,
    Lowest,
    ClosestTo(u64),
}

impl VariantPreference {
    /// Parse the CLI form: `highest`, `lowest`, or a bandwidth number.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highest" | "best" => Some(VariantPreference::Highest),
            "lowest" | "worst" => Some(VariantPreference::Lowest),
            other => other.parse().ok().map(VariantPreference::ClosestTo),
        }
    }
}

/// Same form `parse` accepts; this is what records store.
impl fmt::Display for VariantPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantPreference::Highest => f.write_str("highest"),
            VariantPreference::Lowest => f.write_str("lowest"),
            VariantPreference::ClosestTo(bandwidth) => write!(f, "{}", bandwidth),
        }
    }
}

/// Pick a variant. I-frame-only variants are never chosen.
/// Ties keep the first variant in playlist order.
pub fn select_variant(
    variants: &[VariantStream],
    preference: VariantPreference,
) -> Option<&VariantStream> {
    let mut candidates = variants.iter().filter(|v| !v.is_i_frame);
    let first = candidates.next()?;
    let chosen = candidates.fold(first, |best, v| {
        let better = match preference {
            VariantPreference::Highest => v.bandwidth > best.bandwidth,
            VariantPreference::Lowest => v.bandwidth < best.bandwidth,
            VariantPreference::ClosestTo(target) => {
                v.bandwidth.abs_diff(target) < best.bandwidth.abs_diff(target)
            }
        };
        if better {
            v
        } else {
            best
        }
    });
    Some(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(uri: &str, bandwidth: u64, is_i_frame: bool) -> VariantStream {
        VariantStream {
            is_i_frame,
            uri: uri.to_string(),
            bandwidth,
            ..Default::default()
        }
    }

    #[test]
    fn picks_by_preference() {
        let variants = vec![
            variant("mid.m3u8", 1_200_000, false),
            variant("iframe.m3u8", 9_000_000, true),
            variant("high.m3u8", 3_000_000, false),
            variant("low.m3u8", 400_000, false),
        ];
        assert_eq!(
            select_variant(&variants, VariantPreference::Highest).unwrap().uri,
            "high.m3u8"
        );
        assert_eq!(
            select_variant(&variants, VariantPreference::Lowest).unwrap().uri,
            "low.m3u8"
        );
        assert_eq!(
            select_variant(&variants, VariantPreference::ClosestTo(1_000_000))
                .unwrap()
                .uri,
            "mid.m3u8"
        );
    }

    #[test]
    fn only_iframe_variants_yield_none() {
        let variants = vec![variant("iframe.m3u8", 100, true)];
        assert!(select_variant(&variants, VariantPreference::Highest).is_none());
        assert!(select_variant(&[], VariantPreference::Highest).is_none());
    }

    #[test]
    fn cli_form() {
        assert_eq!(VariantPreference::parse("best"), Some(VariantPreference::Highest));
        assert_eq!(VariantPreference::parse("Lowest"), Some(VariantPreference::Lowest));
        assert_eq!(
            VariantPreference::parse("800000"),
            Some(VariantPreference::ClosestTo(800_000))
        );
        assert_eq!(VariantPreference::parse("hd"), None);
        for pref in [
            VariantPreference::Highest,
            VariantPreference::Lowest,
            VariantPreference::ClosestTo(1_500_000),
        ] {
            assert_eq!(VariantPreference::parse(&pref.to_string()), Some(pref));
        }
    }
}
