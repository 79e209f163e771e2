//! Display-name and subfolder sanitization for Linux filesystems.

const NAME_MAX: usize = 255;

fn truncate_to_name_max(s: &str) -> &str {
    if s.len() <= NAME_MAX {
        return s;
    }
    let mut take = NAME_MAX;
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    &s[..take]
}

/// Make a user-supplied display name safe as a single path component.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Keeps inner spaces (titles are user-facing)
/// - Trims surrounding whitespace and dots
/// - Limits length to 255 bytes (NAME_MAX)
pub fn sanitize_display_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '\0' || c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    truncate_to_name_max(trimmed).to_string()
}

/// Sanitize a relative subfolder (`shows/season 1`). Returns None when nothing usable remains.
/// `..` and `.` components are dropped so the result stays under the destination.
pub fn sanitize_subfolder(sub: &str) -> Option<std::path::PathBuf> {
    let mut out = std::path::PathBuf::new();
    for part in sub.split(['/', '\\']) {
        let part = part.trim();
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        let clean = sanitize_display_name(part);
        if !clean.is_empty() {
            out.push(clean);
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn replaces_separators_keeps_spaces() {
        assert_eq!(sanitize_display_name("Ep 1/2: pilot"), "Ep 1_2: pilot");
        assert_eq!(sanitize_display_name("a\\b\x00c"), "a_b_c");
    }

    #[test]
    fn trims_dots_and_whitespace() {
        assert_eq!(sanitize_display_name("  ..ep1..  "), "ep1");
        assert_eq!(sanitize_display_name(".."), "");
    }

    #[test]
    fn long_names_truncate_on_char_boundary() {
        let long = "é".repeat(200);
        let out = sanitize_display_name(&long);
        assert!(out.len() <= 255);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn subfolder_drops_traversal() {
        assert_eq!(
            sanitize_subfolder("shows/../season 1/"),
            Some(PathBuf::from("shows/season 1"))
        );
        assert_eq!(sanitize_subfolder("../.."), None);
        assert_eq!(sanitize_subfolder("/abs/path"), Some(PathBuf::from("abs/path")));
    }
}
