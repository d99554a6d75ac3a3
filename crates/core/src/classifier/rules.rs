//! Rule-based file classification and episode extraction.
//!
//! Extension allowlists, keyword denylists and an ordered regex chain.
//! No LLM required - works entirely offline.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::warn;

use super::types::Classification;

/// Extensions recognized as video files.
pub const VIDEO_EXTENSIONS: [&str; 8] = [
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v",
];

/// Extensions recognized as subtitle files.
pub const SUBTITLE_EXTENSIONS: [&str; 5] = [".srt", ".ass", ".ssa", ".vtt", ".sub"];

/// Substrings that mark a file as throwaway.
const SKIP_KEYWORDS: [&str; 6] = ["sample", "preview", "trailer", "ncop", "nced", "menu"];

/// Substrings that mark a file as a special rather than a main episode.
const SPECIAL_KEYWORDS: [&str; 6] = ["sp", "special", "ova", "oad", "movie", "pv"];

/// Episode number patterns, tried in order. Explicit markers come before
/// bracketed numbers, which come before the bare-number fallback.
static EPISODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"第(\d+)[话集話]",
        r"[Ee][Pp]?\.?(\d+)",
        r"(\d+)[话集話期]",
        r"[\[\(](\d+)[\]\)]",
        r"(?i)Episode (\d+)",
        r"(?i)S\d+E(\d+)",
        r"- (\d+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Fallback pattern: a bare two or three digit run.
static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2,3}").unwrap());

pub fn is_video_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn is_subtitle_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    SUBTITLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Classify a filename by extension and keywords.
pub fn classify(filename: &str) -> Classification {
    let lower = filename.to_lowercase();

    let video = VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));
    let subtitle = SUBTITLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));

    if !video && !subtitle {
        return Classification::unimportant();
    }

    if SKIP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Classification {
            important: false,
            main_episode: false,
            video,
        };
    }

    let special = SPECIAL_KEYWORDS.iter().any(|kw| lower.contains(kw));

    Classification {
        important: true,
        main_episode: !special,
        video,
    }
}

/// Extract an episode number from a filename using the ordered pattern
/// chain. Underscores and dots are treated as spaces first. Only numbers
/// in [1, 999] are accepted; an out-of-range capture moves on to the next
/// pattern rather than failing the whole extraction.
pub fn extract_episode(filename: &str) -> Option<i64> {
    let cleaned = filename.replace('_', " ").replace('.', " ");

    for pattern in EPISODE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(&cleaned) {
            if let Ok(number) = captures[1].parse::<i64>() {
                if (1..=999).contains(&number) {
                    return Some(number);
                }
            }
        }
    }

    bare_number_episode(&cleaned)
}

/// Apply a stored per-source pattern to the raw filename. The first
/// capture group is parsed as the episode number. A pattern that does not
/// compile, does not match, or captures something non-numeric yields
/// `None`, never an error.
pub fn apply_custom_pattern(pattern: &str, filename: &str) -> Option<i64> {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "invalid episode pattern, skipping");
            return None;
        }
    };

    let captures = regex.captures(filename)?;
    captures.get(1)?.as_str().parse::<i64>().ok()
}

/// A bare digit run immediately followed by `x` and a digit is a
/// resolution like 720x480, not an episode number. The engine has no
/// lookahead, so the check happens after matching.
fn bare_number_episode(cleaned: &str) -> Option<i64> {
    for found in BARE_NUMBER.find_iter(cleaned) {
        let mut rest = cleaned[found.end()..].chars();
        if let (Some('x') | Some('X'), Some(next)) = (rest.next(), rest.next()) {
            if next.is_ascii_digit() {
                continue;
            }
        }

        let number = found.as_str().parse::<i64>().ok()?;
        return (1..=999).contains(&number).then_some(number);
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
