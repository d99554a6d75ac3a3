//! Destination path construction for the media library.
//!
//! All functions here are lexical. Nothing touches the filesystem, so
//! the same logic backs both the materializer and its tests.

use std::path::{Component, Path, PathBuf};

use crate::store::{FileKind, MediaFile, MediaType, Source};

use super::error::MaterializeError;

/// Resolve `.` and `..` segments without consulting the filesystem.
/// Leading `..` segments on relative paths are kept, they have nothing
/// to cancel against.
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(parts.last(), Some(Component::Normal(_))) {
                    parts.pop();
                } else {
                    parts.push(component);
                }
            }
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// A title is safe when it is relative and, after normalization, contains
/// no `..` segment. Unsafe titles could place files outside the root.
pub fn is_safe_title(title: &str) -> bool {
    let path = Path::new(title);
    if path.is_absolute() {
        return false;
    }
    !normalize(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Language suffix for subtitle files, detected from the file name.
pub fn subtitle_suffix(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    let chs = lower.contains("chs");
    let cht = lower.contains("cht");

    if chs && cht {
        ".chs&cht"
    } else if chs {
        ".chs"
    } else if cht {
        ".cht"
    } else if lower.contains("sc") {
        ".sc"
    } else if lower.contains("tc") {
        ".tc"
    } else {
        ""
    }
}

/// File extension including the dot, empty when there is none.
pub fn extension_of(name: &str) -> String {
    match Path::new(name).extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}

/// Build the destination path for a file under the output root.
///
/// TV: `<root>/<title>/Season <n>/<title> S<nn>E<ee><suffix><ext>` with
/// the season defaulting to 1 and both numbers zero-padded to two digits
/// in the file name. Movie: `<root>/<title>/<title><suffix><ext>`. The
/// subtitle language suffix only applies to subtitle files.
pub fn build_dest_path(
    root: &Path,
    source: &Source,
    file: &MediaFile,
) -> Result<PathBuf, MaterializeError> {
    let ext = extension_of(&file.name);
    let suffix = if file.kind == FileKind::Subtitle {
        subtitle_suffix(&file.name)
    } else {
        ""
    };

    match source.media_type {
        MediaType::Tv => {
            let episode = file.final_episode.ok_or_else(|| MaterializeError::NoEpisode {
                name: file.name.clone(),
            })?;
            let season = source.effective_season();
            let file_name = format!(
                "{} S{:02}E{:02}{}{}",
                source.title, season, episode, suffix, ext
            );
            Ok(root
                .join(&source.title)
                .join(format!("Season {}", season))
                .join(file_name))
        }
        MediaType::Movie => {
            let file_name = format!("{}{}{}", source.title, suffix, ext);
            Ok(root.join(&source.title).join(file_name))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileKind, SourceKind};
    use chrono::Utc;

    fn source(media_type: MediaType, title: &str, season: Option<i64>) -> Source {
        Source {
            id: 1,
            kind: SourceKind::Feed,
            url: "https://example.com/feed".to_string(),
            media_type,
            title: title.to_string(),
            catalog_id: None,
            season,
            use_llm_episode: false,
            episode_regex: None,
            episode_offset: 0,
            check_interval: 3600,
            last_check: None,
            outdated: false,
            created_at: Utc::now(),
        }
    }

    fn file(name: &str, kind: FileKind, final_episode: Option<i64>) -> MediaFile {
        MediaFile {
            id: 1,
            torrent_id: 1,
            name: name.to_string(),
            path: name.to_string(),
            size: 1024,
            kind,
            extracted_episode: final_episode,
            final_episode,
            hardlink_path: None,
            hardlink_status: None,
            hardlink_error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("/a/./b")), PathBuf::from("/a/b"));
        assert_eq!(normalize(Path::new("a/b/./../..")), PathBuf::from(""));
    }

    #[test]
    fn test_normalize_keeps_leading_parent_segments() {
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_safe_titles() {
        assert!(is_safe_title("Frieren"));
        assert!(is_safe_title("Show (2024)"));
        assert!(is_safe_title("Group/Show"));
    }

    #[test]
    fn test_unsafe_titles() {
        assert!(!is_safe_title("/etc"));
        assert!(!is_safe_title("../evil"));
        assert!(!is_safe_title("a/../../evil"));
    }

    #[test]
    fn test_subtitle_suffix_variants() {
        assert_eq!(subtitle_suffix("Show 04 CHS&CHT.ass"), ".chs&cht");
        assert_eq!(subtitle_suffix("Show 04 chs.srt"), ".chs");
        assert_eq!(subtitle_suffix("Show 04.CHT.ass"), ".cht");
        assert_eq!(subtitle_suffix("Show 04 [SC].srt"), ".sc");
        assert_eq!(subtitle_suffix("Show 04 [TC].srt"), ".tc");
        assert_eq!(subtitle_suffix("Show 04.srt"), "");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("show.mkv"), ".mkv");
        assert_eq!(extension_of("show.04.MKV"), ".MKV");
        assert_eq!(extension_of("noext"), "");
    }

    #[test]
    fn test_tv_destination_layout() {
        let source = source(MediaType::Tv, "Frieren", Some(2));
        let file = file("Frieren - 04.mkv", FileKind::Episode, Some(4));

        let dest = build_dest_path(Path::new("/media"), &source, &file).unwrap();
        assert_eq!(
            dest,
            PathBuf::from("/media/Frieren/Season 2/Frieren S02E04.mkv")
        );
    }

    #[test]
    fn test_tv_season_defaults_to_one() {
        let source = source(MediaType::Tv, "Frieren", None);
        let file = file("Frieren - 11.mkv", FileKind::Episode, Some(11));

        let dest = build_dest_path(Path::new("/media"), &source, &file).unwrap();
        assert_eq!(
            dest,
            PathBuf::from("/media/Frieren/Season 1/Frieren S01E11.mkv")
        );
    }

    #[test]
    fn test_tv_subtitle_gets_language_suffix() {
        let source = source(MediaType::Tv, "Frieren", Some(1));
        let file = file("Frieren - 04 [CHS].srt", FileKind::Subtitle, Some(4));

        let dest = build_dest_path(Path::new("/media"), &source, &file).unwrap();
        assert_eq!(
            dest,
            PathBuf::from("/media/Frieren/Season 1/Frieren S01E04.chs.srt")
        );
    }

    #[test]
    fn test_tv_without_episode_is_an_error() {
        let source = source(MediaType::Tv, "Frieren", Some(1));
        let file = file("Frieren - extra.mkv", FileKind::Episode, None);

        let result = build_dest_path(Path::new("/media"), &source, &file);
        assert!(matches!(result, Err(MaterializeError::NoEpisode { .. })));
    }

    #[test]
    fn test_movie_destination_layout() {
        let source = source(MediaType::Movie, "Suzume", None);
        let file = file("Suzume.2022.1080p.mkv", FileKind::Episode, None);

        let dest = build_dest_path(Path::new("/media"), &source, &file).unwrap();
        assert_eq!(dest, PathBuf::from("/media/Suzume/Suzume.mkv"));
    }

    #[test]
    fn test_movie_subtitle_suffix() {
        let source = source(MediaType::Movie, "Suzume", None);
        let file = file("Suzume.cht.ass", FileKind::Subtitle, None);

        let dest = build_dest_path(Path::new("/media"), &source, &file).unwrap();
        assert_eq!(dest, PathBuf::from("/media/Suzume/Suzume.cht.ass"));
    }

    #[test]
    fn test_episode_numbers_above_99_are_not_truncated() {
        let source = source(MediaType::Tv, "One Piece", Some(1));
        let file = file("One Piece - 1071.mkv", FileKind::Episode, Some(107));

        let dest = build_dest_path(Path::new("/media"), &source, &file).unwrap();
        assert_eq!(
            dest,
            PathBuf::from("/media/One Piece/Season 1/One Piece S01E107.mkv")
        );
    }
}
