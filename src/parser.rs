//! Season/episode extraction from video filenames.
//!
//! Matchers run against the filename stem in a fixed order: combined season
//! and episode markers first, then bare episode markers (season defaults to
//! 1). A name that matches nothing keeps its cleaned stem as the title and
//! leaves season and episode absent.

use crate::pattern::EpisodeFields;
use crate::types::VIDEO_EXTENSIONS;
use log::trace;
use regex::Regex;
use std::sync::LazyLock;

/// Markers carrying both a season and an episode number.
static SEASON_EPISODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // S01E03, S01.E03, S01 E03
        Regex::new(r"(?i)(?:^|[^a-z0-9])(?P<m>s(?P<season>[0-9]{1,3})[\s._-]?e(?P<episode>[0-9]{1,4}))(?:[^0-9]|$)")
            .unwrap(),
        // 1x03
        Regex::new(r"(?i)(?:^|[^a-z0-9])(?P<m>(?P<season>[0-9]{1,2})x(?P<episode>[0-9]{1,4}))(?:[^0-9]|$)")
            .unwrap(),
        Regex::new(
            r"(?i)(?:^|[^a-z0-9])(?P<m>season[\s._-]*(?P<season>[0-9]{1,3})[\s._-]*episode[\s._-]*(?P<episode>[0-9]{1,4}))(?:[^0-9]|$)",
        )
        .unwrap(),
        // 第1季第3集
        Regex::new(r"(?P<m>第(?P<season>[0-9]{1,3})季[\s._-]*第(?P<episode>[0-9]{1,4})[集话話])").unwrap(),
    ]
});

/// Markers carrying only an episode number.
static EPISODE_ONLY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(?:^|[^a-z0-9])(?P<m>episode[\s._-]*(?P<episode>[0-9]{1,4}))(?:[^0-9]|$)")
            .unwrap(),
        // EP03, E03, EP.03
        Regex::new(r"(?i)(?:^|[^a-z0-9])(?P<m>ep?[\s._-]?(?P<episode>[0-9]{1,4}))(?:[^0-9]|$)")
            .unwrap(),
        // 第3集
        Regex::new(r"(?P<m>第(?P<episode>[0-9]{1,4})[集话話])").unwrap(),
        // [Group] Show - 03 [1080p]; years and resolutions are not episodes
        Regex::new(r"(?P<m>\s-\s(?P<episode>[0-9]{1,3}))(?:[^0-9pP]|$)").unwrap(),
        // 3 of 10
        Regex::new(r"(?i)(?:^|[^a-z0-9])(?P<m>(?P<episode>[0-9]{1,4})[\s._-]*of[\s._-]*[0-9]{1,4})(?:[^0-9]|$)")
            .unwrap(),
    ]
});

/// Episode information derived from a filename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedEpisode {
    /// The filename the information was parsed from.
    pub original_name: String,
    /// Cleaned show title, if any text besides the marker was present.
    pub title: Option<String>,
    /// Season number; absent when no marker matched.
    pub season: Option<u32>,
    /// Episode number; absent when no marker matched.
    pub episode: Option<u32>,
    /// Video extension including the dot, in its original case, or empty.
    pub extension: String,
}

impl ParsedEpisode {
    /// Whether an episode number could be extracted.
    pub fn is_parsed(&self) -> bool {
        self.episode.is_some()
    }

    /// The substitution values for pattern rendering.
    pub fn fields(&self) -> EpisodeFields {
        EpisodeFields {
            title: self.title.clone(),
            season: self.season,
            episode: self.episode,
        }
    }
}

/// Split a filename into stem and supported video extension.
///
/// The extension is matched case-insensitively and returned with its original
/// case. Names without a supported video extension are returned whole with an
/// empty extension.
///
/// # Examples
///
/// ```
/// use episode_renamer::parser::split_extension;
///
/// assert_eq!(split_extension("Show.S01E01.MKV"), ("Show.S01E01", ".MKV"));
/// assert_eq!(split_extension("notes.txt"), ("notes.txt", ""));
/// ```
pub fn split_extension(name: &str) -> (&str, &str) {
    if let Some(dot) = name.rfind('.') {
        let ext = &name[dot..];
        if dot > 0 && VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return (&name[..dot], ext);
        }
    }
    (name, "")
}

/// Whether a name ends in a supported video extension.
pub fn is_video_file(name: &str) -> bool {
    !split_extension(name).1.is_empty()
}

/// Replace separators and filesystem-reserved characters with spaces and
/// collapse whitespace.
///
/// Reserved characters never survive, so a title parsed back out of a
/// rendered name is the title that was rendered.
pub fn clean_title(raw: &str) -> String {
    raw.replace(['.', '_', '-', '<', '>', ':', '"', '/', '\\', '|', '?', '*'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Title from the text around a marker: the part before it, or the part
/// after it when nothing precedes the marker.
fn title_around(stem: &str, start: usize, end: usize) -> Option<String> {
    non_empty(clean_title(&stem[..start])).or_else(|| non_empty(clean_title(&stem[end..])))
}

/// Parse season, episode and title out of a filename.
///
/// # Examples
///
/// ```
/// use episode_renamer::parser::parse_filename;
///
/// let parsed = parse_filename("Show.Name.S02E07.1080p.mkv");
/// assert_eq!(parsed.title.as_deref(), Some("Show Name"));
/// assert_eq!(parsed.season, Some(2));
/// assert_eq!(parsed.episode, Some(7));
/// assert_eq!(parsed.extension, ".mkv");
/// ```
pub fn parse_filename(name: &str) -> ParsedEpisode {
    let (stem, extension) = split_extension(name);

    let mut parsed = ParsedEpisode {
        original_name: name.to_string(),
        title: None,
        season: None,
        episode: None,
        extension: extension.to_string(),
    };

    for re in SEASON_EPISODE_PATTERNS.iter() {
        if let Some(caps) = re.captures(stem) {
            let season = caps.name("season").and_then(|m| m.as_str().parse::<u32>().ok());
            let episode = caps.name("episode").and_then(|m| m.as_str().parse::<u32>().ok());
            if let (Some(season), Some(episode), Some(marker)) = (season, episode, caps.name("m")) {
                parsed.title = title_around(stem, marker.start(), marker.end());
                parsed.season = Some(season);
                parsed.episode = Some(episode);
                trace!("{}: season {} episode {} via {}", name, season, episode, re.as_str());
                return parsed;
            }
        }
    }

    for re in EPISODE_ONLY_PATTERNS.iter() {
        if let Some(caps) = re.captures(stem) {
            let episode = caps.name("episode").and_then(|m| m.as_str().parse::<u32>().ok());
            if let (Some(episode), Some(marker)) = (episode, caps.name("m")) {
                parsed.title = title_around(stem, marker.start(), marker.end());
                parsed.season = Some(1);
                parsed.episode = Some(episode);
                trace!("{}: episode {} via {}", name, episode, re.as_str());
                return parsed;
            }
        }
    }

    trace!("{}: no episode marker", name);
    parsed.title = non_empty(clean_title(stem));
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension_case_insensitive() {
        assert_eq!(split_extension("a.Mp4"), ("a", ".Mp4"));
        assert_eq!(split_extension("a.m2ts"), ("a", ".m2ts"));
    }

    #[test]
    fn test_split_extension_unknown_or_missing() {
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension("subs.srt"), ("subs.srt", ""));
        assert_eq!(split_extension(".mkv"), (".mkv", ""));
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file("clip.WEBM"));
        assert!(!is_video_file("cover.jpg"));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("The.Office_US-"), "The Office US");
        assert_eq!(clean_title("  a   b  "), "a b");
    }

    #[test]
    fn test_clean_title_drops_reserved_characters() {
        assert_eq!(clean_title("Re:Zero"), "Re Zero");
        assert_eq!(clean_title("What?/Why*"), "What Why");
    }

    #[test]
    fn test_year_after_dash_is_not_an_episode() {
        let p = parse_filename("Blade Runner - 2049.mkv");
        assert!(p.episode.is_none());
        assert!(p.season.is_none());
        assert_eq!(p.title.as_deref(), Some("Blade Runner 2049"));
    }

    #[test]
    fn test_resolution_after_dash_is_not_an_episode() {
        assert!(parse_filename("Show - 1080p.mkv").episode.is_none());
        assert!(parse_filename("Show - 720p.mkv").episode.is_none());
    }

    #[test]
    fn test_parse_sxxexx() {
        let p = parse_filename("Breaking.Bad.S01E03.720p.mkv");
        assert_eq!(p.title.as_deref(), Some("Breaking Bad"));
        assert_eq!(p.season, Some(1));
        assert_eq!(p.episode, Some(3));
        assert_eq!(p.extension, ".mkv");
    }

    #[test]
    fn test_parse_sxxexx_with_separator() {
        let p = parse_filename("Show_S02.E10.mp4");
        assert_eq!(p.season, Some(2));
        assert_eq!(p.episode, Some(10));
        assert_eq!(p.title.as_deref(), Some("Show"));
    }

    #[test]
    fn test_parse_lowercase_marker() {
        let p = parse_filename("show s1e5.avi");
        assert_eq!((p.season, p.episode), (Some(1), Some(5)));
    }

    #[test]
    fn test_parse_cross_format() {
        let p = parse_filename("Show.1x02.mkv");
        assert_eq!(p.title.as_deref(), Some("Show"));
        assert_eq!((p.season, p.episode), (Some(1), Some(2)));
    }

    #[test]
    fn test_resolution_is_not_cross_format() {
        let p = parse_filename("Concert.1920x1080.mp4");
        assert!(p.episode.is_none());
        assert_eq!(p.title.as_deref(), Some("Concert 1920x1080"));
    }

    #[test]
    fn test_parse_season_episode_words() {
        let p = parse_filename("Show Season 2 Episode 11.mkv");
        assert_eq!((p.season, p.episode), (Some(2), Some(11)));
        assert_eq!(p.title.as_deref(), Some("Show"));
    }

    #[test]
    fn test_parse_chinese_season_episode() {
        let p = parse_filename("进击的巨人第2季第05集.mp4");
        assert_eq!((p.season, p.episode), (Some(2), Some(5)));
        assert_eq!(p.title.as_deref(), Some("进击的巨人"));
    }

    #[test]
    fn test_parse_bare_ep_marker_defaults_season() {
        let p = parse_filename("Show.EP03.mkv");
        assert_eq!(p.season, Some(1));
        assert_eq!(p.episode, Some(3));
        assert_eq!(p.title.as_deref(), Some("Show"));
    }

    #[test]
    fn test_parse_bare_marker_title_after() {
        let p = parse_filename("EP03_raw.mkv");
        assert_eq!(p.episode, Some(3));
        assert_eq!(p.title.as_deref(), Some("raw"));
    }

    #[test]
    fn test_parse_chinese_episode_only() {
        let p = parse_filename("庆余年第3集.mp4");
        assert_eq!((p.season, p.episode), (Some(1), Some(3)));
        assert_eq!(p.title.as_deref(), Some("庆余年"));
    }

    #[test]
    fn test_parse_fansub_dash_number() {
        let p = parse_filename("[Group] Frieren - 07 [1080p].mkv");
        assert_eq!(p.episode, Some(7));
        assert_eq!(p.title.as_deref(), Some("[Group] Frieren"));
    }

    #[test]
    fn test_parse_of_form() {
        let p = parse_filename("Planet Earth 3 of 6.mkv");
        assert_eq!(p.episode, Some(3));
        assert_eq!(p.season, Some(1));
    }

    #[test]
    fn test_parse_no_marker() {
        let p = parse_filename("RandomClip.mp4");
        assert!(p.season.is_none());
        assert!(p.episode.is_none());
        assert!(!p.is_parsed());
        assert_eq!(p.title.as_deref(), Some("RandomClip"));
        assert_eq!(p.extension, ".mp4");
    }

    #[test]
    fn test_leading_zeros_are_values() {
        let p = parse_filename("Show.S001E0007.mkv");
        assert_eq!((p.season, p.episode), (Some(1), Some(7)));
    }

    #[test]
    fn test_non_video_keeps_whole_name_as_stem() {
        let p = parse_filename("Show.S01E02.srt");
        assert_eq!(p.extension, "");
        assert_eq!(p.episode, Some(2));
    }

    #[test]
    fn test_fields_copies_values() {
        let p = parse_filename("Show.S03E04.mkv");
        let f = p.fields();
        assert_eq!(f.title.as_deref(), Some("Show"));
        assert_eq!(f.season, Some(3));
        assert_eq!(f.episode, Some(4));
    }
}
