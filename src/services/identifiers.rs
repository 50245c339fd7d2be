//! Conversions between the three identifier spaces a title can be addressed by
//!
//! - public slugs: `mv-########`, `sr-########`, `ep-########-sSSeEE`, `cr-########`
//! - IMDb ids: `tt` followed by 7 or 8 digits
//! - storage paths: `<genre>/<kind>/<show>/Temporada 01/Episodio 02/`
//!
//! Everything here is pure. Malformed input yields `None` (or the documented
//! default) rather than an error so callers can fall back to showing the
//! title ungrouped.

use once_cell::sync::Lazy;
use regex::Regex;

use super::text::fold;

static SERIES_PUBLIC_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sr-(\d{8})$").expect("series id regex should compile"));

static EPISODE_PUBLIC_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ep-(\d{8})-s(\d{2})e(\d{2})$").expect("episode id regex should compile")
});

// Matched against folded paths, in priority order.
static SEASON_MARKER_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/temporada\s*(\d+)",
        r"/season\s*(\d+)",
        r"/modulo\s*(\d+)",
        r"/module\s*(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("season marker regex should compile"))
    .collect()
});

static EPISODE_MARKER_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"/episodio\s*(\d+)", r"/episode\s*(\d+)"]
        .iter()
        .map(|p| Regex::new(p).expect("episode marker regex should compile"))
        .collect()
});

static SEASON_SEGMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:temporada|season|modulo|module)\s*\d+")
        .expect("season segment regex should compile")
});

/// Which slug family to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicIdKind {
    Movie,
    Series,
    Episode,
}

/// Builds a public slug from the show's 8-digit IMDb number
///
/// Season and episode only apply to episodes and default to 1.
pub fn build_public_id(
    kind: PublicIdKind,
    imdb_digits8: &str,
    season: Option<u32>,
    episode: Option<u32>,
) -> String {
    match kind {
        PublicIdKind::Movie => format!("mv-{}", imdb_digits8),
        PublicIdKind::Series => format!("sr-{}", imdb_digits8),
        PublicIdKind::Episode => {
            let season = season.filter(|s| *s > 0).unwrap_or(1);
            let episode = episode.filter(|e| *e > 0).unwrap_or(1);
            format!("ep-{}-s{:02}e{:02}", imdb_digits8, season, episode)
        }
    }
}

/// `tt0903747` -> `sr-00903747`
pub fn imdb_to_series_public_id(imdb_id: &str) -> Option<String> {
    let digits = imdb_digits(imdb_id)?;
    Some(format!("sr-{:0>8}", digits))
}

/// `sr-00903747` -> `tt903747`; any other shape yields `None`
pub fn series_public_id_to_imdb(public_id: &str) -> Option<String> {
    let value = public_id.trim().to_lowercase();
    let captures = SERIES_PUBLIC_ID_REGEX.captures(&value)?;
    let digits = captures[1].trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    Some(format!("tt{}", digits))
}

pub fn is_series_public_id(value: &str) -> bool {
    SERIES_PUBLIC_ID_REGEX.is_match(&value.trim().to_lowercase())
}

/// Digits of an IMDb id without the `tt` prefix, if there are any
fn imdb_digits(imdb_id: &str) -> Option<String> {
    let trimmed = imdb_id.trim();
    let without_prefix = match trimmed.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("tt") => &trimmed[2..],
        _ => trimmed,
    };
    let digits: String = without_prefix.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Parsed `ep-########-sSSeEE` slug
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodePublicId {
    pub show_digits: String,
    pub season: u32,
    pub episode: u32,
}

impl EpisodePublicId {
    /// Synthetic id of the show this episode belongs to
    pub fn series_public_id(&self) -> String {
        build_public_id(PublicIdKind::Series, &self.show_digits, None, None)
    }

    /// `tt` id of the show, leading zeros removed
    pub fn series_imdb_id(&self) -> Option<String> {
        series_public_id_to_imdb(&self.series_public_id())
    }
}

pub fn parse_episode_public_id(value: &str) -> Option<EpisodePublicId> {
    let value = value.trim().to_lowercase();
    let captures = EPISODE_PUBLIC_ID_REGEX.captures(&value)?;
    Some(EpisodePublicId {
        show_digits: captures[1].to_string(),
        season: captures[2].parse().ok()?,
        episode: captures[3].parse().ok()?,
    })
}

/// `cr-` slug derived from the last eight digits found in a UUID
pub fn course_public_id_from_uuid(uuid: &str) -> String {
    let digits: Vec<char> = uuid.chars().filter(|c| c.is_ascii_digit()).collect();
    let tail: String = digits[digits.len().saturating_sub(8)..].iter().collect();
    format!("cr-{:0>8}", tail)
}

/// Internal keys are hyphenated UUIDs; anything else is not worth a lookup by `id`
pub fn is_uuid(value: &str) -> bool {
    let value = value.trim();
    value.len() == 36 && uuid::Uuid::parse_str(value).is_ok()
}

/// Season and episode numbers; ordering is season first, then episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeasonEpisode {
    pub season: u32,
    pub episode: u32,
}

impl Default for SeasonEpisode {
    fn default() -> Self {
        Self {
            season: 1,
            episode: 1,
        }
    }
}

/// Reads `Temporada N`/`Season N`/`Módulo N`/`Module N` and `Episódio N`/`Episode N`
/// markers from a storage path. Missing or zero markers default to 1.
pub fn extract_season_episode_from_path(path: &str) -> SeasonEpisode {
    let folded = fold(&path.replace('\\', "/"));

    SeasonEpisode {
        season: first_marker(&SEASON_MARKER_REGEXES, &folded).unwrap_or(1),
        episode: first_marker(&EPISODE_MARKER_REGEXES, &folded).unwrap_or(1),
    }
}

fn first_marker(patterns: &[Regex], haystack: &str) -> Option<u32> {
    patterns
        .iter()
        .find_map(|re| re.captures(haystack))
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Show-level part of an episode's storage path
///
/// `Drama/Séries/Dark/Temporada 01/Episodio 02/` -> `Drama/Séries/Dark`.
/// Paths without a season/module segment come back with trailing slashes removed.
pub fn extract_series_base_from_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').collect();

    let marker = segments
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, segment)| SEASON_SEGMENT_REGEX.is_match(&fold(segment)))
        .map(|(idx, _)| idx);

    if let Some(idx) = marker {
        let base = segments[..idx].join("/");
        let base = base.trim_end_matches('/');
        if !base.is_empty() {
            return base.to_string();
        }
    }

    normalized.trim_end_matches('/').to_string()
}
