use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Kind of content a title row describes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Course,
    #[serde(untagged)]
    Other(String),
}

impl MediaType {
    /// Parses the store's free-form `media_type` value
    ///
    /// Legacy rows spell courses as `curso`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        match value.as_str() {
            "" => None,
            "movie" => Some(MediaType::Movie),
            "tv" => Some(MediaType::Tv),
            "course" | "curso" => Some(MediaType::Course),
            _ => Some(MediaType::Other(value)),
        }
    }

    /// Series-like titles are the ones the catalog groups into cards
    pub fn is_series_like(&self) -> bool {
        matches!(self, MediaType::Tv | MediaType::Course)
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
            MediaType::Course => write!(f, "course"),
            MediaType::Other(other) => write!(f, "{}", other),
        }
    }
}

/// Raw row from the `titles` table
///
/// Every field except `id` is optional because the projection that produced
/// the row may have shed columns the deployed schema does not have.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub id: String,
    pub public_id: Option<String>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub media_type: Option<MediaType>,
    pub is_series: bool,
    pub series_id: Option<String>,
    /// Storage path of the title's media (`r2_prefix`)
    pub storage_prefix: Option<String>,
    /// Explicit show-level storage path (`r2_prefix_base`)
    pub storage_prefix_base: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub maturity: Option<String>,
    pub duration_label: Option<String>,
    pub duration_sec: Option<f64>,
    pub synopsis: Option<String>,
    pub hero_youtube: Option<String>,
    pub hero_image_url: Option<String>,
    pub trailer_youtube: Option<String>,
    pub trailer_image_url: Option<String>,
    pub thumb_url: Option<String>,
    pub hero_preview_url: Option<String>,
    pub hero_preview_poster_url: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub cast_names: Vec<String>,
    pub director: Option<String>,
    pub creators: Vec<String>,
    pub in_cinema: bool,
    pub release_at: Option<NaiveDate>,
}

impl TitleRecord {
    /// Public slug if present, otherwise the internal key
    pub fn display_id(&self) -> String {
        self.public_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(self.id.trim())
            .to_string()
    }
}

/// Row from `media_assets`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub title_id: String,
    pub hls_master_url: Option<String>,
    pub hls_master_hd_url: Option<String>,
    pub storage_prefix: Option<String>,
    pub has_4k: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row from `subtitles`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleRow {
    pub title_id: String,
    pub label: String,
    pub lang: String,
    pub src: String,
    pub is_default: bool,
}

/// Subtitle track as exposed on a title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    pub label: String,
    pub lang: String,
    pub src: String,
    pub default: bool,
}

impl From<&SubtitleRow> for Subtitle {
    fn from(row: &SubtitleRow) -> Self {
        Self {
            label: row.label.clone(),
            lang: row.lang.clone(),
            src: row.src.clone(),
            default: row.is_default,
        }
    }
}

/// A title joined with its media asset and subtitles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTitle {
    /// Display id: public slug, else internal id
    pub id: String,
    pub public_id: Option<String>,
    pub db_id: String,
    pub media_type: Option<MediaType>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub series_id: Option<String>,
    pub is_series: bool,
    pub storage_prefix: Option<String>,
    pub storage_prefix_base: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,

    pub title: String,
    pub year: Option<i32>,
    pub maturity: String,
    pub duration: String,
    pub duration_sec: f64,
    pub synopsis: String,

    pub hero_image: String,
    pub hero_youtube: String,
    pub banner_image: String,
    pub thumb: String,
    pub trailer_youtube: String,
    pub trailer_image: String,
    pub hero_preview_url: String,
    pub hero_preview_poster_url: String,

    /// Manifest key chosen for the caller's 4K entitlement
    pub hls_master_key: String,
    pub hls_master_4k_key: String,
    pub hls_master_hd_key: String,
    pub has_4k: bool,
    pub subtitles: Vec<Subtitle>,

    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub cast: Vec<String>,
    pub director: String,
    pub creators: Vec<String>,

    pub in_cinema: bool,
    pub release_at: Option<NaiveDate>,
}
