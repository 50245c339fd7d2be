use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaType;

/// A "continue watching" entry for one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeEntry {
    /// Display id (public slug when the title has one)
    pub id: String,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub db_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub progress_sec: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    /// Storage path; the season/episode chip is derived from it
    #[serde(default)]
    pub storage_prefix: Option<String>,

    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub maturity: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub series_card: bool,
    #[serde(default)]
    pub series_imdb_id: Option<String>,
    /// Episode the collapsed series card resumes into
    #[serde(default)]
    pub resume_episode_public_id: Option<String>,
}

impl ResumeEntry {
    /// Public id if present, otherwise the display id
    pub fn lookup_id(&self) -> &str {
        self.public_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(self.id.trim())
    }

    /// Milliseconds since the epoch; missing timestamps sort as oldest
    pub fn updated_at_ms(&self) -> i64 {
        self.updated_at.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}
