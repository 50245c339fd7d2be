use std::fmt::Display;

use crate::{
    error::StoreError,
    models::{MediaAsset, SubtitleRow, TitleRecord},
};

/// Column that can never be shed from a projection
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// Every `titles` column the catalog knows how to use
pub const TITLE_COLUMNS: &[&str] = &[
    "id",
    "public_id",
    "imdb_id",
    "tmdb_id",
    "media_type",
    "is_series",
    "series_id",
    "r2_prefix",
    "r2_prefix_base",
    "title",
    "year",
    "maturity",
    "duration_label",
    "duration_sec",
    "synopsis",
    "hero_youtube",
    "hero_image_url",
    "trailer_youtube",
    "trailer_image_url",
    "thumb_url",
    "hero_preview_url",
    "hero_preview_poster_url",
    "status",
    "created_at",
    "tags",
    "categories",
    "cast_names",
    "director",
    "creators",
    "in_cinema",
    "cinesuper_release_at",
];

/// Columns requested from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Columns(Vec<String>),
    /// `*`
    All,
}

impl Projection {
    pub fn columns(columns: &[&str]) -> Self {
        if columns.iter().any(|c| c.trim() == "*") {
            return Projection::All;
        }
        Projection::Columns(columns.iter().map(|c| c.trim().to_string()).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All)
    }

    /// Whether a row read with this projection carries `column`
    pub fn includes(&self, column: &str) -> bool {
        match self {
            Projection::All => true,
            Projection::Columns(cols) => {
                let wanted = normalize_column_name(column);
                cols.iter().any(|c| normalize_column_name(c) == wanted)
            }
        }
    }

    /// The same projection minus `column`
    ///
    /// `None` when the column is not part of it or nothing would be left.
    pub fn without(&self, column: &str) -> Option<Projection> {
        let Projection::Columns(cols) = self else {
            return None;
        };
        let wanted = normalize_column_name(column);
        let next: Vec<String> = cols
            .iter()
            .filter(|c| normalize_column_name(c) != wanted)
            .cloned()
            .collect();

        if next.len() == cols.len() || next.is_empty() {
            None
        } else {
            Some(Projection::Columns(next))
        }
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Projection::All => write!(f, "*"),
            Projection::Columns(cols) => write!(f, "{}", cols.join(", ")),
        }
    }
}

/// `"titles"."In_Cinema"` -> `in_cinema`
pub fn normalize_column_name(column: &str) -> String {
    column
        .replace(['"', '\''], "")
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Value of an equality filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Bool(bool),
}

/// Equality filters, ordering and limit for a `titles` read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitleQuery {
    pub filters: Vec<(String, FilterValue)>,
    /// Column and whether to sort descending
    pub order_by: Option<(String, bool)>,
    pub limit: Option<i64>,
}

impl TitleQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq_text(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters
            .push((column.to_string(), FilterValue::Text(value.into())));
        self
    }

    pub fn eq_bool(mut self, column: &str, value: bool) -> Self {
        self.filters.push((column.to_string(), FilterValue::Bool(value)));
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order_by = Some(("created_at".to_string(), true));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Published titles, newest first
    pub fn published() -> Self {
        Self::new().eq_text("status", "published").newest_first()
    }

    /// Drafts already announced as showing in cinemas
    pub fn cinema_drafts() -> Self {
        Self::new()
            .eq_text("status", "draft")
            .eq_bool("in_cinema", true)
            .newest_first()
    }
}

/// Read-only access to the title, media-asset and subtitle tables
///
/// Implementations must report an unknown column as
/// [`StoreError::MissingColumn`] so the schema-tolerant layer can react to it
/// without parsing vendor messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TitleStore: Send + Sync {
    /// Reads `titles` rows with the given projection
    async fn select_titles(
        &self,
        projection: &Projection,
        query: &TitleQuery,
    ) -> Result<Vec<TitleRecord>, StoreError>;

    /// Media assets for the given title ids, newest first
    async fn media_assets(&self, title_ids: &[String]) -> Result<Vec<MediaAsset>, StoreError>;

    /// Subtitles for the given title ids, default track first
    async fn subtitles(&self, title_ids: &[String]) -> Result<Vec<SubtitleRow>, StoreError>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
