use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MediaType, NormalizedTitle};

/// The unit shown in catalog rows
///
/// Either a title passed through as-is, or a series card standing in for a
/// whole show (`series_card` set, fields taken from the representative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCard {
    #[serde(flatten)]
    pub title: NormalizedTitle,
    #[serde(default)]
    pub series_card: bool,
    #[serde(default)]
    pub series_imdb_id: Option<String>,
}

impl CatalogCard {
    /// Wraps a title without any aggregation
    pub fn passthrough(title: NormalizedTitle) -> Self {
        Self {
            title,
            series_card: false,
            series_imdb_id: None,
        }
    }

    /// Builds a series card that takes over `id`/`public_id` from the source title
    pub fn series(mut title: NormalizedTitle, id: String, imdb_id: Option<String>) -> Self {
        title.public_id = Some(id.clone());
        title.id = id;
        Self {
            title,
            series_card: true,
            series_imdb_id: imdb_id.filter(|i| !i.is_empty()),
        }
    }

    pub fn id(&self) -> &str {
        &self.title.id
    }

    pub fn media_type(&self) -> Option<&MediaType> {
        self.title.media_type.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.title.created_at
    }

    pub fn categories(&self) -> &[String] {
        &self.title.categories
    }

    pub fn is_published(&self) -> bool {
        self.title
            .status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("published"))
    }
}

/// One horizontal row of the home feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeRow {
    pub key: String,
    pub title: String,
    pub items: Vec<CatalogCard>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(id: &str) -> NormalizedTitle {
        NormalizedTitle {
            id: id.to_string(),
            public_id: Some(id.to_string()),
            db_id: format!("db-{}", id),
            title: "Dark".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_series_card_takes_over_ids() {
        let card = CatalogCard::series(
            title("ep-05753222-s01e01"),
            "sr-05753222".to_string(),
            Some("tt5753222".to_string()),
        );
        assert_eq!(card.id(), "sr-05753222");
        assert_eq!(card.title.public_id.as_deref(), Some("sr-05753222"));
        assert_eq!(card.title.db_id, "db-ep-05753222-s01e01");
        assert!(card.series_card);
        assert_eq!(card.series_imdb_id.as_deref(), Some("tt5753222"));
    }

    #[test]
    fn test_series_card_drops_empty_imdb() {
        let card = CatalogCard::series(title("x"), "series:abc".to_string(), Some(String::new()));
        assert_eq!(card.series_imdb_id, None);
    }

    #[test]
    fn test_card_serializes_flat() {
        let card = CatalogCard::passthrough(title("mv-00111161"));
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["id"], "mv-00111161");
        assert_eq!(json["series_card"], false);
        assert!(json.get("title").is_some_and(|t| t == "Dark"));
    }

    #[test]
    fn test_is_published() {
        let mut card = CatalogCard::passthrough(title("a"));
        assert!(!card.is_published());
        card.title.status = Some("Published".to_string());
        assert!(card.is_published());
    }
}
