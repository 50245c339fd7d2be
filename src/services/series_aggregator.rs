use std::{collections::HashMap, fmt::Display};

use crate::models::{CatalogCard, MediaType, NormalizedTitle};

use super::identifiers::{
    extract_season_episode_from_path, extract_series_base_from_path, imdb_to_series_public_id,
    is_series_public_id,
};

/// Where a grouping key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySource {
    Series,
    Imdb,
    Path,
}

impl Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Series => write!(f, "series"),
            KeySource::Imdb => write!(f, "imdb"),
            KeySource::Path => write!(f, "path"),
        }
    }
}

/// Value used to bucket episode rows of the same show
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupingKey {
    pub source: KeySource,
    pub value: String,
}

impl GroupingKey {
    fn new(source: KeySource, value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            source,
            value: value.to_string(),
        })
    }
}

impl Display for GroupingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.value)
    }
}

pub type KeyExtractor = fn(&NormalizedTitle) -> Option<GroupingKey>;

/// Key strategies, most explicit first
pub const KEY_EXTRACTORS: &[KeyExtractor] = &[series_id_key, series_row_key, imdb_key, path_key];

/// Explicit `series_id`
pub fn series_id_key(title: &NormalizedTitle) -> Option<GroupingKey> {
    GroupingKey::new(KeySource::Series, title.series_id.as_deref()?)
}

/// A flagged series row without `series_id` is keyed by its own id, which
/// is what its episodes carry in `series_id`
pub fn series_row_key(title: &NormalizedTitle) -> Option<GroupingKey> {
    let has_series_id = title
        .series_id
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if !title.is_series || has_series_id {
        return None;
    }
    GroupingKey::new(KeySource::Series, &title.db_id)
}

/// IMDb id, only for `tv` rows
pub fn imdb_key(title: &NormalizedTitle) -> Option<GroupingKey> {
    if title.media_type != Some(MediaType::Tv) {
        return None;
    }
    let imdb = title.imdb_id.as_deref()?.trim().to_lowercase();
    if !imdb.starts_with("tt") {
        return None;
    }
    GroupingKey::new(KeySource::Imdb, &imdb)
}

/// Show-level storage path: the explicit base, else derived from the prefix
pub fn path_key(title: &NormalizedTitle) -> Option<GroupingKey> {
    let explicit = title
        .storage_prefix_base
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());

    let base = match explicit {
        Some(base) => base.to_string(),
        None => extract_series_base_from_path(title.storage_prefix.as_deref()?.trim()),
    };

    GroupingKey::new(KeySource::Path, &base.to_lowercase())
}

/// First key any extractor can derive
pub fn grouping_key(title: &NormalizedTitle) -> Option<GroupingKey> {
    KEY_EXTRACTORS.iter().find_map(|extract| extract(title))
}

/// Every key the extractors derive, most explicit first
pub fn grouping_keys(title: &NormalizedTitle) -> Vec<GroupingKey> {
    KEY_EXTRACTORS
        .iter()
        .filter_map(|extract| extract(title))
        .collect()
}

/// Maps every key an explicit series row answers to onto that row's own key
///
/// Episodes may point at their show by `series_id`, IMDb id or path, while
/// the series row's first key is usually a different one. A later series row
/// sharing any key with an earlier one maps onto the earlier row's key.
fn series_row_aliases(titles: &[NormalizedTitle]) -> HashMap<GroupingKey, GroupingKey> {
    let mut aliases: HashMap<GroupingKey, GroupingKey> = HashMap::new();

    let series_rows = titles.iter().filter(|title| {
        title.media_type.as_ref().is_some_and(MediaType::is_series_like) && is_series_row(title)
    });

    for title in series_rows {
        let keys = grouping_keys(title);
        let Some(own) = keys.first() else {
            continue;
        };
        let canonical = keys
            .iter()
            .find_map(|key| aliases.get(key).cloned())
            .unwrap_or_else(|| own.clone());
        for key in keys {
            aliases.entry(key).or_insert_with(|| canonical.clone());
        }
    }

    aliases
}

/// Lowest (season, episode) parsed from each item's storage path
///
/// The first item wins on equal numbers.
pub fn pick_lowest_episode<T, F>(items: &[T], path: F) -> Option<&T>
where
    F: Fn(&T) -> &str,
{
    items
        .iter()
        .min_by_key(|item| extract_season_episode_from_path(path(item)))
}

fn storage_path(title: &NormalizedTitle) -> &str {
    title.storage_prefix.as_deref().unwrap_or("")
}

fn is_series_row(title: &NormalizedTitle) -> bool {
    title.is_series
        || (title.media_type == Some(MediaType::Tv)
            && is_series_public_id(title.public_id.as_deref().unwrap_or(&title.id)))
}

struct Bucket {
    key: GroupingKey,
    media_type: MediaType,
    imdb_id: String,
    series_row: Option<NormalizedTitle>,
    episodes: Vec<NormalizedTitle>,
}

/// Groups normalized rows into catalog cards, one card per show
///
/// Movies and anything else not series-like pass through, as do series-like
/// rows no key can be derived for. Every input row ends up either as a card
/// of its own or absorbed into exactly one series card.
pub fn aggregate_series_cards(titles: Vec<NormalizedTitle>) -> Vec<CatalogCard> {
    let input_len = titles.len();
    let mut out = Vec::with_capacity(input_len);
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<GroupingKey, usize> = HashMap::new();
    let aliases = series_row_aliases(&titles);

    for title in titles {
        let media_type = match &title.media_type {
            Some(mt) if mt.is_series_like() => mt.clone(),
            _ => {
                out.push(CatalogCard::passthrough(title));
                continue;
            }
        };

        let Some(key) = grouping_key(&title) else {
            out.push(CatalogCard::passthrough(title));
            continue;
        };
        let key = aliases.get(&key).cloned().unwrap_or(key);
        let imdb_id = title
            .imdb_id
            .as_deref()
            .map(|i| i.trim().to_lowercase())
            .unwrap_or_default();

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            buckets.push(Bucket {
                key,
                media_type,
                imdb_id: String::new(),
                series_row: None,
                episodes: Vec::new(),
            });
            buckets.len() - 1
        });
        let bucket = &mut buckets[slot];
        if bucket.imdb_id.is_empty() {
            bucket.imdb_id = imdb_id;
        }

        if is_series_row(&title) {
            if let Some(previous) = bucket.series_row.replace(title) {
                // A second explicit series row for the same show stays visible.
                out.push(CatalogCard::passthrough(previous));
            }
        } else {
            bucket.episodes.push(title);
        }
    }

    let bucket_count = buckets.len();

    for bucket in buckets {
        let imdb = Some(bucket.imdb_id.clone()).filter(|i| !i.is_empty());

        if let Some(series_row) = bucket.series_row {
            let id = series_row.id.clone();
            let imdb = if bucket.media_type == MediaType::Tv {
                imdb
            } else {
                None
            };
            out.push(CatalogCard::series(series_row, id, imdb));
            continue;
        }

        if bucket.media_type == MediaType::Course {
            out.extend(bucket.episodes.into_iter().map(CatalogCard::passthrough));
            continue;
        }

        let Some(representative) = pick_lowest_episode(&bucket.episodes, storage_path) else {
            unreachable!("bucket {} has no rows", bucket.key);
        };

        let card_id = imdb
            .as_deref()
            .and_then(imdb_to_series_public_id)
            .unwrap_or_else(|| bucket.key.to_string());

        out.push(CatalogCard::series(representative.clone(), card_id, imdb));
    }

    tracing::debug!(
        rows = input_len,
        buckets = bucket_count,
        cards = out.len(),
        "Aggregated series cards"
    );

    out
}
