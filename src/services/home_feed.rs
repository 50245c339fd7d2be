use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap, HashSet},
};

use chrono::NaiveDate;

use crate::models::{CatalogCard, HomeRow, MediaType};

use super::text::fold;

const GENRE_PRIORITY: &[&str] = &[
    "Suspense",
    "Terror",
    "Mistério",
    "Crime",
    "Ficção científica",
    "Ação",
    "Aventura",
    "Fantasia",
    "Drama",
    "Comédia",
    "Romance",
    "Animação",
    "Documentário",
    "Guerra",
    "Faroeste",
    "Família",
    "Musical",
];

const COLLECTION_PRIORITY: &[&str] = &["Em alta", "Novidades", "Recomendados", "Para começar"];

/// Categories that describe the kind of title rather than its genre
const TYPE_CATEGORIES: &[&str] = &["filmes", "series"];

/// Category or tag values that flag a title as showing in cinemas
const CINEMA_MARKERS: &[&str] = &["cinema", "em cinema", "nos cinemas", "no cinema"];

/// Sizing and labels for the home feed
#[derive(Debug, Clone, PartialEq)]
pub struct HomeFeedConfig {
    /// Genres in tie-break order, highest priority first
    pub genre_priority: Vec<String>,
    /// Curated collections, emitted before any genre row
    pub collection_priority: Vec<String>,
    /// Items per row before a row is split into "i/N" parts
    pub chunk_size: usize,
    pub genre_min: usize,
    pub genre_max: usize,
    /// Titles of one genre a single collection may take
    pub collection_genre_cap: usize,
    /// Genre for titles without any usable category
    pub fallback_genre: String,
    /// Title of the single row used when nothing else was produced
    ///
    /// Fixed rather than "Filmes"/"Séries": the feed is built without a
    /// movie/series type filter.
    pub fallback_title: String,
    /// Categories kept off the home feed entirely
    pub hidden_categories: Vec<String>,
    pub calendar_label: String,
    pub arrival_label: String,
    pub coming_soon_label: String,
}

impl HomeFeedConfig {
    pub fn web() -> Self {
        Self {
            genre_priority: GENRE_PRIORITY.iter().map(|g| g.to_string()).collect(),
            collection_priority: COLLECTION_PRIORITY.iter().map(|c| c.to_string()).collect(),
            chunk_size: 24,
            genre_min: 12,
            genre_max: 30,
            collection_genre_cap: 2,
            fallback_genre: "Catálogo".to_string(),
            fallback_title: "Catálogo".to_string(),
            hidden_categories: vec!["Gospel".to_string()],
            calendar_label: "Calendário".to_string(),
            arrival_label: "Chega em".to_string(),
            coming_soon_label: "Em breve no CineSuper".to_string(),
        }
    }

    /// Shorter rows for the TV shell
    pub fn tv() -> Self {
        Self {
            chunk_size: 14,
            genre_min: 6,
            genre_max: 12,
            collection_genre_cap: 3,
            ..Self::web()
        }
    }
}

impl Default for HomeFeedConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Folded genre name -> position in the priority list
struct GenreRanks(HashMap<String, usize>);

impl GenreRanks {
    fn new(priority: &[String]) -> Self {
        let mut ranks = HashMap::new();
        for (idx, genre) in priority.iter().enumerate() {
            ranks.entry(fold(genre)).or_insert(idx);
        }
        Self(ranks)
    }

    /// Unlisted genres rank after every listed one
    fn rank(&self, genre: &str) -> usize {
        self.0.get(&fold(genre)).copied().unwrap_or(usize::MAX)
    }
}

fn clean_categories(card: &CatalogCard) -> Vec<&str> {
    card.categories()
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect()
}

fn is_type_category(category: &str) -> bool {
    TYPE_CATEGORIES.contains(&fold(category).as_str())
}

fn has_category(card: &CatalogCard, folded: &str) -> bool {
    folded.is_empty() || card.categories().iter().any(|c| fold(c) == folded)
}

fn recency_ms(card: &CatalogCard) -> i64 {
    card.created_at().map(|t| t.timestamp_millis()).unwrap_or(0)
}

fn sort_by_recency(items: &mut [&CatalogCard]) {
    items.sort_by_key(|card| Reverse(recency_ms(card)));
}

/// Genres a title could be filed under
///
/// Type categories and collection names are never genres, unless nothing
/// else is left, in which case collection names are allowed back in.
pub fn candidate_genres<'a>(card: &'a CatalogCard, config: &HomeFeedConfig) -> Vec<&'a str> {
    let collections: Vec<String> = config.collection_priority.iter().map(|c| fold(c)).collect();
    let categories = clean_categories(card);

    let genres: Vec<&str> = categories
        .iter()
        .copied()
        .filter(|c| !is_type_category(c) && !collections.contains(&fold(c)))
        .collect();

    if !genres.is_empty() {
        return genres;
    }

    categories
        .into_iter()
        .filter(|c| !is_type_category(c))
        .collect()
}

/// Candidate genre with the lowest running count, ties broken by priority
fn pick_balanced_genre(
    card: &CatalogCard,
    counts: &HashMap<String, usize>,
    ranks: &GenreRanks,
    config: &HomeFeedConfig,
) -> String {
    let candidates = candidate_genres(card, config);

    let picked = candidates
        .iter()
        .min_by_key(|genre| (counts.get(**genre).copied().unwrap_or(0), ranks.rank(genre)))
        .copied()
        .or_else(|| clean_categories(card).first().copied());

    picked
        .map(str::to_string)
        .unwrap_or_else(|| config.fallback_genre.clone())
}

/// Splits `items` into rows of at most `chunk_size`, titled "name · i/N" when split
fn chunk_rows(name: &str, key_prefix: &str, items: &[&CatalogCard], chunk_size: usize) -> Vec<HomeRow> {
    let chunks: Vec<&[&CatalogCard]> = items.chunks(chunk_size.max(1)).collect();
    let total = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| HomeRow {
            key: format!("{}:{}", key_prefix, idx),
            title: if total > 1 {
                format!("{} · {}/{}", name, idx + 1, total)
            } else {
                name.to_string()
            },
            items: chunk.iter().map(|card| (*card).clone()).collect(),
        })
        .collect()
}

/// Genre buckets in first-seen order
#[derive(Default)]
struct Buckets<'a> {
    order: Vec<(String, Vec<&'a CatalogCard>)>,
    counts: HashMap<String, usize>,
}

impl<'a> Buckets<'a> {
    fn push(&mut self, genre: String, card: &'a CatalogCard) {
        match self.order.iter_mut().find(|(name, _)| *name == genre) {
            Some((_, items)) => items.push(card),
            None => self.order.push((genre.clone(), vec![card])),
        }
        *self.counts.entry(genre).or_insert(0) += 1;
    }
}

/// Distributes the catalog into home rows without repeating any title
///
/// Collections come first, in priority order, each taking at most
/// `collection_genre_cap` titles per genre. Every title left over is filed
/// under exactly one genre; genre rows follow in alphabetical order, each
/// truncated to a cap derived from the average bucket size. A title is
/// marked used the moment it is placed, so no id appears in two rows.
pub fn build_home_rows(catalog: &[CatalogCard], config: &HomeFeedConfig) -> Vec<HomeRow> {
    if catalog.is_empty() {
        return Vec::new();
    }

    let ranks = GenreRanks::new(&config.genre_priority);
    let mut used: HashSet<&str> = HashSet::new();
    let mut rows = Vec::new();

    for collection in &config.collection_priority {
        let wanted = fold(collection);
        let mut buckets = Buckets::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for card in catalog {
            let id = card.id().trim();
            if id.is_empty() || used.contains(id) || !has_category(card, &wanted) {
                continue;
            }
            if !seen.insert(id) {
                continue;
            }
            let genre = pick_balanced_genre(card, &buckets.counts, &ranks, config);
            buckets.push(genre, card);
        }

        let mut picked: Vec<&CatalogCard> = Vec::new();
        for (_, mut items) in buckets.order {
            sort_by_recency(&mut items);
            items.truncate(config.collection_genre_cap);
            picked.extend(items);
        }

        if picked.is_empty() {
            continue;
        }

        sort_by_recency(&mut picked);
        used.extend(picked.iter().map(|card| card.id().trim()));

        rows.extend(chunk_rows(
            collection,
            &format!("home:col:{}", wanted),
            &picked,
            config.chunk_size,
        ));
    }

    let collection_rows = rows.len();
    let mut buckets = Buckets::default();

    for card in catalog {
        let id = card.id().trim();
        if id.is_empty() || !used.insert(id) {
            continue;
        }
        let genre = pick_balanced_genre(card, &buckets.counts, &ranks, config);
        buckets.push(genre, card);
    }

    let mut genres = buckets.order;
    genres.sort_by(|(a, _), (b, _)| fold(a).cmp(&fold(b)).then_with(|| a.cmp(b)));

    let genre_count = genres.len();
    let genre_total: usize = genres.iter().map(|(_, items)| items.len()).sum();
    let cap = genre_cap(genre_total, genre_count, config);

    for (genre, mut items) in genres {
        sort_by_recency(&mut items);
        items.truncate(cap);
        if items.is_empty() {
            continue;
        }
        rows.extend(chunk_rows(
            &genre,
            &format!("home:genre:{}", fold(&genre)),
            &items,
            config.chunk_size,
        ));
    }

    tracing::debug!(
        titles = catalog.len(),
        collection_rows,
        genre_rows = rows.len() - collection_rows,
        genre_cap = cap,
        "Built home rows"
    );

    if rows.is_empty() {
        return vec![HomeRow {
            key: "all".to_string(),
            title: config.fallback_title.clone(),
            items: catalog.to_vec(),
        }];
    }

    rows
}

/// `clamp(ceil(total / count), min, max)`, unlimited with a single genre
fn genre_cap(total: usize, count: usize, config: &HomeFeedConfig) -> usize {
    if count <= 1 {
        return usize::MAX;
    }
    let average = total.div_ceil(count);
    average.min(config.genre_max).max(config.genre_min)
}

/// Drops titles in a category the home feed hides
pub fn without_hidden_categories(catalog: Vec<CatalogCard>, config: &HomeFeedConfig) -> Vec<CatalogCard> {
    let hidden: Vec<String> = config.hidden_categories.iter().map(|c| fold(c)).collect();
    catalog
        .into_iter()
        .filter(|card| !card.categories().iter().any(|c| hidden.contains(&fold(c))))
        .collect()
}

/// Flagged in-cinema, or tagged as such
pub fn is_in_cinema(card: &CatalogCard) -> bool {
    card.title.in_cinema
        || card
            .categories()
            .iter()
            .chain(card.title.tags.iter())
            .any(|value| CINEMA_MARKERS.contains(&fold(value).as_str()))
}

/// Upcoming cinema releases, one row per release date
///
/// Dated rows come in ascending date order; titles without a date share a
/// final "coming soon" row. Releases before `today` are left out.
pub fn build_calendar_rows(
    catalog: &[CatalogCard],
    today: NaiveDate,
    config: &HomeFeedConfig,
) -> Vec<HomeRow> {
    let mut dated: BTreeMap<NaiveDate, Vec<CatalogCard>> = BTreeMap::new();
    let mut undated: Vec<CatalogCard> = Vec::new();

    let upcoming = catalog.iter().filter(|card| {
        card.media_type() == Some(&MediaType::Movie)
            && is_in_cinema(card)
            && card.title.release_at.map_or(true, |date| date >= today)
    });

    for card in upcoming {
        match card.title.release_at {
            Some(date) => dated.entry(date).or_default().push(card.clone()),
            None => undated.push(card.clone()),
        }
    }

    let mut rows: Vec<HomeRow> = dated
        .into_iter()
        .map(|(date, items)| HomeRow {
            key: format!("cal:{}", date.format("%Y-%m-%d")),
            title: format!(
                "{} · {} {}",
                config.calendar_label,
                config.arrival_label,
                date.format("%d/%m/%Y")
            ),
            items,
        })
        .collect();

    if !undated.is_empty() {
        rows.push(HomeRow {
            key: "cal:nodate".to_string(),
            title: format!("{} · {}", config.calendar_label, config.coming_soon_label),
            items: undated,
        });
    }

    rows
}
