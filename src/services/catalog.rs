use std::{collections::HashMap, sync::Arc};

use crate::{
    db::{TitleQuery, TitleStore, TITLE_COLUMNS},
    error::{AppResult, StoreError},
    models::{CatalogCard, FetchOptions, MediaAsset, SubtitleRow, TitleRecord},
};

use super::{
    identifiers::{is_series_public_id, is_uuid, series_public_id_to_imdb},
    normalize::normalize_title,
    schema::SchemaContext,
    series_aggregator::{aggregate_series_cards, pick_lowest_episode},
};

const IN_CINEMA_COLUMN: &str = "in_cinema";

/// Reads the catalog from a [`TitleStore`] and turns it into cards
///
/// Holds no state between calls: schema capabilities are discovered per call
/// through a fresh [`SchemaContext`].
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn TitleStore>,
    max_retries: usize,
}

fn record_path(record: &TitleRecord) -> &str {
    record.storage_prefix.as_deref().unwrap_or("")
}

/// `tt903747` and the 7-digit form `tt0903747` the store may hold
fn imdb_spellings(imdb_id: &str) -> Vec<String> {
    let digits = imdb_id.trim_start_matches("tt");
    let mut spellings = vec![imdb_id.to_string()];
    let padded = format!("tt{:0>7}", digits);
    if padded != imdb_id {
        spellings.push(padded);
    }
    spellings
}

impl CatalogService {
    pub fn new(store: Arc<dyn TitleStore>, max_retries: usize) -> Self {
        Self { store, max_retries }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    async fn select_records(
        &self,
        schema: &mut SchemaContext,
        query: &TitleQuery,
    ) -> Result<Vec<TitleRecord>, StoreError> {
        let store = &self.store;
        schema
            .select(TITLE_COLUMNS, |projection| async move {
                store.select_titles(&projection, query).await
            })
            .await
    }

    /// Like [`Self::select_records`] for queries filtering on `in_cinema`
    ///
    /// A schema without that column simply has no cinema drafts.
    async fn select_cinema_drafts(
        &self,
        schema: &mut SchemaContext,
        query: &TitleQuery,
    ) -> Result<Vec<TitleRecord>, StoreError> {
        if schema.is_known_missing(IN_CINEMA_COLUMN) {
            return Ok(Vec::new());
        }

        match self.select_records(schema, query).await {
            Err(err) if err.missing_column() == Some(IN_CINEMA_COLUMN) => {
                tracing::warn!("Store has no in_cinema column, skipping cinema drafts");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn media_and_subtitles(
        &self,
        title_ids: &[String],
    ) -> Result<(Vec<MediaAsset>, Vec<SubtitleRow>), StoreError> {
        tokio::try_join!(
            self.store.media_assets(title_ids),
            self.store.subtitles(title_ids)
        )
    }

    /// Published titles (plus cinema drafts when asked) as catalog cards
    pub async fn fetch_catalog(&self, options: FetchOptions) -> AppResult<Vec<CatalogCard>> {
        let mut schema = SchemaContext::new(self.max_retries);

        let mut records = self
            .select_records(&mut schema, &TitleQuery::published())
            .await?;
        let published = records.len();

        if options.include_draft_calendar {
            let drafts = self
                .select_cinema_drafts(&mut schema, &TitleQuery::cinema_drafts())
                .await?;
            records.extend(drafts);
        }

        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let (media, subtitles) = self.media_and_subtitles(&ids).await?;

        // Assets come newest first; the first one per title wins.
        let mut media_by_title: HashMap<&str, &MediaAsset> = HashMap::new();
        for asset in &media {
            media_by_title.entry(asset.title_id.as_str()).or_insert(asset);
        }

        let mut subtitles_by_title: HashMap<&str, Vec<SubtitleRow>> = HashMap::new();
        for row in &subtitles {
            subtitles_by_title
                .entry(row.title_id.as_str())
                .or_default()
                .push(row.clone());
        }

        let normalized = records
            .iter()
            .map(|record| {
                normalize_title(
                    record,
                    media_by_title.get(record.id.as_str()).copied(),
                    subtitles_by_title
                        .get(record.id.as_str())
                        .map(Vec::as_slice)
                        .unwrap_or(&[]),
                    options.allow_4k,
                )
            })
            .collect();

        let cards = aggregate_series_cards(normalized);

        tracing::info!(
            store = self.store.name(),
            published,
            drafts = records.len() - published,
            cards = cards.len(),
            "Fetched catalog"
        );

        Ok(cards)
    }

    /// One title by public slug or internal id
    ///
    /// `sr-` slugs resolve to a series card, built from the explicit series
    /// row when there is one, otherwise from the show's lowest episode.
    pub async fn fetch_title_by_id(
        &self,
        id_or_public_id: &str,
        options: FetchOptions,
    ) -> AppResult<Option<CatalogCard>> {
        let value = id_or_public_id.trim();
        if value.is_empty() {
            return Ok(None);
        }

        let mut schema = SchemaContext::new(self.max_retries);

        if is_series_public_id(value) {
            return self.fetch_series_card(value, options, &mut schema).await;
        }

        let Some(record) = self.find_record(value, options, &mut schema).await? else {
            tracing::debug!(id = %value, "Title not found");
            return Ok(None);
        };

        let ids = vec![record.id.clone()];
        let (media, subtitles) = self.media_and_subtitles(&ids).await?;

        let title = normalize_title(&record, media.first(), &subtitles, options.allow_4k);
        Ok(Some(CatalogCard::passthrough(title)))
    }

    async fn find_record(
        &self,
        value: &str,
        options: FetchOptions,
        schema: &mut SchemaContext,
    ) -> Result<Option<TitleRecord>, StoreError> {
        let by_uuid = is_uuid(value);

        let mut published = vec![TitleQuery::published().eq_text("public_id", value)];
        if by_uuid {
            published.push(TitleQuery::published().eq_text("id", value));
        }

        for query in published {
            let rows = self.select_records(schema, &query.limit(1)).await?;
            if let Some(record) = rows.into_iter().next() {
                return Ok(Some(record));
            }
        }

        if !options.include_draft_calendar {
            return Ok(None);
        }

        let mut drafts = vec![TitleQuery::cinema_drafts().eq_text("public_id", value)];
        if by_uuid {
            drafts.push(TitleQuery::cinema_drafts().eq_text("id", value));
        }

        for query in drafts {
            let rows = self.select_cinema_drafts(schema, &query.limit(1)).await?;
            if let Some(record) = rows.into_iter().next() {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    async fn fetch_series_card(
        &self,
        series_public_id: &str,
        options: FetchOptions,
        schema: &mut SchemaContext,
    ) -> AppResult<Option<CatalogCard>> {
        let Some(imdb_id) = series_public_id_to_imdb(series_public_id) else {
            return Ok(None);
        };

        let explicit = TitleQuery::published()
            .eq_text("public_id", series_public_id)
            .limit(1);

        let series_row = match self.select_records(schema, &explicit).await {
            Ok(rows) => rows.into_iter().next(),
            Err(err) => {
                tracing::warn!(
                    id = %series_public_id,
                    error = %err,
                    "Series row lookup failed, using episodes"
                );
                None
            }
        };

        let record = match series_row {
            Some(row) => Some(row),
            None => {
                let mut representative = None;
                for imdb in imdb_spellings(&imdb_id) {
                    let query = TitleQuery::published()
                        .eq_text("media_type", "tv")
                        .eq_text("imdb_id", imdb);
                    let episodes = self.select_records(schema, &query).await?;
                    if let Some(lowest) = pick_lowest_episode(&episodes, record_path) {
                        representative = Some(lowest.clone());
                        break;
                    }
                }
                representative
            }
        };

        let Some(record) = record else {
            return Ok(None);
        };

        let mut title = normalize_title(&record, None, &[], options.allow_4k);
        title.is_series = true;

        Ok(Some(CatalogCard::series(
            title,
            series_public_id.to_string(),
            Some(imdb_id),
        )))
    }
}
