use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Decode, PgPool, Postgres, QueryBuilder, Row, Type,
};
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{MediaAsset, MediaType, SubtitleRow, TitleRecord},
};

use super::title_store::{normalize_column_name, FilterValue, Projection, TitleQuery, TitleStore};

/// SQLSTATE for `undefined_column`
const UNDEFINED_COLUMN: &str = "42703";

static MISSING_COLUMN_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)column\s+titles\.(\w+)\s+does not exist",
        r#"(?i)column\s+"?(\w+)"?\s+of relation\s+"?titles"?\s+does not exist"#,
        r#"(?i)could not find the ['"](\w+)['"] column"#,
        r#"(?i)column\s+"?(?:\w+\.)?"?(\w+)"?\s+does not exist"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("missing column regex should compile"))
    .collect()
});

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Pulls the column name out of an `undefined_column` message
pub fn extract_missing_column(message: &str) -> Option<String> {
    MISSING_COLUMN_REGEXES
        .iter()
        .find_map(|re| re.captures(message))
        .map(|c| normalize_column_name(&c[1]))
        .filter(|c| !c.is_empty())
}

/// Translates driver errors into the store's error taxonomy
fn map_store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNDEFINED_COLUMN) {
            if let Some(column) = extract_missing_column(db_err.message()) {
                return StoreError::MissingColumn { column };
            }
        }
    }
    StoreError::Database(err)
}

/// Postgres-backed [`TitleStore`]
#[derive(Clone)]
pub struct PgTitleStore {
    pool: PgPool,
}

impl PgTitleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_identifier(builder: &mut QueryBuilder<'_, Postgres>, column: &str) -> Result<(), StoreError> {
    let valid = !column.is_empty()
        && column
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::Backend(format!("invalid column name: {}", column)));
    }
    builder.push(column);
    Ok(())
}

fn build_select<'a>(
    projection: &Projection,
    query: &'a TitleQuery,
) -> Result<QueryBuilder<'a, Postgres>, StoreError> {
    let mut builder = QueryBuilder::new("SELECT ");

    match projection {
        Projection::All => {
            builder.push("*");
        }
        Projection::Columns(cols) => {
            for (i, col) in cols.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_identifier(&mut builder, col)?;
            }
        }
    }

    builder.push(" FROM titles");

    for (i, (column, value)) in query.filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_identifier(&mut builder, column)?;
        match value {
            FilterValue::Text(text) => {
                builder.push("::text = ");
                builder.push_bind(text.as_str());
            }
            FilterValue::Bool(flag) => {
                builder.push(" = ");
                builder.push_bind(*flag);
            }
        }
    }

    if let Some((column, descending)) = &query.order_by {
        builder.push(" ORDER BY ");
        push_identifier(&mut builder, column)?;
        builder.push(if *descending { " DESC" } else { " ASC" });
    }

    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }

    Ok(builder)
}

#[async_trait::async_trait]
impl TitleStore for PgTitleStore {
    async fn select_titles(
        &self,
        projection: &Projection,
        query: &TitleQuery,
    ) -> Result<Vec<TitleRecord>, StoreError> {
        let mut builder = build_select(projection, query)?;

        tracing::debug!(projection = %projection, filters = query.filters.len(), "Selecting titles");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_store_error)?;

        rows.iter().map(title_record_from_row).collect()
    }

    async fn media_assets(&self, title_ids: &[String]) -> Result<Vec<MediaAsset>, StoreError> {
        if title_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT title_id, hls_master_url, hls_master_hd_url, r2_prefix, has_4k, created_at
            FROM media_assets
            WHERE title_id::text = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(title_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_error)?;

        rows.iter()
            .map(|row| {
                Ok(MediaAsset {
                    title_id: text_like(row, "title_id")?.unwrap_or_default(),
                    hls_master_url: text_like(row, "hls_master_url")?,
                    hls_master_hd_url: text_like(row, "hls_master_hd_url")?,
                    storage_prefix: text_like(row, "r2_prefix")?,
                    has_4k: opt::<bool>(row, "has_4k")?.unwrap_or(false),
                    created_at: timestamp(row, "created_at")?,
                })
            })
            .collect()
    }

    async fn subtitles(&self, title_ids: &[String]) -> Result<Vec<SubtitleRow>, StoreError> {
        if title_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT title_id, label, lang, src, is_default
            FROM subtitles
            WHERE title_id::text = ANY($1)
            ORDER BY is_default DESC
            "#,
        )
        .bind(title_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_store_error)?;

        rows.iter()
            .map(|row| {
                Ok(SubtitleRow {
                    title_id: text_like(row, "title_id")?.unwrap_or_default(),
                    label: text_like(row, "label")?.unwrap_or_default(),
                    lang: text_like(row, "lang")?.unwrap_or_default(),
                    src: text_like(row, "src")?.unwrap_or_default(),
                    is_default: opt::<bool>(row, "is_default")?.unwrap_or(false),
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

fn title_record_from_row(row: &PgRow) -> Result<TitleRecord, StoreError> {
    let id = text_like(row, "id")?
        .ok_or_else(|| StoreError::Backend("titles row without id".to_string()))?;

    Ok(TitleRecord {
        id,
        public_id: text_like(row, "public_id")?,
        imdb_id: text_like(row, "imdb_id")?,
        tmdb_id: text_like(row, "tmdb_id")?,
        media_type: text_like(row, "media_type")?.and_then(|m| MediaType::parse(&m)),
        is_series: opt::<bool>(row, "is_series")?.unwrap_or(false),
        series_id: text_like(row, "series_id")?,
        storage_prefix: text_like(row, "r2_prefix")?,
        storage_prefix_base: text_like(row, "r2_prefix_base")?,
        title: text_like(row, "title")?.unwrap_or_default(),
        year: text_like(row, "year")?.and_then(|y| y.trim().parse().ok()),
        maturity: text_like(row, "maturity")?,
        duration_label: text_like(row, "duration_label")?,
        duration_sec: number(row, "duration_sec")?,
        synopsis: text_like(row, "synopsis")?,
        hero_youtube: text_like(row, "hero_youtube")?,
        hero_image_url: text_like(row, "hero_image_url")?,
        trailer_youtube: text_like(row, "trailer_youtube")?,
        trailer_image_url: text_like(row, "trailer_image_url")?,
        thumb_url: text_like(row, "thumb_url")?,
        hero_preview_url: text_like(row, "hero_preview_url")?,
        hero_preview_poster_url: text_like(row, "hero_preview_poster_url")?,
        status: text_like(row, "status")?,
        created_at: timestamp(row, "created_at")?,
        tags: text_list(row, "tags")?,
        categories: text_list(row, "categories")?,
        cast_names: text_list(row, "cast_names")?,
        director: text_like(row, "director")?,
        creators: text_list(row, "creators")?,
        in_cinema: opt::<bool>(row, "in_cinema")?.unwrap_or(false),
        release_at: date(row, "cinesuper_release_at")?,
    })
}

// Row helpers: a column the projection shed decodes as absent.

fn opt<'r, T>(row: &'r PgRow, column: &str) -> Result<Option<T>, StoreError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(e) => Err(StoreError::Database(e)),
    }
}

fn is_type_mismatch(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::ColumnDecode { .. })
}

/// Text, or any scalar the schema may have used instead (uuid, integers)
fn text_like(row: &PgRow, column: &str) -> Result<Option<String>, StoreError> {
    match row.try_get::<Option<String>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(e) if is_type_mismatch(&e) => {
            if let Ok(value) = row.try_get::<Option<Uuid>, _>(column) {
                return Ok(value.map(|v| v.to_string()));
            }
            if let Ok(value) = row.try_get::<Option<i32>, _>(column) {
                return Ok(value.map(|v| v.to_string()));
            }
            if let Ok(value) = row.try_get::<Option<i64>, _>(column) {
                return Ok(value.map(|v| v.to_string()));
            }
            Err(StoreError::Database(e))
        }
        Err(e) => Err(StoreError::Database(e)),
    }
}

fn number(row: &PgRow, column: &str) -> Result<Option<f64>, StoreError> {
    match row.try_get::<Option<f64>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(e) if is_type_mismatch(&e) => {
            if let Ok(value) = row.try_get::<Option<i32>, _>(column) {
                return Ok(value.map(f64::from));
            }
            if let Ok(value) = row.try_get::<Option<i64>, _>(column) {
                return Ok(value.map(|v| v as f64));
            }
            Ok(text_like(row, column)?.and_then(|v| v.trim().parse().ok()))
        }
        Err(e) => Err(StoreError::Database(e)),
    }
}

fn text_list(row: &PgRow, column: &str) -> Result<Vec<String>, StoreError> {
    match row.try_get::<Option<Vec<String>>, _>(column) {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(Vec::new()),
        Err(e) if is_type_mismatch(&e) => {
            tracing::debug!(column, error = %e, "Ignoring non-array list column");
            Ok(Vec::new())
        }
        Err(e) => Err(StoreError::Database(e)),
    }
}

fn timestamp(row: &PgRow, column: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    match row.try_get::<Option<DateTime<Utc>>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(e) if is_type_mismatch(&e) => Ok(opt::<NaiveDateTime>(row, column)
            .ok()
            .flatten()
            .map(|naive| naive.and_utc())),
        Err(e) => Err(StoreError::Database(e)),
    }
}

fn date(row: &PgRow, column: &str) -> Result<Option<NaiveDate>, StoreError> {
    match row.try_get::<Option<NaiveDate>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(e) if is_type_mismatch(&e) => {
            Ok(timestamp(row, column)?.map(|t| t.date_naive()))
        }
        Err(e) => Err(StoreError::Database(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_missing_column_postgres_messages() {
        assert_eq!(
            extract_missing_column("column titles.ghost_column does not exist").as_deref(),
            Some("ghost_column")
        );
        assert_eq!(
            extract_missing_column(r#"column "in_cinema" does not exist"#).as_deref(),
            Some("in_cinema")
        );
        assert_eq!(
            extract_missing_column(r#"column "tags" of relation "titles" does not exist"#)
                .as_deref(),
            Some("tags")
        );
        assert_eq!(
            extract_missing_column("Could not find the 'r2_prefix_base' column of 'titles'")
                .as_deref(),
            Some("r2_prefix_base")
        );
    }

    #[test]
    fn test_extract_missing_column_ignores_other_errors() {
        assert_eq!(
            extract_missing_column("relation \"titles\" does not exist"),
            None
        );
        assert_eq!(extract_missing_column("connection refused"), None);
    }

    #[test]
    fn test_build_select_sql() {
        let projection = Projection::columns(&["id", "public_id"]);
        let query = TitleQuery::published().limit(1);
        let builder = build_select(&projection, &query).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT id, public_id FROM titles WHERE status::text = $1 ORDER BY created_at DESC LIMIT $2"
        );
    }

    #[test]
    fn test_build_select_wildcard_with_bool_filter() {
        let query = TitleQuery::cinema_drafts();
        let builder = build_select(&Projection::All, &query).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT * FROM titles WHERE status::text = $1 AND in_cinema = $2 ORDER BY created_at DESC"
        );
    }

    #[test]
    fn test_build_select_rejects_unsafe_identifiers() {
        let projection = Projection::Columns(vec!["id; DROP TABLE titles".to_string()]);
        let query = TitleQuery::new();
        let result = build_select(&projection, &query);
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
