use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogCard, FetchOptions},
};

use super::AppState;

/// Handler for a single title, by public slug or internal id
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(options): Query<FetchOptions>,
) -> AppResult<Json<CatalogCard>> {
    if id.trim().is_empty() {
        return Err(AppError::InvalidInput("title id must not be empty".to_string()));
    }

    state
        .catalog
        .fetch_title_by_id(&id, options)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("title {}", id.trim())))
}
