use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{CatalogCard, FetchOptions},
};

use super::AppState;

/// Handler for the catalog listing endpoint
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(options): Query<FetchOptions>,
) -> AppResult<Json<Vec<CatalogCard>>> {
    let cards = state.catalog.fetch_catalog(options).await?;
    Ok(Json(cards))
}
