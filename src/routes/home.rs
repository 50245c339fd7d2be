use axum::{extract::State, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{CatalogCard, FetchOptions, HomeRow},
    services::{
        access::{dedup_by_display_id, filter_allowed, policy_for, ProfilePolicy},
        home_feed::{build_calendar_rows, build_home_rows, without_hidden_categories},
    },
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct HomeRequest {
    #[serde(default = "default_allow_4k")]
    pub allow_4k: bool,
    #[serde(default)]
    pub profile: Option<ProfilePolicy>,
}

fn default_allow_4k() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CalendarRequest {
    #[serde(default)]
    pub profile: Option<ProfilePolicy>,
    /// Caller's local date; defaults to the current UTC date
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

/// Access filter then dedup, the input every feed is built from
fn visible_catalog(cards: Vec<CatalogCard>, profile: Option<ProfilePolicy>) -> Vec<CatalogCard> {
    let policy = policy_for(profile);
    dedup_by_display_id(filter_allowed(cards, policy.as_ref()))
}

/// Handler for the home feed rows
pub async fn home_rows(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HomeRequest>,
) -> AppResult<Json<Vec<HomeRow>>> {
    let options = FetchOptions {
        allow_4k: request.allow_4k,
        include_draft_calendar: false,
    };
    let cards = state.catalog.fetch_catalog(options).await?;

    let published: Vec<CatalogCard> = visible_catalog(cards, request.profile)
        .into_iter()
        .filter(CatalogCard::is_published)
        .collect();
    let catalog = without_hidden_categories(published, &state.feed);

    Ok(Json(build_home_rows(&catalog, &state.feed)))
}

/// Handler for the upcoming cinema releases rows
pub async fn calendar_rows(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CalendarRequest>,
) -> AppResult<Json<Vec<HomeRow>>> {
    let options = FetchOptions {
        allow_4k: true,
        include_draft_calendar: true,
    };
    let cards = state.catalog.fetch_catalog(options).await?;
    let catalog = visible_catalog(cards, request.profile);
    let today = request.today.unwrap_or_else(|| Utc::now().date_naive());

    Ok(Json(build_calendar_rows(&catalog, today, &state.feed)))
}
