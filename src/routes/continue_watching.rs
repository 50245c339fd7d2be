use axum::Json;
use serde::Deserialize;

use crate::{
    error::AppResult,
    models::ResumeEntry,
    services::{
        access::{filter_allowed, policy_for, ProfilePolicy},
        continue_watching::collapse_continue_watching,
    },
};

#[derive(Debug, Deserialize)]
pub struct ContinueWatchingRequest {
    pub entries: Vec<ResumeEntry>,
    #[serde(default)]
    pub profile: Option<ProfilePolicy>,
}

/// Handler collapsing a profile's resume entries into one card per show
pub async fn collapse(
    Json(request): Json<ContinueWatchingRequest>,
) -> AppResult<Json<Vec<ResumeEntry>>> {
    let policy = policy_for(request.profile);
    let allowed = filter_allowed(request.entries, policy.as_ref());
    Ok(Json(collapse_continue_watching(allowed)))
}
