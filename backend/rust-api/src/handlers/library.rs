use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::models::library::LibraryItemSummary;
use crate::services::{catalog_service::CatalogService, AppState};

use super::ApiError;

/// GET /api/v1/library/stories - Published stories
pub async fn list_stories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let stories = CatalogService::new(state.mongo.clone()).list_stories().await?;
    let summaries: Vec<LibraryItemSummary> =
        stories.iter().map(LibraryItemSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/library/stories/{story_id}
pub async fn get_story(
    State(state): State<Arc<AppState>>,
    Path(story_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let story = CatalogService::new(state.mongo.clone())
        .get_story(&story_id)
        .await?;
    Ok(Json(story))
}

/// GET /api/v1/library/prayers - Published prayers
pub async fn list_prayers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let prayers = CatalogService::new(state.mongo.clone()).list_prayers().await?;
    let summaries: Vec<LibraryItemSummary> =
        prayers.iter().map(LibraryItemSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/library/prayers/{prayer_id}
pub async fn get_prayer(
    State(state): State<Arc<AppState>>,
    Path(prayer_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let prayer = CatalogService::new(state.mongo.clone())
        .get_prayer(&prayer_id)
        .await?;
    Ok(Json(prayer))
}

/// GET /api/v1/library/songs - Published songs
pub async fn list_songs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let songs = CatalogService::new(state.mongo.clone()).list_songs().await?;
    let summaries: Vec<LibraryItemSummary> = songs.iter().map(LibraryItemSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/library/songs/{song_id}
pub async fn get_song(
    State(state): State<Arc<AppState>>,
    Path(song_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let song = CatalogService::new(state.mongo.clone())
        .get_song(&song_id)
        .await?;
    Ok(Json(song))
}

/// GET /api/v1/library/activities - Published activities
pub async fn list_activities(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let activities = CatalogService::new(state.mongo.clone())
        .list_activities()
        .await?;
    let summaries: Vec<LibraryItemSummary> =
        activities.iter().map(LibraryItemSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/library/activities/{activity_id}
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let activity = CatalogService::new(state.mongo.clone())
        .get_activity(&activity_id)
        .await?;
    Ok(Json(activity))
}
