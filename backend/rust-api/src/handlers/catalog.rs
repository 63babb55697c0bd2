use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    error::CoreError,
    middlewares::auth::JwtClaims,
    models::catalog::{AgeGroup, LearningPathSummary, LessonSummary},
    services::{account_service::AccountService, catalog_service::CatalogService, AppState},
};

use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListPathsQuery {
    pub category_id: Option<String>,
    pub age_group: Option<String>,
}

/// GET /api/v1/categories - Active categories in display order
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = CatalogService::new(state.mongo.clone())
        .list_categories()
        .await?;
    Ok(Json(categories))
}

/// GET /api/v1/paths - Published learning paths, optionally filtered by
/// category and age group
pub async fn list_paths(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPathsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let age_group = query
        .age_group
        .as_deref()
        .map(AgeGroup::from_str)
        .transpose()
        .map_err(|_| CoreError::validation("Unknown age group"))?;

    let paths = CatalogService::new(state.mongo.clone())
        .list_paths(query.category_id.as_deref(), age_group)
        .await?;
    let summaries: Vec<LearningPathSummary> = paths.iter().map(LearningPathSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/paths/featured - Editorially featured paths
pub async fn featured_paths(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let paths = CatalogService::new(state.mongo.clone())
        .featured_paths()
        .await?;
    let summaries: Vec<LearningPathSummary> = paths.iter().map(LearningPathSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/paths/recommended - Paths matched to the caller's age
/// bucket, minus those already completed
pub async fn recommended_paths(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = AccountService::new(state.mongo.clone(), state.clock.clone())
        .get_user(&claims.sub)
        .await?;
    let paths = CatalogService::new(state.mongo.clone())
        .recommended_paths(&user, state.clock.today())
        .await?;
    let summaries: Vec<LearningPathSummary> = paths.iter().map(LearningPathSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/paths/{path_id} - A single published path
pub async fn get_path(
    State(state): State<Arc<AppState>>,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = CatalogService::new(state.mongo.clone())
        .get_path(&path_id)
        .await?;
    Ok(Json(path))
}

/// GET /api/v1/paths/{path_id}/lessons - Published lessons of a path in
/// display order
pub async fn list_path_lessons(
    State(state): State<Arc<AppState>>,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lessons = CatalogService::new(state.mongo.clone())
        .list_lessons(&path_id)
        .await?;
    let summaries: Vec<LessonSummary> = lessons.iter().map(LessonSummary::from).collect();
    Ok(Json(summaries))
}

/// GET /api/v1/lessons/{lesson_id} - A single published lesson with body
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lesson = CatalogService::new(state.mongo.clone())
        .get_lesson(&lesson_id)
        .await?;
    Ok(Json(lesson))
}

/// GET /api/v1/achievements - The active achievement catalog
pub async fn list_achievements(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let achievements = CatalogService::new(state.mongo.clone())
        .list_achievements()
        .await?;
    Ok(Json(achievements))
}
