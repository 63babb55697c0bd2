use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::CoreError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    services::{goal_service::GoalService, progress_service::ProgressService, AppState},
};

use super::ApiError;

fn progress_service(state: &AppState) -> ProgressService {
    ProgressService::new(state.mongo.clone(), state.clock.clone())
}

fn goal_service(state: &AppState) -> GoalService {
    GoalService::new(state.mongo.clone(), state.clock.clone())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordActivityRequest {
    #[validate(range(min = 0, max = 100))]
    pub progress_percentage: i32,
    /// Minutes spent since the last report
    #[validate(range(min = 0))]
    pub minutes: i32,
}

/// POST /api/v1/progress/lessons/{lesson_id}/activity - Report study
/// activity on a lesson
pub async fn record_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
    AppJson(req): AppJson<RecordActivityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let row = progress_service(&state)
        .record_activity(&claims.sub, &lesson_id, req.progress_percentage, req.minutes)
        .await?;
    Ok(Json(row))
}

/// POST /api/v1/progress/lessons/{lesson_id}/complete - Mark a lesson
/// completed and recompute its path aggregate
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (lesson, path) = progress_service(&state)
        .mark_completed(&claims.sub, &lesson_id)
        .await?;
    Ok(Json(json!({
        "lesson_progress": lesson,
        "path_progress": path,
    })))
}

/// GET /api/v1/progress/lessons/{lesson_id} - The caller's progress on
/// one lesson
pub async fn get_lesson_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = progress_service(&state)
        .get_lesson_progress(&claims.sub, &lesson_id)
        .await?;
    Ok(Json(row))
}

/// GET /api/v1/progress/paths - All path aggregates for the caller
pub async fn list_path_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = progress_service(&state)
        .list_path_progress(&claims.sub)
        .await?;
    Ok(Json(rows))
}

/// GET /api/v1/progress/paths/{path_id} - The caller's aggregate for one
/// path
pub async fn get_path_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = progress_service(&state)
        .get_path_progress(&claims.sub, &path_id)
        .await?;
    Ok(Json(row))
}

/// POST /api/v1/progress/paths/{path_id}/recompute - Recompute the path
/// aggregate on demand
pub async fn recompute_path(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(path_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = progress_service(&state)
        .recompute_path(&claims.sub, &path_id)
        .await?;
    Ok(Json(row))
}

/// GET /api/v1/progress/streak - The caller's study streak
pub async fn get_streak(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let streak = progress_service(&state).get_streak(&claims.sub).await?;
    Ok(Json(streak))
}

/// GET /api/v1/progress/goals/today - Today's goal row, created on first
/// read
pub async fn get_today_goal(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let today = state.clock.today();
    let goal = goal_service(&state).get_goal(&claims.sub, today).await?;
    Ok(Json(goal))
}

#[derive(Debug, Deserialize)]
pub struct GoalDatePath {
    pub date: String,
}

/// GET /api/v1/progress/goals/{date} - The goal row for a specific day
pub async fn get_goal_for_date(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(params): Path<GoalDatePath>,
) -> Result<impl IntoResponse, ApiError> {
    let date = NaiveDate::parse_from_str(&params.date, "%Y-%m-%d")
        .map_err(|_| CoreError::validation("Date must be YYYY-MM-DD"))?;
    let goal = goal_service(&state).get_goal(&claims.sub, date).await?;
    Ok(Json(goal))
}
