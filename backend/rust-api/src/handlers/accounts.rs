use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::user::{LinkChildRequest, UpdateProfileRequest, UpdateSettingsRequest, UserView},
    services::{
        account_service::AccountService,
        dashboard_service::{ChildSummary, DashboardService},
        AppState,
    },
};

use super::ApiError;

fn account_service(state: &AppState) -> AccountService {
    AccountService::new(state.mongo.clone(), state.clock.clone())
}

/// GET /api/v1/users/me/profile - Current user's profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = account_service(&state).ensure_profile(&claims.sub).await?;
    Ok(Json(profile))
}

/// PUT /api/v1/users/me/profile - Update profile fields
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let profile = account_service(&state)
        .update_profile(&claims.sub, req)
        .await?;
    Ok(Json(profile))
}

/// GET /api/v1/users/me/settings - Current user's settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = account_service(&state).ensure_settings(&claims.sub).await?;
    Ok(Json(settings))
}

/// PUT /api/v1/users/me/settings - Update goal targets and preferences
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let settings = account_service(&state)
        .update_settings(&claims.sub, req)
        .await?;
    Ok(Json(settings))
}

/// POST /api/v1/users/me/children - Link a child account (parent or admin)
pub async fn link_child(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<LinkChildRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let link = account_service(&state)
        .link_child(&claims.sub, claims.role, req)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// GET /api/v1/users/me/children - Children the caller may monitor
pub async fn list_children(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let children = account_service(&state).list_children(&claims.sub).await?;
    Ok(Json(children))
}

/// DELETE /api/v1/users/me/children/{child_id} - Remove a parent-child link
pub async fn unlink_child(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(child_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    account_service(&state)
        .unlink_child(&claims.sub, &child_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/me/children/{child_id}/stats - A linked child's
/// dashboard summary (parent or admin)
pub async fn child_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(child_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let child = account_service(&state)
        .monitored_child(&claims.sub, claims.role, &child_id)
        .await?;

    let dashboard = DashboardService::new(state.mongo.clone(), state.clock.clone());
    let stats = dashboard.child_stats(&child_id).await?;

    Ok(Json(ChildSummary {
        child: UserView::from(child),
        stats,
    }))
}

/// GET /api/v1/users/me/achievements - Achievements the caller has earned
pub async fn list_my_achievements(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let earned = account_service(&state)
        .list_user_achievements(&claims.sub)
        .await?;
    Ok(Json(earned))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AwardAchievementRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub achievement_id: String,
}

/// POST /api/v1/admin/achievements/award - Award an achievement (admin only)
pub async fn award_achievement(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<AwardAchievementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    tracing::info!(
        admin_id = %claims.sub,
        user_id = %req.user_id,
        achievement_id = %req.achievement_id,
        "Manual achievement award"
    );

    let award = account_service(&state)
        .award_achievement(&req.user_id, &req.achievement_id)
        .await?;
    Ok((StatusCode::CREATED, Json(award)))
}
