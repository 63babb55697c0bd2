use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    models::user::UserRole,
    services::{dashboard_service::DashboardService, AppState},
};

use super::ApiError;

/// GET /api/v1/dashboard/stats - Role-branched dashboard
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = DashboardService::new(state.mongo.clone(), state.clock.clone());

    let body = match claims.role {
        UserRole::Child => serde_json::to_value(service.child_stats(&claims.sub).await?),
        UserRole::Parent => serde_json::to_value(service.parent_stats(&claims.sub).await?),
        UserRole::Admin => serde_json::to_value(service.admin_stats().await?),
    }
    .map_err(|e| crate::error::CoreError::Storage(anyhow::anyhow!(e)))?;

    Ok(Json(body))
}
