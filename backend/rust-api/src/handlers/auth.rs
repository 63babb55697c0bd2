use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::{JwtClaims, JwtService, ACCESS_TOKEN_COOKIE},
    models::user::{LoginRequest, RegisterRequest, UserRole},
    services::{auth_service::AuthService, AppState},
};

use super::ApiError;

fn auth_service(state: &AppState) -> AuthService {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    AuthService::new(
        state.mongo.clone(),
        state.redis.clone(),
        jwt_service,
        state.clock.clone(),
    )
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
}

fn access_token_cookie(token: String) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::hours(1))
        .build()
}

/// POST /api/v1/auth/register - Register a new child account
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    tracing::info!("Registering new user: {}", req.email);

    let service = auth_service(&state);
    let response = service.register(req, false).await?;

    let jar = jar.add(access_token_cookie(response.access_token.clone()));
    Ok((StatusCode::CREATED, jar, Json(response)))
}

/// POST /api/v1/admin/users/register - Register a parent or admin account
/// (admin only)
pub async fn register_managed(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    tracing::info!("Admin {} registering managed account: {}", claims.sub, req.email);

    let service = auth_service(&state);
    let response = service
        .register(req, claims.role == UserRole::Admin)
        .await?;

    // No cookie here: the admin stays logged in as themselves.
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login - Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let ip = client_ip(&headers);
    tracing::info!("Login attempt for user: {}", req.email);

    let service = auth_service(&state);
    let response = service.login(req, ip.as_deref()).await?;

    let jar = jar.add(access_token_cookie(response.access_token.clone()));
    Ok((StatusCode::OK, jar, Json(response)))
}

/// POST /api/v1/auth/logout - Clear the access token cookie
pub async fn logout(
    Extension(claims): Extension<JwtClaims>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("User {} logged out", claims.sub);

    let cookie = Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .build();

    Ok((StatusCode::NO_CONTENT, jar.add(cookie)))
}

/// GET /api/v1/auth/me - Current user (protected)
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = auth_service(&state);
    let user = service.me(&claims.sub).await?;
    Ok(Json(user))
}

/// GET /api/v1/auth/csrf-token - Get CSRF token for state-changing requests
/// Returns the token in both the JSON body and a cookie
pub async fn get_csrf_token() -> impl IntoResponse {
    use crate::middlewares::csrf::{generate_csrf_token, set_csrf_cookie};
    use axum::response::Response;

    tracing::debug!("Generating CSRF token");

    let token = generate_csrf_token();
    let json_response = Json(serde_json::json!({ "csrf_token": token }));

    let response: Response = (StatusCode::OK, json_response).into_response();
    set_csrf_cookie(response, &token)
}
