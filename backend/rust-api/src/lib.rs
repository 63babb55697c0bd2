use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS configuration for the browser frontend
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        // Auth endpoints (mixed: some public, some protected)
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        // Catalog and library (read-only, authenticated)
        .nest(
            "/api/v1",
            catalog_routes()
                .merge(library_routes())
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        // Learner progress, goals, quizzes, dashboard (state-changing)
        .nest(
            "/api/v1",
            progress_routes()
                .merge(quiz_routes())
                .merge(account_routes())
                .route("/dashboard/stats", get(handlers::dashboard::get_stats))
                .layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/v1/admin",
            admin_routes(app_state.clone())
                .layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn catalog_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/categories", get(handlers::catalog::list_categories))
        .route("/paths", get(handlers::catalog::list_paths))
        .route("/paths/featured", get(handlers::catalog::featured_paths))
        .route(
            "/paths/recommended",
            get(handlers::catalog::recommended_paths),
        )
        .route("/paths/{path_id}", get(handlers::catalog::get_path))
        .route(
            "/paths/{path_id}/lessons",
            get(handlers::catalog::list_path_lessons),
        )
        .route("/lessons/{lesson_id}", get(handlers::catalog::get_lesson))
        .route(
            "/lessons/{lesson_id}/quiz",
            get(handlers::quizzes::get_lesson_quiz),
        )
        .route("/achievements", get(handlers::catalog::list_achievements))
}

fn library_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/library/stories", get(handlers::library::list_stories))
        .route(
            "/library/stories/{story_id}",
            get(handlers::library::get_story),
        )
        .route("/library/prayers", get(handlers::library::list_prayers))
        .route(
            "/library/prayers/{prayer_id}",
            get(handlers::library::get_prayer),
        )
        .route("/library/songs", get(handlers::library::list_songs))
        .route("/library/songs/{song_id}", get(handlers::library::get_song))
        .route(
            "/library/activities",
            get(handlers::library::list_activities),
        )
        .route(
            "/library/activities/{activity_id}",
            get(handlers::library::get_activity),
        )
}

fn progress_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/progress/lessons/{lesson_id}/activity",
            post(handlers::progress::record_activity),
        )
        .route(
            "/progress/lessons/{lesson_id}/complete",
            post(handlers::progress::complete_lesson),
        )
        .route(
            "/progress/lessons/{lesson_id}",
            get(handlers::progress::get_lesson_progress),
        )
        .route("/progress/paths", get(handlers::progress::list_path_progress))
        .route(
            "/progress/paths/{path_id}",
            get(handlers::progress::get_path_progress),
        )
        .route(
            "/progress/paths/{path_id}/recompute",
            post(handlers::progress::recompute_path),
        )
        .route("/progress/streak", get(handlers::progress::get_streak))
        .route(
            "/progress/goals/today",
            get(handlers::progress::get_today_goal),
        )
        .route(
            "/progress/goals/{date}",
            get(handlers::progress::get_goal_for_date),
        )
}

fn quiz_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/quizzes/{quiz_id}/attempts",
            post(handlers::quizzes::start_attempt).get(handlers::quizzes::list_attempts),
        )
        .route(
            "/attempts/{attempt_id}/answers",
            post(handlers::quizzes::submit_answer),
        )
        .route(
            "/attempts/{attempt_id}/complete",
            post(handlers::quizzes::complete_attempt),
        )
}

fn account_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/users/me/profile",
            get(handlers::accounts::get_profile).put(handlers::accounts::update_profile),
        )
        .route(
            "/users/me/settings",
            get(handlers::accounts::get_settings).put(handlers::accounts::update_settings),
        )
        .route(
            "/users/me/children",
            get(handlers::accounts::list_children).post(handlers::accounts::link_child),
        )
        .route(
            "/users/me/children/{child_id}",
            delete(handlers::accounts::unlink_child),
        )
        .route(
            "/users/me/children/{child_id}/stats",
            get(handlers::accounts::child_stats),
        )
        .route(
            "/users/me/achievements",
            get(handlers::accounts::list_my_achievements),
        )
}

fn admin_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/achievements/award",
            post(handlers::accounts::award_achievement),
        )
        .route(
            "/users/register",
            post(handlers::auth::register_managed),
        )
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
}

fn auth_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Public routes with rate limiting
    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::register_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    // CSRF token endpoint (public, no auth required)
    let csrf_route = Router::new().route("/csrf-token", get(handlers::auth::get_csrf_token));

    let public_routes = register_route.merge(login_route).merge(csrf_route);

    // Protected routes (require JWT auth + CSRF protection)
    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
