use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::attempt::SubmitAnswerRequest,
    models::catalog::{AnswerOption, Question},
    services::{catalog_service::CatalogService, quiz_service::QuizService, AppState},
};

use super::ApiError;

/// Question as served to quiz takers. The recorded correct option never
/// leaves the server.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub order: i32,
    pub options: Vec<AnswerOption>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.to_hex(),
            text: question.text.clone(),
            order: question.order,
            options: question.options.clone(),
        }
    }
}

fn quiz_service(state: &AppState) -> QuizService {
    QuizService::new(state.mongo.clone(), state.clock.clone())
}

/// GET /api/v1/lessons/{lesson_id}/quiz - The active quiz for a lesson,
/// with its questions
pub async fn get_lesson_quiz(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let catalog = CatalogService::new(state.mongo.clone());
    let quiz = catalog.get_quiz_for_lesson(&lesson_id).await?;
    let questions = catalog.list_questions(&quiz.id).await?;
    let views: Vec<QuestionView> = questions.iter().map(QuestionView::from).collect();

    Ok(Json(json!({
        "quiz": quiz,
        "questions": views,
    })))
}

/// POST /api/v1/quizzes/{quiz_id}/attempts - Start a new attempt
pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let attempt = quiz_service(&state)
        .start_attempt(&claims.sub, &quiz_id)
        .await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// GET /api/v1/quizzes/{quiz_id}/attempts - The caller's attempts on a
/// quiz, oldest first
pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let attempts = quiz_service(&state)
        .list_attempts(&claims.sub, &quiz_id)
        .await?;
    Ok(Json(attempts))
}

/// POST /api/v1/attempts/{attempt_id}/answers - Record one answer
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let response = quiz_service(&state)
        .submit_answer(&claims.sub, &attempt_id, &req)
        .await?;
    Ok(Json(response))
}

/// POST /api/v1/attempts/{attempt_id}/complete - Score and close the
/// attempt
pub async fn complete_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = quiz_service(&state)
        .complete_attempt(&claims.sub, &attempt_id)
        .await?;
    Ok(Json(result))
}
