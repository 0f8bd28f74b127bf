use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{DEFAULT_QUIZ_SIZE, Genre},
    quiz::{CompletedQuiz, NewQuestion},
    state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizParams {
    genre: Genre,
    limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingParams {
    limit: Option<usize>,
}

pub async fn submit_question_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewQuestion>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.quiz.submit_question(payload).await?;

    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Path(question_id): Path<String>,
    Json(payload): Json<VotePayload>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.quiz.vote_to_approve(&question_id, &payload.user_id).await?;

    Ok(Json(question))
}

pub async fn quiz_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QuizParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_QUIZ_SIZE);
    let questions = state.quiz.fetch_approved_questions(params.genre, limit).await?;

    Ok(Json(questions))
}

pub async fn pending_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PendingParams>,
) -> Result<impl IntoResponse, AppError> {
    let questions = state.quiz.fetch_pending_questions(params.limit).await?;

    Ok(Json(questions))
}

pub async fn result_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CompletedQuiz>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.quiz.submit_quiz_result(payload).await?;

    Ok((StatusCode::CREATED, Json(result)))
}
