//! Axum route handlers for the Interview API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::{AnswerEvaluation, FinalReport, TranscriptEntry};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub candidate_name: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub first_question: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Uuid,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub next_question: Option<String>,
    pub evaluation: AnswerEvaluation,
    pub is_complete: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /interview/start
///
/// Opens a session and returns the first question.
pub async fn handle_start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let candidate_name = request.candidate_name.trim();
    if candidate_name.is_empty() {
        return Err(AppError::Validation(
            "candidate_name cannot be empty".to_string(),
        ));
    }

    let first_question = state
        .questions
        .first()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("question bank is empty")))?
        .text
        .clone();

    let session = state.sessions.create(candidate_name);
    info!("Started interview session {} for {}", session.id, session.candidate_name);

    Ok(Json(StartResponse {
        session_id: session.id,
        first_question,
    }))
}

/// POST /interview/chat
///
/// Scores the answer to the current question, records it, and returns the
/// next question. A failed evaluation is recorded with score 0 and the
/// interview still advances.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let session = state
        .sessions
        .get(request.session_id)
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    let current_index = session.current_index;
    let question = state
        .questions
        .get(current_index)
        .ok_or_else(|| AppError::Validation("Interview complete".to_string()))?
        .text
        .clone();

    let evaluation = state
        .evaluator
        .evaluate_answer(&question, &request.answer)
        .await;
    info!(
        "Session {} question {} scored {}/5",
        session.id,
        current_index + 1,
        evaluation.score
    );

    let updated = state.sessions.append(
        session.id,
        current_index,
        TranscriptEntry {
            question,
            answer: request.answer,
            evaluation: evaluation.clone(),
        },
    )?;

    let next_question = state
        .questions
        .get(updated.current_index)
        .map(|q| q.text.clone());
    let is_complete = next_question.is_none();

    Ok(Json(ChatResponse {
        next_question,
        evaluation,
        is_complete,
    }))
}

/// GET /interview/report/:session_id
///
/// Synthesizes the hiring report from everything answered so far.
pub async fn handle_report(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<FinalReport>, AppError> {
    let session = state
        .sessions
        .get(session_id)
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if session.transcript.is_empty() {
        return Err(AppError::Validation(
            "No answers recorded for this session yet".to_string(),
        ));
    }

    let report = state.evaluator.synthesize_report(&session.transcript).await?;
    info!(
        "Report for session {}: {} ({}/100) after {}s",
        session.id,
        report.overall_recommendation,
        report.proficiency_score,
        session.elapsed().num_seconds()
    );

    Ok(Json(report))
}
