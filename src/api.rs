use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{FixedOffset, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::content::ContentAccessor;
use crate::error::UnlockError;
use crate::models::{Answer, Module, UnlockReceipt, UserProgress};
use crate::progress::{calculate_progress, progress_for, ProgressData};
use crate::quiz::{grade, QuizOutcome};
use crate::store::ProgressStore;
use crate::streak::StreakUpdate;
use crate::unlock::{module_views, unlock_price, ModuleView, UnlockCosts};

#[derive(Clone)]
pub struct ApiState {
    pub content: Arc<ContentAccessor>,
    pub store: Arc<ProgressStore>,
    pub costs: UnlockCosts,
}

pub fn app_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/modules", get(list_modules))
        .route("/api/modules/:module_id", get(get_module))
        .route("/api/modules/:module_id/lessons/:lesson_id", get(get_lesson))
        .route("/api/modules/:module_id/quiz", get(get_quiz))
        .route("/api/users/:user_id/login", post(login))
        .route("/api/users/:user_id/dashboard", get(dashboard))
        .route("/api/users/:user_id/lessons/:lesson_id/complete", post(complete_lesson))
        .route("/api/users/:user_id/quizzes/:module_id", post(submit_quiz))
        .route("/api/users/:user_id/unlock/:module_id", post(unlock_module))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

enum ApiError {
    NotFound(&'static str),
    Locked(String),
    Unavailable(&'static str),
    Unlock(UnlockError),
}

impl From<UnlockError> for ApiError {
    fn from(e: UnlockError) -> Self {
        ApiError::Unlock(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            ApiError::Locked(module_id) => (
                StatusCode::FORBIDDEN,
                format!("module {} is locked", module_id),
            ),
            ApiError::Unavailable(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{} is temporarily unavailable", what),
            ),
            ApiError::Unlock(e) => {
                let status = match e {
                    UnlockError::InsufficientPoints { .. } => StatusCode::PAYMENT_REQUIRED,
                    UnlockError::AlreadyUnlocked(_) => StatusCode::CONFLICT,
                    UnlockError::NotPurchasable(_) => StatusCode::BAD_REQUEST,
                    UnlockError::UnknownModule(_) => StatusCode::NOT_FOUND,
                    UnlockError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn list_modules(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.content.modules().await.to_vec())
}

async fn get_module(
    State(state): State<ApiState>,
    Path(module_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state.content.module(&module_id).await.ok_or(ApiError::NotFound("module"))?;
    Ok(Json(module))
}

async fn get_lesson(
    State(state): State<ApiState>,
    Path((module_id, lesson_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let lesson = state
        .content
        .lesson(&module_id, &lesson_id)
        .await
        .ok_or(ApiError::NotFound("lesson"))?;
    Ok(Json(lesson))
}

async fn get_quiz(
    State(state): State<ApiState>,
    Path(module_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = state.content.quiz(&module_id).await.ok_or(ApiError::NotFound("quiz"))?;
    Ok(Json(quiz))
}

/// Identity comes from the external provider; only its claims are stored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: Option<String>,
    display_name: Option<String>,
    /// Client offset from UTC, so streak days follow the user's calendar.
    utc_offset_minutes: Option<i32>,
}

async fn login(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Json(payload): Json<LoginRequest>,
) -> Json<StreakUpdate> {
    let offset = payload
        .utc_offset_minutes
        .and_then(|m| FixedOffset::east_opt(m.saturating_mul(60)));

    let (_, update) = state
        .store
        .update(&user_id, |user| {
            if payload.email.is_some() {
                user.email = payload.email;
            }
            if payload.display_name.is_some() {
                user.display_name = payload.display_name;
            }
            match offset {
                Some(tz) => user.apply_login(Utc::now().with_timezone(&tz)),
                None => user.apply_login(Utc::now()),
            }
        })
        .await;
    Json(update)
}

async fn views_for(state: &ApiState, user: &UserProgress) -> (ProgressData, Vec<ModuleView>) {
    let modules = state.content.modules().await;
    let progress = progress_for(&state.content, user).await;
    let views = module_views(&modules, &progress, &user.unlocked_modules, &state.costs);
    (progress, views)
}

/// The real manifest, for routes that change a user's record. Placeholder
/// content is never credited.
async fn live_modules(state: &ApiState) -> Result<Arc<[Module]>, ApiError> {
    state.content.try_modules().await.map_err(|e| {
        warn!("refusing progress update, manifest unavailable: {}", e);
        ApiError::Unavailable("course content")
    })
}

fn user_views(modules: &[Module], user: &UserProgress, costs: &UnlockCosts) -> Vec<ModuleView> {
    let progress = calculate_progress(modules, &user.completed_concepts, &user.completed_quizzes);
    module_views(modules, &progress, &user.unlocked_modules, costs)
}

fn ensure_open(
    modules: &[Module],
    user: &UserProgress,
    module_id: &str,
    costs: &UnlockCosts,
) -> Result<(), ApiError> {
    let view = user_views(modules, user, costs)
        .into_iter()
        .find(|v| v.id == module_id)
        .ok_or(ApiError::NotFound("module"))?;
    if view.locked {
        return Err(ApiError::Locked(view.id));
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Dashboard {
    progress: ProgressData,
    modules: Vec<ModuleView>,
    total_points: u32,
    learning_streak: u32,
}

async fn dashboard(State(state): State<ApiState>, Path(user_id): Path<String>) -> Json<Dashboard> {
    let user = state.store.load(&user_id).await;
    let (progress, modules) = views_for(&state, &user).await;
    Json(Dashboard {
        progress,
        modules,
        total_points: user.total_points,
        learning_streak: user.learning_streak,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionResponse {
    newly_completed: bool,
    total_points: u32,
    progress: ProgressData,
}

async fn complete_lesson(
    State(state): State<ApiState>,
    Path((user_id, lesson_id)): Path<(String, String)>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let modules = live_modules(&state).await?;
    let (module_id, lesson) = modules
        .iter()
        .find_map(|m| m.lesson(&lesson_id).map(|l| (m.id.clone(), l.clone())))
        .ok_or(ApiError::NotFound("lesson"))?;

    // The gate is checked on the same snapshot that gets written.
    let (user, newly_completed) = state
        .store
        .try_update(&user_id, |user| {
            ensure_open(&modules, user, &module_id, &state.costs)?;
            Ok::<_, ApiError>(user.complete_lesson(&lesson))
        })
        .await?;
    let progress = calculate_progress(&modules, &user.completed_concepts, &user.completed_quizzes);

    Ok(Json(CompletionResponse {
        newly_completed,
        total_points: user.total_points,
        progress,
    }))
}

#[derive(Deserialize)]
struct QuizSubmission {
    answers: Vec<Answer>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuizResponse {
    #[serde(flatten)]
    outcome: QuizOutcome,
    first_pass: bool,
    total_points: u32,
}

async fn submit_quiz(
    State(state): State<ApiState>,
    Path((user_id, module_id)): Path<(String, String)>,
    Json(submission): Json<QuizSubmission>,
) -> Result<Json<QuizResponse>, ApiError> {
    let modules = live_modules(&state).await?;
    let quiz = state.content.quiz(&module_id).await.ok_or(ApiError::NotFound("quiz"))?;
    if quiz.placeholder {
        return Err(ApiError::Unavailable("quiz"));
    }

    let outcome = grade(&quiz.content, &submission.answers);
    let (user, first_pass) = state
        .store
        .try_update(&user_id, |user| {
            ensure_open(&modules, user, &module_id, &state.costs)?;
            // Only passing attempts are recorded.
            let first = outcome.passed
                && user.record_quiz(&quiz.info.id, outcome.score, quiz.info.points);
            Ok::<_, ApiError>(first)
        })
        .await?;

    Ok(Json(QuizResponse {
        outcome,
        first_pass,
        total_points: user.total_points,
    }))
}

async fn unlock_module(
    State(state): State<ApiState>,
    Path((user_id, module_id)): Path<(String, String)>,
) -> Result<Json<UnlockReceipt>, ApiError> {
    let modules = live_modules(&state).await?;
    let user = state.store.load(&user_id).await;
    let views = user_views(&modules, &user, &state.costs);
    let view = views
        .iter()
        .find(|v| v.id == module_id)
        .ok_or_else(|| UnlockError::UnknownModule(module_id.clone()))?;
    // The balance is checked again atomically by the store.
    let cost = unlock_price(view, &state.costs)?;

    let receipt = state.store.unlock_module(&user_id, &module_id, cost).await?;
    Ok(Json(receipt))
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
