//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ChatListResponse, ChatTurnRequest, ChatTurnResponse, ChatView, DraftRequest, ErrorResponse,
    ModelsResponse, RegenerateResponse, SaveEditResponse, SelectResponse, SpeakResponse,
    StopResponse, SubmitRequest, TtsRequest, TtsResponse, TurnResponse, VoiceRequest,
    VoicesResponse,
};
use super::AppState;
use crate::runtime::{ControllerError, ControllerErrorKind, SessionSnapshot};
use crate::session::Settings;
use crate::state_machine::EditState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Stateless turn and synthesis
        .route("/api/chat", post(chat_turn))
        .route("/api/tts", post(tts))
        // Catalogs
        .route("/api/models", get(list_models))
        .route("/api/voices", get(list_voices))
        // Session
        .route("/api/session", get(get_session))
        .route("/api/session/settings", put(update_settings))
        .route("/api/events", get(stream_events))
        // Chats
        .route("/api/chats", get(list_chats).post(create_chat))
        .route("/api/chats/:id", get(get_chat))
        .route("/api/chats/:id/select", post(select_chat))
        .route("/api/chats/:id/messages", post(submit_message))
        .route("/api/chats/:id/redo", post(redo))
        .route("/api/chats/:id/retry", post(retry))
        // Per-message actions
        .route("/api/chats/:id/messages/:mid/branch", post(branch))
        .route("/api/chats/:id/messages/:mid/edit", post(start_edit))
        .route("/api/chats/:id/messages/:mid/speak", post(speak))
        .route("/api/chats/:id/messages/:mid/voice", put(set_message_voice))
        .route("/api/chats/:id/messages/:mid/audio", get(get_audio))
        // Edit state
        .route("/api/edit", get(get_edit).put(update_draft))
        .route("/api/edit/cancel", post(cancel_edit))
        .route("/api/edit/save", post(save_edit))
        // Playback
        .route("/api/playback/stop", post(stop_playback))
        .with_state(state)
}

// ============================================================
// Stateless endpoints
// ============================================================

async fn chat_turn(
    State(state): State<AppState>,
    payload: Result<Json<ChatTurnRequest>, JsonRejection>,
) -> Result<Json<ChatTurnResponse>, AppError> {
    let Json(req) = payload?;
    let outcome = state
        .controller
        .complete_stateless(
            req.messages,
            req.temperature,
            req.model.as_deref(),
            req.voice.as_deref(),
        )
        .await?;
    Ok(Json(outcome.into()))
}

async fn tts(
    State(state): State<AppState>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<TtsResponse>, AppError> {
    let Json(req) = payload?;
    let speech = state
        .controller
        .synthesize(&req.text, req.voice.as_deref())
        .await?;
    Ok(Json(TtsResponse {
        audio: BASE64.encode(speech.audio.as_bytes()),
        voice: speech.voice,
    }))
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state.controller.available_models(true).await;
    Json(ModelsResponse { models })
}

async fn list_voices(State(state): State<AppState>) -> Result<Json<VoicesResponse>, AppError> {
    let catalog = state
        .controller
        .voice_catalog()
        .await
        .ok_or_else(|| AppError::Upstream("Speech service is unavailable".to_string()))?;
    let default = state.controller.resolve_voice(None).await?;
    let mut voices = catalog.voices.clone();
    voices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(VoicesResponse { voices, default }))
}

// ============================================================
// Session
// ============================================================

async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot())
}

async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<Settings>, JsonRejection>,
) -> Result<Json<Settings>, AppError> {
    let Json(settings) = payload?;
    Ok(Json(state.controller.update_settings(settings).await?))
}

async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.controller.subscribe();
    sse_stream(state.controller.snapshot(), rx)
}

// ============================================================
// Chats
// ============================================================

fn chat_view(state: &AppState, chat_id: &str) -> Result<ChatView, AppError> {
    let chat = state.controller.chat(chat_id)?;
    Ok(ChatView::new(&chat, state.controller.is_pending(chat_id)))
}

async fn list_chats(State(state): State<AppState>) -> Json<ChatListResponse> {
    Json(ChatListResponse {
        chats: state.controller.list_chats(),
    })
}

async fn create_chat(State(state): State<AppState>) -> Result<Json<ChatView>, AppError> {
    let chat = state.controller.new_chat()?;
    Ok(Json(ChatView::new(&chat, false)))
}

async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatView>, AppError> {
    Ok(Json(chat_view(&state, &id)?))
}

async fn select_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SelectResponse>, AppError> {
    let selected = state.controller.select_chat(&id)?;
    Ok(Json(SelectResponse { selected }))
}

async fn submit_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, AppError> {
    let Json(req) = payload?;
    let report = state.controller.submit_user_message(&id, &req.text).await?;
    Ok(Json(report.into()))
}

async fn redo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegenerateResponse>, AppError> {
    let turn = state.controller.redo(&id).await?;
    Ok(Json(RegenerateResponse {
        turn: turn.map(TurnResponse::from),
    }))
}

async fn retry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegenerateResponse>, AppError> {
    let turn = state.controller.retry_turn(&id).await?;
    Ok(Json(RegenerateResponse {
        turn: turn.map(TurnResponse::from),
    }))
}

// ============================================================
// Per-message actions
// ============================================================

async fn branch(
    State(state): State<AppState>,
    Path((id, mid)): Path<(String, String)>,
) -> Result<Json<ChatView>, AppError> {
    let chat = state.controller.branch(&id, &mid)?;
    Ok(Json(ChatView::new(&chat, false)))
}

async fn start_edit(
    State(state): State<AppState>,
    Path((id, mid)): Path<(String, String)>,
) -> Result<Json<EditState>, AppError> {
    Ok(Json(state.controller.start_edit(&id, &mid)?))
}

async fn speak(
    State(state): State<AppState>,
    Path((id, mid)): Path<(String, String)>,
) -> Result<Json<SpeakResponse>, AppError> {
    Ok(Json(state.controller.speak(&id, &mid).await?.into()))
}

async fn set_message_voice(
    State(state): State<AppState>,
    Path((id, mid)): Path<(String, String)>,
    payload: Result<Json<VoiceRequest>, JsonRejection>,
) -> Result<Json<SpeakResponse>, AppError> {
    let Json(req) = payload?;
    let outcome = state
        .controller
        .set_message_voice(&id, &mid, &req.voice)
        .await?;
    Ok(Json(outcome.into()))
}

async fn get_audio(
    State(state): State<AppState>,
    Path((id, mid)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let clip = state
        .controller
        .audio(&id, &mid)?
        .ok_or_else(|| AppError::NotFound(format!("No audio for message {mid}")))?;
    Ok((
        [(header::CONTENT_TYPE, "audio/wav")],
        clip.as_bytes().to_vec(),
    )
        .into_response())
}

// ============================================================
// Edit state
// ============================================================

async fn get_edit(State(state): State<AppState>) -> Json<EditState> {
    Json(state.controller.edit_state())
}

async fn update_draft(
    State(state): State<AppState>,
    payload: Result<Json<DraftRequest>, JsonRejection>,
) -> Result<Json<EditState>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.controller.update_draft(&req.draft)?))
}

async fn cancel_edit(State(state): State<AppState>) -> Result<Json<EditState>, AppError> {
    Ok(Json(state.controller.cancel_edit()?))
}

async fn save_edit(State(state): State<AppState>) -> Result<Json<SaveEditResponse>, AppError> {
    Ok(Json(state.controller.save_edit().await?.into()))
}

// ============================================================
// Playback
// ============================================================

async fn stop_playback(State(state): State<AppState>) -> Json<StopResponse> {
    Json(StopResponse {
        stopped: state.controller.stop_playback(),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Upstream(String),
    Internal(String),
}

impl From<ControllerError> for AppError {
    fn from(e: ControllerError) -> Self {
        let message = e.to_string();
        match e.kind() {
            ControllerErrorKind::Validation => AppError::BadRequest(message),
            ControllerErrorKind::NotFound => AppError::NotFound(message),
            ControllerErrorKind::Conflict => AppError::Conflict(message),
            ControllerErrorKind::Upstream => AppError::Upstream(message),
            ControllerErrorKind::Internal => {
                tracing::error!(error = %message, "Request failed");
                AppError::Internal(message)
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
