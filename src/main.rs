//! talkback - voice chat with a local LLM
//!
//! A Rust backend that keeps a multi-chat session, sends turns to an
//! OpenAI-compatible completion server and speaks replies through a
//! Kokoro speech service.

mod api;
mod config;
mod db;
mod llm;
mod playback;
mod runtime;
mod session;
mod state_machine;
mod tts;
mod turn;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::{CompletionClient, LoggingService, OpenAICompatibleClient};
use playback::{AudioOutput, CommandPlayer};
use runtime::{ChatController, DatabaseStorage};
use session::ConversationStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tts::{KokoroHttpClient, LoggingSpeech, SpeechClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talkback=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    let store = ConversationStore::open(DatabaseStorage::new(db), config.default_settings())?;

    let completions: Arc<dyn CompletionClient> = Arc::new(LoggingService::new(Arc::new(
        OpenAICompatibleClient::new(&config.lmstudio_base_url, config.lmstudio_api_key.clone())?,
    )));
    let speech: Arc<dyn SpeechClient> = Arc::new(LoggingSpeech::new(Arc::new(
        KokoroHttpClient::new(&config.tts_base_url)?,
    )));
    let output: Arc<dyn AudioOutput> = Arc::new(CommandPlayer::new(&config.player_command)?);

    tracing::info!(
        completions = %config.lmstudio_base_url,
        speech = %config.tts_base_url,
        model = ?config.pinned_model,
        voice = %config.preferred_voice,
        player = %config.player_command,
        "Services configured"
    );

    let controller = ChatController::new(
        store,
        completions,
        speech,
        output,
        config.controller_options(),
    );
    let state = AppState::new(controller);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("talkback server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
