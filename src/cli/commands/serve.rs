//! HTTP API and WebSocket chat server.
//!
//! REST endpoints for dialogue search and chat administration, plus the
//! WebSocket session channel for in-character conversations.

use crate::cache::ResponseCache;
use crate::chat::{ChatEngine, ChatService, ChatSummary, TranscriptStore};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::embedding::create_embedder;
use crate::error::ReplikkError;
use crate::index::{create_index, QueryMatch};
use crate::retrieval::{RetrievalService, RetrievalSource};
use crate::session::SessionContext;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Shared application state.
struct AppState {
    retrieval: RetrievalService,
    chat_service: ChatService,
    cache: Arc<ResponseCache>,
    prompts: Prompts,
    settings: Settings,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let embedder = create_embedder(&settings).await?;
    let index = create_index(&settings)?;
    let cache = Arc::new(ResponseCache::new());

    let retrieval = RetrievalService::new(
        cache.clone(),
        embedder,
        index,
        settings.index.namespace.clone(),
        Duration::from_secs(settings.cache.search_ttl_seconds),
    );

    let transcripts = Arc::new(TranscriptStore::new(&settings.transcript_path())?);
    let chat_service = ChatService::new(
        transcripts,
        cache.clone(),
        Duration::from_secs(settings.cache.listing_ttl_seconds),
    );

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    let state = Arc::new(AppState {
        retrieval,
        chat_service,
        cache,
        prompts,
        settings,
    });

    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/search_dialogue", post(search_dialogue))
        .route("/user_chats/{user_id}", get(user_chats))
        .route(
            "/chat_history/{chat_id}",
            get(chat_history).delete(delete_chat_history),
        )
        .route("/flush_cache", post(flush_cache))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Replikk API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Search", "POST   /search_dialogue");
    Output::kv("User Chats", "GET    /user_chats/:user_id");
    Output::kv("Chat History", "GET    /chat_history/:chat_id");
    Output::kv("Delete Chat", "DELETE /chat_history/:chat_id");
    Output::kv("Flush Cache", "POST   /flush_cache");
    Output::kv("Chat Session", "WS     /ws");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchDialogueRequest {
    search_query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SearchDialogueResponse {
    response: Vec<QueryMatch>,
    source: RetrievalSource,
}

#[derive(Serialize)]
struct UserChatsResponse {
    chats: Vec<ChatSummary>,
    total: usize,
}

#[derive(Serialize)]
struct DeleteChatResponse {
    deleted: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn search_dialogue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchDialogueRequest>,
) -> impl IntoResponse {
    match state.retrieval.search(&req.search_query, req.top_k).await {
        Ok(retrieved) => Json(SearchDialogueResponse {
            response: retrieved.matches,
            source: retrieved.source,
        })
        .into_response(),
        Err(e @ ReplikkError::InvalidRequest(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn user_chats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.chat_service.user_chats(&user_id) {
        Ok(chats) => Json(UserChatsResponse {
            total: chats.len(),
            chats,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> impl IntoResponse {
    match state.chat_service.chat_history(&chat_id) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Chat not found: {}", chat_id),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn delete_chat_history(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> impl IntoResponse {
    match state.chat_service.delete_chat(&chat_id) {
        Ok(deleted) => Json(DeleteChatResponse { deleted }).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn flush_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let flushed = state.cache.flush();
    Json(serde_json::json!({
        "status": "Cache cleared",
        "entries_flushed": flushed,
    }))
}

// === WebSocket session ===

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

/// Drive one chat session over a WebSocket.
///
/// The protocol is sequential: prompt for a username, open a chat window,
/// then treat every text frame as one conversation turn. Errors are sent
/// in-band; only transport failures end the session.
async fn handle_session(mut socket: WebSocket, state: Arc<AppState>) {
    let mut session = SessionContext::new();
    debug!("Session {} opened", session.session_id());

    if send_text(&mut socket, "Enter username: ".to_string())
        .await
        .is_err()
    {
        return;
    }

    let username = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => break text.trim().to_string(),
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return,
        }
    };

    let chat_id = match state.chat_service.create_chat(&username) {
        Ok(id) => id,
        Err(e) => {
            let _ = send_text(&mut socket, format!("Error: {}", e)).await;
            return;
        }
    };

    let mut engine = ChatEngine::new(
        &state.settings.chat.model,
        state.settings.chat.history_turns,
    )
    .with_prompts(state.prompts.clone());

    if send_text(&mut socket, "Enter any movie dialogue".to_string())
        .await
        .is_err()
    {
        return;
    }

    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(_) => break,
        };

        if session.needs_retrieval() {
            match state
                .retrieval
                .search(&message, state.settings.chat.search_top_k)
                .await
            {
                Ok(retrieved) => {
                    session.resolve_from(&retrieved.matches);
                }
                Err(e) => {
                    if send_text(&mut socket, format!("Error: {}", e)).await.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        if let Some(title) = session.movie_title() {
            if send_text(&mut socket, format!("movie: {}", title))
                .await
                .is_err()
            {
                break;
            }
        }

        let movie_title = session.movie_title().unwrap_or_default().to_string();
        let dialogue_context = session.dialogue_context().unwrap_or_default().to_string();

        match engine.respond(&movie_title, &dialogue_context, &message).await {
            Ok(response) => {
                if let Err(e) = state.chat_service.append_turn(&chat_id, &message, &response) {
                    warn!("Failed to record turn for chat {}: {}", chat_id, e);
                }
                if send_text(&mut socket, response).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                if send_text(&mut socket, format!("Error: {}", e)).await.is_err() {
                    break;
                }
            }
        }
    }

    debug!("Session {} closed", session.session_id());
}

async fn send_text(
    socket: &mut WebSocket,
    text: String,
) -> std::result::Result<(), axum::Error> {
    socket.send(Message::Text(text.into())).await
}
