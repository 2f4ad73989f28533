use crate::agent::{process_message, Agent};
use crate::config::Config;
use crate::error::TtsError;
use crate::protocol::{ChatRequest, ChatResponse, ErrorBody, TtsRequest, TtsResponse};
use crate::session::SessionStore;
use crate::tts::{SpeechRequest, DEFAULT_LANGUAGE_CODE};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Every browser client shares one user identity; sessions tell them apart.
pub const USER_ID: &str = "web_user";

const INDEX_HTML: &str = include_str!("../static/index.html");

struct ServerState {
    config: Config,
    sessions: SessionStore,
    http: Client,
}

type ServerResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

enum ApiError {
    BadRequest(&'static str),
    InvalidBody(JsonRejection),
    Tts(TtsError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            ApiError::InvalidBody(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Tts(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub async fn run(config: Config) -> ServerResult<()> {
    if config.agent.api_key.is_none() {
        warn!("GOOGLE_API_KEY not set; chat replies will report the missing key");
    }

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!(listen = %config.listen, model = %config.agent.model, "voicebot server listening");
    axum::serve(listener, router(config)).await?;

    Ok(())
}

fn router(config: Config) -> Router {
    let state = Arc::new(ServerState {
        config,
        sessions: SessionStore::new(),
        http: Client::new(),
    });

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/tts", post(tts))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload?;
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is empty"));
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let session = state.sessions.get_or_create(USER_ID, &session_id).await;

    let agent = Agent::new(state.http.clone(), state.config.agent.clone());
    let response = process_message(
        agent,
        &session,
        &payload.message,
        state.config.agent_timeout,
    )
    .await;

    Ok(Json(ChatResponse {
        response,
        session_id,
    }))
}

async fn tts(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<TtsResponse>, ApiError> {
    let Json(payload) = payload?;
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text is empty"));
    }

    let provider = payload.provider.unwrap_or_default();
    let request = SpeechRequest {
        text: &payload.text,
        language_code: payload
            .language_code
            .as_deref()
            .unwrap_or(DEFAULT_LANGUAGE_CODE),
        voice_name: payload.voice_name.as_deref(),
    };

    let audio = provider
        .synthesize(&state.http, &state.config.tts, &request)
        .await
        .map_err(|err| {
            error!(provider = provider.name(), error = %err, "speech synthesis failed");
            ApiError::Tts(err)
        })?;

    Ok(Json(TtsResponse {
        audio: STANDARD.encode(audio),
        format: "mp3".to_string(),
    }))
}
