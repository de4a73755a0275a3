//! HTTP surface: the chat page, the chat endpoint, and two read-only views.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | HTML chat widget |
//! | `POST /chat` | `{message, user_id}` → `{response}` |
//! | `GET /health` | catalog and preference counts |
//! | `GET /preferences/{user_id}` | a user's stored preferences |

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::chat::Advisor;
use crate::config::BarkeepConfig;
use crate::context::{AdvisorContext, Health};
use crate::llm::{CompletionClient, OpenAiClient};
use crate::preferences::UserPreferences;

const CHAT_PAGE: &str = include_str!("../assets/chat.html");

const DEFAULT_USER_ID: &str = "user1";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    #[serde(flatten)]
    counts: Health,
}

pub fn router(advisor: Advisor) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/chat", post(chat))
        .route("/health", get(health))
        .route("/preferences/{user_id}", get(preferences))
        .with_state(advisor)
}

async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

async fn chat(State(advisor): State<Advisor>, Json(request): Json<ChatRequest>) -> Response {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "message must not be empty".into(),
            }),
        )
            .into_response();
    }

    let span = tracing::info_span!(
        "chat",
        request_id = %uuid::Uuid::now_v7(),
        user_id = %request.user_id
    );

    async move {
        tracing::info!(message = %request.message, "message received");
        let turn = advisor.handle(&request.user_id, &request.message).await;
        tracing::info!(
            hits = turn.hits.len(),
            response_len = turn.response.len(),
            "response generated"
        );
        Json(ChatResponse {
            response: turn.response,
        })
        .into_response()
    }
    .instrument(span)
    .await
}

async fn health(State(advisor): State<Advisor>) -> Json<HealthBody> {
    let counts = advisor.context().health();
    let status = if counts.catalog_index_size > 0 {
        "ok"
    } else {
        "index_not_ready"
    };
    Json(HealthBody { status, counts })
}

async fn preferences(
    State(advisor): State<Advisor>,
    Path(user_id): Path<String>,
) -> Json<UserPreferences> {
    Json(advisor.context().preferences_for(&user_id))
}

/// Load all state, then serve HTTP until ctrl-c, then flush preferences.
pub async fn serve(config: BarkeepConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let llm: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(&config.llm)?);

    // model load and a possible index build are CPU-heavy
    let context = tokio::task::spawn_blocking(move || AdvisorContext::open(config))
        .await
        .context("startup task failed")?
        .context("failed to initialize advisor")?;
    let context = Arc::new(context);

    let health = context.health();
    tracing::info!(
        catalog = health.catalog_records,
        preference_users = health.preference_users,
        "advisor ready"
    );

    let app = router(Advisor::new(Arc::clone(&context), llm));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;

    tokio::task::spawn_blocking(move || context.shutdown())
        .await
        .context("shutdown task failed")??;
    Ok(())
}
