use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use doodle_contracts::wire::{GenerateBody, GenerateReply};
use doodle_engine::Generator;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub fn router(generator: Arc<Generator>, body_limit: usize) -> Router {
    Router::new()
        .route("/api/generate", post(handle_generate))
        .route("/healthz", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(generator)
}

pub async fn serve(generator: Arc<Generator>, bind: SocketAddr, body_limit: usize) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(
        addr = %bind,
        provider = %generator.provider(),
        configured = generator.is_configured(),
        body_limit,
        "listening"
    );
    axum::serve(listener, router(generator, body_limit))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn handle_generate(
    State(generator): State<Arc<Generator>>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return reply(
                StatusCode::BAD_REQUEST,
                GenerateReply::Error {
                    error: format!("Invalid request body: {}", rejection.body_text()),
                },
            )
        }
    };

    // Dropping the handler future (client gone) cancels the generation.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let outcome = generator.generate_with_cancel(&body, &cancel).await;
    let (status, body) = GenerateReply::from_outcome(&outcome);
    reply(
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}

async fn health(State(generator): State<Arc<Generator>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": generator.provider(),
        "configured": generator.is_configured(),
    }))
}

fn reply(status: StatusCode, body: GenerateReply) -> Response {
    (status, Json(body)).into_response()
}
