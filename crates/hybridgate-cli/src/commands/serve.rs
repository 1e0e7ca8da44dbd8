use std::process::ExitCode;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hybridgate_core::{Gateway, GatewayReply};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cli::ServeArgs;
use crate::error::CliError;

pub async fn run(args: &ServeArgs, gateway: Arc<Gateway>) -> Result<ExitCode, CliError> {
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    let sweeper = gateway.spawn_cache_sweeper();
    info!(addr = %args.bind, sweeper = sweeper.is_some(), "listening");

    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| CliError::Server(error.to_string()))?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("server stopped");
    Ok(ExitCode::SUCCESS)
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/usage", get(usage))
        .route("/metrics", get(metrics))
        .route("/v1/lookup/:category", post(lookup))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(error = %error, "failed to listen for shutdown signal");
    }
}

async fn health(State(gateway): State<Arc<Gateway>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "circuit": gateway.breaker().state(),
    }))
}

async fn usage(State(gateway): State<Arc<Gateway>>) -> Response {
    Json(gateway.usage()).into_response()
}

async fn metrics(State(gateway): State<Arc<Gateway>>) -> Response {
    Json(gateway.metrics()).into_response()
}

async fn lookup(
    State(gateway): State<Arc<Gateway>>,
    Path(category): Path<String>,
    body: Bytes,
) -> Response {
    // A body that is not JSON is rejected by validation like any non-object.
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);

    let category = match gateway.resolve_category(&category, &payload) {
        Ok(category) => category,
        Err(reply) => return reply_response(&reply),
    };

    // Detached so a client disconnect does not abort an in-flight premium call.
    let reply = Arc::clone(&gateway).spawn_handle(category, payload).await;
    reply_response(&reply)
}

fn reply_response(reply: &GatewayReply) -> Response {
    let status = StatusCode::from_u16(reply.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match reply.to_json() {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => {
            error!(error = %error, "failed to serialize reply");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
