use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Value, json};

use registrar_api::Registration;

use super::AppState;
use crate::error::GatewayError;
use crate::validate;

// ═══════════════════════════════════════════════════════════════
//  GET /
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_root() -> impl IntoResponse {
    Json(json!({ "message": "Tournament registrar API is running" }))
}

// ═══════════════════════════════════════════════════════════════
//  POST /registrar
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::Body(e.body_text()))?;
    let registration = validate::registration(&body)?;

    let outcome = state.coordinator.register(registration).await?;
    if !outcome.announced {
        tracing::debug!(id = %outcome.stored.id, "responding without announcement");
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "data": outcome.stored })),
    )
        .into_response())
}

// ═══════════════════════════════════════════════════════════════
//  POST /upload-data
// ═══════════════════════════════════════════════════════════════

/// Bulk ingest. The whole batch is validated before anything is stored;
/// then items are registered one by one. A store failure stops the batch
/// and reports how many items were already stored.
pub(crate) async fn handle_upload(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::Body(e.body_text()))?;
    let items = match body {
        Value::Array(items) => items,
        single => vec![single],
    };

    let registrations = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            validate::registration(item).map_err(|source| GatewayError::BatchItem { index, source })
        })
        .collect::<Result<Vec<Registration>, _>>()?;

    let mut stored = Vec::with_capacity(registrations.len());
    for registration in registrations {
        match state.coordinator.register(registration).await {
            Ok(outcome) => stored.push(outcome.stored),
            Err(e) => {
                tracing::error!(error = %e, inserted = stored.len(), "bulk upload interrupted");
                let body = json!({ "ok": false, "error": e.to_string(), "inserted": stored.len() });
                return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response());
            }
        }
    }

    tracing::info!(count = stored.len(), "bulk upload stored");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "message": format!("Inserted {} tournaments", stored.len()),
            "data": stored,
        })),
    )
        .into_response())
}

// ═══════════════════════════════════════════════════════════════
//  GET /fetch, /fetch-tournaments
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_list(State(state): State<AppState>) -> Result<Response, GatewayError> {
    let records = state.coordinator.list().await?;
    Ok(Json(records).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  GET /status
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.coordinator.stats();
    Json(json!({
        "broker": state.coordinator.broker_state(),
        "topic": state.coordinator.topic(),
        "stored": stats.stored,
        "announced": stats.announced,
        "announceFailures": stats.announce_failures,
    }))
}
