//! Request handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use herald_core::{Environment, RecordId};
use herald_dispatch::OutboxReceipt;
use herald_store::{NotificationEvent, RegisterDevice};
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::origin::RequestOrigin;
use crate::server::AppState;

/// Largest page `GET /users/{id}/notifications` returns.
pub const MAX_HISTORY_LIMIT: u32 = 100;
const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// `POST /devices/apns` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceBody {
    /// Owning user.
    pub user_id: String,
    /// Device token.
    pub token: String,
    /// Platform name (defaults to iOS).
    #[serde(default)]
    pub platform: Option<String>,
    /// Explicit environment.
    #[serde(default)]
    pub environment: Option<String>,
    /// App identifier override.
    #[serde(default)]
    pub topic: Option<String>,
}

/// `POST /devices/apns` response.
#[derive(Debug, Serialize)]
pub struct RegisterDeviceResponse {
    /// Always `true`.
    pub ok: bool,
    /// Registration id.
    pub id: RecordId,
    /// Whether a new registration was created.
    pub created: bool,
    /// Environment the token was stored under.
    pub environment: Environment,
}

/// `POST /notify` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyBody {
    /// Sender.
    pub from_user_id: String,
    /// Recipient.
    pub to_user_id: String,
    /// Message text; a default is used when empty.
    #[serde(default)]
    pub message: Option<String>,
}

/// Query string for the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Page size.
    pub limit: Option<u32>,
}

/// `GET /users/{id}/notifications` response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Events newest first.
    pub events: Vec<NotificationEvent>,
}

fn invalid_body(rejection: &JsonRejection) -> ApiError {
    ApiError::InvalidParams {
        message: rejection.body_text(),
    }
}

/// POST /devices/apns
pub async fn register_device(
    State(state): State<AppState>,
    origin: RequestOrigin,
    body: Result<Json<RegisterDeviceBody>, JsonRejection>,
) -> Result<Json<RegisterDeviceResponse>, ApiError> {
    let Json(body) = body.map_err(|e| invalid_body(&e))?;
    let request = RegisterDevice {
        user_id: body.user_id,
        token: body.token,
        platform: body.platform,
        environment: body.environment,
        topic: body.topic,
    };

    let registered = state.registry.register(request, origin.as_deref()).await?;
    Ok(Json(RegisterDeviceResponse {
        ok: true,
        id: registered.id,
        created: registered.created,
        environment: registered.environment,
    }))
}

/// POST /notify
pub async fn notify(
    State(state): State<AppState>,
    body: Result<Json<NotifyBody>, JsonRejection>,
) -> Result<Json<OutboxReceipt>, ApiError> {
    let Json(body) = body.map_err(|e| invalid_body(&e))?;
    let receipt = state
        .outbox
        .record_and_notify(&body.from_user_id, &body.to_user_id, body.message.as_deref())
        .await?;
    Ok(Json(receipt))
}

/// GET /users/{user_id}/notifications
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidParams {
        message: e.body_text(),
    })?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let events = state.outbox.history(&user_id, limit).await?;
    Ok(Json(HistoryResponse { events }))
}
