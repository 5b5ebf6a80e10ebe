use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use byrd_core::{Notification, NotificationPreferences};
use byrd_notify::PreferencesUpdate;
use chrono::Utc;
use futures_util::Stream;
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use uuid::Uuid;

use crate::{error::AppError, middleware::CurrentMerchant, state::AppState};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route(
            "/api/notifications/preferences",
            get(get_preferences).put(update_preferences),
        )
        .route("/api/notifications/stream", get(stream_notifications))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let notifications = state
        .notifications
        .list_notifications(merchant_id, query.unread_only, limit)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(notifications))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    state
        .notifications
        .mark_read(notification_id, merchant_id, Utc::now())
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Notification {} not found", notification_id)))
}

async fn load_preferences(state: &AppState, merchant_id: Uuid) -> Result<NotificationPreferences, AppError> {
    Ok(state
        .notifications
        .get_preferences(merchant_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .unwrap_or_else(|| NotificationPreferences::default_for(merchant_id)))
}

async fn get_preferences(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
) -> Result<Json<NotificationPreferences>, AppError> {
    Ok(Json(load_preferences(&state, merchant_id).await?))
}

async fn update_preferences(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Json(req): Json<PreferencesUpdate>,
) -> Result<Json<NotificationPreferences>, AppError> {
    let current = load_preferences(&state, merchant_id).await?;
    let updated = req.apply(current)?;
    state
        .notifications
        .save_preferences(&updated)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(updated))
}

/// Live feed of notifications persisted for the caller.
async fn stream_notifications(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.live_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(notification) if notification.merchant_id == merchant_id => Event::default()
            .event(notification.notification_type.as_str())
            .json_data(&notification)
            .ok()
            .map(Ok),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(%merchant_id, "Notification stream lagged: {}", e);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
