use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use byrd_core::{CampaignFolder, Offer, OfferPhase};
use byrd_offer::{NewOffer, OfferUpdate};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::CurrentMerchant, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OfferResponse {
    #[serde(flatten)]
    pub offer: Offer,
    pub phase: OfferPhase,
}

impl From<Offer> for OfferResponse {
    fn from(offer: Offer) -> Self {
        let phase = offer.phase(Utc::now());
        Self { offer, phase }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOffersQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteOfferQuery {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/offers", get(list_offers).post(create_offer))
        .route(
            "/api/offers/{id}",
            get(get_offer).put(update_offer).delete(delete_offer),
        )
        .route("/api/offers/{id}/restore", post(restore_offer))
        .route("/api/offers/{id}/reintegrate", post(reintegrate_offer))
        .route("/api/folders", get(list_folders).post(create_folder))
        .route("/api/folders/{id}/promote", post(promote_folder))
}

// ============================================================================
// Offer Handlers
// ============================================================================

async fn list_offers(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Query(query): Query<ListOffersQuery>,
) -> Result<Json<Vec<OfferResponse>>, AppError> {
    let offers = state.offers.list_offers(merchant_id, query.include_deleted).await?;
    Ok(Json(offers.into_iter().map(OfferResponse::from).collect()))
}

async fn create_offer(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Json(req): Json<NewOffer>,
) -> Result<(StatusCode, Json<OfferResponse>), AppError> {
    let offer = state.offers.create_offer(merchant_id, req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(offer.into())))
}

async fn get_offer(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<OfferResponse>, AppError> {
    let offer = state.offers.get_offer(merchant_id, offer_id).await?;
    Ok(Json(offer.into()))
}

async fn update_offer(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Path(offer_id): Path<Uuid>,
    Json(req): Json<OfferUpdate>,
) -> Result<Json<OfferResponse>, AppError> {
    let offer = state.offers.update_offer(merchant_id, offer_id, req, Utc::now()).await?;
    Ok(Json(offer.into()))
}

/// Soft delete by default; `?hard=true` permanently removes an already soft-deleted offer.
async fn delete_offer(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Path(offer_id): Path<Uuid>,
    Query(query): Query<DeleteOfferQuery>,
) -> Result<Response, AppError> {
    if query.hard {
        state.offers.hard_delete(merchant_id, offer_id).await?;
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let offer = state.offers.soft_delete(merchant_id, offer_id, Utc::now()).await?;
    Ok(Json(OfferResponse::from(offer)).into_response())
}

async fn restore_offer(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<OfferResponse>, AppError> {
    let offer = state.offers.restore(merchant_id, offer_id, Utc::now()).await?;
    Ok(Json(offer.into()))
}

async fn reintegrate_offer(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<OfferResponse>, AppError> {
    let offer = state.offers.reintegrate(merchant_id, offer_id, Utc::now()).await?;
    Ok(Json(offer.into()))
}

// ============================================================================
// Folder Handlers
// ============================================================================

async fn list_folders(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
) -> Result<Json<Vec<CampaignFolder>>, AppError> {
    Ok(Json(state.offers.list_folders(merchant_id).await?))
}

async fn create_folder(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<CampaignFolder>), AppError> {
    let folder = state.offers.create_folder(merchant_id, req.name).await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

/// Locks the folder; offers inside can no longer be edited.
async fn promote_folder(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Path(folder_id): Path<Uuid>,
) -> Result<Json<CampaignFolder>, AppError> {
    Ok(Json(state.offers.promote_folder(merchant_id, folder_id, Utc::now()).await?))
}
