use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use byrd_billing::{BankSummary, BudgetCheck, TransferReceipt, TransferRequest};
use byrd_core::{SmsCharge, SmsUsage};
use chrono::Utc;
use serde::Deserialize;

use crate::{error::AppError, middleware::CurrentMerchant, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SmsBatchRequest {
    pub count: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bank", get(get_summary))
        .route("/api/bank/transfer", post(transfer))
        .route("/api/bank/sms/budget", get(check_sms_budget))
        .route("/api/bank/sms/usage", get(get_sms_usage))
        .route("/api/bank/sms/batches", post(record_sms_batch))
}

async fn get_summary(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
) -> Result<Json<BankSummary>, AppError> {
    Ok(Json(state.bank.summary(merchant_id).await?))
}

async fn transfer(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferReceipt>, AppError> {
    Ok(Json(state.bank.transfer(merchant_id, req, Utc::now()).await?))
}

async fn check_sms_budget(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
) -> Result<Json<BudgetCheck>, AppError> {
    Ok(Json(state.bank.check_sms_budget(merchant_id, Utc::now()).await?))
}

async fn get_sms_usage(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
) -> Result<Json<SmsUsage>, AppError> {
    Ok(Json(state.bank.sms_usage(merchant_id, Utc::now()).await?))
}

async fn record_sms_batch(
    State(state): State<AppState>,
    Extension(CurrentMerchant(merchant_id)): Extension<CurrentMerchant>,
    Json(req): Json<SmsBatchRequest>,
) -> Result<Json<SmsCharge>, AppError> {
    Ok(Json(state.bank.record_sms_batch(merchant_id, req.count, Utc::now()).await?))
}
