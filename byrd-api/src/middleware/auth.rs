use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

pub const MERCHANT_ROLE: &str = "MERCHANT";

/// HS256 bearer token issued by the merchant login service.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MerchantClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Authenticated merchant, available to handlers as an `Extension`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentMerchant(pub Uuid);

pub async fn merchant_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<MerchantClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if token_data.claims.role != MERCHANT_ROLE {
        return Err(StatusCode::FORBIDDEN);
    }

    let merchant_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(CurrentMerchant(merchant_id));
    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}
