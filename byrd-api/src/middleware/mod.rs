pub mod auth;
pub mod rate_limit;

pub use auth::{merchant_auth_middleware, CurrentMerchant, MerchantClaims};
pub use rate_limit::rate_limit_middleware;
