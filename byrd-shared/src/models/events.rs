use uuid::Uuid;
use crate::pii::Masked;

/// Hand-off payload for out-of-app delivery (SMS / email workers consume these).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct NotificationDeliveryEvent {
    pub notification_id: Uuid,
    pub merchant_id: Uuid,
    pub offer_id: Option<Uuid>,
    pub channel: String,
    pub recipient: Masked<String>,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub priority: String,
    pub timestamp: i64,
}

/// Emitted whenever a sweep moves an offer to a new lifecycle state.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OfferTransitionEvent {
    pub offer_id: Uuid,
    pub merchant_id: Uuid,
    pub job: String,
    pub from_status: String,
    pub to_status: String,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub timestamp: i64,
}
