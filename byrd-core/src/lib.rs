pub mod offer;
pub mod merchant;
pub mod tier;
pub mod sms;
pub mod notification;
pub mod scheduler;
pub mod repository;
pub mod memory;

use serde::{Deserialize, Serialize};

pub use merchant::{Ledger, LedgerDelta, Merchant, MerchantLedgers};
pub use notification::{Notification, NotificationPreferences, NotificationPriority, NotificationType};
pub use offer::{AddType, CampaignFolder, DeliveryConfig, DeliveryMethod, Offer, OfferPatch, OfferPhase, OfferStatus, OfferType};
pub use scheduler::SweepJob;
pub use sms::{PricingBand, SmsCharge, SmsUsage};
pub use tier::{MembershipTier, TierCapabilities};

/// A single field-level problem, returned to the merchant as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_required: Option<MembershipTier>,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            upgrade_required: None,
        }
    }

    pub fn upgrade(field: &str, message: impl Into<String>, tier: Option<MembershipTier>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            upgrade_required: tier,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0:?}")]
    Validation(Vec<FieldError>),
    #[error("Membership tier does not allow this: {0:?}")]
    TierRestricted(Vec<FieldError>),
    #[error("Insufficient {ledger} balance: required {required}, available {available}")]
    InsufficientFunds {
        ledger: Ledger,
        required: String,
        available: String,
    },
    #[error("Offer {0} must be reintegrated before it can be activated")]
    NeedsReintegration(uuid::Uuid),
    #[error("Campaign folder {0} is locked")]
    FolderLocked(uuid::Uuid),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<repository::RepoError> for CoreError {
    fn from(err: repository::RepoError) -> Self {
        CoreError::Repository(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
