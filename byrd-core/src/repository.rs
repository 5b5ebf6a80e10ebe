use async_trait::async_trait;
use byrd_shared::models::events::OfferTransitionEvent;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::merchant::{LedgerDelta, Merchant, MerchantLedgers};
use crate::notification::{Notification, NotificationPreferences};
use crate::offer::{CampaignFolder, Offer, OfferPatch};
use crate::scheduler::SweepJob;
use crate::sms::{SmsCharge, SmsUsage};

pub type RepoError = Box<dyn std::error::Error + Send + Sync>;
pub type RepoResult<T> = Result<T, RepoError>;

/// Prices a batch against the merchant row as it is inside the write lock.
pub type SmsPricer<'a> = &'a (dyn Fn(&Merchant) -> SmsCharge + Send + Sync);

/// Repository trait for offer data access
#[async_trait]
pub trait OfferRepository: Send + Sync {
    /// Draft/active, undeleted, integrated, never activated, started within the lookback window.
    async fn get_offers_to_activate(
        &self,
        now: DateTime<Utc>,
        lookback_minutes: i64,
    ) -> RepoResult<Vec<Offer>>;

    /// Active, undeleted, integrated, ended at or before `now`.
    async fn get_offers_to_expire(&self, now: DateTime<Utc>) -> RepoResult<Vec<Offer>>;

    /// Active offers ending in `(now, now + hours_ahead]`.
    async fn get_expiring_offers(
        &self,
        now: DateTime<Utc>,
        hours_ahead: i64,
    ) -> RepoResult<Vec<Offer>>;

    /// Apply a partial update; `None` if the offer does not belong to `merchant_id`.
    async fn update_offer(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        patch: OfferPatch,
    ) -> RepoResult<Option<Offer>>;

    async fn get_offer(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<Option<Offer>>;

    async fn list_offers(&self, merchant_id: Uuid, include_deleted: bool) -> RepoResult<Vec<Offer>>;

    async fn insert_offer(&self, offer: &Offer) -> RepoResult<()>;

    /// Replace every mutable column of an existing offer.
    async fn save_offer(&self, offer: &Offer) -> RepoResult<()>;

    async fn delete_offer(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<bool>;

    async fn count_active_offers(
        &self,
        merchant_id: Uuid,
        excluding: Option<Uuid>,
    ) -> RepoResult<u32>;
}

#[async_trait]
pub trait FolderRepository: Send + Sync {
    async fn get_folder(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<Option<CampaignFolder>>;

    async fn list_folders(&self, merchant_id: Uuid) -> RepoResult<Vec<CampaignFolder>>;

    async fn insert_folder(&self, folder: &CampaignFolder) -> RepoResult<()>;

    async fn lock_folder(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<CampaignFolder>>;
}

#[async_trait]
pub trait MerchantRepository: Send + Sync {
    async fn get_merchant(&self, id: Uuid) -> RepoResult<Option<Merchant>>;

    /// Apply `delta` atomically. `None` when the merchant is missing or any ledger would go negative;
    /// in that case nothing is written.
    async fn apply_ledger_delta(
        &self,
        id: Uuid,
        delta: &LedgerDelta,
    ) -> RepoResult<Option<MerchantLedgers>>;

    /// Price and persist one SMS batch under a single lock on the merchant row: lifetime counter,
    /// free-trial flag, text-budget debit and the monthly usage row move together.
    async fn record_sms_batch(
        &self,
        merchant_id: Uuid,
        price: SmsPricer<'_>,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<SmsCharge>>;

    async fn get_sms_usage(&self, merchant_id: Uuid, month: &str) -> RepoResult<Option<SmsUsage>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> RepoResult<()>;

    async fn list_notifications(
        &self,
        merchant_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> RepoResult<Vec<Notification>>;

    async fn mark_read(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<Notification>>;

    async fn get_preferences(&self, merchant_id: Uuid) -> RepoResult<Option<NotificationPreferences>>;

    async fn save_preferences(&self, preferences: &NotificationPreferences) -> RepoResult<()>;
}

/// Persisted sweep checkpoints.
#[async_trait]
pub trait SchedulerStateRepository: Send + Sync {
    async fn last_successful_run(&self, job: SweepJob) -> RepoResult<Option<DateTime<Utc>>>;

    async fn record_successful_run(&self, job: SweepJob, at: DateTime<Utc>) -> RepoResult<()>;
}

/// Outbound stream of lifecycle transitions.
#[async_trait]
pub trait TransitionSink: Send + Sync {
    async fn publish_transition(&self, event: &OfferTransitionEvent) -> RepoResult<()>;
}
