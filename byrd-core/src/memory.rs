//! In-memory repositories. Used by unit and API tests; every method mirrors the SQL contract
//! of the Postgres implementations in `byrd-store`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use byrd_shared::models::events::OfferTransitionEvent;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::merchant::{LedgerDelta, Merchant, MerchantLedgers};
use crate::notification::{Notification, NotificationPreferences};
use crate::offer::{CampaignFolder, Offer, OfferPatch, OfferStatus};
use crate::repository::{
    FolderRepository, MerchantRepository, NotificationRepository, OfferRepository, RepoResult,
    SchedulerStateRepository, SmsPricer, TransitionSink,
};
use crate::scheduler::SweepJob;
use crate::sms::{SmsCharge, SmsUsage};

#[derive(Default)]
struct State {
    offers: Vec<Offer>,
    folders: HashMap<Uuid, CampaignFolder>,
    merchants: HashMap<Uuid, Merchant>,
    sms_usage: HashMap<(Uuid, String), SmsUsage>,
    notifications: Vec<Notification>,
    preferences: HashMap<Uuid, NotificationPreferences>,
    checkpoints: HashMap<SweepJob, DateTime<Utc>>,
    transitions: Vec<OfferTransitionEvent>,
    fail_offer_updates: Vec<Uuid>,
    fail_queries: bool,
}

/// Shared in-memory backing for every repository trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_merchant(&self, merchant: Merchant) {
        self.state.lock().await.merchants.insert(merchant.id, merchant);
    }

    pub async fn put_offer(&self, offer: Offer) {
        let mut state = self.state.lock().await;
        state.offers.retain(|o| o.id != offer.id);
        state.offers.push(offer);
    }

    pub async fn offer(&self, id: Uuid) -> Option<Offer> {
        self.state.lock().await.offers.iter().find(|o| o.id == id).cloned()
    }

    pub async fn merchant(&self, id: Uuid) -> Option<Merchant> {
        self.state.lock().await.merchants.get(&id).cloned()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }

    pub async fn transitions(&self) -> Vec<OfferTransitionEvent> {
        self.state.lock().await.transitions.clone()
    }

    /// Make `update_offer` fail for this offer, to exercise per-item error handling.
    pub async fn fail_updates_for(&self, offer_id: Uuid) {
        self.state.lock().await.fail_offer_updates.push(offer_id);
    }

    /// Make every sweep query fail, as if the database were unreachable.
    pub async fn set_queries_failing(&self, failing: bool) {
        self.state.lock().await.fail_queries = failing;
    }
}

fn unavailable() -> crate::repository::RepoError {
    "database unavailable".into()
}

#[async_trait]
impl OfferRepository for MemoryStore {
    async fn get_offers_to_activate(
        &self,
        now: DateTime<Utc>,
        lookback_minutes: i64,
    ) -> RepoResult<Vec<Offer>> {
        let state = self.state.lock().await;
        if state.fail_queries {
            return Err(unavailable());
        }
        Ok(state
            .offers
            .iter()
            .filter(|o| o.matches_activation(now, lookback_minutes))
            .cloned()
            .collect())
    }

    async fn get_offers_to_expire(&self, now: DateTime<Utc>) -> RepoResult<Vec<Offer>> {
        let state = self.state.lock().await;
        if state.fail_queries {
            return Err(unavailable());
        }
        Ok(state.offers.iter().filter(|o| o.matches_expiry(now)).cloned().collect())
    }

    async fn get_expiring_offers(
        &self,
        now: DateTime<Utc>,
        hours_ahead: i64,
    ) -> RepoResult<Vec<Offer>> {
        let state = self.state.lock().await;
        if state.fail_queries {
            return Err(unavailable());
        }
        Ok(state
            .offers
            .iter()
            .filter(|o| o.matches_expiring_soon(now, hours_ahead))
            .cloned()
            .collect())
    }

    async fn update_offer(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        patch: OfferPatch,
    ) -> RepoResult<Option<Offer>> {
        let mut state = self.state.lock().await;
        if state.fail_offer_updates.contains(&id) {
            return Err(format!("write failed for offer {}", id).into());
        }
        let Some(offer) = state
            .offers
            .iter_mut()
            .find(|o| o.id == id && o.merchant_id == merchant_id)
        else {
            return Ok(None);
        };
        offer.apply_patch(&patch, Utc::now());
        Ok(Some(offer.clone()))
    }

    async fn get_offer(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<Option<Offer>> {
        let state = self.state.lock().await;
        Ok(state
            .offers
            .iter()
            .find(|o| o.id == id && o.merchant_id == merchant_id)
            .cloned())
    }

    async fn list_offers(&self, merchant_id: Uuid, include_deleted: bool) -> RepoResult<Vec<Offer>> {
        let state = self.state.lock().await;
        Ok(state
            .offers
            .iter()
            .filter(|o| o.merchant_id == merchant_id && (include_deleted || !o.is_deleted))
            .cloned()
            .collect())
    }

    async fn insert_offer(&self, offer: &Offer) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        if state.offers.iter().any(|o| o.id == offer.id) {
            return Err(format!("duplicate offer id {}", offer.id).into());
        }
        state.offers.push(offer.clone());
        Ok(())
    }

    async fn save_offer(&self, offer: &Offer) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        match state
            .offers
            .iter_mut()
            .find(|o| o.id == offer.id && o.merchant_id == offer.merchant_id)
        {
            Some(existing) => {
                *existing = offer.clone();
                Ok(())
            }
            None => Err(format!("offer {} not found", offer.id).into()),
        }
    }

    async fn delete_offer(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.offers.len();
        state.offers.retain(|o| !(o.id == id && o.merchant_id == merchant_id));
        Ok(state.offers.len() < before)
    }

    async fn count_active_offers(
        &self,
        merchant_id: Uuid,
        excluding: Option<Uuid>,
    ) -> RepoResult<u32> {
        let state = self.state.lock().await;
        let count = state
            .offers
            .iter()
            .filter(|o| o.merchant_id == merchant_id)
            .filter(|o| o.status == OfferStatus::Active && !o.is_deleted)
            .filter(|o| Some(o.id) != excluding)
            .count();
        Ok(count as u32)
    }
}

#[async_trait]
impl FolderRepository for MemoryStore {
    async fn get_folder(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<Option<CampaignFolder>> {
        let state = self.state.lock().await;
        Ok(state.folders.get(&id).filter(|f| f.merchant_id == merchant_id).cloned())
    }

    async fn list_folders(&self, merchant_id: Uuid) -> RepoResult<Vec<CampaignFolder>> {
        let state = self.state.lock().await;
        Ok(state
            .folders
            .values()
            .filter(|f| f.merchant_id == merchant_id)
            .cloned()
            .collect())
    }

    async fn insert_folder(&self, folder: &CampaignFolder) -> RepoResult<()> {
        self.state.lock().await.folders.insert(folder.id, folder.clone());
        Ok(())
    }

    async fn lock_folder(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<CampaignFolder>> {
        let mut state = self.state.lock().await;
        let Some(folder) = state.folders.get_mut(&id).filter(|f| f.merchant_id == merchant_id) else {
            return Ok(None);
        };
        if !folder.is_locked {
            folder.is_locked = true;
            folder.locked_at = Some(at);
        }
        Ok(Some(folder.clone()))
    }
}

#[async_trait]
impl MerchantRepository for MemoryStore {
    async fn get_merchant(&self, id: Uuid) -> RepoResult<Option<Merchant>> {
        Ok(self.state.lock().await.merchants.get(&id).cloned())
    }

    async fn apply_ledger_delta(
        &self,
        id: Uuid,
        delta: &LedgerDelta,
    ) -> RepoResult<Option<MerchantLedgers>> {
        let mut state = self.state.lock().await;
        let Some(merchant) = state.merchants.get_mut(&id) else {
            return Ok(None);
        };
        let Some(next) = merchant.ledgers.apply(delta) else {
            return Ok(None);
        };
        merchant.ledgers = next.clone();
        Ok(Some(next))
    }

    async fn record_sms_batch(
        &self,
        merchant_id: Uuid,
        price: SmsPricer<'_>,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<SmsCharge>> {
        let mut state = self.state.lock().await;
        let Some(merchant) = state.merchants.get_mut(&merchant_id) else {
            return Ok(None);
        };
        let charge = price(merchant);
        merchant.lifetime_texts_sent = charge.lifetime_after();
        if merchant.lifetime_texts_sent >= crate::sms::FREE_TRIAL_TEXTS {
            merchant.free_trial_used = true;
        }
        merchant.ledgers.text_budget -= charge.budget_debit;

        let key = (merchant_id, charge.month.clone());
        state
            .sms_usage
            .entry(key)
            .or_insert_with(|| SmsUsage::empty(merchant_id, charge.month.clone(), now))
            .record(&charge, now);
        Ok(Some(charge))
    }

    async fn get_sms_usage(&self, merchant_id: Uuid, month: &str) -> RepoResult<Option<SmsUsage>> {
        let state = self.state.lock().await;
        Ok(state.sms_usage.get(&(merchant_id, month.to_string())).cloned())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> RepoResult<()> {
        self.state.lock().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        merchant_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> RepoResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut items: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.merchant_id == merchant_id && (!unread_only || n.read_at.is_none()))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<Notification>> {
        let mut state = self.state.lock().await;
        let Some(notification) = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.merchant_id == merchant_id)
        else {
            return Ok(None);
        };
        notification.mark_read(at);
        Ok(Some(notification.clone()))
    }

    async fn get_preferences(&self, merchant_id: Uuid) -> RepoResult<Option<NotificationPreferences>> {
        Ok(self.state.lock().await.preferences.get(&merchant_id).cloned())
    }

    async fn save_preferences(&self, preferences: &NotificationPreferences) -> RepoResult<()> {
        self.state
            .lock()
            .await
            .preferences
            .insert(preferences.merchant_id, preferences.clone());
        Ok(())
    }
}

#[async_trait]
impl SchedulerStateRepository for MemoryStore {
    async fn last_successful_run(&self, job: SweepJob) -> RepoResult<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.checkpoints.get(&job).copied())
    }

    async fn record_successful_run(&self, job: SweepJob, at: DateTime<Utc>) -> RepoResult<()> {
        self.state.lock().await.checkpoints.insert(job, at);
        Ok(())
    }
}

#[async_trait]
impl TransitionSink for MemoryStore {
    async fn publish_transition(&self, event: &OfferTransitionEvent) -> RepoResult<()> {
        self.state.lock().await.transitions.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merchant::LedgerDelta;
    use crate::tier::MembershipTier;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_ledger_delta_is_all_or_nothing() {
        let store = MemoryStore::new();
        let mut merchant = Merchant::new("Bakery".into(), "bake@example.com".into(), MembershipTier::Soar);
        merchant.ledgers.bank_cents = 1_000;
        let id = merchant.id;
        store.put_merchant(merchant).await;

        let overdraw = LedgerDelta {
            bank_cents: -1_500,
            text_budget: Decimal::new(1_500, 2),
            ..Default::default()
        };
        assert!(store.apply_ledger_delta(id, &overdraw).await.unwrap().is_none());

        let after = store.merchant(id).await.unwrap();
        assert_eq!(after.ledgers.bank_cents, 1_000);
        assert_eq!(after.ledgers.text_budget, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_count_active_excludes_self_and_deleted() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        let mut ids = Vec::new();
        for deleted in [false, false, true] {
            let mut offer = Offer::new(merchant_id, "Deal".into(), crate::offer::OfferType::Bogo);
            offer.status = OfferStatus::Active;
            offer.is_deleted = deleted;
            ids.push(offer.id);
            store.put_offer(offer).await;
        }

        assert_eq!(store.count_active_offers(merchant_id, None).await.unwrap(), 2);
        assert_eq!(store.count_active_offers(merchant_id, Some(ids[0])).await.unwrap(), 1);
    }
}
