use std::sync::Arc;

use byrd_core::repository::MerchantRepository;
use byrd_core::sms::{usage_month, FREE_TRIAL_TEXTS};
use byrd_core::{
    CoreError, CoreResult, FieldError, Ledger, MembershipTier, Merchant, MerchantLedgers, SmsCharge,
    SmsUsage,
};
use byrd_notify::NotificationDispatcher;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::budget::{self, BudgetCheck};
use crate::metering;
use crate::transfer::TransferRequest;

#[derive(Debug, Clone, Serialize)]
pub struct BankSummary {
    pub merchant_id: Uuid,
    pub membership_tier: MembershipTier,
    pub ledgers: MerchantLedgers,
    pub lifetime_texts_sent: i64,
    pub free_trial_used: bool,
    pub free_texts_remaining: i64,
    pub current_rate_cents: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub request: TransferRequest,
    pub source: Ledger,
    pub destination: Ledger,
    pub amount_cents: i64,
    pub ledgers: MerchantLedgers,
}

/// Merchant-facing bank operations: transfers, SMS budget checks and metering.
pub struct BankService {
    merchants: Arc<dyn MerchantRepository>,
    notifier: Arc<NotificationDispatcher>,
}

impl BankService {
    pub fn new(merchants: Arc<dyn MerchantRepository>, notifier: Arc<NotificationDispatcher>) -> Self {
        Self { merchants, notifier }
    }

    async fn load(&self, merchant_id: Uuid) -> CoreResult<Merchant> {
        self.merchants
            .get_merchant(merchant_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("merchant {}", merchant_id)))
    }

    pub async fn summary(&self, merchant_id: Uuid) -> CoreResult<BankSummary> {
        let merchant = self.load(merchant_id).await?;
        Ok(BankSummary {
            merchant_id,
            membership_tier: merchant.membership_tier,
            current_rate_cents: metering::current_rate_cents(&merchant),
            free_texts_remaining: (FREE_TRIAL_TEXTS - merchant.lifetime_texts_sent).max(0),
            ledgers: merchant.ledgers,
            lifetime_texts_sent: merchant.lifetime_texts_sent,
            free_trial_used: merchant.free_trial_used,
        })
    }

    #[tracing::instrument(skip(self, now))]
    pub async fn transfer(
        &self,
        merchant_id: Uuid,
        request: TransferRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<TransferReceipt> {
        let merchant = self.load(merchant_id).await?;
        let plan = request.plan(&merchant)?;

        let Some(ledgers) = self.merchants.apply_ledger_delta(merchant_id, &plan.delta).await? else {
            // Balance moved between the read and the conditional write.
            let current = self.load(merchant_id).await?;
            tracing::warn!("Transfer lost a race with a concurrent spend");
            return Err(CoreError::InsufficientFunds {
                ledger: plan.source,
                required: byrd_core::merchant::cents_to_dollars(plan.amount_cents).to_string(),
                available: current.ledgers.balance_of(plan.source).to_string(),
            });
        };

        tracing::info!(
            source = %plan.source,
            destination = %plan.destination,
            amount_cents = plan.amount_cents,
            "Ledger transfer committed"
        );

        if let Err(e) = self.notifier.notify_transfer_completed(merchant_id, &plan.summary(), now).await {
            tracing::warn!("Failed to record transfer notification: {}", e);
        }

        Ok(TransferReceipt {
            request,
            source: plan.source,
            destination: plan.destination,
            amount_cents: plan.amount_cents,
            ledgers,
        })
    }

    /// Pre-send gate. An allocation tier that has used its month gets a quota notification.
    pub async fn check_sms_budget(&self, merchant_id: Uuid, now: DateTime<Utc>) -> CoreResult<BudgetCheck> {
        let merchant = self.load(merchant_id).await?;
        let sent = self
            .merchants
            .get_sms_usage(merchant_id, &usage_month(now))
            .await?
            .map_or(0, |usage| usage.texts_sent);

        let check = budget::evaluate(&merchant, sent);
        if check.quota_exhausted() {
            let allocation = check.monthly_allocation.unwrap_or_default();
            if let Err(e) = self
                .notifier
                .notify_sms_quota_reached(merchant_id, sent, allocation, now)
                .await
            {
                tracing::warn!("Failed to record quota notification: {}", e);
            }
        }
        Ok(check)
    }

    /// Meter a batch of texts that has been sent.
    #[tracing::instrument(skip(self, now))]
    pub async fn record_sms_batch(&self, merchant_id: Uuid, count: i64, now: DateTime<Utc>) -> CoreResult<SmsCharge> {
        if count <= 0 {
            return Err(CoreError::Validation(vec![FieldError::new(
                "count",
                "Batch size must be greater than zero",
            )]));
        }

        let pricer = move |merchant: &Merchant| metering::price_batch(merchant, count, now);
        let charge = self
            .merchants
            .record_sms_batch(merchant_id, &pricer, now)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("merchant {}", merchant_id)))?;

        tracing::info!(
            count,
            lifetime = charge.lifetime_after(),
            total_cents = %charge.total_cents,
            uncovered_cents = %charge.uncovered_cents,
            "SMS batch metered"
        );

        if charge.total_cents > Decimal::ZERO && charge.text_budget_after <= Decimal::ZERO {
            if let Err(e) = self
                .notifier
                .notify_low_balance(merchant_id, &Ledger::Text.to_string(), now)
                .await
            {
                tracing::warn!("Failed to record low balance notification: {}", e);
            }
        }
        Ok(charge)
    }

    pub async fn sms_usage(&self, merchant_id: Uuid, now: DateTime<Utc>) -> CoreResult<SmsUsage> {
        let month = usage_month(now);
        Ok(self
            .merchants
            .get_sms_usage(merchant_id, &month)
            .await?
            .unwrap_or_else(|| SmsUsage::empty(merchant_id, month, now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byrd_core::memory::MemoryStore;
    use byrd_core::NotificationType;

    async fn setup(tier: MembershipTier, bank_cents: i64, text_budget: Decimal) -> (MemoryStore, BankService, Uuid) {
        let store = MemoryStore::new();
        let mut merchant = Merchant::new("Bike Shop".into(), "bikes@example.com".into(), tier);
        merchant.ledgers.bank_cents = bank_cents;
        merchant.ledgers.text_budget = text_budget;
        let id = merchant.id;
        store.put_merchant(merchant).await;

        let notifier = Arc::new(NotificationDispatcher::new(Arc::new(store.clone())));
        let service = BankService::new(Arc::new(store.clone()), notifier);
        (store, service, id)
    }

    #[tokio::test]
    async fn test_transfer_commits_and_notifies() {
        let (store, service, id) = setup(MembershipTier::Soar, 2_000, Decimal::ZERO).await;

        let receipt = service
            .transfer(id, TransferRequest::BankToRips { amount_cents: 500 }, Utc::now())
            .await
            .unwrap();

        assert_eq!(receipt.ledgers.bank_cents, 1_500);
        assert_eq!(receipt.ledgers.rips_budget, Decimal::new(500, 2));
        let notes = store.notifications().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].notification_type, NotificationType::TransferCompleted);
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_ledgers_untouched() {
        let (store, service, id) = setup(MembershipTier::Soar, 300, Decimal::new(100, 2)).await;

        let err = service
            .transfer(id, TransferRequest::BankToText { amount_cents: 301 }, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));

        let merchant = store.merchant(id).await.unwrap();
        assert_eq!(merchant.ledgers.bank_cents, 300);
        assert_eq!(merchant.ledgers.text_budget, Decimal::new(100, 2));
        assert!(store.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_metering_updates_lifetime_usage_and_budget() {
        let (store, service, id) = setup(MembershipTier::Freebyrd, 0, Decimal::new(1_000, 2)).await;
        let now = Utc::now();

        let charge = service.record_sms_batch(id, 105, now).await.unwrap();
        assert_eq!(charge.bands.len(), 2);
        assert_eq!(charge.total_cents, Decimal::new(105, 1));

        let merchant = store.merchant(id).await.unwrap();
        assert_eq!(merchant.lifetime_texts_sent, 105);
        assert!(merchant.free_trial_used);
        assert_eq!(merchant.ledgers.text_budget, Decimal::new(10_000, 3) - Decimal::new(105, 3));

        let usage = service.sms_usage(id, now).await.unwrap();
        assert_eq!(usage.texts_sent, 105);
        assert_eq!(usage.pricing_breakdown.len(), 2);

        service.record_sms_batch(id, 5, now).await.unwrap();
        let usage = service.sms_usage(id, now).await.unwrap();
        assert_eq!(usage.pricing_breakdown.len(), 3);
        assert_eq!(usage.pricing_breakdown[2].from, 106);
    }

    #[tokio::test]
    async fn test_draining_text_budget_raises_low_balance() {
        let (store, service, id) = setup(MembershipTier::Soar, 0, Decimal::new(10, 2)).await;
        {
            let mut merchant = store.merchant(id).await.unwrap();
            merchant.lifetime_texts_sent = 100;
            store.put_merchant(merchant).await;
        }

        let charge = service.record_sms_batch(id, 20, Utc::now()).await.unwrap();
        assert!(charge.uncovered_cents > Decimal::ZERO);

        let notes = store.notifications().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].notification_type, NotificationType::LowBalance);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_notifies() {
        let (store, service, id) = setup(MembershipTier::Ascend, 0, Decimal::new(100_000, 2)).await;
        let now = Utc::now();
        service.record_sms_batch(id, 500, now).await.unwrap();

        let check = service.check_sms_budget(id, now).await.unwrap();
        assert!(!check.allowed);

        let notes = store.notifications().await;
        assert!(notes.iter().any(|n| n.notification_type == NotificationType::SmsQuotaReached));
    }

    #[tokio::test]
    async fn test_zero_batch_is_rejected() {
        let (_store, service, id) = setup(MembershipTier::Freebyrd, 0, Decimal::ZERO).await;
        assert!(matches!(
            service.record_sms_batch(id, 0, Utc::now()).await,
            Err(CoreError::Validation(_))
        ));
    }
}
