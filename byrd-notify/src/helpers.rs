//! Typed notification helpers with canned copy, one per event type.

use byrd_core::{CoreResult, NotificationPriority, NotificationType};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::dispatcher::{DispatchOutcome, NotificationDispatcher, NotifyRequest};

fn offer_url(offer_id: Uuid) -> Option<String> {
    Some(format!("/offers/{}", offer_id))
}

impl NotificationDispatcher {
    pub async fn notify_offer_activated(
        &self,
        merchant_id: Uuid,
        offer_id: Uuid,
        title: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<DispatchOutcome> {
        let request = NotifyRequest {
            merchant_id,
            notification_type: NotificationType::OfferActivated,
            title: "Offer is live".to_string(),
            message: format!("\"{}\" is now active and visible to customers.", title),
            priority: NotificationPriority::High,
            offer_id: Some(offer_id),
            action_url: offer_url(offer_id),
        };
        self.notify_at(request, now).await
    }

    pub async fn notify_offer_expired(
        &self,
        merchant_id: Uuid,
        offer_id: Uuid,
        title: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<DispatchOutcome> {
        let request = NotifyRequest {
            merchant_id,
            notification_type: NotificationType::OfferExpired,
            title: "Offer ended".to_string(),
            message: format!("\"{}\" has expired.", title),
            priority: NotificationPriority::Low,
            offer_id: Some(offer_id),
            action_url: offer_url(offer_id),
        };
        self.notify_at(request, now).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn notify_auto_extend(
        &self,
        merchant_id: Uuid,
        offer_id: Uuid,
        title: &str,
        units_sold: i32,
        target_units: i32,
        new_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<DispatchOutcome> {
        let request = NotifyRequest {
            merchant_id,
            notification_type: NotificationType::AutoExtend,
            title: "Offer extended".to_string(),
            message: format!(
                "\"{}\" sold {} of {} units, so it was extended to {}.",
                title,
                units_sold,
                target_units,
                new_end.format("%b %d %H:%M UTC")
            ),
            priority: NotificationPriority::Normal,
            offer_id: Some(offer_id),
            action_url: offer_url(offer_id),
        };
        self.notify_at(request, now).await
    }

    pub async fn notify_shortfall_warning(
        &self,
        merchant_id: Uuid,
        offer_id: Uuid,
        title: &str,
        units_sold: i32,
        target_units: i32,
        now: DateTime<Utc>,
    ) -> CoreResult<DispatchOutcome> {
        let request = NotifyRequest {
            merchant_id,
            notification_type: NotificationType::ShortfallWarning,
            title: "Offer below target".to_string(),
            message: format!(
                "\"{}\" ends within the hour with {} of {} units sold.",
                title, units_sold, target_units
            ),
            priority: NotificationPriority::Normal,
            offer_id: Some(offer_id),
            action_url: offer_url(offer_id),
        };
        self.notify_at(request, now).await
    }

    pub async fn notify_low_balance(
        &self,
        merchant_id: Uuid,
        ledger: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<DispatchOutcome> {
        let request = NotifyRequest {
            merchant_id,
            notification_type: NotificationType::LowBalance,
            title: "Balance depleted".to_string(),
            message: format!("Your {} is empty. Top it up to keep sending.", ledger),
            priority: NotificationPriority::High,
            offer_id: None,
            action_url: Some("/bank".to_string()),
        };
        self.notify_at(request, now).await
    }

    pub async fn notify_transfer_completed(
        &self,
        merchant_id: Uuid,
        summary: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<DispatchOutcome> {
        let request = NotifyRequest {
            merchant_id,
            notification_type: NotificationType::TransferCompleted,
            title: "Transfer complete".to_string(),
            message: summary.to_string(),
            priority: NotificationPriority::Low,
            offer_id: None,
            action_url: Some("/bank".to_string()),
        };
        self.notify_at(request, now).await
    }

    pub async fn notify_sms_quota_reached(
        &self,
        merchant_id: Uuid,
        texts_sent: i64,
        allocation: u32,
        now: DateTime<Utc>,
    ) -> CoreResult<DispatchOutcome> {
        let request = NotifyRequest {
            merchant_id,
            notification_type: NotificationType::SmsQuotaReached,
            title: "Monthly texts used up".to_string(),
            message: format!(
                "You have sent {} of {} texts included this month.",
                texts_sent, allocation
            ),
            priority: NotificationPriority::Normal,
            offer_id: None,
            action_url: Some("/bank".to_string()),
        };
        self.notify_at(request, now).await
    }
}
