//! Preference-gated notification dispatch.
//!
//! Every notification raised by the lifecycle sweeps or the bank goes through
//! [`NotificationDispatcher::notify_at`]. Order of checks:
//!
//! 1. No preferences on file: persist unconditionally.
//! 2. High/urgent priority and system alerts skip the per-type toggles.
//! 3. Everything else must pass its toggle and fall outside quiet hours.
//!
//! A persisted notification is pushed to the live stream and then handed to SMS/email
//! channels when both the priority and the merchant's channel switches allow it.

use std::sync::Arc;

use byrd_core::repository::NotificationRepository;
use byrd_core::{CoreResult, Notification, NotificationPreferences, NotificationPriority, NotificationType};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::channel::{ChannelKind, DeliveryChannel};
use crate::quiet_hours;

#[derive(Debug, Clone)]
pub struct NotifyRequest {
    pub merchant_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub offer_id: Option<Uuid>,
    pub action_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Persisted {
        notification: Notification,
        channels: Vec<ChannelKind>,
    },
    SuppressedByPreference,
    SuppressedQuietHours,
}

impl DispatchOutcome {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            DispatchOutcome::Persisted { notification, .. } => Some(notification),
            _ => None,
        }
    }
}

pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
    channels: Vec<Arc<dyn DeliveryChannel>>,
    live: Option<broadcast::Sender<Notification>>,
}

impl NotificationDispatcher {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self {
            repo,
            channels: Vec::new(),
            live: None,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Publish every persisted notification on `sender` (feeds the SSE stream).
    pub fn with_live_feed(mut self, sender: broadcast::Sender<Notification>) -> Self {
        self.live = Some(sender);
        self
    }

    pub async fn notify(&self, request: NotifyRequest) -> CoreResult<DispatchOutcome> {
        self.notify_at(request, Utc::now()).await
    }

    #[tracing::instrument(skip(self, request), fields(merchant_id = %request.merchant_id, kind = %request.notification_type))]
    pub async fn notify_at(&self, request: NotifyRequest, now: DateTime<Utc>) -> CoreResult<DispatchOutcome> {
        let preferences = self.repo.get_preferences(request.merchant_id).await?;

        if let Some(prefs) = &preferences {
            let bypass = request.priority.is_elevated()
                || request.notification_type == NotificationType::SystemAlert;
            if !bypass {
                if prefs.flag_for(request.notification_type) == Some(false) {
                    tracing::debug!("Suppressed by merchant preference");
                    return Ok(DispatchOutcome::SuppressedByPreference);
                }
                if quiet_hours::is_quiet(prefs, now) {
                    tracing::debug!("Dropped during quiet hours");
                    return Ok(DispatchOutcome::SuppressedQuietHours);
                }
            }
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            merchant_id: request.merchant_id,
            notification_type: request.notification_type,
            title: request.title,
            message: request.message,
            priority: request.priority,
            offer_id: request.offer_id,
            action_url: request.action_url,
            created_at: now,
            read_at: None,
        };
        self.repo.insert_notification(&notification).await?;

        if let Some(live) = &self.live {
            // No subscribers is not an error.
            let _ = live.send(notification.clone());
        }

        let channels = preferences
            .as_ref()
            .map(|prefs| channels_for(notification.priority, prefs))
            .unwrap_or_default();
        self.deliver(&notification, &channels).await;

        Ok(DispatchOutcome::Persisted { notification, channels })
    }

    async fn deliver(&self, notification: &Notification, kinds: &[ChannelKind]) {
        for kind in kinds {
            for channel in self.channels.iter().filter(|c| c.kind() == *kind) {
                if let Err(e) = channel.deliver(notification).await {
                    tracing::warn!(
                        notification_id = %notification.id,
                        channel = kind.as_str(),
                        "Delivery failed: {}",
                        e
                    );
                }
            }
        }
    }
}

/// Out-of-band channels for a priority: urgent gets SMS and email, high gets SMS.
fn channels_for(priority: NotificationPriority, prefs: &NotificationPreferences) -> Vec<ChannelKind> {
    let wanted: &[ChannelKind] = match priority {
        NotificationPriority::Urgent => &[ChannelKind::Sms, ChannelKind::Email],
        NotificationPriority::High => &[ChannelKind::Sms],
        NotificationPriority::Normal | NotificationPriority::Low => &[],
    };
    wanted
        .iter()
        .copied()
        .filter(|kind| match kind {
            ChannelKind::Sms => prefs.sms_enabled,
            ChannelKind::Email => prefs.email_enabled,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeliveryError;
    use async_trait::async_trait;
    use byrd_core::memory::MemoryStore;
    use chrono::{NaiveTime, TimeZone};
    use tokio::sync::Mutex;

    pub(crate) struct RecordingChannel {
        kind: ChannelKind,
        fail: bool,
        pub(crate) sent: Mutex<Vec<Uuid>>,
    }

    impl RecordingChannel {
        pub(crate) fn new(kind: ChannelKind, fail: bool) -> Arc<Self> {
            Arc::new(Self { kind, fail, sent: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
            self.sent.lock().await.push(notification.id);
            if self.fail {
                return Err(DeliveryError::Transport("gateway timeout".into()));
            }
            Ok(())
        }
    }

    fn request(merchant_id: Uuid, kind: NotificationType, priority: NotificationPriority) -> NotifyRequest {
        NotifyRequest {
            merchant_id,
            notification_type: kind,
            title: "Heads up".into(),
            message: "Something happened".into(),
            priority,
            offer_id: None,
            action_url: None,
        }
    }

    fn midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 0, 30, 0).unwrap()
    }

    async fn quiet_prefs(store: &MemoryStore, merchant_id: Uuid) -> NotificationPreferences {
        let mut prefs = NotificationPreferences::default_for(merchant_id);
        prefs.quiet_hours_enabled = true;
        prefs.quiet_hours_start = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        prefs.quiet_hours_end = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        store.save_preferences(&prefs).await.unwrap();
        prefs
    }

    #[tokio::test]
    async fn test_missing_preferences_fail_open() {
        let store = MemoryStore::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone()));
        let merchant_id = Uuid::new_v4();

        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::OfferExpired, NotificationPriority::Low), midnight())
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Persisted { ref channels, .. } if channels.is_empty()));
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_toggle_suppresses_normal_priority() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        let mut prefs = NotificationPreferences::default_for(merchant_id);
        prefs.notify_auto_extend = false;
        store.save_preferences(&prefs).await.unwrap();
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone()));

        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::AutoExtend, NotificationPriority::Normal), midnight())
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::SuppressedByPreference);

        prefs.notify_offer_activated = false;
        store.save_preferences(&prefs).await.unwrap();
        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::OfferActivated, NotificationPriority::High), midnight())
            .await
            .unwrap();
        assert!(outcome.notification().is_some());
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_quiet_hours_drop_low_but_not_elevated() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        quiet_prefs(&store, merchant_id).await;
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone()));

        for priority in [NotificationPriority::Low, NotificationPriority::Normal] {
            let outcome = dispatcher
                .notify_at(request(merchant_id, NotificationType::OfferExpired, priority), midnight())
                .await
                .unwrap();
            assert_eq!(outcome, DispatchOutcome::SuppressedQuietHours);
        }
        for priority in [NotificationPriority::High, NotificationPriority::Urgent] {
            let outcome = dispatcher
                .notify_at(request(merchant_id, NotificationType::OfferExpired, priority), midnight())
                .await
                .unwrap();
            assert!(outcome.notification().is_some());
        }

        let daytime = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::OfferExpired, NotificationPriority::Low), daytime)
            .await
            .unwrap();
        assert!(outcome.notification().is_some());
        assert_eq!(store.notifications().await.len(), 3);
    }

    #[tokio::test]
    async fn test_same_day_quiet_window_keeps_elevated() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        let mut prefs = NotificationPreferences::default_for(merchant_id);
        prefs.quiet_hours_enabled = true;
        prefs.quiet_hours_start = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        prefs.quiet_hours_end = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        store.save_preferences(&prefs).await.unwrap();
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone()));
        let afternoon = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();

        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::OfferExpired, NotificationPriority::Low), afternoon)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::SuppressedQuietHours);

        for priority in [NotificationPriority::High, NotificationPriority::Urgent] {
            let outcome = dispatcher
                .notify_at(request(merchant_id, NotificationType::OfferExpired, priority), afternoon)
                .await
                .unwrap();
            assert!(outcome.notification().is_some());
        }

        // Outside the window the low-priority text goes through.
        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::OfferExpired, NotificationPriority::Low), midnight())
            .await
            .unwrap();
        assert!(outcome.notification().is_some());
        assert_eq!(store.notifications().await.len(), 3);
    }

    #[tokio::test]
    async fn test_system_alert_bypasses_quiet_hours() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        quiet_prefs(&store, merchant_id).await;
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone()));

        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::SystemAlert, NotificationPriority::Low), midnight())
            .await
            .unwrap();
        assert!(outcome.notification().is_some());
    }

    #[tokio::test]
    async fn test_channel_routing_by_priority() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        let mut prefs = NotificationPreferences::default_for(merchant_id);
        prefs.sms_enabled = true;
        prefs.email_enabled = true;
        store.save_preferences(&prefs).await.unwrap();

        let sms = RecordingChannel::new(ChannelKind::Sms, false);
        let email = RecordingChannel::new(ChannelKind::Email, false);
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone()))
            .with_channel(sms.clone())
            .with_channel(email.clone());

        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        dispatcher
            .notify_at(request(merchant_id, NotificationType::SystemAlert, NotificationPriority::Urgent), now)
            .await
            .unwrap();
        dispatcher
            .notify_at(request(merchant_id, NotificationType::OfferActivated, NotificationPriority::High), now)
            .await
            .unwrap();
        dispatcher
            .notify_at(request(merchant_id, NotificationType::AutoExtend, NotificationPriority::Normal), now)
            .await
            .unwrap();

        assert_eq!(sms.sent.lock().await.len(), 2);
        assert_eq!(email.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_channel_is_skipped() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        let mut prefs = NotificationPreferences::default_for(merchant_id);
        prefs.email_enabled = true;
        store.save_preferences(&prefs).await.unwrap();

        let sms = RecordingChannel::new(ChannelKind::Sms, false);
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone())).with_channel(sms.clone());

        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::SystemAlert, NotificationPriority::Urgent), midnight())
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Persisted { ref channels, .. } if channels == &vec![ChannelKind::Email]));
        assert!(sms.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_notification() {
        let store = MemoryStore::new();
        let merchant_id = Uuid::new_v4();
        let mut prefs = NotificationPreferences::default_for(merchant_id);
        prefs.sms_enabled = true;
        store.save_preferences(&prefs).await.unwrap();

        let sms = RecordingChannel::new(ChannelKind::Sms, true);
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone())).with_channel(sms.clone());

        let outcome = dispatcher
            .notify_at(request(merchant_id, NotificationType::LowBalance, NotificationPriority::High), midnight())
            .await;

        assert!(outcome.is_ok());
        assert_eq!(sms.sent.lock().await.len(), 1);
        assert_eq!(store.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_live_feed_receives_persisted() {
        let store = MemoryStore::new();
        let (tx, mut rx) = broadcast::channel(8);
        let dispatcher = NotificationDispatcher::new(Arc::new(store.clone())).with_live_feed(tx);
        let merchant_id = Uuid::new_v4();

        dispatcher
            .notify_at(request(merchant_id, NotificationType::TransferCompleted, NotificationPriority::Low), midnight())
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.merchant_id, merchant_id);
    }
}
