use std::sync::Arc;

use async_trait::async_trait;
use byrd_core::repository::MerchantRepository;
use byrd_core::Notification;
use byrd_notify::{ChannelKind, DeliveryChannel, DeliveryError};
use byrd_shared::models::events::NotificationDeliveryEvent;
use byrd_shared::Masked;

use crate::events::EventProducer;

/// Hands SMS/email deliveries to Kafka; provider workers consume the topics.
pub struct KafkaDeliveryChannel {
    kind: ChannelKind,
    topic: String,
    producer: EventProducer,
    merchants: Arc<dyn MerchantRepository>,
}

impl KafkaDeliveryChannel {
    pub fn new(
        kind: ChannelKind,
        topic: String,
        producer: EventProducer,
        merchants: Arc<dyn MerchantRepository>,
    ) -> Self {
        Self { kind, topic, producer, merchants }
    }
}

pub fn delivery_event(
    notification: &Notification,
    kind: ChannelKind,
    recipient: String,
) -> NotificationDeliveryEvent {
    NotificationDeliveryEvent {
        notification_id: notification.id,
        merchant_id: notification.merchant_id,
        offer_id: notification.offer_id,
        channel: kind.as_str().to_string(),
        recipient: Masked(recipient),
        title: notification.title.clone(),
        message: notification.message.clone(),
        action_url: notification.action_url.clone(),
        priority: notification.priority.as_str().to_string(),
        timestamp: notification.created_at.timestamp(),
    }
}

#[async_trait]
impl DeliveryChannel for KafkaDeliveryChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let merchant = self
            .merchants
            .get_merchant(notification.merchant_id)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
            .ok_or(DeliveryError::MissingContact("merchant"))?;

        let recipient = match self.kind {
            ChannelKind::Sms => merchant.phone.ok_or(DeliveryError::MissingContact("phone"))?,
            ChannelKind::Email => merchant.email,
        };

        let event = delivery_event(notification, self.kind, recipient);
        tracing::debug!(recipient = %event.recipient, channel = self.kind.as_str(), "Queueing delivery");

        let payload = serde_json::to_string(&event).map_err(|e| DeliveryError::Transport(e.to_string()))?;
        self.producer
            .publish(&self.topic, &notification.merchant_id.to_string(), &payload)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byrd_core::{NotificationPriority, NotificationType};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_delivery_event_masks_recipient_in_logs() {
        let notification = Notification {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            notification_type: NotificationType::LowBalance,
            title: "Balance depleted".into(),
            message: "Top up".into(),
            priority: NotificationPriority::Urgent,
            offer_id: None,
            action_url: Some("/bank".into()),
            created_at: Utc::now(),
            read_at: None,
        };

        let event = delivery_event(&notification, ChannelKind::Sms, "+15551234567".into());
        assert_eq!(event.channel, "sms");
        assert_eq!(event.priority, "urgent");
        assert_eq!(format!("{}", event.recipient), "***4567");

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["recipient"], "+15551234567");
    }
}
