use async_trait::async_trait;
use byrd_core::Notification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Sms,
    Email,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Sms => "sms",
            ChannelKind::Email => "email",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("No {0} contact on file for merchant")]
    MissingContact(&'static str),
    #[error("Delivery transport failed: {0}")]
    Transport(String),
}

/// Out-of-band delivery for a persisted notification.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}
