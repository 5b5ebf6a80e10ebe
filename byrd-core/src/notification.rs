use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OfferActivated,
    OfferExpired,
    AutoExtend,
    ShortfallWarning,
    LowBalance,
    TransferCompleted,
    SmsQuotaReached,
    SystemAlert,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::OfferActivated => "offer_activated",
            NotificationType::OfferExpired => "offer_expired",
            NotificationType::AutoExtend => "auto_extend",
            NotificationType::ShortfallWarning => "shortfall_warning",
            NotificationType::LowBalance => "low_balance",
            NotificationType::TransferCompleted => "transfer_completed",
            NotificationType::SmsQuotaReached => "sms_quota_reached",
            NotificationType::SystemAlert => "system_alert",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer_activated" => Ok(NotificationType::OfferActivated),
            "offer_expired" => Ok(NotificationType::OfferExpired),
            "auto_extend" => Ok(NotificationType::AutoExtend),
            "shortfall_warning" => Ok(NotificationType::ShortfallWarning),
            "low_balance" => Ok(NotificationType::LowBalance),
            "transfer_completed" => Ok(NotificationType::TransferCompleted),
            "sms_quota_reached" => Ok(NotificationType::SmsQuotaReached),
            "system_alert" => Ok(NotificationType::SystemAlert),
            other => Err(format!("unknown notification type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }

    /// High and urgent bypass per-type toggles and quiet hours.
    pub fn is_elevated(&self) -> bool {
        matches!(self, NotificationPriority::High | NotificationPriority::Urgent)
    }
}

impl FromStr for NotificationPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(NotificationPriority::Low),
            "normal" => Ok(NotificationPriority::Normal),
            "high" => Ok(NotificationPriority::High),
            "urgent" => Ok(NotificationPriority::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// In-app notification. Immutable after creation apart from `read_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub offer_id: Option<Uuid>,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn mark_read(&mut self, at: DateTime<Utc>) {
        if self.read_at.is_none() {
            self.read_at = Some(at);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPreferences {
    pub merchant_id: Uuid,
    pub notify_offer_activated: bool,
    pub notify_offer_expired: bool,
    pub notify_auto_extend: bool,
    pub notify_shortfall: bool,
    pub notify_budget: bool,
    pub sms_enabled: bool,
    pub email_enabled: bool,
    pub quiet_hours_enabled: bool,
    pub quiet_hours_start: NaiveTime,
    pub quiet_hours_end: NaiveTime,
    /// IANA zone name the quiet-hours window is expressed in.
    pub timezone: String,
}

impl NotificationPreferences {
    pub fn default_for(merchant_id: Uuid) -> Self {
        Self {
            merchant_id,
            notify_offer_activated: true,
            notify_offer_expired: true,
            notify_auto_extend: true,
            notify_shortfall: true,
            notify_budget: true,
            sms_enabled: false,
            email_enabled: false,
            quiet_hours_enabled: false,
            quiet_hours_start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            quiet_hours_end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            timezone: "UTC".to_string(),
        }
    }

    /// Toggle governing `notification_type`; `None` when the type has no toggle.
    pub fn flag_for(&self, notification_type: NotificationType) -> Option<bool> {
        match notification_type {
            NotificationType::OfferActivated => Some(self.notify_offer_activated),
            NotificationType::OfferExpired => Some(self.notify_offer_expired),
            NotificationType::AutoExtend => Some(self.notify_auto_extend),
            NotificationType::ShortfallWarning => Some(self.notify_shortfall),
            NotificationType::LowBalance
            | NotificationType::TransferCompleted
            | NotificationType::SmsQuotaReached => Some(self.notify_budget),
            NotificationType::SystemAlert => None,
        }
    }
}
