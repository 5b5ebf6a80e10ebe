use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_EXTENSION_DAYS: i32 = 3;

/// Offer status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Draft,
    Active,
    Paused,
    Expired,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Draft => "draft",
            OfferStatus::Active => "active",
            OfferStatus::Paused => "paused",
            OfferStatus::Expired => "expired",
        }
    }

    /// Transitions a merchant may request. Same-status saves are always allowed.
    pub fn can_transition_to(&self, next: OfferStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (OfferStatus::Draft, OfferStatus::Active)
                | (OfferStatus::Draft, OfferStatus::Paused)
                | (OfferStatus::Active, OfferStatus::Paused)
                | (OfferStatus::Active, OfferStatus::Expired)
                | (OfferStatus::Paused, OfferStatus::Active)
                | (OfferStatus::Paused, OfferStatus::Expired)
                | (OfferStatus::Expired, OfferStatus::Draft)
                | (OfferStatus::Expired, OfferStatus::Active)
        )
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(OfferStatus::Draft),
            "active" => Ok(OfferStatus::Active),
            "paused" => Ok(OfferStatus::Paused),
            "expired" => Ok(OfferStatus::Expired),
            other => Err(format!("unknown offer status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    PercentOff,
    DollarOff,
    Bogo,
    FreeItem,
    Bundle,
}

impl OfferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::PercentOff => "percent_off",
            OfferType::DollarOff => "dollar_off",
            OfferType::Bogo => "bogo",
            OfferType::FreeItem => "free_item",
            OfferType::Bundle => "bundle",
        }
    }
}

impl FromStr for OfferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percent_off" => Ok(OfferType::PercentOff),
            "dollar_off" => Ok(OfferType::DollarOff),
            "bogo" => Ok(OfferType::Bogo),
            "free_item" => Ok(OfferType::FreeItem),
            "bundle" => Ok(OfferType::Bundle),
            other => Err(format!("unknown offer type: {}", other)),
        }
    }
}

/// How the offer is presented to customers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddType {
    #[default]
    Standard,
    Countdown,
}

impl AddType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddType::Standard => "standard",
            AddType::Countdown => "countdown",
        }
    }
}

impl FromStr for AddType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(AddType::Standard),
            "countdown" => Ok(AddType::Countdown),
            other => Err(format!("unknown add type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Sms,
    Email,
    InStore,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Sms => "sms",
            DeliveryMethod::Email => "email",
            DeliveryMethod::InStore => "in_store",
        }
    }
}

/// Coupon delivery settings; the fields available depend on the method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DeliveryConfig {
    Sms {
        message_template: String,
        #[serde(default)]
        include_link: bool,
    },
    Email {
        subject: String,
        #[serde(default)]
        reply_to: Option<String>,
    },
    InStore {
        redemption_code: String,
    },
}

impl DeliveryConfig {
    pub fn method(&self) -> DeliveryMethod {
        match self {
            DeliveryConfig::Sms { .. } => DeliveryMethod::Sms,
            DeliveryConfig::Email { .. } => DeliveryMethod::Email,
            DeliveryConfig::InStore { .. } => DeliveryMethod::InStore,
        }
    }
}

/// Where an offer sits in time, independent of what the scheduler has done yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferPhase {
    Future,
    Current,
    Expired,
    Inactive,
}

/// A time-boxed promotional offer owned by a merchant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub offer_type: OfferType,
    pub add_type: AddType,
    pub status: OfferStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub needs_reintegration: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub units_sold: i32,
    pub target_units: Option<i32>,
    pub auto_extend: bool,
    pub extension_days: i32,
    pub notify_on_shortfall: bool,
    pub last_auto_extended_at: Option<DateTime<Utc>>,
    pub media_urls: Vec<String>,
    pub get_new_customers: bool,
    pub delivery: Option<DeliveryConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Create a new draft offer
    pub fn new(merchant_id: Uuid, title: String, offer_type: OfferType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            folder_id: None,
            title,
            offer_type,
            add_type: AddType::Standard,
            status: OfferStatus::Draft,
            start_date: None,
            end_date: None,
            activated_at: None,
            needs_reintegration: false,
            is_deleted: false,
            deleted_at: None,
            units_sold: 0,
            target_units: None,
            auto_extend: false,
            extension_days: DEFAULT_EXTENSION_DAYS,
            notify_on_shortfall: false,
            last_auto_extended_at: None,
            media_urls: Vec::new(),
            get_new_customers: false,
            delivery: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.status == OfferStatus::Draft
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Expired || self.end_date.is_some_and(|end| now > end)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> OfferPhase {
        if self.is_expired(now) {
            return OfferPhase::Expired;
        }
        if self.start_date.is_some_and(|start| start > now) {
            return OfferPhase::Future;
        }
        let started = self.start_date.map_or(true, |start| start <= now);
        let not_ended = self.end_date.map_or(true, |end| now <= end);
        if self.status == OfferStatus::Active && started && not_ended {
            OfferPhase::Current
        } else {
            OfferPhase::Inactive
        }
    }

    pub fn target_met(&self) -> Option<bool> {
        self.target_units.map(|target| self.units_sold >= target)
    }

    fn eligible_for_lifecycle(&self) -> bool {
        !self.is_deleted && !self.needs_reintegration
    }

    /// Activation candidates: started inside the lookback window, never activated, with an end
    /// date still ahead. Offers without an end date stay where they are.
    pub fn matches_activation(&self, now: DateTime<Utc>, lookback_minutes: i64) -> bool {
        let window_start = now - Duration::minutes(lookback_minutes);
        matches!(self.status, OfferStatus::Draft | OfferStatus::Active)
            && self.eligible_for_lifecycle()
            && self.activated_at.is_none()
            && self.start_date.is_some_and(|start| start >= window_start && start <= now)
            && self.end_date.is_some_and(|end| end > now)
    }

    pub fn matches_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Active
            && self.eligible_for_lifecycle()
            && self.end_date.is_some_and(|end| end <= now)
    }

    pub fn matches_expiring_soon(&self, now: DateTime<Utc>, hours_ahead: i64) -> bool {
        let horizon = now + Duration::hours(hours_ahead);
        self.status == OfferStatus::Active
            && self.eligible_for_lifecycle()
            && self.end_date.is_some_and(|end| end > now && end <= horizon)
    }

    /// Apply a scheduler patch. `activated_at` is write-once.
    pub fn apply_patch(&mut self, patch: &OfferPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if self.activated_at.is_none() {
            if let Some(at) = patch.activated_at {
                self.activated_at = Some(at);
            }
        }
        if let Some(end) = patch.end_date {
            self.end_date = Some(end);
        }
        if let Some(at) = patch.last_auto_extended_at {
            self.last_auto_extended_at = Some(at);
        }
        self.updated_at = now;
    }
}

/// Partial update issued by the lifecycle sweeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferPatch {
    pub status: Option<OfferStatus>,
    pub activated_at: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub last_auto_extended_at: Option<DateTime<Utc>>,
}

/// Grouping of offers. Once promoted to a campaign it is locked for good.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignFolder {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub is_locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CampaignFolder {
    pub fn new(merchant_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            name,
            is_locked: false,
            locked_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer_at(now: DateTime<Utc>) -> Offer {
        let mut offer = Offer::new(Uuid::new_v4(), "Half-price lattes".to_string(), OfferType::PercentOff);
        offer.start_date = Some(now - Duration::minutes(10));
        offer.end_date = Some(now + Duration::hours(6));
        offer
    }

    #[test]
    fn test_phase_classification() {
        let now = Utc::now();
        let mut offer = offer_at(now);
        assert_eq!(offer.phase(now), OfferPhase::Inactive);

        offer.status = OfferStatus::Active;
        assert_eq!(offer.phase(now), OfferPhase::Current);

        offer.start_date = Some(now + Duration::hours(1));
        assert_eq!(offer.phase(now), OfferPhase::Future);

        offer.end_date = Some(now - Duration::minutes(1));
        assert_eq!(offer.phase(now), OfferPhase::Expired);

        let mut expired = offer_at(now);
        expired.status = OfferStatus::Expired;
        assert_eq!(expired.phase(now), OfferPhase::Expired);
    }

    #[test]
    fn test_activation_and_expiry_predicates_are_disjoint() {
        let now = Utc::now();
        let mut offer = offer_at(now);
        offer.status = OfferStatus::Active;

        for end_offset in [-30i64, 0, 30] {
            offer.end_date = Some(now + Duration::minutes(end_offset));
            assert!(!(offer.matches_activation(now, 60) && offer.matches_expiry(now)));
        }
    }

    #[test]
    fn test_activation_requires_unactivated_and_integrated() {
        let now = Utc::now();
        let mut offer = offer_at(now);
        assert!(offer.matches_activation(now, 15));
        assert!(!offer.matches_activation(now, 5));

        offer.needs_reintegration = true;
        assert!(!offer.matches_activation(now, 15));
        offer.needs_reintegration = false;

        offer.activated_at = Some(now);
        assert!(!offer.matches_activation(now, 15));
    }

    #[test]
    fn test_activation_requires_end_date() {
        let now = Utc::now();
        let mut offer = offer_at(now);
        offer.end_date = None;
        assert!(!offer.matches_activation(now, 15));

        offer.end_date = Some(now);
        assert!(!offer.matches_activation(now, 15));
    }

    #[test]
    fn test_activated_at_is_write_once() {
        let now = Utc::now();
        let mut offer = offer_at(now);
        let first = now - Duration::minutes(5);
        offer.apply_patch(&OfferPatch { activated_at: Some(first), ..Default::default() }, now);
        offer.apply_patch(&OfferPatch { activated_at: Some(now), ..Default::default() }, now);
        assert_eq!(offer.activated_at, Some(first));
    }

    #[test]
    fn test_status_transitions() {
        assert!(OfferStatus::Draft.can_transition_to(OfferStatus::Active));
        assert!(OfferStatus::Expired.can_transition_to(OfferStatus::Active));
        assert!(!OfferStatus::Draft.can_transition_to(OfferStatus::Expired));
        assert!(!OfferStatus::Active.can_transition_to(OfferStatus::Draft));
        assert!(OfferStatus::Paused.can_transition_to(OfferStatus::Paused));
    }

    #[test]
    fn test_delivery_config_is_tagged_by_method() {
        let json = serde_json::json!({ "method": "sms", "message_template": "Show this text" });
        let config: DeliveryConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.method(), DeliveryMethod::Sms);
        assert_eq!(
            config,
            DeliveryConfig::Sms { message_template: "Show this text".to_string(), include_link: false }
        );
    }
}
