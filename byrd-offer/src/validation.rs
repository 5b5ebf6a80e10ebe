//! Offer validation gates. Drafts skip everything but the basic field checks.

use byrd_core::merchant::MIN_ACQUISITION_BALANCE_CENTS;
use byrd_core::{AddType, FieldError, MembershipTier, Merchant, Offer, OfferStatus};
use chrono::{DateTime, Duration, Utc};

/// Shortest run a non-draft offer may be scheduled for, measured from now.
pub const MIN_FORWARD_WINDOW_HOURS: i64 = 2;

/// Clock-skew tolerance on a start date that is "now".
pub const START_SKEW_GRACE_SECS: i64 = 60;

/// What a save touched, so time checks only run against values the merchant supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeSet {
    pub is_new: bool,
    pub start_changed: bool,
    pub end_changed: bool,
    pub status_changed: bool,
}

impl ChangeSet {
    pub fn created() -> Self {
        Self {
            is_new: true,
            start_changed: true,
            end_changed: true,
            status_changed: true,
        }
    }

    fn schedule_touched(&self) -> bool {
        self.is_new || self.start_changed || self.end_changed || self.status_changed
    }
}

pub fn validate_fields(offer: &Offer) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if offer.title.trim().is_empty() {
        errors.push(FieldError::new("title", "Title is required"));
    }
    if offer.target_units.is_some_and(|t| t <= 0) {
        errors.push(FieldError::new("target_units", "Target units must be positive"));
    }
    if offer.extension_days <= 0 {
        errors.push(FieldError::new("extension_days", "Extension must be at least one day"));
    }
    if offer.units_sold < 0 {
        errors.push(FieldError::new("units_sold", "Units sold cannot be negative"));
    }
    errors
}

/// Temporal window checks for live (active or paused) offers.
pub fn validate_schedule(offer: &Offer, changes: ChangeSet, now: DateTime<Utc>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !matches!(offer.status, OfferStatus::Active | OfferStatus::Paused) {
        return errors;
    }

    if offer.status == OfferStatus::Active {
        match offer.end_date {
            None => errors.push(FieldError::new("end_date", "Active offers need an end date")),
            Some(end) if end < now => {
                errors.push(FieldError::new("end_date", "End date is in the past"))
            }
            Some(_) => {}
        }
    }

    if let (Some(start), Some(end)) = (offer.start_date, offer.end_date) {
        if end < start {
            errors.push(FieldError::new("end_date", "End date must be after the start date"));
        }
    }

    if changes.is_new || changes.start_changed {
        if let Some(start) = offer.start_date {
            if start < now - Duration::seconds(START_SKEW_GRACE_SECS) {
                errors.push(FieldError::new("start_date", "Start date cannot be in the past"));
            }
        }
    }

    if changes.schedule_touched() && errors.is_empty() {
        if let Some(end) = offer.end_date {
            let from = offer.start_date.map_or(now, |start| start.max(now));
            if end < from + Duration::hours(MIN_FORWARD_WINDOW_HOURS) {
                errors.push(FieldError::new(
                    "end_date",
                    format!("Offers must run for at least {} hours", MIN_FORWARD_WINDOW_HOURS),
                ));
            }
        }
    }

    errors
}

/// Every feature the tier does not allow, each naming the cheapest tier that does.
pub fn validate_tier_capabilities(offer: &Offer, tier: MembershipTier) -> Vec<FieldError> {
    let caps = tier.capabilities();
    let mut errors = Vec::new();

    if !caps.allowed_offer_types.contains(&offer.offer_type) {
        let offer_type = offer.offer_type;
        errors.push(FieldError::upgrade(
            "offer_type",
            format!("{} offers are not available on {}", offer_type.as_str(), tier),
            tier.next_qualifying(|c| c.allowed_offer_types.contains(&offer_type)),
        ));
    }
    if offer.add_type == AddType::Countdown && !caps.allow_countdown {
        errors.push(FieldError::upgrade(
            "add_type",
            "Countdown offers require an upgrade",
            tier.next_qualifying(|c| c.allow_countdown),
        ));
    }
    if offer.folder_id.is_some() && !caps.allow_folders {
        errors.push(FieldError::upgrade(
            "folder_id",
            "Campaign folders require an upgrade",
            tier.next_qualifying(|c| c.allow_folders),
        ));
    }
    if offer.notify_on_shortfall && !caps.allow_notifications {
        errors.push(FieldError::upgrade(
            "notify_on_shortfall",
            "Offer notifications require an upgrade",
            tier.next_qualifying(|c| c.allow_notifications),
        ));
    }
    if offer.auto_extend && !caps.allow_auto_extend {
        errors.push(FieldError::upgrade(
            "auto_extend",
            "Auto-extend requires an upgrade",
            tier.next_qualifying(|c| c.allow_auto_extend),
        ));
    }
    if !offer.media_urls.is_empty() && !caps.allow_media {
        errors.push(FieldError::upgrade(
            "media_urls",
            "Media attachments require an upgrade",
            tier.next_qualifying(|c| c.allow_media),
        ));
    }
    if offer.get_new_customers && !caps.allow_customer_acquisition {
        errors.push(FieldError::upgrade(
            "get_new_customers",
            "Customer acquisition requires an upgrade",
            tier.next_qualifying(|c| c.allow_customer_acquisition),
        ));
    }
    if let Some(delivery) = &offer.delivery {
        let method = delivery.method();
        if !caps.allowed_delivery_methods.contains(&method) {
            errors.push(FieldError::upgrade(
                "delivery",
                format!("{} delivery is not available on {}", method.as_str(), tier),
                tier.next_qualifying(|c| c.allowed_delivery_methods.contains(&method)),
            ));
        }
    }

    errors
}

/// `active_count` excludes the offer being saved.
pub fn check_active_limit(tier: MembershipTier, active_count: u32) -> Option<FieldError> {
    let max = tier.capabilities().max_active_offers?;
    (active_count >= max).then(|| {
        FieldError::upgrade(
            "status",
            format!("{} allows at most {} active offers", tier, max),
            tier.next(),
        )
    })
}

pub fn check_acquisition_balance(offer: &Offer, merchant: &Merchant) -> Option<FieldError> {
    (offer.get_new_customers && !merchant.can_fund_acquisition()).then(|| {
        FieldError::new(
            "get_new_customers",
            format!(
                "Bank balance must be at least ${} to acquire new customers",
                byrd_core::merchant::cents_to_dollars(MIN_ACQUISITION_BALANCE_CENTS)
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byrd_core::{DeliveryConfig, OfferType};
    use uuid::Uuid;

    fn live_offer(now: DateTime<Utc>) -> Offer {
        let mut offer = Offer::new(Uuid::new_v4(), "Free coffee with pastry".into(), OfferType::PercentOff);
        offer.status = OfferStatus::Active;
        offer.start_date = Some(now);
        offer.end_date = Some(now + Duration::hours(3));
        offer
    }

    #[test]
    fn test_valid_schedule_passes() {
        let now = Utc::now();
        assert!(validate_schedule(&live_offer(now), ChangeSet::created(), now).is_empty());
    }

    #[test]
    fn test_active_needs_end_date() {
        let now = Utc::now();
        let mut offer = live_offer(now);
        offer.end_date = None;
        let errors = validate_schedule(&offer, ChangeSet::created(), now);
        assert_eq!(errors[0].field, "end_date");
    }

    #[test]
    fn test_start_grace_window() {
        let now = Utc::now();
        let mut offer = live_offer(now);
        offer.start_date = Some(now - Duration::seconds(59));
        assert!(validate_schedule(&offer, ChangeSet::created(), now).is_empty());

        offer.start_date = Some(now - Duration::seconds(61));
        let errors = validate_schedule(&offer, ChangeSet::created(), now);
        assert!(errors.iter().any(|e| e.field == "start_date"));

        // An untouched start date on an existing offer is not re-checked.
        let unchanged = ChangeSet { end_changed: true, ..Default::default() };
        assert!(validate_schedule(&offer, unchanged, now).is_empty());
    }

    #[test]
    fn test_two_hour_minimum() {
        let now = Utc::now();
        let mut offer = live_offer(now);
        offer.end_date = Some(now + Duration::minutes(90));
        let errors = validate_schedule(&offer, ChangeSet::created(), now);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("2 hours"));

        offer.start_date = Some(now + Duration::hours(5));
        offer.end_date = Some(now + Duration::hours(6));
        assert!(!validate_schedule(&offer, ChangeSet::created(), now).is_empty());
    }

    #[test]
    fn test_end_before_start() {
        let now = Utc::now();
        let mut offer = live_offer(now);
        offer.start_date = Some(now + Duration::hours(10));
        offer.end_date = Some(now + Duration::hours(5));
        let errors = validate_schedule(&offer, ChangeSet::created(), now);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "End date must be after the start date");
    }

    #[test]
    fn test_tier_violations_are_collected() {
        let now = Utc::now();
        let mut offer = live_offer(now);
        offer.offer_type = OfferType::Bundle;
        offer.add_type = AddType::Countdown;
        offer.auto_extend = true;
        offer.media_urls = vec!["https://cdn.example.com/a.png".into()];
        offer.delivery = Some(DeliveryConfig::Email { subject: "Hi".into(), reply_to: None });

        let errors = validate_tier_capabilities(&offer, MembershipTier::Nest);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["offer_type", "add_type", "auto_extend", "media_urls", "delivery"]);

        assert_eq!(errors[0].upgrade_required, Some(MembershipTier::Soar));
        assert_eq!(errors[1].upgrade_required, Some(MembershipTier::Ascend));
        assert_eq!(errors[3].upgrade_required, Some(MembershipTier::Freebyrd));
        assert_eq!(errors[4].upgrade_required, Some(MembershipTier::Ascend));

        assert!(validate_tier_capabilities(&offer, MembershipTier::Soar).is_empty());
    }

    #[test]
    fn test_active_limit_uses_fixed_ladder() {
        let err = check_active_limit(MembershipTier::Freebyrd, 3).unwrap();
        assert_eq!(err.upgrade_required, Some(MembershipTier::Ascend));
        assert!(check_active_limit(MembershipTier::Freebyrd, 2).is_none());
        assert!(check_active_limit(MembershipTier::SoarPlatinum, 10_000).is_none());
    }

    #[test]
    fn test_acquisition_balance() {
        let now = Utc::now();
        let mut offer = live_offer(now);
        offer.get_new_customers = true;
        let mut merchant = Merchant::new("Gym".into(), "gym@example.com".into(), MembershipTier::Soar);
        merchant.ledgers.bank_cents = 100;
        assert!(check_acquisition_balance(&offer, &merchant).is_some());
        merchant.ledgers.bank_cents = 165;
        assert!(check_acquisition_balance(&offer, &merchant).is_none());
    }
}
