//! Membership tiers and the static capability table that gates offer features.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::offer::{DeliveryMethod, OfferType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipTier {
    Nest,
    Freebyrd,
    #[serde(alias = "GLIDE")]
    Ascend,
    Soar,
    SoarPlus,
    SoarPlatinum,
}

/// Upgrade path, cheapest first.
pub const TIER_LADDER: [MembershipTier; 6] = [
    MembershipTier::Nest,
    MembershipTier::Freebyrd,
    MembershipTier::Ascend,
    MembershipTier::Soar,
    MembershipTier::SoarPlus,
    MembershipTier::SoarPlatinum,
];

#[derive(Debug, Clone, Serialize)]
pub struct TierPricing {
    /// Texts covered each calendar month; 0 means pay-as-you-go.
    pub monthly_text_allocation: u32,
    pub cost_per_text_cents: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierCapabilities {
    /// `None` means unlimited.
    pub max_active_offers: Option<u32>,
    pub allowed_offer_types: &'static [OfferType],
    pub allow_countdown: bool,
    pub allow_folders: bool,
    pub allow_notifications: bool,
    pub allow_auto_extend: bool,
    pub allow_media: bool,
    pub allow_customer_acquisition: bool,
    pub allowed_delivery_methods: &'static [DeliveryMethod],
    pub pricing: TierPricing,
}

const BASIC_TYPES: &[OfferType] = &[OfferType::PercentOff, OfferType::DollarOff];
const FREEBYRD_TYPES: &[OfferType] = &[OfferType::PercentOff, OfferType::DollarOff, OfferType::Bogo];
const ASCEND_TYPES: &[OfferType] = &[
    OfferType::PercentOff,
    OfferType::DollarOff,
    OfferType::Bogo,
    OfferType::FreeItem,
];
const ALL_TYPES: &[OfferType] = &[
    OfferType::PercentOff,
    OfferType::DollarOff,
    OfferType::Bogo,
    OfferType::FreeItem,
    OfferType::Bundle,
];

const IN_STORE_ONLY: &[DeliveryMethod] = &[DeliveryMethod::InStore];
const IN_STORE_AND_SMS: &[DeliveryMethod] = &[DeliveryMethod::InStore, DeliveryMethod::Sms];
const ALL_DELIVERY: &[DeliveryMethod] = &[DeliveryMethod::InStore, DeliveryMethod::Sms, DeliveryMethod::Email];

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Nest => "NEST",
            MembershipTier::Freebyrd => "FREEBYRD",
            MembershipTier::Ascend => "ASCEND",
            MembershipTier::Soar => "SOAR",
            MembershipTier::SoarPlus => "SOAR_PLUS",
            MembershipTier::SoarPlatinum => "SOAR_PLATINUM",
        }
    }

    /// The next rung on the ladder, if any.
    pub fn next(&self) -> Option<MembershipTier> {
        let idx = TIER_LADDER.iter().position(|t| t == self)?;
        TIER_LADDER.get(idx + 1).copied()
    }

    /// Cheapest tier above this one whose capabilities satisfy `qualifies`.
    pub fn next_qualifying<F>(&self, qualifies: F) -> Option<MembershipTier>
    where
        F: Fn(&TierCapabilities) -> bool,
    {
        TIER_LADDER
            .iter()
            .filter(|t| *t > self)
            .find(|t| qualifies(&t.capabilities()))
            .copied()
    }

    /// Tiers billed against a monthly text allocation (GLIDE/SOAR family).
    pub fn has_monthly_allocation(&self) -> bool {
        self.capabilities().pricing.monthly_text_allocation > 0
    }

    pub fn capabilities(&self) -> TierCapabilities {
        match self {
            MembershipTier::Nest => TierCapabilities {
                max_active_offers: Some(1),
                allowed_offer_types: BASIC_TYPES,
                allow_countdown: false,
                allow_folders: false,
                allow_notifications: false,
                allow_auto_extend: false,
                allow_media: false,
                allow_customer_acquisition: false,
                allowed_delivery_methods: IN_STORE_ONLY,
                pricing: TierPricing {
                    monthly_text_allocation: 0,
                    cost_per_text_cents: Decimal::ZERO,
                },
            },
            MembershipTier::Freebyrd => TierCapabilities {
                max_active_offers: Some(3),
                allowed_offer_types: FREEBYRD_TYPES,
                allow_countdown: false,
                allow_folders: false,
                allow_notifications: true,
                allow_auto_extend: false,
                allow_media: true,
                allow_customer_acquisition: false,
                allowed_delivery_methods: IN_STORE_AND_SMS,
                pricing: TierPricing {
                    monthly_text_allocation: 0,
                    cost_per_text_cents: Decimal::new(21, 1),
                },
            },
            MembershipTier::Ascend => TierCapabilities {
                max_active_offers: Some(10),
                allowed_offer_types: ASCEND_TYPES,
                allow_countdown: true,
                allow_folders: true,
                allow_notifications: true,
                allow_auto_extend: true,
                allow_media: true,
                allow_customer_acquisition: false,
                allowed_delivery_methods: ALL_DELIVERY,
                pricing: TierPricing {
                    monthly_text_allocation: 500,
                    cost_per_text_cents: Decimal::new(79, 2),
                },
            },
            MembershipTier::Soar => soar_family(Some(25), 1_500),
            MembershipTier::SoarPlus => soar_family(Some(50), 5_000),
            MembershipTier::SoarPlatinum => soar_family(None, 15_000),
        }
    }
}

fn soar_family(max_active_offers: Option<u32>, monthly_text_allocation: u32) -> TierCapabilities {
    TierCapabilities {
        max_active_offers,
        allowed_offer_types: ALL_TYPES,
        allow_countdown: true,
        allow_folders: true,
        allow_notifications: true,
        allow_auto_extend: true,
        allow_media: true,
        allow_customer_acquisition: true,
        allowed_delivery_methods: ALL_DELIVERY,
        pricing: TierPricing {
            monthly_text_allocation,
            cost_per_text_cents: Decimal::new(79, 2),
        },
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEST" => Ok(MembershipTier::Nest),
            "FREEBYRD" => Ok(MembershipTier::Freebyrd),
            "ASCEND" | "GLIDE" => Ok(MembershipTier::Ascend),
            "SOAR" => Ok(MembershipTier::Soar),
            "SOAR_PLUS" => Ok(MembershipTier::SoarPlus),
            "SOAR_PLATINUM" => Ok(MembershipTier::SoarPlatinum),
            other => Err(format!("unknown membership tier: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_order() {
        assert_eq!(MembershipTier::Nest.next(), Some(MembershipTier::Freebyrd));
        assert_eq!(MembershipTier::Freebyrd.next(), Some(MembershipTier::Ascend));
        assert_eq!(MembershipTier::SoarPlus.next(), Some(MembershipTier::SoarPlatinum));
        assert_eq!(MembershipTier::SoarPlatinum.next(), None);
    }

    #[test]
    fn test_next_qualifying_skips_tiers_without_feature() {
        let tier = MembershipTier::Nest.next_qualifying(|c| c.allow_customer_acquisition);
        assert_eq!(tier, Some(MembershipTier::Soar));

        let tier = MembershipTier::Freebyrd.next_qualifying(|c| c.allow_countdown);
        assert_eq!(tier, Some(MembershipTier::Ascend));
    }

    #[test]
    fn test_glide_alias() {
        assert_eq!("GLIDE".parse::<MembershipTier>().unwrap(), MembershipTier::Ascend);
        let tier: MembershipTier = serde_json::from_str("\"GLIDE\"").unwrap();
        assert_eq!(tier, MembershipTier::Ascend);
        assert_eq!(serde_json::to_string(&MembershipTier::SoarPlus).unwrap(), "\"SOAR_PLUS\"");
    }

    #[test]
    fn test_allocation_tiers() {
        assert!(!MembershipTier::Nest.has_monthly_allocation());
        assert!(!MembershipTier::Freebyrd.has_monthly_allocation());
        assert!(MembershipTier::Ascend.has_monthly_allocation());
        assert!(MembershipTier::SoarPlatinum.has_monthly_allocation());
        assert_eq!(MembershipTier::SoarPlatinum.capabilities().max_active_offers, None);
    }
}
