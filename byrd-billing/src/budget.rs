use byrd_core::{MembershipTier, Merchant};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::metering;

/// Pre-send answer: may this merchant send another text right now?
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BudgetCheck {
    pub allowed: bool,
    pub tier: MembershipTier,
    pub reason: Option<String>,
    pub texts_sent_this_month: i64,
    /// `None` for pay-as-you-go tiers.
    pub monthly_allocation: Option<u32>,
    pub remaining_this_month: Option<i64>,
    /// Informational; what the next text will cost.
    pub current_rate_cents: Decimal,
}

impl BudgetCheck {
    /// True when an allocation tier was refused because it used up its month.
    pub fn quota_exhausted(&self) -> bool {
        !self.allowed && self.monthly_allocation.is_some()
    }
}

pub fn evaluate(merchant: &Merchant, texts_sent_this_month: i64) -> BudgetCheck {
    let tier = merchant.membership_tier;
    let allocation = tier.capabilities().pricing.monthly_text_allocation;
    let current_rate_cents = metering::current_rate_cents(merchant);

    match tier {
        MembershipTier::Nest => BudgetCheck {
            allowed: false,
            tier,
            reason: Some("Texting is not included in the NEST tier".to_string()),
            texts_sent_this_month,
            monthly_allocation: None,
            remaining_this_month: None,
            current_rate_cents,
        },
        // Pay-as-you-go: no monthly cap, every text is metered.
        _ if !tier.has_monthly_allocation() => BudgetCheck {
            allowed: true,
            tier,
            reason: None,
            texts_sent_this_month,
            monthly_allocation: None,
            remaining_this_month: None,
            current_rate_cents,
        },
        _ => {
            let remaining = (i64::from(allocation) - texts_sent_this_month).max(0);
            let allowed = remaining > 0;
            BudgetCheck {
                allowed,
                tier,
                reason: (!allowed).then(|| {
                    format!("Monthly allocation of {} texts has been used", allocation)
                }),
                texts_sent_this_month,
                monthly_allocation: Some(allocation),
                remaining_this_month: Some(remaining),
                current_rate_cents,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merchant(tier: MembershipTier) -> Merchant {
        Merchant::new("Deli".into(), "deli@example.com".into(), tier)
    }

    #[test]
    fn test_nest_is_always_denied() {
        let check = evaluate(&merchant(MembershipTier::Nest), 0);
        assert!(!check.allowed);
        assert!(!check.quota_exhausted());
    }

    #[test]
    fn test_freebyrd_is_never_capped() {
        let check = evaluate(&merchant(MembershipTier::Freebyrd), 1_000_000);
        assert!(check.allowed);
        assert_eq!(check.monthly_allocation, None);
    }

    #[test]
    fn test_allocation_tiers_stop_at_allocation() {
        let m = merchant(MembershipTier::Ascend);
        let check = evaluate(&m, 499);
        assert!(check.allowed);
        assert_eq!(check.remaining_this_month, Some(1));

        let check = evaluate(&m, 500);
        assert!(!check.allowed);
        assert!(check.quota_exhausted());
        assert_eq!(check.remaining_this_month, Some(0));

        assert!(evaluate(&merchant(MembershipTier::SoarPlatinum), 14_999).allowed);
    }
}
