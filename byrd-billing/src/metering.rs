//! SMS cost metering.
//!
//! A batch of N texts occupies lifetime ordinals `L+1 ..= L+N`. Each text is priced by the
//! lifetime count *before* it was sent: under 100 it is free, then the tier rate applies.
//! FREEBYRD drops from 2.1¢ to 1.3¢ once 3000 texts have gone out. A batch that straddles a
//! boundary is split into one band per rate.

use byrd_core::sms::{usage_month, FREEBYRD_DISCOUNT_THRESHOLD, FREE_TRIAL_TEXTS};
use byrd_core::{Merchant, MembershipTier, PricingBand, SmsCharge};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub const FREE_TRIAL_BAND: &str = "FREE_TRIAL";
pub const FREEBYRD_DISCOUNT_BAND: &str = "FREEBYRD_3000_PLUS";

pub fn freebyrd_standard_rate() -> Decimal {
    Decimal::new(21, 1)
}

pub fn freebyrd_discount_rate() -> Decimal {
    Decimal::new(13, 1)
}

/// Rate in cents for the next text a merchant sends.
pub fn current_rate_cents(merchant: &Merchant) -> Decimal {
    let sent = merchant.lifetime_texts_sent;
    if sent < FREE_TRIAL_TEXTS {
        return Decimal::ZERO;
    }
    match merchant.membership_tier {
        MembershipTier::Freebyrd if sent >= FREEBYRD_DISCOUNT_THRESHOLD => freebyrd_discount_rate(),
        MembershipTier::Freebyrd => freebyrd_standard_rate(),
        tier => tier.capabilities().pricing.cost_per_text_cents,
    }
}

/// Push a band covering texts whose prior lifetime count is in `[from_prior, to_prior)`.
fn push_band(bands: &mut Vec<PricingBand>, from_prior: i64, to_prior: i64, rate_cents: Decimal, tier: &str) {
    let count = to_prior - from_prior;
    if count <= 0 {
        return;
    }
    bands.push(PricingBand {
        from: from_prior + 1,
        to: to_prior,
        rate_cents,
        count,
        amount_cents: rate_cents * Decimal::from(count),
        tier: tier.to_string(),
    });
}

/// Split `count` texts into priced bands starting after `lifetime_before`.
pub fn price_bands(tier: MembershipTier, lifetime_before: i64, count: i64) -> Vec<PricingBand> {
    let mut bands = Vec::new();
    let end = lifetime_before + count;

    let free_end = end.min(FREE_TRIAL_TEXTS).max(lifetime_before);
    push_band(&mut bands, lifetime_before, free_end, Decimal::ZERO, FREE_TRIAL_BAND);

    match tier {
        MembershipTier::Freebyrd => {
            let split = end.min(FREEBYRD_DISCOUNT_THRESHOLD).max(free_end);
            push_band(&mut bands, free_end, split, freebyrd_standard_rate(), tier.as_str());
            push_band(&mut bands, split, end, freebyrd_discount_rate(), FREEBYRD_DISCOUNT_BAND);
        }
        other => {
            let rate = other.capabilities().pricing.cost_per_text_cents;
            push_band(&mut bands, free_end, end, rate, other.as_str());
        }
    }
    bands
}

/// Price a batch for `merchant` and settle it against the text budget, floored at zero.
pub fn price_batch(merchant: &Merchant, count: i64, now: DateTime<Utc>) -> SmsCharge {
    let bands = price_bands(merchant.membership_tier, merchant.lifetime_texts_sent, count);
    let total_cents: Decimal = bands.iter().map(|b| b.amount_cents).sum();

    let fee_dollars = total_cents / Decimal::ONE_HUNDRED;
    let available = merchant.ledgers.text_budget.max(Decimal::ZERO);
    let budget_debit = fee_dollars.min(available);
    let uncovered_cents = (fee_dollars - budget_debit) * Decimal::ONE_HUNDRED;

    SmsCharge {
        merchant_id: merchant.id,
        month: usage_month(now),
        count,
        lifetime_before: merchant.lifetime_texts_sent,
        bands,
        total_cents,
        budget_debit,
        uncovered_cents,
        text_budget_after: merchant.ledgers.text_budget - budget_debit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merchant(tier: MembershipTier, lifetime: i64, text_budget: Decimal) -> Merchant {
        let mut merchant = Merchant::new("Tacos".into(), "t@example.com".into(), tier);
        merchant.lifetime_texts_sent = lifetime;
        merchant.ledgers.text_budget = text_budget;
        merchant
    }

    #[test]
    fn test_freebyrd_straddles_discount_boundary() {
        let bands = price_bands(MembershipTier::Freebyrd, 2998, 5);

        assert_eq!(bands.len(), 2);
        assert_eq!((bands[0].from, bands[0].to, bands[0].count), (2999, 3000, 2));
        assert_eq!(bands[0].rate_cents, Decimal::new(21, 1));
        assert_eq!(bands[0].amount_cents, Decimal::new(42, 1));
        assert_eq!((bands[1].from, bands[1].to, bands[1].count), (3001, 3003, 3));
        assert_eq!(bands[1].rate_cents, Decimal::new(13, 1));
        assert_eq!(bands[1].amount_cents, Decimal::new(39, 1));
    }

    #[test]
    fn test_partial_free_trial() {
        let bands = price_bands(MembershipTier::Freebyrd, 95, 10);

        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].tier, FREE_TRIAL_BAND);
        assert_eq!((bands[0].from, bands[0].to, bands[0].count), (96, 100, 5));
        assert_eq!(bands[0].amount_cents, Decimal::ZERO);
        assert_eq!((bands[1].from, bands[1].to, bands[1].count), (101, 105, 5));
        assert_eq!(bands[1].amount_cents, Decimal::new(105, 1));
    }

    #[test]
    fn test_allocation_tier_flat_rate() {
        let bands = price_bands(MembershipTier::Ascend, 500, 100);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].rate_cents, Decimal::new(79, 2));
        assert_eq!(bands[0].amount_cents, Decimal::new(79, 0));
    }

    #[test]
    fn test_bands_are_contiguous_and_cover_batch() {
        for tier in [MembershipTier::Freebyrd, MembershipTier::Soar, MembershipTier::Nest] {
            for lifetime in [0, 42, 99, 100, 2990, 2999, 3000, 5000] {
                for count in [1, 7, 150] {
                    let bands = price_bands(tier, lifetime, count);
                    let total: i64 = bands.iter().map(|b| b.count).sum();
                    assert_eq!(total, count, "{:?} L={} N={}", tier, lifetime, count);

                    let mut expected_from = lifetime + 1;
                    for band in &bands {
                        assert_eq!(band.from, expected_from);
                        assert!(band.to >= band.from);
                        if band.to <= FREE_TRIAL_TEXTS {
                            assert_eq!(band.amount_cents, Decimal::ZERO);
                        }
                        expected_from = band.to + 1;
                    }
                }
            }
        }
    }

    #[test]
    fn test_debit_is_floored_at_zero() {
        // 50 paid texts at 2.1¢ = 105¢ against a $0.60 budget.
        let m = merchant(MembershipTier::Freebyrd, 200, Decimal::new(60, 2));
        let charge = price_batch(&m, 50, Utc::now());

        assert_eq!(charge.total_cents, Decimal::new(105, 0));
        assert_eq!(charge.budget_debit, Decimal::new(60, 2));
        assert_eq!(charge.uncovered_cents, Decimal::new(45, 0));
        assert_eq!(charge.text_budget_after, Decimal::ZERO);
        assert_eq!(charge.lifetime_after(), 250);
    }

    #[test]
    fn test_current_rate_follows_lifetime() {
        assert_eq!(current_rate_cents(&merchant(MembershipTier::Freebyrd, 10, Decimal::ZERO)), Decimal::ZERO);
        assert_eq!(current_rate_cents(&merchant(MembershipTier::Freebyrd, 100, Decimal::ZERO)), Decimal::new(21, 1));
        assert_eq!(current_rate_cents(&merchant(MembershipTier::Freebyrd, 3000, Decimal::ZERO)), Decimal::new(13, 1));
        assert_eq!(current_rate_cents(&merchant(MembershipTier::SoarPlus, 3000, Decimal::ZERO)), Decimal::new(79, 2));
    }
}
