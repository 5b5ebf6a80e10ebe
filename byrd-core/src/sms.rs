use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime texts that are free for every merchant.
pub const FREE_TRIAL_TEXTS: i64 = 100;

/// Lifetime count at which FREEBYRD moves to the discounted rate.
pub const FREEBYRD_DISCOUNT_THRESHOLD: i64 = 3000;

/// One audit entry: a contiguous run of lifetime text ordinals billed at one rate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingBand {
    pub from: i64,
    pub to: i64,
    pub rate_cents: Decimal,
    pub count: i64,
    pub amount_cents: Decimal,
    pub tier: String,
}

/// Monthly usage row for a merchant. `pricing_breakdown` is append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmsUsage {
    pub merchant_id: Uuid,
    pub month: String,
    pub texts_sent: i64,
    pub total_fee_cents: Decimal,
    pub pricing_breakdown: Vec<PricingBand>,
    pub updated_at: DateTime<Utc>,
}

impl SmsUsage {
    pub fn empty(merchant_id: Uuid, month: String, now: DateTime<Utc>) -> Self {
        Self {
            merchant_id,
            month,
            texts_sent: 0,
            total_fee_cents: Decimal::ZERO,
            pricing_breakdown: Vec::new(),
            updated_at: now,
        }
    }

    pub fn record(&mut self, charge: &SmsCharge, now: DateTime<Utc>) {
        self.texts_sent += charge.count;
        self.total_fee_cents += charge.total_cents;
        self.pricing_breakdown.extend(charge.bands.iter().cloned());
        self.updated_at = now;
    }
}

/// The priced result of one batch, including how it settled against the text budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmsCharge {
    pub merchant_id: Uuid,
    pub month: String,
    pub count: i64,
    pub lifetime_before: i64,
    pub bands: Vec<PricingBand>,
    pub total_cents: Decimal,
    /// Dollars taken from the text budget.
    pub budget_debit: Decimal,
    /// Part of the fee the text budget could not cover, in cents.
    pub uncovered_cents: Decimal,
    pub text_budget_after: Decimal,
}

impl SmsCharge {
    pub fn lifetime_after(&self) -> i64 {
        self.lifetime_before + self.count
    }
}

/// Calendar-month key for usage rows, e.g. `2026-10`.
pub fn usage_month(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}
