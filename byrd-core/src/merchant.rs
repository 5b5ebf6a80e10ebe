use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tier::MembershipTier;

/// Cost of acquiring one new customer; the bank must cover it before acquisition is enabled.
pub const MIN_ACQUISITION_BALANCE_CENTS: i64 = 165;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Ledger {
    Bank,
    Text,
    Rips,
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ledger::Bank => f.write_str("bank"),
            Ledger::Text => f.write_str("text budget"),
            Ledger::Rips => f.write_str("RIPS budget"),
        }
    }
}

/// The three budget pools on a merchant. Bank is whole cents, the budgets are dollars.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MerchantLedgers {
    pub bank_cents: i64,
    pub text_budget: Decimal,
    pub rips_budget: Decimal,
}

impl MerchantLedgers {
    /// Result of applying `delta`, or `None` if any ledger would go negative.
    pub fn apply(&self, delta: &LedgerDelta) -> Option<MerchantLedgers> {
        let next = MerchantLedgers {
            bank_cents: self.bank_cents.checked_add(delta.bank_cents)?,
            text_budget: self.text_budget + delta.text_budget,
            rips_budget: self.rips_budget + delta.rips_budget,
        };
        let non_negative = next.bank_cents >= 0
            && next.text_budget >= Decimal::ZERO
            && next.rips_budget >= Decimal::ZERO;
        non_negative.then_some(next)
    }

    pub fn balance_of(&self, ledger: Ledger) -> Decimal {
        match ledger {
            Ledger::Bank => cents_to_dollars(self.bank_cents),
            Ledger::Text => self.text_budget,
            Ledger::Rips => self.rips_budget,
        }
    }
}

/// Signed change to every ledger, applied as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LedgerDelta {
    pub bank_cents: i64,
    pub text_budget: Decimal,
    pub rips_budget: Decimal,
}

pub fn cents_to_dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Merchant {
    pub id: Uuid,
    pub business_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub membership_tier: MembershipTier,
    pub lifetime_texts_sent: i64,
    pub free_trial_used: bool,
    pub ledgers: MerchantLedgers,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    pub fn new(business_name: String, email: String, membership_tier: MembershipTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_name,
            email,
            phone: None,
            membership_tier,
            lifetime_texts_sent: 0,
            free_trial_used: false,
            ledgers: MerchantLedgers::default(),
            created_at: Utc::now(),
        }
    }

    pub fn can_fund_acquisition(&self) -> bool {
        self.ledgers.bank_cents >= MIN_ACQUISITION_BALANCE_CENTS
    }
}
