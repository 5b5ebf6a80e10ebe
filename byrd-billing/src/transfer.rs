//! Two-sided ledger transfers.
//!
//! A transfer is planned against a snapshot (sufficiency check) and then committed as a
//! single [`LedgerDelta`]; the repository applies the delta atomically and refuses it if any
//! ledger would go negative, so a concurrent spend can never produce a half-applied move.

use byrd_core::merchant::cents_to_dollars;
use byrd_core::{CoreError, CoreResult, FieldError, Ledger, LedgerDelta, Merchant};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferRequest {
    BankToText { amount_cents: i64 },
    BankToRips { amount_cents: i64 },
    /// Buy texts: bank pays `count × rate` into the text budget.
    BuyTexts { count: i64 },
    /// Sell texts back: the reverse of `BuyTexts`.
    SellTexts { count: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    pub source: Ledger,
    pub destination: Ledger,
    pub amount_cents: i64,
    pub delta: LedgerDelta,
}

impl TransferPlan {
    pub fn summary(&self) -> String {
        format!(
            "Moved ${} from your {} to your {}.",
            cents_to_dollars(self.amount_cents),
            self.source,
            self.destination
        )
    }
}

impl TransferRequest {
    fn quantity(&self) -> (&'static str, i64) {
        match *self {
            TransferRequest::BankToText { amount_cents } | TransferRequest::BankToRips { amount_cents } => {
                ("amount_cents", amount_cents)
            }
            TransferRequest::BuyTexts { count } | TransferRequest::SellTexts { count } => ("count", count),
        }
    }

    /// Check sufficiency against `merchant` and build the delta to commit.
    pub fn plan(&self, merchant: &Merchant) -> CoreResult<TransferPlan> {
        let (field, quantity) = self.quantity();
        if quantity <= 0 {
            return Err(CoreError::Validation(vec![FieldError::new(
                field,
                "Amount must be greater than zero",
            )]));
        }

        let (source, destination, amount_cents) = match *self {
            TransferRequest::BankToText { amount_cents } => (Ledger::Bank, Ledger::Text, amount_cents),
            TransferRequest::BankToRips { amount_cents } => (Ledger::Bank, Ledger::Rips, amount_cents),
            TransferRequest::BuyTexts { count } => (Ledger::Bank, Ledger::Text, text_cost_cents(merchant, count)?),
            TransferRequest::SellTexts { count } => (Ledger::Text, Ledger::Bank, text_cost_cents(merchant, count)?),
        };

        let required = cents_to_dollars(amount_cents);
        let available = merchant.ledgers.balance_of(source);
        if available < required {
            return Err(CoreError::InsufficientFunds {
                ledger: source,
                required: required.to_string(),
                available: available.to_string(),
            });
        }

        let mut delta = LedgerDelta::default();
        for (ledger, sign) in [(source, -1i64), (destination, 1i64)] {
            match ledger {
                Ledger::Bank => delta.bank_cents += sign * amount_cents,
                Ledger::Text => delta.text_budget += Decimal::from(sign) * required,
                Ledger::Rips => delta.rips_budget += Decimal::from(sign) * required,
            }
        }

        Ok(TransferPlan {
            source,
            destination,
            amount_cents,
            delta,
        })
    }
}

/// Whole-cent price of `count` texts at the merchant's tier rate.
fn text_cost_cents(merchant: &Merchant, count: i64) -> CoreResult<i64> {
    let rate = merchant.membership_tier.capabilities().pricing.cost_per_text_cents;
    if rate.is_zero() {
        return Err(CoreError::TierRestricted(vec![FieldError::upgrade(
            "count",
            format!("{} does not include texting", merchant.membership_tier),
            merchant.membership_tier.next(),
        )]));
    }
    (Decimal::from(count) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .filter(|cents| *cents > 0)
        .ok_or_else(|| CoreError::Validation(vec![FieldError::new("count", "Text count is out of range")]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byrd_core::MembershipTier;

    fn merchant(tier: MembershipTier, bank_cents: i64, text_budget: Decimal) -> Merchant {
        let mut merchant = Merchant::new("Florist".into(), "f@example.com".into(), tier);
        merchant.ledgers.bank_cents = bank_cents;
        merchant.ledgers.text_budget = text_budget;
        merchant
    }

    #[test]
    fn test_bank_to_text_moves_exact_amount() {
        let m = merchant(MembershipTier::Soar, 1_000, Decimal::ZERO);
        let plan = TransferRequest::BankToText { amount_cents: 250 }.plan(&m).unwrap();

        assert_eq!(plan.delta.bank_cents, -250);
        assert_eq!(plan.delta.text_budget, Decimal::new(250, 2));
        assert_eq!(plan.delta.rips_budget, Decimal::ZERO);

        let after = m.ledgers.apply(&plan.delta).unwrap();
        assert_eq!(after.bank_cents, 750);
        assert_eq!(after.text_budget, Decimal::new(250, 2));
    }

    #[test]
    fn test_insufficient_source_is_rejected() {
        let m = merchant(MembershipTier::Soar, 100, Decimal::ZERO);
        let err = TransferRequest::BankToRips { amount_cents: 101 }.plan(&m).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { ledger: Ledger::Bank, .. }));
    }

    #[test]
    fn test_non_positive_amounts_are_rejected() {
        let m = merchant(MembershipTier::Soar, 100, Decimal::ZERO);
        for request in [
            TransferRequest::BankToText { amount_cents: -5 },
            TransferRequest::BankToRips { amount_cents: 0 },
            TransferRequest::BuyTexts { count: -1 },
        ] {
            assert!(matches!(request.plan(&m), Err(CoreError::Validation(_))));
        }
    }

    #[test]
    fn test_buy_and_sell_texts_are_symmetric() {
        // 100 texts at 0.79¢ = 79¢.
        let m = merchant(MembershipTier::Ascend, 1_000, Decimal::ZERO);
        let buy = TransferRequest::BuyTexts { count: 100 }.plan(&m).unwrap();
        assert_eq!(buy.amount_cents, 79);
        let after_buy = m.ledgers.apply(&buy.delta).unwrap();
        assert_eq!(after_buy.text_budget, Decimal::new(79, 2));

        let mut m2 = m.clone();
        m2.ledgers = after_buy;
        let sell = TransferRequest::SellTexts { count: 100 }.plan(&m2).unwrap();
        let after_sell = m2.ledgers.apply(&sell.delta).unwrap();
        assert_eq!(after_sell.bank_cents, 1_000);
        assert_eq!(after_sell.text_budget, Decimal::ZERO);
    }

    #[test]
    fn test_nest_cannot_buy_texts() {
        let m = merchant(MembershipTier::Nest, 1_000, Decimal::ZERO);
        let err = TransferRequest::BuyTexts { count: 10 }.plan(&m).unwrap_err();
        assert!(matches!(err, CoreError::TierRestricted(_)));
    }
}
