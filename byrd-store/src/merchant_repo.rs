use async_trait::async_trait;
use byrd_core::repository::{MerchantRepository, RepoError, RepoResult, SmsPricer};
use byrd_core::sms::FREE_TRIAL_TEXTS;
use byrd_core::{LedgerDelta, Merchant, MerchantLedgers, PricingBand, SmsCharge, SmsUsage};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const MERCHANT_COLUMNS: &str = "id, business_name, email, phone, membership_tier, lifetime_texts_sent, \
    free_trial_used, merchant_bank_cents, merchant_text_budget, merchant_rips_budget, created_at";

#[derive(Debug, sqlx::FromRow)]
struct MerchantRow {
    id: Uuid,
    business_name: String,
    email: String,
    phone: Option<String>,
    membership_tier: String,
    lifetime_texts_sent: i64,
    free_trial_used: bool,
    merchant_bank_cents: i64,
    merchant_text_budget: Decimal,
    merchant_rips_budget: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<MerchantRow> for Merchant {
    type Error = RepoError;

    fn try_from(row: MerchantRow) -> Result<Self, Self::Error> {
        Ok(Merchant {
            id: row.id,
            business_name: row.business_name,
            email: row.email,
            phone: row.phone,
            membership_tier: row.membership_tier.parse()?,
            lifetime_texts_sent: row.lifetime_texts_sent,
            free_trial_used: row.free_trial_used,
            ledgers: MerchantLedgers {
                bank_cents: row.merchant_bank_cents,
                text_budget: row.merchant_text_budget,
                rips_budget: row.merchant_rips_budget,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SmsUsageRow {
    merchant_id: Uuid,
    month: String,
    texts_sent: i64,
    total_fee_cents: Decimal,
    pricing_breakdown: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SmsUsageRow> for SmsUsage {
    type Error = RepoError;

    fn try_from(row: SmsUsageRow) -> Result<Self, Self::Error> {
        Ok(SmsUsage {
            merchant_id: row.merchant_id,
            month: row.month,
            texts_sent: row.texts_sent,
            total_fee_cents: row.total_fee_cents,
            pricing_breakdown: serde_json::from_value::<Vec<PricingBand>>(row.pricing_breakdown)?,
            updated_at: row.updated_at,
        })
    }
}

pub struct PostgresMerchantRepository {
    pub pool: PgPool,
}

#[async_trait]
impl MerchantRepository for PostgresMerchantRepository {
    async fn get_merchant(&self, id: Uuid) -> RepoResult<Option<Merchant>> {
        let sql = format!("SELECT {} FROM merchants WHERE id = $1", MERCHANT_COLUMNS);
        let row = sqlx::query_as::<_, MerchantRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Merchant::try_from).transpose()
    }

    async fn apply_ledger_delta(
        &self,
        id: Uuid,
        delta: &LedgerDelta,
    ) -> RepoResult<Option<MerchantLedgers>> {
        // Check and write in one statement so concurrent transfers cannot double-spend.
        let row: Option<(i64, Decimal, Decimal)> = sqlx::query_as(
            r#"
            UPDATE merchants SET
                merchant_bank_cents = merchant_bank_cents + $2,
                merchant_text_budget = merchant_text_budget + $3,
                merchant_rips_budget = merchant_rips_budget + $4
            WHERE id = $1
              AND merchant_bank_cents + $2 >= 0
              AND merchant_text_budget + $3 >= 0
              AND merchant_rips_budget + $4 >= 0
            RETURNING merchant_bank_cents, merchant_text_budget, merchant_rips_budget
            "#,
        )
        .bind(id)
        .bind(delta.bank_cents)
        .bind(delta.text_budget)
        .bind(delta.rips_budget)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(bank_cents, text_budget, rips_budget)| MerchantLedgers {
            bank_cents,
            text_budget,
            rips_budget,
        }))
    }

    async fn record_sms_batch(
        &self,
        merchant_id: Uuid,
        price: SmsPricer<'_>,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<SmsCharge>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM merchants WHERE id = $1 FOR UPDATE", MERCHANT_COLUMNS);
        let Some(row) = sqlx::query_as::<_, MerchantRow>(&sql)
            .bind(merchant_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let merchant = Merchant::try_from(row)?;
        let charge = price(&merchant);

        sqlx::query(
            r#"
            UPDATE merchants SET
                lifetime_texts_sent = $2,
                free_trial_used = free_trial_used OR $2 >= $3,
                merchant_text_budget = merchant_text_budget - $4
            WHERE id = $1
            "#,
        )
        .bind(merchant_id)
        .bind(charge.lifetime_after())
        .bind(FREE_TRIAL_TEXTS)
        .bind(charge.budget_debit)
        .execute(&mut *tx)
        .await?;

        // Breakdown is append-only: new bands are concatenated onto the stored array.
        sqlx::query(
            r#"
            INSERT INTO sms_usage (merchant_id, month, texts_sent, total_fee_cents, pricing_breakdown, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (merchant_id, month) DO UPDATE SET
                texts_sent = sms_usage.texts_sent + EXCLUDED.texts_sent,
                total_fee_cents = sms_usage.total_fee_cents + EXCLUDED.total_fee_cents,
                pricing_breakdown = sms_usage.pricing_breakdown || EXCLUDED.pricing_breakdown,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(merchant_id)
        .bind(&charge.month)
        .bind(charge.count)
        .bind(charge.total_cents)
        .bind(serde_json::to_value(&charge.bands)?)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(charge))
    }

    async fn get_sms_usage(&self, merchant_id: Uuid, month: &str) -> RepoResult<Option<SmsUsage>> {
        let row = sqlx::query_as::<_, SmsUsageRow>(
            "SELECT merchant_id, month, texts_sent, total_fee_cents, pricing_breakdown, updated_at \
             FROM sms_usage WHERE merchant_id = $1 AND month = $2",
        )
        .bind(merchant_id)
        .bind(month)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SmsUsage::try_from).transpose()
    }
}
