use async_trait::async_trait;
use byrd_core::repository::{FolderRepository, OfferRepository, RepoError, RepoResult};
use byrd_core::{CampaignFolder, DeliveryConfig, Offer, OfferPatch};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const OFFER_COLUMNS: &str = "id, merchant_id, folder_id, title, offer_type, add_type, status, \
    start_date, end_date, activated_at, needs_reintegration, is_deleted, deleted_at, units_sold, \
    target_units, auto_extend, extension_days, notify_on_shortfall, last_auto_extended_at, \
    media_urls, get_new_customers, delivery, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OfferRow {
    id: Uuid,
    merchant_id: Uuid,
    folder_id: Option<Uuid>,
    title: String,
    offer_type: String,
    add_type: String,
    status: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    activated_at: Option<DateTime<Utc>>,
    needs_reintegration: bool,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    units_sold: i32,
    target_units: Option<i32>,
    auto_extend: bool,
    extension_days: i32,
    notify_on_shortfall: bool,
    last_auto_extended_at: Option<DateTime<Utc>>,
    media_urls: Vec<String>,
    get_new_customers: bool,
    delivery: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = RepoError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let delivery = row
            .delivery
            .map(serde_json::from_value::<DeliveryConfig>)
            .transpose()?;
        Ok(Offer {
            id: row.id,
            merchant_id: row.merchant_id,
            folder_id: row.folder_id,
            title: row.title,
            offer_type: row.offer_type.parse()?,
            add_type: row.add_type.parse()?,
            status: row.status.parse()?,
            start_date: row.start_date,
            end_date: row.end_date,
            activated_at: row.activated_at,
            needs_reintegration: row.needs_reintegration,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            units_sold: row.units_sold,
            target_units: row.target_units,
            auto_extend: row.auto_extend,
            extension_days: row.extension_days,
            notify_on_shortfall: row.notify_on_shortfall,
            last_auto_extended_at: row.last_auto_extended_at,
            media_urls: row.media_urls,
            get_new_customers: row.get_new_customers,
            delivery,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_offers(rows: Vec<OfferRow>) -> RepoResult<Vec<Offer>> {
    rows.into_iter().map(Offer::try_from).collect()
}

fn delivery_json(offer: &Offer) -> RepoResult<Option<serde_json::Value>> {
    Ok(offer.delivery.as_ref().map(serde_json::to_value).transpose()?)
}

pub struct PostgresOfferRepository {
    pub pool: PgPool,
}

#[async_trait]
impl OfferRepository for PostgresOfferRepository {
    async fn get_offers_to_activate(
        &self,
        now: DateTime<Utc>,
        lookback_minutes: i64,
    ) -> RepoResult<Vec<Offer>> {
        let sql = format!(
            "SELECT {} FROM offers \
             WHERE status IN ('draft', 'active') \
               AND is_deleted = FALSE \
               AND needs_reintegration = FALSE \
               AND activated_at IS NULL \
               AND start_date >= $1 AND start_date <= $2 \
               AND end_date IS NOT NULL AND end_date > $2",
            OFFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(now - Duration::minutes(lookback_minutes))
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        into_offers(rows)
    }

    async fn get_offers_to_expire(&self, now: DateTime<Utc>) -> RepoResult<Vec<Offer>> {
        let sql = format!(
            "SELECT {} FROM offers \
             WHERE status = 'active' \
               AND is_deleted = FALSE \
               AND needs_reintegration = FALSE \
               AND end_date <= $1",
            OFFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        into_offers(rows)
    }

    async fn get_expiring_offers(
        &self,
        now: DateTime<Utc>,
        hours_ahead: i64,
    ) -> RepoResult<Vec<Offer>> {
        let sql = format!(
            "SELECT {} FROM offers \
             WHERE status = 'active' \
               AND is_deleted = FALSE \
               AND needs_reintegration = FALSE \
               AND end_date > $1 AND end_date <= $2",
            OFFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(now)
            .bind(now + Duration::hours(hours_ahead))
            .fetch_all(&self.pool)
            .await?;
        into_offers(rows)
    }

    async fn update_offer(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        patch: OfferPatch,
    ) -> RepoResult<Option<Offer>> {
        // activated_at is write-once.
        let sql = format!(
            "UPDATE offers SET \
                status = COALESCE($3, status), \
                activated_at = COALESCE(activated_at, $4), \
                end_date = COALESCE($5, end_date), \
                last_auto_extended_at = COALESCE($6, last_auto_extended_at), \
                updated_at = NOW() \
             WHERE id = $1 AND merchant_id = $2 \
             RETURNING {}",
            OFFER_COLUMNS
        );
        let row = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(id)
            .bind(merchant_id)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.activated_at)
            .bind(patch.end_date)
            .bind(patch.last_auto_extended_at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Offer::try_from).transpose()
    }

    async fn get_offer(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<Option<Offer>> {
        let sql = format!("SELECT {} FROM offers WHERE id = $1 AND merchant_id = $2", OFFER_COLUMNS);
        let row = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(id)
            .bind(merchant_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Offer::try_from).transpose()
    }

    async fn list_offers(&self, merchant_id: Uuid, include_deleted: bool) -> RepoResult<Vec<Offer>> {
        let sql = format!(
            "SELECT {} FROM offers \
             WHERE merchant_id = $1 AND ($2 OR is_deleted = FALSE) \
             ORDER BY created_at DESC",
            OFFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(merchant_id)
            .bind(include_deleted)
            .fetch_all(&self.pool)
            .await?;
        into_offers(rows)
    }

    async fn insert_offer(&self, offer: &Offer) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO offers (id, merchant_id, folder_id, title, offer_type, add_type, status,
                start_date, end_date, activated_at, needs_reintegration, is_deleted, deleted_at,
                units_sold, target_units, auto_extend, extension_days, notify_on_shortfall,
                last_auto_extended_at, media_urls, get_new_customers, delivery, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(offer.id)
        .bind(offer.merchant_id)
        .bind(offer.folder_id)
        .bind(&offer.title)
        .bind(offer.offer_type.as_str())
        .bind(offer.add_type.as_str())
        .bind(offer.status.as_str())
        .bind(offer.start_date)
        .bind(offer.end_date)
        .bind(offer.activated_at)
        .bind(offer.needs_reintegration)
        .bind(offer.is_deleted)
        .bind(offer.deleted_at)
        .bind(offer.units_sold)
        .bind(offer.target_units)
        .bind(offer.auto_extend)
        .bind(offer.extension_days)
        .bind(offer.notify_on_shortfall)
        .bind(offer.last_auto_extended_at)
        .bind(offer.media_urls.clone())
        .bind(offer.get_new_customers)
        .bind(delivery_json(offer)?)
        .bind(offer.created_at)
        .bind(offer.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_offer(&self, offer: &Offer) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE offers SET
                folder_id = $3, title = $4, offer_type = $5, add_type = $6, status = $7,
                start_date = $8, end_date = $9, needs_reintegration = $10, is_deleted = $11,
                deleted_at = $12, units_sold = $13, target_units = $14, auto_extend = $15,
                extension_days = $16, notify_on_shortfall = $17, media_urls = $18,
                get_new_customers = $19, delivery = $20, updated_at = $21
            WHERE id = $1 AND merchant_id = $2
            "#,
        )
        .bind(offer.id)
        .bind(offer.merchant_id)
        .bind(offer.folder_id)
        .bind(&offer.title)
        .bind(offer.offer_type.as_str())
        .bind(offer.add_type.as_str())
        .bind(offer.status.as_str())
        .bind(offer.start_date)
        .bind(offer.end_date)
        .bind(offer.needs_reintegration)
        .bind(offer.is_deleted)
        .bind(offer.deleted_at)
        .bind(offer.units_sold)
        .bind(offer.target_units)
        .bind(offer.auto_extend)
        .bind(offer.extension_days)
        .bind(offer.notify_on_shortfall)
        .bind(offer.media_urls.clone())
        .bind(offer.get_new_customers)
        .bind(delivery_json(offer)?)
        .bind(offer.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("offer {} not found", offer.id).into());
        }
        Ok(())
    }

    async fn delete_offer(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1 AND merchant_id = $2")
            .bind(id)
            .bind(merchant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_active_offers(
        &self,
        merchant_id: Uuid,
        excluding: Option<Uuid>,
    ) -> RepoResult<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM offers
            WHERE merchant_id = $1 AND status = 'active' AND is_deleted = FALSE
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
        .bind(merchant_id)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count)?)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FolderRow {
    id: Uuid,
    merchant_id: Uuid,
    name: String,
    is_locked: bool,
    locked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<FolderRow> for CampaignFolder {
    fn from(row: FolderRow) -> Self {
        CampaignFolder {
            id: row.id,
            merchant_id: row.merchant_id,
            name: row.name,
            is_locked: row.is_locked,
            locked_at: row.locked_at,
            created_at: row.created_at,
        }
    }
}

const FOLDER_COLUMNS: &str = "id, merchant_id, name, is_locked, locked_at, created_at";

pub struct PostgresFolderRepository {
    pub pool: PgPool,
}

#[async_trait]
impl FolderRepository for PostgresFolderRepository {
    async fn get_folder(&self, id: Uuid, merchant_id: Uuid) -> RepoResult<Option<CampaignFolder>> {
        let sql = format!(
            "SELECT {} FROM campaign_folders WHERE id = $1 AND merchant_id = $2",
            FOLDER_COLUMNS
        );
        let row = sqlx::query_as::<_, FolderRow>(&sql)
            .bind(id)
            .bind(merchant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CampaignFolder::from))
    }

    async fn list_folders(&self, merchant_id: Uuid) -> RepoResult<Vec<CampaignFolder>> {
        let sql = format!(
            "SELECT {} FROM campaign_folders WHERE merchant_id = $1 ORDER BY created_at",
            FOLDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, FolderRow>(&sql)
            .bind(merchant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CampaignFolder::from).collect())
    }

    async fn insert_folder(&self, folder: &CampaignFolder) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO campaign_folders (id, merchant_id, name, is_locked, locked_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(folder.id)
        .bind(folder.merchant_id)
        .bind(&folder.name)
        .bind(folder.is_locked)
        .bind(folder.locked_at)
        .bind(folder.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lock_folder(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<CampaignFolder>> {
        let sql = format!(
            "UPDATE campaign_folders SET is_locked = TRUE, locked_at = COALESCE(locked_at, $3) \
             WHERE id = $1 AND merchant_id = $2 RETURNING {}",
            FOLDER_COLUMNS
        );
        let row = sqlx::query_as::<_, FolderRow>(&sql)
            .bind(id)
            .bind(merchant_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CampaignFolder::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> OfferRow {
        let now = Utc::now();
        OfferRow {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            folder_id: None,
            title: "Row".into(),
            offer_type: "bogo".into(),
            add_type: "countdown".into(),
            status: status.into(),
            start_date: Some(now),
            end_date: None,
            activated_at: None,
            needs_reintegration: false,
            is_deleted: false,
            deleted_at: None,
            units_sold: 0,
            target_units: None,
            auto_extend: false,
            extension_days: 3,
            notify_on_shortfall: false,
            last_auto_extended_at: None,
            media_urls: vec![],
            get_new_customers: false,
            delivery: Some(serde_json::json!({"method": "in_store", "redemption_code": "SAVE10"})),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_maps_enums_and_delivery() {
        let offer = Offer::try_from(row("paused")).unwrap();
        assert_eq!(offer.status, byrd_core::OfferStatus::Paused);
        assert_eq!(offer.add_type, byrd_core::AddType::Countdown);
        assert_eq!(
            offer.delivery,
            Some(DeliveryConfig::InStore { redemption_code: "SAVE10".into() })
        );
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        assert!(Offer::try_from(row("archived")).is_err());
    }
}
