use async_trait::async_trait;
use byrd_core::repository::{NotificationRepository, RepoError, RepoResult, SchedulerStateRepository};
use byrd_core::{Notification, NotificationPreferences, SweepJob};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str =
    "id, merchant_id, notification_type, title, message, priority, offer_id, action_url, created_at, read_at";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    merchant_id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    priority: String,
    offer_id: Option<Uuid>,
    action_url: Option<String>,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = RepoError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            merchant_id: row.merchant_id,
            notification_type: row.notification_type.parse()?,
            title: row.title,
            message: row.message,
            priority: row.priority.parse()?,
            offer_id: row.offer_id,
            action_url: row.action_url,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PreferencesRow {
    merchant_id: Uuid,
    notify_offer_activated: bool,
    notify_offer_expired: bool,
    notify_auto_extend: bool,
    notify_shortfall: bool,
    notify_budget: bool,
    sms_enabled: bool,
    email_enabled: bool,
    quiet_hours_enabled: bool,
    quiet_hours_start: NaiveTime,
    quiet_hours_end: NaiveTime,
    timezone: String,
}

impl From<PreferencesRow> for NotificationPreferences {
    fn from(row: PreferencesRow) -> Self {
        NotificationPreferences {
            merchant_id: row.merchant_id,
            notify_offer_activated: row.notify_offer_activated,
            notify_offer_expired: row.notify_offer_expired,
            notify_auto_extend: row.notify_auto_extend,
            notify_shortfall: row.notify_shortfall,
            notify_budget: row.notify_budget,
            sms_enabled: row.sms_enabled,
            email_enabled: row.email_enabled,
            quiet_hours_enabled: row.quiet_hours_enabled,
            quiet_hours_start: row.quiet_hours_start,
            quiet_hours_end: row.quiet_hours_end,
            timezone: row.timezone,
        }
    }
}

pub struct PostgresNotificationRepository {
    pub pool: PgPool,
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn insert_notification(&self, notification: &Notification) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, merchant_id, notification_type, title, message, priority,
                offer_id, action_url, created_at, read_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(notification.merchant_id)
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.priority.as_str())
        .bind(notification.offer_id)
        .bind(&notification.action_url)
        .bind(notification.created_at)
        .bind(notification.read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        merchant_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> RepoResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications \
             WHERE merchant_id = $1 AND (NOT $2 OR read_at IS NULL) \
             ORDER BY created_at DESC LIMIT $3",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(merchant_id)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_read(
        &self,
        id: Uuid,
        merchant_id: Uuid,
        at: DateTime<Utc>,
    ) -> RepoResult<Option<Notification>> {
        let sql = format!(
            "UPDATE notifications SET read_at = COALESCE(read_at, $3) \
             WHERE id = $1 AND merchant_id = $2 RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id)
            .bind(merchant_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn get_preferences(&self, merchant_id: Uuid) -> RepoResult<Option<NotificationPreferences>> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            r#"
            SELECT merchant_id, notify_offer_activated, notify_offer_expired, notify_auto_extend,
                notify_shortfall, notify_budget, sms_enabled, email_enabled, quiet_hours_enabled,
                quiet_hours_start, quiet_hours_end, timezone
            FROM notification_preferences WHERE merchant_id = $1
            "#,
        )
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(NotificationPreferences::from))
    }

    async fn save_preferences(&self, preferences: &NotificationPreferences) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_preferences (merchant_id, notify_offer_activated, notify_offer_expired,
                notify_auto_extend, notify_shortfall, notify_budget, sms_enabled, email_enabled,
                quiet_hours_enabled, quiet_hours_start, quiet_hours_end, timezone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (merchant_id) DO UPDATE SET
                notify_offer_activated = EXCLUDED.notify_offer_activated,
                notify_offer_expired = EXCLUDED.notify_offer_expired,
                notify_auto_extend = EXCLUDED.notify_auto_extend,
                notify_shortfall = EXCLUDED.notify_shortfall,
                notify_budget = EXCLUDED.notify_budget,
                sms_enabled = EXCLUDED.sms_enabled,
                email_enabled = EXCLUDED.email_enabled,
                quiet_hours_enabled = EXCLUDED.quiet_hours_enabled,
                quiet_hours_start = EXCLUDED.quiet_hours_start,
                quiet_hours_end = EXCLUDED.quiet_hours_end,
                timezone = EXCLUDED.timezone
            "#,
        )
        .bind(preferences.merchant_id)
        .bind(preferences.notify_offer_activated)
        .bind(preferences.notify_offer_expired)
        .bind(preferences.notify_auto_extend)
        .bind(preferences.notify_shortfall)
        .bind(preferences.notify_budget)
        .bind(preferences.sms_enabled)
        .bind(preferences.email_enabled)
        .bind(preferences.quiet_hours_enabled)
        .bind(preferences.quiet_hours_start)
        .bind(preferences.quiet_hours_end)
        .bind(&preferences.timezone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct PostgresSchedulerStateRepository {
    pub pool: PgPool,
}

#[async_trait]
impl SchedulerStateRepository for PostgresSchedulerStateRepository {
    async fn last_successful_run(&self, job: SweepJob) -> RepoResult<Option<DateTime<Utc>>> {
        let at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT last_successful_run FROM scheduler_state WHERE job = $1")
                .bind(job.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(at)
    }

    async fn record_successful_run(&self, job: SweepJob, at: DateTime<Utc>) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO scheduler_state (job, last_successful_run) VALUES ($1, $2) \
             ON CONFLICT (job) DO UPDATE SET last_successful_run = EXCLUDED.last_successful_run",
        )
        .bind(job.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
