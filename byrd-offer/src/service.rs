//! Request-path offer and folder operations.

use std::sync::Arc;

use byrd_core::repository::{FolderRepository, MerchantRepository, OfferRepository};
use byrd_core::{
    AddType, CampaignFolder, CoreError, CoreResult, DeliveryConfig, FieldError, Merchant, Offer,
    OfferStatus, OfferType,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::validation::{self, ChangeSet};

fn draft_status() -> OfferStatus {
    OfferStatus::Draft
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub title: String,
    pub offer_type: OfferType,
    #[serde(default)]
    pub add_type: AddType,
    #[serde(default = "draft_status")]
    pub status: OfferStatus,
    pub folder_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub target_units: Option<i32>,
    #[serde(default)]
    pub auto_extend: bool,
    pub extension_days: Option<i32>,
    #[serde(default)]
    pub notify_on_shortfall: bool,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub get_new_customers: bool,
    pub delivery: Option<DeliveryConfig>,
}

/// Partial update; absent fields are left alone. The nullable fields take
/// an explicit `null` to clear them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferUpdate {
    pub title: Option<String>,
    pub offer_type: Option<OfferType>,
    pub add_type: Option<AddType>,
    pub status: Option<OfferStatus>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub folder_id: Option<Option<Uuid>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub units_sold: Option<i32>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub target_units: Option<Option<i32>>,
    pub auto_extend: Option<bool>,
    pub extension_days: Option<i32>,
    pub notify_on_shortfall: Option<bool>,
    pub media_urls: Option<Vec<String>>,
    pub get_new_customers: Option<bool>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub delivery: Option<Option<DeliveryConfig>>,
}

pub struct OfferService {
    offers: Arc<dyn OfferRepository>,
    folders: Arc<dyn FolderRepository>,
    merchants: Arc<dyn MerchantRepository>,
}

impl OfferService {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        folders: Arc<dyn FolderRepository>,
        merchants: Arc<dyn MerchantRepository>,
    ) -> Self {
        Self { offers, folders, merchants }
    }

    async fn merchant(&self, merchant_id: Uuid) -> CoreResult<Merchant> {
        self.merchants
            .get_merchant(merchant_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("merchant {}", merchant_id)))
    }

    async fn load(&self, id: Uuid, merchant_id: Uuid) -> CoreResult<Offer> {
        self.offers
            .get_offer(id, merchant_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("offer {}", id)))
    }

    async fn load_live(&self, id: Uuid, merchant_id: Uuid) -> CoreResult<Offer> {
        let offer = self.load(id, merchant_id).await?;
        if offer.is_deleted {
            return Err(CoreError::NotFound(format!("offer {}", id)));
        }
        Ok(offer)
    }

    async fn ensure_folder_writable(&self, folder_id: Option<Uuid>, merchant_id: Uuid) -> CoreResult<()> {
        let Some(folder_id) = folder_id else {
            return Ok(());
        };
        let folder = self
            .folders
            .get_folder(folder_id, merchant_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("folder {}", folder_id)))?;
        if folder.is_locked {
            return Err(CoreError::FolderLocked(folder_id));
        }
        Ok(())
    }

    /// Run every gate that applies to `offer` in its target state.
    async fn validate(&self, offer: &Offer, changes: ChangeSet, now: DateTime<Utc>) -> CoreResult<()> {
        let errors = validation::validate_fields(offer);
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }
        if offer.is_draft() {
            return Ok(());
        }

        if offer.needs_reintegration && offer.status == OfferStatus::Active {
            return Err(CoreError::NeedsReintegration(offer.id));
        }

        let errors = validation::validate_schedule(offer, changes, now);
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }

        let merchant = self.merchant(offer.merchant_id).await?;
        let mut errors = validation::validate_tier_capabilities(offer, merchant.membership_tier);
        if offer.status == OfferStatus::Active {
            let active = self.offers.count_active_offers(offer.merchant_id, Some(offer.id)).await?;
            errors.extend(validation::check_active_limit(merchant.membership_tier, active));
        }
        if !errors.is_empty() {
            return Err(CoreError::TierRestricted(errors));
        }

        if let Some(err) = validation::check_acquisition_balance(offer, &merchant) {
            return Err(CoreError::Validation(vec![err]));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, input, now), fields(title = %input.title))]
    pub async fn create_offer(&self, merchant_id: Uuid, input: NewOffer, now: DateTime<Utc>) -> CoreResult<Offer> {
        if !matches!(input.status, OfferStatus::Draft | OfferStatus::Active | OfferStatus::Paused) {
            return Err(CoreError::Validation(vec![FieldError::new(
                "status",
                "New offers start as draft, active or paused",
            )]));
        }
        self.ensure_folder_writable(input.folder_id, merchant_id).await?;

        let mut offer = Offer::new(merchant_id, input.title, input.offer_type);
        offer.add_type = input.add_type;
        offer.status = input.status;
        offer.folder_id = input.folder_id;
        offer.start_date = input.start_date;
        offer.end_date = input.end_date;
        offer.target_units = input.target_units;
        offer.auto_extend = input.auto_extend;
        if let Some(days) = input.extension_days {
            offer.extension_days = days;
        }
        offer.notify_on_shortfall = input.notify_on_shortfall;
        offer.media_urls = input.media_urls;
        offer.get_new_customers = input.get_new_customers;
        offer.delivery = input.delivery;
        offer.created_at = now;
        offer.updated_at = now;

        self.validate(&offer, ChangeSet::created(), now).await?;
        self.offers.insert_offer(&offer).await?;
        tracing::info!(offer_id = %offer.id, status = %offer.status, "Offer created");
        Ok(offer)
    }

    #[tracing::instrument(skip(self, update, now))]
    pub async fn update_offer(
        &self,
        merchant_id: Uuid,
        id: Uuid,
        update: OfferUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<Offer> {
        let mut offer = self.load_live(id, merchant_id).await?;
        self.ensure_folder_writable(offer.folder_id, merchant_id).await?;
        if let Some(folder_id) = update.folder_id {
            if folder_id != offer.folder_id {
                self.ensure_folder_writable(folder_id, merchant_id).await?;
            }
        }

        let mut changes = ChangeSet::default();
        if let Some(status) = update.status {
            if !offer.status.can_transition_to(status) {
                return Err(CoreError::InvalidTransition {
                    from: offer.status.to_string(),
                    to: status.to_string(),
                });
            }
            changes.status_changed = status != offer.status;
            offer.status = status;
        }
        if let Some(start) = update.start_date {
            changes.start_changed = offer.start_date != Some(start);
            offer.start_date = Some(start);
        }
        if let Some(end) = update.end_date {
            changes.end_changed = offer.end_date != Some(end);
            offer.end_date = Some(end);
        }

        if let Some(title) = update.title {
            offer.title = title;
        }
        if let Some(offer_type) = update.offer_type {
            offer.offer_type = offer_type;
        }
        if let Some(add_type) = update.add_type {
            offer.add_type = add_type;
        }
        if let Some(folder_id) = update.folder_id {
            offer.folder_id = folder_id;
        }
        if let Some(units_sold) = update.units_sold {
            offer.units_sold = units_sold;
        }
        if let Some(target_units) = update.target_units {
            offer.target_units = target_units;
        }
        if let Some(auto_extend) = update.auto_extend {
            offer.auto_extend = auto_extend;
        }
        if let Some(days) = update.extension_days {
            offer.extension_days = days;
        }
        if let Some(notify) = update.notify_on_shortfall {
            offer.notify_on_shortfall = notify;
        }
        if let Some(media_urls) = update.media_urls {
            offer.media_urls = media_urls;
        }
        if let Some(get_new_customers) = update.get_new_customers {
            offer.get_new_customers = get_new_customers;
        }
        if let Some(delivery) = update.delivery {
            offer.delivery = delivery;
        }
        offer.updated_at = now;

        self.validate(&offer, changes, now).await?;
        self.offers.save_offer(&offer).await?;
        tracing::info!(offer_id = %offer.id, status = %offer.status, "Offer updated");
        Ok(offer)
    }

    pub async fn get_offer(&self, merchant_id: Uuid, id: Uuid) -> CoreResult<Offer> {
        self.load(id, merchant_id).await
    }

    pub async fn list_offers(&self, merchant_id: Uuid, include_deleted: bool) -> CoreResult<Vec<Offer>> {
        Ok(self.offers.list_offers(merchant_id, include_deleted).await?)
    }

    pub async fn soft_delete(&self, merchant_id: Uuid, id: Uuid, now: DateTime<Utc>) -> CoreResult<Offer> {
        let mut offer = self.load_live(id, merchant_id).await?;
        self.ensure_folder_writable(offer.folder_id, merchant_id).await?;

        offer.is_deleted = true;
        offer.deleted_at = Some(now);
        offer.updated_at = now;
        self.offers.save_offer(&offer).await?;
        tracing::info!(offer_id = %id, "Offer soft-deleted");
        Ok(offer)
    }

    /// Bring back a soft-deleted offer. It stays out of the lifecycle until reintegrated.
    pub async fn restore(&self, merchant_id: Uuid, id: Uuid, now: DateTime<Utc>) -> CoreResult<Offer> {
        let mut offer = self.load(id, merchant_id).await?;
        if !offer.is_deleted {
            return Err(CoreError::InvalidTransition {
                from: "live".to_string(),
                to: "restored".to_string(),
            });
        }
        self.ensure_folder_writable(offer.folder_id, merchant_id).await?;

        offer.is_deleted = false;
        offer.deleted_at = None;
        offer.needs_reintegration = true;
        if offer.status == OfferStatus::Active {
            offer.status = OfferStatus::Paused;
        }
        offer.updated_at = now;
        self.offers.save_offer(&offer).await?;
        tracing::info!(offer_id = %id, "Offer restored, awaiting reintegration");
        Ok(offer)
    }

    /// Clear the reintegration flag after the offer passes validation again.
    pub async fn reintegrate(&self, merchant_id: Uuid, id: Uuid, now: DateTime<Utc>) -> CoreResult<Offer> {
        let mut offer = self.load_live(id, merchant_id).await?;
        if !offer.needs_reintegration {
            return Err(CoreError::InvalidTransition {
                from: "integrated".to_string(),
                to: "integrated".to_string(),
            });
        }
        self.ensure_folder_writable(offer.folder_id, merchant_id).await?;

        offer.needs_reintegration = false;
        offer.updated_at = now;
        self.validate(&offer, ChangeSet::default(), now).await?;
        self.offers.save_offer(&offer).await?;
        tracing::info!(offer_id = %id, "Offer reintegrated");
        Ok(offer)
    }

    /// Permanently remove an offer. Only soft-deleted offers qualify.
    pub async fn hard_delete(&self, merchant_id: Uuid, id: Uuid) -> CoreResult<()> {
        let offer = self.load(id, merchant_id).await?;
        if !offer.is_deleted {
            return Err(CoreError::InvalidTransition {
                from: "live".to_string(),
                to: "purged".to_string(),
            });
        }
        self.ensure_folder_writable(offer.folder_id, merchant_id).await?;

        if !self.offers.delete_offer(id, merchant_id).await? {
            return Err(CoreError::NotFound(format!("offer {}", id)));
        }
        tracing::info!(offer_id = %id, "Offer permanently deleted");
        Ok(())
    }

    pub async fn create_folder(&self, merchant_id: Uuid, name: String) -> CoreResult<CampaignFolder> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation(vec![FieldError::new("name", "Folder name is required")]));
        }
        let merchant = self.merchant(merchant_id).await?;
        let tier = merchant.membership_tier;
        if !tier.capabilities().allow_folders {
            return Err(CoreError::TierRestricted(vec![FieldError::upgrade(
                "folder",
                "Campaign folders require an upgrade",
                tier.next_qualifying(|c| c.allow_folders),
            )]));
        }

        let folder = CampaignFolder::new(merchant_id, name);
        self.folders.insert_folder(&folder).await?;
        Ok(folder)
    }

    pub async fn list_folders(&self, merchant_id: Uuid) -> CoreResult<Vec<CampaignFolder>> {
        Ok(self.folders.list_folders(merchant_id).await?)
    }

    /// Promote a folder to a campaign. Locking cannot be undone.
    pub async fn promote_folder(&self, merchant_id: Uuid, id: Uuid, now: DateTime<Utc>) -> CoreResult<CampaignFolder> {
        let folder = self
            .folders
            .lock_folder(id, merchant_id, now)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("folder {}", id)))?;
        tracing::info!(folder_id = %id, "Folder promoted to campaign");
        Ok(folder)
    }
}
