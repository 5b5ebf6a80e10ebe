use std::sync::Arc;

use byrd_billing::BankService;
use byrd_core::repository::{FolderRepository, MerchantRepository, NotificationRepository, OfferRepository};
use byrd_core::Notification;
use byrd_notify::NotificationDispatcher;
use byrd_offer::OfferService;
use byrd_store::RedisClient;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Storage handles the services are built from.
#[derive(Clone)]
pub struct Repositories {
    pub offers: Arc<dyn OfferRepository>,
    pub folders: Arc<dyn FolderRepository>,
    pub merchants: Arc<dyn MerchantRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub offers: Arc<OfferService>,
    pub bank: Arc<BankService>,
    pub notifications: Arc<dyn NotificationRepository>,
    /// Rate limiting is skipped when absent.
    pub redis: Option<Arc<RedisClient>>,
    pub live_tx: broadcast::Sender<Notification>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        repos: &Repositories,
        notifier: Arc<NotificationDispatcher>,
        live_tx: broadcast::Sender<Notification>,
        redis: Option<Arc<RedisClient>>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            offers: Arc::new(OfferService::new(
                repos.offers.clone(),
                repos.folders.clone(),
                repos.merchants.clone(),
            )),
            bank: Arc::new(BankService::new(repos.merchants.clone(), notifier)),
            notifications: repos.notifications.clone(),
            redis,
            live_tx,
            auth,
        }
    }
}
