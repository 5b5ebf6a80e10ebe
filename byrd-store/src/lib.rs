pub mod app_config;
pub mod database;
pub mod delivery;
pub mod events;
pub mod merchant_repo;
pub mod notification_repo;
pub mod offer_repo;
pub mod redis_repo;

pub use database::DbClient;
pub use delivery::KafkaDeliveryChannel;
pub use events::{EventProducer, KafkaTransitionSink};
pub use merchant_repo::PostgresMerchantRepository;
pub use notification_repo::{PostgresNotificationRepository, PostgresSchedulerStateRepository};
pub use offer_repo::{PostgresFolderRepository, PostgresOfferRepository};
pub use redis_repo::RedisClient;
