use std::net::SocketAddr;
use std::sync::Arc;

use byrd_api::{app, worker, AppState, AuthConfig, Repositories};
use byrd_notify::{ChannelKind, NotificationDispatcher};
use byrd_offer::LifecycleScheduler;
use byrd_store::{
    DbClient, EventProducer, KafkaDeliveryChannel, KafkaTransitionSink, PostgresFolderRepository,
    PostgresMerchantRepository, PostgresNotificationRepository, PostgresOfferRepository,
    PostgresSchedulerStateRepository, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "byrd_api=debug,byrd_offer=info,byrd_billing=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = byrd_store::app_config::Config::load()?;
    tracing::info!("Starting Byrd API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;

    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(RedisClient::new(&redis.url)?)),
        None => {
            tracing::warn!("No Redis configured, rate limiting disabled");
            None
        }
    };

    let kafka = EventProducer::new(&config.kafka.brokers)?;

    let repos = Repositories {
        offers: Arc::new(PostgresOfferRepository { pool: db.pool.clone() }),
        folders: Arc::new(PostgresFolderRepository { pool: db.pool.clone() }),
        merchants: Arc::new(PostgresMerchantRepository { pool: db.pool.clone() }),
        notifications: Arc::new(PostgresNotificationRepository { pool: db.pool.clone() }),
    };

    // Live notification feed for SSE subscribers
    let (live_tx, _) = tokio::sync::broadcast::channel(100);

    let mut dispatcher = NotificationDispatcher::new(repos.notifications.clone()).with_live_feed(live_tx.clone());
    for kind in [ChannelKind::Sms, ChannelKind::Email] {
        dispatcher = dispatcher.with_channel(Arc::new(KafkaDeliveryChannel::new(
            kind,
            config.kafka.delivery_topic(kind.as_str()),
            kafka.clone(),
            repos.merchants.clone(),
        )));
    }
    let notifier = Arc::new(dispatcher);

    if config.scheduler.enabled {
        let scheduler = LifecycleScheduler::new(
            repos.offers.clone(),
            Arc::new(PostgresSchedulerStateRepository { pool: db.pool.clone() }),
            notifier.clone(),
        )
        .with_transition_sink(Arc::new(KafkaTransitionSink::new(
            kafka.clone(),
            config.kafka.transition_topic.clone(),
        )));
        worker::start_sweep_workers(Arc::new(scheduler));
    } else {
        tracing::info!("Lifecycle sweeps disabled by configuration");
    }

    let app_state = AppState::new(
        &repos,
        notifier,
        live_tx,
        redis,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
