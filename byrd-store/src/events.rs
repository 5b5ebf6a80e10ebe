use async_trait::async_trait;
use byrd_core::repository::{RepoResult, TransitionSink};
use byrd_shared::models::events::OfferTransitionEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Publishes lifecycle transitions keyed by offer id.
pub struct KafkaTransitionSink {
    producer: EventProducer,
    topic: String,
}

impl KafkaTransitionSink {
    pub fn new(producer: EventProducer, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl TransitionSink for KafkaTransitionSink {
    async fn publish_transition(&self, event: &OfferTransitionEvent) -> RepoResult<()> {
        let payload = serde_json::to_string(event)?;
        self.producer
            .publish(&self.topic, &event.offer_id.to_string(), &payload)
            .await?;
        Ok(())
    }
}
