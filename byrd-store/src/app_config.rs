use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Rate limiting is off when no Redis is configured.
    pub redis: Option<RedisConfig>,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    /// SMS and email deliveries go to `{prefix}.sms` and `{prefix}.email`.
    pub delivery_topic_prefix: String,
    pub transition_topic: String,
}

impl KafkaConfig {
    pub fn delivery_topic(&self, channel: &str) -> String {
        format!("{}.{}", self.delivery_topic_prefix, channel)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `BYRD__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("BYRD").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: &str = include_str!("../../config/default.toml");

    #[test]
    fn test_default_file_deserializes() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(config.redis.is_some());
        assert!(config.scheduler.enabled);
        assert_eq!(config.kafka.delivery_topic("sms"), "byrd.notifications.sms");
    }

    #[test]
    fn test_redis_section_is_optional() {
        let toml = r#"
            [server]
            port = 8080
            [database]
            url = "postgres://localhost/byrd"
            [kafka]
            brokers = "localhost:9092"
            delivery_topic_prefix = "n"
            transition_topic = "t"
            [auth]
            jwt_secret = "s"
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.redis.is_none());
        assert_eq!(config.database.max_connections, 5);
        assert!(config.scheduler.enabled);
    }
}
