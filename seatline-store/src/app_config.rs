use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub rules: ReservationRules,
    #[serde(default)]
    pub observers: ObserverConfig,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub seed: SeedConfig,
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
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Upper bound on waiting for a contended seat row lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout_ms() -> u64 { 3000 }
fn default_lock_timeout_ms() -> u64 { 5000 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { topic: default_topic() }
    }
}

fn default_topic() -> String { "seat_events".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationRules {
    #[serde(default = "default_hold_ttl_seconds")]
    pub hold_ttl_seconds: u64,
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self { hold_ttl_seconds: default_hold_ttl_seconds() }
    }
}

fn default_hold_ttl_seconds() -> u64 { 300 }

#[derive(Debug, Deserialize, Clone)]
pub struct ObserverConfig {
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl ObserverConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_send_timeout_ms() -> u64 { 1000 }
fn default_queue_capacity() -> usize { 64 }

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeSettings {
    #[serde(default = "default_resubscribe_delay_ms")]
    pub resubscribe_delay_ms: u64,
}

impl BridgeSettings {
    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self { resubscribe_delay_ms: default_resubscribe_delay_ms() }
    }
}

fn default_resubscribe_delay_ms() -> u64 { 1000 }

#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfig {
    #[serde(default = "default_demo_data")]
    pub demo_data: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { demo_data: default_demo_data() }
    }
}

fn default_demo_data() -> bool { true }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, uncommitted overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `SEATLINE__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("SEATLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
