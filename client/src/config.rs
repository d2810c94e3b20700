use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use parley_protocol::{ChatRoom, RoomCatalog, room::builtin_rooms};
use serde::Deserialize;

/// Backoff applied when a room subscription fails to open or drops.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// `None` retries forever
    pub max_attempts: Option<usize>,
    #[serde(rename = "initial_delay_ms", with = "millis")]
    pub initial_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 1..attempt {
            if delay >= self.max_delay {
                break;
            }
            let next = delay.as_millis() as f64 * self.backoff_multiplier;
            delay = Duration::from_millis(next as u64).min(self.max_delay);
        }
        delay
    }

    pub fn exhausted(&self, attempt: usize) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub rooms: Vec<ChatRoom>,
    pub reconnect: ReconnectPolicy,
    /// Where the last signed-in identity is kept between runs
    pub identity_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rooms: builtin_rooms(),
            reconnect: ReconnectPolicy::default(),
            identity_path: None,
        }
    }
}

impl ClientConfig {
    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("Failed to parse config")?;
        config.catalog()?;
        Ok(config)
    }

    pub fn catalog(&self) -> Result<RoomCatalog> {
        RoomCatalog::new(self.rooms.clone()).context("Config must list at least one room")
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ClientConfig, ReconnectPolicy};

    #[test]
    fn test_default_config_has_builtin_rooms() {
        let config = ClientConfig::default();
        let catalog = config.catalog().unwrap();

        assert_eq!(catalog.first().name, "General");
        assert_eq!(config.reconnect.max_attempts, None);
    }

    #[test]
    fn test_config_from_json_partial() {
        let config = ClientConfig::from_json(
            r#"{
                "rooms": [{"id": "lobby", "name": "Lobby", "description": "Say hi"}],
                "reconnect": {"max_attempts": 3, "initial_delay_ms": 10}
            }"#,
        )
        .unwrap();

        assert_eq!(config.rooms.len(), 1);
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(10));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert!(config.identity_path.is_none());
    }

    #[test]
    fn test_config_rejects_empty_catalog() {
        assert!(ClientConfig::from_json(r#"{"rooms": []}"#).is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            max_attempts: Some(4),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_multiplier: 2.0,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(10), Duration::from_millis(350));
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));
    }
}
