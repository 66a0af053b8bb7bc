use crate::{
    DEFAULT_REPLICATION_FACTOR,
    db::schema::{ReplicaStrategy, Replication},
};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config field '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

///
/// PersistenceConfig
///
/// Engine settings loaded from TOML:
///
/// ```toml
/// keyspace = "app"
/// debug = false
/// request_timeout_ms = 2000
///
/// [replication]
/// strategy = "NetworkTopologyStrategy"
/// factor = 3
/// datacenter = "dc1"
/// ```
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    pub keyspace: String,

    #[serde(default)]
    pub replication: ReplicationConfig,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl PersistenceConfig {
    /// Parse and validate.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyspace.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "keyspace",
                reason: "must not be empty",
            });
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                reason: "must be positive when set",
            });
        }
        self.replication.to_replication()?;

        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

///
/// ReplicationConfig
///
/// `strategy` accepts the placement class name or the short names
/// `simple` and `network_topology`; any other value is passed through.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReplicationConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_factor")]
    pub factor: u32,

    #[serde(default)]
    pub datacenter: Option<String>,
}

fn default_strategy() -> String {
    "SimpleStrategy".to_string()
}

const fn default_factor() -> u32 {
    DEFAULT_REPLICATION_FACTOR
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            factor: default_factor(),
            datacenter: None,
        }
    }
}

impl ReplicationConfig {
    pub fn to_replication(&self) -> Result<Replication, ConfigError> {
        if self.factor == 0 {
            return Err(ConfigError::Invalid {
                field: "replication.factor",
                reason: "must be at least 1",
            });
        }

        let strategy = match self.strategy.as_str() {
            "SimpleStrategy" | "simple" => ReplicaStrategy::Simple,
            "NetworkTopologyStrategy" | "network_topology" => {
                let datacenter = self
                    .datacenter
                    .clone()
                    .filter(|dc| !dc.trim().is_empty())
                    .ok_or(ConfigError::Invalid {
                        field: "replication.datacenter",
                        reason: "required for network topology replication",
                    })?;
                ReplicaStrategy::NetworkTopology { datacenter }
            }
            "" => {
                return Err(ConfigError::Invalid {
                    field: "replication.strategy",
                    reason: "must not be empty",
                });
            }
            other => ReplicaStrategy::Other(other.to_string()),
        };

        Ok(Replication {
            strategy,
            factor: self.factor,
        })
    }
}
