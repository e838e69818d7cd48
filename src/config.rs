use crate::constants::{
    DEFAULT_GATEWAY_INTENTS, DEFAULT_GATEWAY_URL, DEFAULT_PROVISION_MAX_ATTEMPTS,
    DEFAULT_WRITE_QUEUE_CAPACITY,
};
use crate::error::{RelayError, Result};
use crate::observability::logging::{normalize_level, LoggingConfig};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

/// Which gateway integration feeds the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// Guild-aware client with live member counts
    Typed,
    /// Raw dispatch packets, no member counts
    Packet,
}

impl FromStr for GatewayMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typed" => Ok(GatewayMode::Typed),
            "packet" | "raw" => Ok(GatewayMode::Packet),
            other => Err(RelayError::Config(format!("unknown gateway mode '{}'", other))),
        }
    }
}

#[derive(Clone)]
pub struct InfluxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl InfluxConfig {
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }
}

impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub mode: GatewayMode,
    pub url: String,
    pub intents: u64,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("mode", &self.mode)
            .field("url", &self.url)
            .field("intents", &self.intents)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub write_queue_capacity: usize,
    pub provision_max_attempts: u32,
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub influxdb: InfluxConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
    pub relay: RelayConfig,
}

// Optional TOML file; every key may be overridden by the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub influxdb: InfluxFileConfig,
    pub gateway: GatewayFileConfig,
    pub logging: LoggingFileConfig,
    pub relay: RelayFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InfluxFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GatewayFileConfig {
    pub token: Option<String>,
    pub mode: Option<GatewayMode>,
    pub url: Option<String>,
    pub intents: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingFileConfig {
    pub level: Option<String>,
    pub production: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RelayFileConfig {
    pub write_queue_capacity: Option<usize>,
    pub provision_max_attempts: Option<u32>,
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Load from the optional TOML file at `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    RelayError::Config(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                toml::from_str(&content)?
            }
            None => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge file values with `env` lookups; the environment wins.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let influxdb = InfluxConfig {
            host: env("INFLUXDB_HOST")
                .or(file.influxdb.host)
                .unwrap_or_else(|| "localhost".to_string()),
            port: match env("INFLUXDB_PORT") {
                Some(v) => parse_value("INFLUXDB_PORT", &v)?,
                None => file.influxdb.port.unwrap_or(8086),
            },
            username: env("INFLUXDB_USERNAME")
                .or(file.influxdb.username)
                .unwrap_or_else(|| "root".to_string()),
            password: env("INFLUXDB_PASSWORD")
                .or(file.influxdb.password)
                .unwrap_or_else(|| "root".to_string()),
            database: env("INFLUXDB_DATABASE")
                .or(file.influxdb.database)
                .unwrap_or_default(),
        };

        let gateway = GatewayConfig {
            token: env("DISCORD_TOKEN").or(file.gateway.token).unwrap_or_default(),
            mode: match env("GATEWAY_MODE") {
                Some(v) => v.parse()?,
                None => file.gateway.mode.unwrap_or(GatewayMode::Typed),
            },
            url: env("GATEWAY_URL")
                .or(file.gateway.url)
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            intents: match env("GATEWAY_INTENTS") {
                Some(v) => parse_value("GATEWAY_INTENTS", &v)?,
                None => file.gateway.intents.unwrap_or(DEFAULT_GATEWAY_INTENTS),
            },
        };

        let production = match env("APP_ENV").or_else(|| env("NODE_ENV")) {
            Some(v) => v.eq_ignore_ascii_case("production"),
            None => file.logging.production.unwrap_or(false),
        };
        let logging = LoggingConfig {
            level: normalize_level(
                &env("LOGGING_LEVEL")
                    .or(file.logging.level)
                    .unwrap_or_default(),
            ),
            production,
        };

        let relay = RelayConfig {
            write_queue_capacity: match env("WRITE_QUEUE_CAPACITY") {
                Some(v) => parse_value("WRITE_QUEUE_CAPACITY", &v)?,
                None => file
                    .relay
                    .write_queue_capacity
                    .unwrap_or(DEFAULT_WRITE_QUEUE_CAPACITY),
            },
            provision_max_attempts: match env("PROVISION_MAX_ATTEMPTS") {
                Some(v) => parse_value("PROVISION_MAX_ATTEMPTS", &v)?,
                None => file
                    .relay
                    .provision_max_attempts
                    .unwrap_or(DEFAULT_PROVISION_MAX_ATTEMPTS),
            },
            metrics_addr: match env("RELAY_METRICS_ADDR") {
                Some(v) => Some(parse_value("RELAY_METRICS_ADDR", &v)?),
                None => file.relay.metrics_addr,
            },
        };

        let config = Config {
            influxdb,
            gateway,
            logging,
            relay,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.influxdb.database.is_empty() {
            return Err(RelayError::Config("INFLUXDB_DATABASE must be set".to_string()));
        }
        if self.relay.write_queue_capacity == 0 {
            return Err(RelayError::Config(
                "WRITE_QUEUE_CAPACITY must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The relay needs a gateway token; provisioning alone does not.
    pub fn require_gateway_token(&self) -> Result<()> {
        if self.gateway.token.is_empty() {
            return Err(RelayError::Config("DISCORD_TOKEN must be set".to_string()));
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| RelayError::Config(format!("invalid {} '{}': {}", key, raw, e)))
}
