use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result, ensure};
use axum::http::HeaderValue;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/quickpoll.toml";
const PRODUCTION: &str = "production";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub realtime: RealtimeConfig,
    pub polls: PollsConfig,
    pub logging: LoggingConfig,
}

impl ApiConfig {
    /// Reads configuration once at startup.
    ///
    /// Later sources win: built-in defaults, the TOML file, an optional
    /// per-environment overlay, `QUICKPOLL__SECTION__KEY` variables, and finally
    /// the conventional `DATABASE_URL`, `PORT` and `CORS_ORIGIN`.
    pub fn load() -> Result<Self> {
        let explicit_path = std::env::var("QUICKPOLL_CONFIG").ok();
        let configured_path = explicit_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Self::defaults()?.add_source(
            File::new(&configured_path, FileFormat::Toml).required(explicit_path.is_some()),
        );

        if let Ok(env_override) = std::env::var("QUICKPOLL_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/quickpoll.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        builder = builder
            .add_source(
                Environment::with_prefix("QUICKPOLL")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?;

        let mut config = Self::from_builder(builder, &configured_path)?;
        if let Ok(origins) = std::env::var("CORS_ORIGIN") {
            config.cors.allowed_origins = split_origins(&origins);
        }

        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4000)?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("realtime.channel_capacity", 256)?
            .set_default("polls.serve_inactive", true)?
            .set_default("logging.format", "compact")
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>, path: &str) -> Result<Self> {
        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, path))?;
        settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.database.url.trim().is_empty(),
            "Database URL must be specified (database.url or DATABASE_URL)"
        );
        ensure!(self.server.port > 0, "Server port must be greater than zero");
        self.database.ensure_bounds()?;
        ensure!(
            self.realtime.channel_capacity > 0,
            "Realtime channel capacity must be positive"
        );
        ensure!(
            self.realtime.channel_capacity <= 65_536,
            "Realtime channel capacity exceeds 65536"
        );
        self.cors.header_values()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(self.port != 0, "HTTP port cannot be zero");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    fn ensure_bounds(&self) -> Result<()> {
        ensure!(
            self.max_connections > 0,
            "Max connections must be positive"
        );
        ensure!(
            self.max_connections <= 128,
            "Connection pool oversized"
        );
        ensure!(
            self.max_connections >= self.min_connections.unwrap_or(1),
            "Max connections must be >= min connections"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// `"*"` anywhere in the list opens the API to every origin.
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin.trim() == "*")
    }

    pub fn header_values(&self) -> Result<Vec<HeaderValue>> {
        self.allowed_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty() && *origin != "*")
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("Invalid CORS origin {origin:?}"))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollsConfig {
    /// Whether soft-deleted polls still resolve by identifier.
    pub serve_inactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
