/// Configuration management for the directory server
///
/// Sources, lowest precedence first:
///
/// 1. Built-in defaults
/// 2. `taskcenter.toml` in the working directory, if present
/// 3. Environment variables prefixed `TASKCENTER__`, with `__` between
///    levels (`TASKCENTER__API__PORT=9000`,
///    `TASKCENTER__DIRECTORY__PWD_MIN_CHARS=12`)
/// 4. `DATABASE_URL` and `JWT_SECRET`
///
/// A `.env` file is loaded first, so any of the variables above may live there.
///
/// # Example
///
/// ```no_run
/// use taskcenter_directory::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use taskcenter_shared::db::pool::DatabaseConfig;

use crate::directory::DirectorySettings;

const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    pub store: StoreConfig,

    #[serde(default)]
    pub directory: DirectorySettings,

    /// Region name to region layout
    #[serde(default = "default_regions")]
    pub regions: BTreeMap<String, RegionConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode
    pub production: bool,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 characters. Generate with: `openssl rand -hex 32`
    pub secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

/// Layout of one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Number of shards
    pub shards: usize,

    /// One database URL per shard, in shard order (postgres backend only)
    #[serde(default)]
    pub shard_urls: Vec<String>,
}

fn default_regions() -> BTreeMap<String, RegionConfig> {
    BTreeMap::from([(
        "local".to_string(),
        RegionConfig {
            shards: 1,
            shard_urls: Vec::new(),
        },
    )])
}

impl Config {
    /// Loads configuration from all sources
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A source has a value of the wrong type
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - The region layout is empty or does not match the store backend
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let builder = with_defaults(config::Config::builder())?
            .add_source(File::with_name("taskcenter").required(false))
            .add_source(
                Environment::with_prefix("TASKCENTER")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("api.cors_origins")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("jwt.secret", env::var("JWT_SECRET").ok())?;

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus explicit key/value overrides, ignoring files and the environment
    pub fn with_overrides(overrides: &[(&str, &str)]) -> anyhow::Result<Self> {
        let mut builder = with_defaults(config::Config::builder())?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long");
        }
        if self.regions.is_empty() {
            anyhow::bail!("At least one region must be configured");
        }
        for (name, region) in &self.regions {
            if region.shards == 0 {
                anyhow::bail!("Region {name} must have at least one shard");
            }
            if self.store.backend == StoreBackend::Postgres && region.shard_urls.len() != region.shards {
                anyhow::bail!(
                    "Region {name} has {} shards but {} shard URLs",
                    region.shards,
                    region.shard_urls.len()
                );
            }
        }
        if self.store.backend == StoreBackend::Postgres && self.database.url.is_empty() {
            anyhow::bail!("DATABASE_URL is required for the postgres store backend");
        }

        let settings = &self.directory;
        if settings.name_min_chars > settings.name_max_chars || settings.pwd_min_chars > settings.pwd_max_chars {
            anyhow::bail!("Minimum lengths must not exceed maximum lengths");
        }
        if settings.salt_len < 8 {
            anyhow::bail!("Salt length must be at least 8 bytes");
        }
        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn with_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let directory = DirectorySettings::default();
    builder
        .set_default("api.host", "0.0.0.0")?
        .set_default("api.port", 8080_i64)?
        .set_default("api.cors_origins", vec!["*"])?
        .set_default("api.production", false)?
        .set_default("jwt.secret", "")?
        .set_default("store.backend", "memory")?
        .set_default("directory.name_min_chars", directory.name_min_chars as i64)?
        .set_default("directory.name_max_chars", directory.name_max_chars as i64)?
        .set_default("directory.pwd_min_chars", directory.pwd_min_chars as i64)?
        .set_default("directory.pwd_max_chars", directory.pwd_max_chars as i64)?
        .set_default("directory.max_process_entity_count", directory.max_process_entity_count as i64)?
        .set_default("directory.max_search_limit", directory.max_search_limit as i64)?
        .set_default("directory.crypto_code_len", directory.crypto_code_len as i64)?
        .set_default("directory.salt_len", directory.salt_len as i64)?
        .set_default("directory.kdf.m_cost", i64::from(directory.kdf.m_cost))?
        .set_default("directory.kdf.t_cost", i64::from(directory.kdf.t_cost))?
        .set_default("directory.kdf.p_cost", i64::from(directory.kdf.p_cost))?
        .set_default("directory.kdf.key_len", i64::from(directory.kdf.key_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_defaults() {
        let config = Config::with_overrides(&[("jwt.secret", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.directory.name_min_chars, 3);
        assert_eq!(config.directory.pwd_max_chars, 200);
        assert_eq!(config.directory.kdf.m_cost, 65536);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.regions.len(), 1);
    }

    #[test]
    fn test_overrides() {
        let config = Config::with_overrides(&[
            ("jwt.secret", SECRET),
            ("api.port", "9000"),
            ("directory.salt_len", "16"),
            ("regions.eu.shards", "4"),
        ])
        .unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.directory.salt_len, 16);
        assert_eq!(config.regions.keys().collect::<Vec<_>>(), vec!["eu"]);
        assert_eq!(config.regions["eu"].shards, 4);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(Config::with_overrides(&[("jwt.secret", "short")]).is_err());
    }

    #[test]
    fn test_zero_shards_rejected() {
        assert!(Config::with_overrides(&[("jwt.secret", SECRET), ("regions.eu.shards", "0")]).is_err());
    }

    #[test]
    fn test_postgres_needs_database_and_shard_urls() {
        let missing = Config::with_overrides(&[("jwt.secret", SECRET), ("store.backend", "postgres")]);
        assert!(missing.is_err());

        let missing_urls = Config::with_overrides(&[
            ("jwt.secret", SECRET),
            ("store.backend", "postgres"),
            ("database.url", "postgresql://localhost/directory"),
        ]);
        assert!(missing_urls.is_err());
    }
}
