//! Configuration loader with layered sources.

use crate::{validation, StoreConfig};
use coffer_core::CacheError;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable prefix read by default.
pub const ENV_PREFIX: &str = "COFFER";

/// Loads a [`StoreConfig`] from layered sources.
///
/// Sources are applied in order, later ones overriding earlier ones:
/// 1. `{dir}/default.toml`
/// 2. `{dir}/{COFFER_ENVIRONMENT}.toml` (defaults to `development`)
/// 3. `{dir}/local.toml`
/// 4. Environment variables with the `COFFER_` prefix, `__` between
///    sections (`COFFER_REDIS__ADDRESS=cache:6379`)
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Creates a loader reading files from `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Creates a loader for the default location (`./config`).
    pub fn from_default_location() -> Self {
        Self::new("./config")
    }

    /// Overrides the environment variable prefix.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<StoreConfig, CacheError> {
        // Load .env file if present
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment = std::env::var(format!("{}_ENVIRONMENT", self.env_prefix))
            .unwrap_or_else(|_| "development".to_string());
        info!("Loading cache configuration for environment: {}", environment);

        let mut builder = Config::builder();
        for name in ["default", environment.as_str(), "local"] {
            let path = self.config_dir.join(format!("{name}.toml"));
            builder = add_file(builder, &path);
        }

        self.finish(builder)
    }

    /// Loads and validates the configuration from a single file, with
    /// environment overrides applied on top.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StoreConfig, CacheError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CacheError::configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        self.finish(add_file(Config::builder(), path))
    }

    fn finish(&self, builder: ConfigBuilder<DefaultState>) -> Result<StoreConfig, CacheError> {
        let config = builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error_to_cache_error)?;

        let store_config: StoreConfig = config
            .try_deserialize()
            .map_err(config_error_to_cache_error)?;

        if store_config.prefix.as_deref() == Some("") {
            warn!("Empty cache prefix configured; keys are not namespaced");
        }

        validation::validate(&store_config).into_result()?;
        Ok(store_config)
    }
}

fn add_file(builder: ConfigBuilder<DefaultState>, path: &Path) -> ConfigBuilder<DefaultState> {
    if path.exists() {
        debug!("Loading cache config from: {}", path.display());
        builder.add_source(File::from(path).required(false))
    } else {
        builder
    }
}

fn config_error_to_cache_error(err: ConfigError) -> CacheError {
    CacheError::Configuration(err.to_string())
}
