use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "diary_config.toml";
const CONFIG_PATH_ENV: &str = "DIARY_CONFIG_PATH";
const ENV_PREFIX: &str = "DIARY_";

pub const DEFAULT_COLLECTION_NAME: &str = "diary_entries";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "qdrant")]
    Qdrant,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    #[serde(rename = "fastembed")]
    FastEmbed,
    /// Feature hashing, no model download. Meant for tests and offline runs.
    #[serde(rename = "hashing")]
    Hashing,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub collection_name: String,
    /// gRPC endpoint, only used by the qdrant backend.
    pub qdrant_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Vector size for the hashing provider. fastembed models fix their own.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let default_cache_dir = ProjectDirs::from("dev", "diary", "diary-vector")
            .map(|dirs| dirs.cache_dir().join("models"));
        Self {
            provider: EmbeddingProvider::FastEmbed,
            cache_dir: default_cache_dir,
            dimension: 384,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Loads configuration: defaults, then the TOML file, then `DIARY_*` env vars.
///
/// The TOML path comes from `DIARY_CONFIG_PATH` (which must exist when set),
/// falling back to `diary_config.toml` in the working directory.
pub fn load_config() -> Result<AppConfig> {
    let config_path_env = std::env::var(CONFIG_PATH_ENV).ok();
    let config_path = config_path_env
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow::anyhow!(
                "Config file not found at {}: {}",
                CONFIG_PATH_ENV,
                env_path
            ));
        }
        log::info!("{} is set: {}", CONFIG_PATH_ENV, env_path);
    } else {
        log::info!("{} not set, falling back to default: {}", CONFIG_PATH_ENV, config_path);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment.extract().context("Failed to extract AppConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        return Err(anyhow::anyhow!("server.port must be non-zero"));
    }
    if config.store.collection_name.trim().is_empty() {
        return Err(anyhow::anyhow!("store.collection_name cannot be empty"));
    }
    if config.store.backend == StoreBackend::Qdrant && config.store.qdrant_url.trim().is_empty() {
        return Err(anyhow::anyhow!("store.qdrant_url is required for the qdrant backend"));
    }
    if config.embedding.provider == EmbeddingProvider::Hashing && config.embedding.dimension == 0 {
        return Err(anyhow::anyhow!("embedding.dimension must be greater than zero"));
    }
    if let Some(dir) = &config.embedding.cache_dir {
        if dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Configured embedding.cache_dir cannot be empty"));
        }
    }
    Ok(())
}
