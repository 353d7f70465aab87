use log::{info, warn};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} must be set")]
    Missing(&'static str),
    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub api_key: String,
    pub tmdb_base_url: String,
    pub bcrypt_cost: u32,
    /// Keep every store in memory instead of under `data_dir`.
    pub ephemeral: bool,
}

impl Config {
    /// Reads `.env` if there is one, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Ok(Config {
            bind: try_load("CINELIST_BIND", "127.0.0.1:3000")?,
            data_dir: try_load("CINELIST_DATA_DIR", "./data")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_secs: try_load("JWT_TTL_SECS", "3600")?,
            api_key: required("API_KEY")?,
            tmdb_base_url: try_load("TMDB_BASE_URL", "https://api.themoviedb.org/3")?,
            bcrypt_cost: try_load("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
            ephemeral: try_load("CINELIST_EPHEMERAL", "false")?,
        })
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.jsonl")
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.data_dir.join("favorites.jsonl")
    }

    pub fn denylist_path(&self) -> PathBuf {
        self.data_dir.join("denylist.jsonl")
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or_else(|| {
        warn!("{} is not set", key);
        ConfigError::Missing(key)
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{} not set, using default: {}", key, default);
            default.to_owned()
        })
        .parse()
        .map_err(|err: T::Err| ConfigError::Invalid {
            key,
            message: err.to_string(),
        })
}
