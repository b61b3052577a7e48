//! Server settings, read from flags or the environment (`.env` is loaded first).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::auth::DEFAULT_TOKEN_TTL_SECS;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Clone)]
#[command(name = "recipes_api", version, about = "Recipes HTTP API")]
pub struct Config {
    /// Address the HTTP server binds to.
    #[arg(long = "listen", env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Directory of the Sled document store.
    #[arg(long, env = "STORE_PATH", default_value = "recipes_data")]
    pub store_path: String,

    /// Database name; namespaces the collections inside the store.
    #[arg(long, env = "STORE_DATABASE", default_value = "demo")]
    pub store_database: String,

    /// Redis URL for the listing cache. Without it the cache lives in-process.
    #[arg(long, env = "CACHE_ADDR")]
    pub cache_addr: Option<String>,

    /// HMAC key used to sign tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "TOKEN_TTL_SECS", default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub token_ttl_secs: i64,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Write logs to daily files in this directory instead of stdout.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn signing_key(&self) -> Result<&[u8], ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        Ok(self.jwt_secret.as_bytes())
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
