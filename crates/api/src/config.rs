use std::path::PathBuf;
use std::time::Duration;

use crate::net::{parse_network_list, IpNetwork};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on draining in-flight generation runs at shutdown.
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    /// Model used when a prompt carries no `--model` flag.
    pub default_model: String,
    /// Root directory for generated artifacts.
    pub storage_root: PathBuf,
    pub comfyui_url: String,
    /// Directory of `<workflow>.json` templates.
    pub workflow_dir: PathBuf,
    /// Base URL of the synchronous backend; disabled when `None`.
    pub direct_backend_url: Option<String>,
    pub generation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub blocking_pool_size: usize,
    /// When set, broadcasts are relayed to this peer instead of fanned out.
    pub peer_broadcast_url: Option<String>,
    /// Bearer token for `/api/broadcast`, both inbound and relayed.
    pub broadcast_token: Option<String>,
    /// Caller networks allowed to use `/api/broadcast`.
    pub broadcast_allowed_networks: Vec<IpNetwork>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                    |
    /// |------------------------------|----------------------------|
    /// | `HOST`                       | `0.0.0.0`                  |
    /// | `PORT`                       | `3000`                     |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                       |
    /// | `DATABASE_URL`               | required                   |
    /// | `DEFAULT_MODEL`              | `flux`                     |
    /// | `STORAGE_ROOT`               | `./data/photos`            |
    /// | `COMFYUI_URL`                | `http://127.0.0.1:8188`    |
    /// | `WORKFLOW_DIR`               | `./workflows`              |
    /// | `DIRECT_BACKEND_URL`         | unset                      |
    /// | `GENERATION_TIMEOUT_SECS`    | `600`                      |
    /// | `POLL_INTERVAL_MS`           | `1000`                     |
    /// | `BLOCKING_POOL_SIZE`         | `4`                        |
    /// | `PEER_BROADCAST_URL`         | unset                      |
    /// | `BROADCAST_TOKEN`            | unset                      |
    /// | `BROADCAST_ALLOWED_NETWORKS` | `127.0.0.0/8,::1/128`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let cors_origins = or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let networks_raw = or("BROADCAST_ALLOWED_NETWORKS", "127.0.0.0/8,::1/128");
        let broadcast_allowed_networks =
            parse_network_list(&networks_raw).map_err(|e| ConfigError::Invalid {
                var: "BROADCAST_ALLOWED_NETWORKS",
                value: networks_raw.clone(),
                reason: e.to_string(),
            })?;

        let blocking_pool_size: usize = parse_var("BLOCKING_POOL_SIZE", or("BLOCKING_POOL_SIZE", "4"))?;
        if blocking_pool_size == 0 {
            return Err(ConfigError::Invalid {
                var: "BLOCKING_POOL_SIZE",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            host: or("HOST", "0.0.0.0"),
            port: parse_var("PORT", or("PORT", "3000"))?,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", or("REQUEST_TIMEOUT_SECS", "30"))?,
            shutdown_timeout_secs: parse_var(
                "SHUTDOWN_TIMEOUT_SECS",
                or("SHUTDOWN_TIMEOUT_SECS", "30"),
            )?,
            database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            default_model: or("DEFAULT_MODEL", "flux"),
            storage_root: PathBuf::from(or("STORAGE_ROOT", "./data/photos")),
            comfyui_url: or("COMFYUI_URL", "http://127.0.0.1:8188"),
            workflow_dir: PathBuf::from(or("WORKFLOW_DIR", "./workflows")),
            direct_backend_url: var("DIRECT_BACKEND_URL"),
            generation_timeout_secs: parse_var(
                "GENERATION_TIMEOUT_SECS",
                or("GENERATION_TIMEOUT_SECS", "600"),
            )?,
            poll_interval_ms: parse_var("POLL_INTERVAL_MS", or("POLL_INTERVAL_MS", "1000"))?,
            blocking_pool_size,
            peer_broadcast_url: var("PEER_BROADCAST_URL"),
            broadcast_token: var("BROADCAST_TOKEN"),
            broadcast_allowed_networks,
        })
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_var<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}
