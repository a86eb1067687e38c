//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file is
//! optional. Secrets (store connection string, access password) come from
//! env vars or from files named in the TOML, never from the TOML itself.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Key-value store settings
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(skip)]
    pub url: Option<Secret<String>>,
    /// File holding the connection string (alternative to REDIS_CONN_STRING)
    #[serde(default)]
    pub url_file: Option<PathBuf>,
}

/// Admin access settings
#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared password; `None` leaves the admin API open
    #[serde(skip)]
    pub access_password: Option<Secret<String>>,
    /// File holding the password (alternative to ACCESS_PWD)
    #[serde(default)]
    pub access_password_file: Option<PathBuf>,
}

/// OAuth flow settings
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_flow_ttl")]
    pub flow_ttl_secs: u64,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_connections() -> usize {
    1000
}

fn default_flow_ttl() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            flow_ttl_secs: default_flow_ttl(),
        }
    }
}

/// Read a secret from a file, trimming surrounding whitespace. Empty files yield `None`.
fn read_secret_file(path: &Path, what: &str) -> common::Result<Option<Secret<String>>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        common::Error::Config(format!("failed to read {what} {}: {e}", path.display()))
    })?;
    let value = contents.trim().to_owned();
    Ok((!value.is_empty()).then(|| Secret::new(value)))
}

/// Non-empty env var value, if set.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay environment variables.
    ///
    /// Secret resolution order for both the store URL and the password:
    /// 1. env var (`REDIS_CONN_STRING`, `ACCESS_PWD`)
    /// 2. `*_file` path from config
    ///
    /// `PORT` replaces the port of `listen_addr`.
    pub fn load(path: &Path) -> common::Result<Self> {
        let mut config: Config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            info!(path = %path.display(), "config file not found, using defaults and environment");
            Config::default()
        };

        if let Some(port) = env_value("PORT") {
            let port: u16 = port.parse().map_err(|e| common::Error::Env {
                name: "PORT".into(),
                reason: format!("{e}"),
            })?;
            config.server.listen_addr.set_port(port);
        }

        if let Some(url) = env_value("REDIS_CONN_STRING") {
            config.store.url = Some(Secret::new(url));
        } else if let Some(ref file) = config.store.url_file {
            config.store.url = read_secret_file(file, "store url_file")?;
        }

        if let Some(password) = env_value("ACCESS_PWD") {
            config.auth.access_password = Some(Secret::new(password));
        } else if let Some(ref file) = config.auth.access_password_file {
            config.auth.access_password = read_secret_file(file, "access_password_file")?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let url = self.store.url.as_ref().ok_or_else(|| {
            common::Error::Config(
                "store connection string is required (REDIS_CONN_STRING or store.url_file)".into(),
            )
        })?;
        let scheme_ok = ["redis://", "rediss://", "redis+unix://", "unix://"]
            .iter()
            .any(|scheme| url.expose().starts_with(scheme));
        if !scheme_ok {
            return Err(common::Error::Config(
                "store connection string must start with redis://, rediss://, redis+unix:// or unix://"
                    .into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.oauth.flow_ttl_secs == 0 {
            return Err(common::Error::Config(
                "flow_ttl_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("augment-token-manager.toml")
    }
}
