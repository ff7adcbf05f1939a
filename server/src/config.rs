use miette::{IntoDiagnostic, Result, WrapErr, miette};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DATABASE_URL: &str = "sqlite:auth.db";
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 60;

/// Process settings, read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// JSON file with clients and users to load on startup
    pub seed_file: Option<PathBuf>,
    /// Overrides the library's default grant lifetime
    pub grant_lifetime: Option<chrono::Duration>,
    pub purge_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .into_diagnostic()
            .wrap_err("BIND_ADDR is not a socket address")?;

        let grant_lifetime = lookup("GRANT_LIFETIME_SECS")
            .map(|raw| parse_secs("GRANT_LIFETIME_SECS", &raw))
            .transpose()?
            .map(|secs| chrono::Duration::seconds(secs as i64));

        let purge_interval = lookup("GRANT_PURGE_INTERVAL_SECS")
            .map(|raw| parse_secs("GRANT_PURGE_INTERVAL_SECS", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_PURGE_INTERVAL_SECS);
        if purge_interval == 0 {
            return Err(miette!("GRANT_PURGE_INTERVAL_SECS must be positive"));
        }

        Ok(Self {
            bind_addr,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            seed_file: lookup("SEED_FILE").map(PathBuf::from),
            grant_lifetime,
            purge_interval: Duration::from_secs(purge_interval),
        })
    }

    /// Library configuration derived from these settings.
    pub fn server_config(&self) -> oauth2_server::ServerConfig {
        let config = oauth2_server::ServerConfig::new();
        match self.grant_lifetime {
            Some(lifetime) => config.with_grant_lifetime(lifetime),
            None => config,
        }
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .into_diagnostic()
        .wrap_err_with(|| format!("{} must be a whole number of seconds", key))
}
