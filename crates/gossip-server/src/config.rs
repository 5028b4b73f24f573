use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder admin passwords that MUST NOT be used.
const PLACEHOLDER_PASSWORDS: &[&str] = &["change-me", "admin", "password"];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub admin_user: String,
    pub admin_password: String,
    pub redelivery_delay: Duration,
    pub max_in_flight: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("GOSSIP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("GOSSIP_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("GOSSIP_PORT is not a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("GOSSIP_HOST is not an address")?;

        let admin_password = var("GOSSIP_ADMIN_PASSWORD").unwrap_or_default();
        if admin_password.is_empty() || PLACEHOLDER_PASSWORDS.contains(&admin_password.as_str()) {
            bail!("GOSSIP_ADMIN_PASSWORD is unset or still a placeholder");
        }

        let redelivery_ms: u64 = var("GOSSIP_REDELIVERY_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        let max_in_flight: usize = var("GOSSIP_MAX_IN_FLIGHT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        Ok(Self {
            addr,
            db_path: var("GOSSIP_DB_PATH").unwrap_or_else(|| "gossip.db".into()).into(),
            admin_user: var("GOSSIP_ADMIN_USER").unwrap_or_else(|| "admin".into()),
            admin_password,
            redelivery_delay: Duration::from_millis(redelivery_ms),
            max_in_flight: max_in_flight.max(1),
        })
    }
}
