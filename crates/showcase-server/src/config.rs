use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets that ship in sample `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Usernames that are made admins when they register.
    pub admins: HashSet<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("SHOWCASE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("SHOWCASE_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid SHOWCASE_PORT: {}", raw))?,
            None => 3000,
        };
        let db_path = PathBuf::from(lookup("SHOWCASE_DB_PATH").unwrap_or_else(|| "showcase.db".into()));

        let jwt_secret = lookup("SHOWCASE_JWT_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("SHOWCASE_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.to_lowercase().as_str()) {
            bail!("SHOWCASE_JWT_SECRET is a placeholder value; set a real secret");
        }

        let admins = lookup("SHOWCASE_ADMINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            admins,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
