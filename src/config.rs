//! Server configuration.
//!
//! Everything comes from environment variables so the binary can run under
//! systemd or a container without a config file:
//! - `HOST` / `PORT` - bind address (defaults `127.0.0.1:8080`)
//! - `DATABASE_PATH` - SQLite file (default `taskdeck.db`)
//! - `JWT_SECRET` - required unless `DEV_MODE=true`
//! - `JWT_TTL_DAYS` - session lifetime (default 30)
//! - `DEV_MODE` - when true, a missing JWT_SECRET falls back to an
//!   ephemeral secret and request logging is more verbose

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let dev_mode = std::env::var("DEV_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ if dev_mode => {
                tracing::warn!("JWT_SECRET not set, using ephemeral dev secret");
                let mut buf = [0u8; 32];
                rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut buf);
                hex::encode(buf)
            }
            _ => anyhow::bail!("JWT_SECRET must be set (or run with DEV_MODE=true)"),
        };

        let port = match std::env::var("PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT is not a valid port number: {}", p))?,
            Err(_) => 8080,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            database_path: std::env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("taskdeck.db")),
            jwt_secret,
            jwt_ttl_days: std::env::var("JWT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            dev_mode,
        })
    }
}
