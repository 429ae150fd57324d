//! Process configuration sourced from `AUTHGATE_*` environment variables.
//!
//! Resolved once at startup. Degraded-but-workable settings (short or
//! missing signing secret, half-configured admin pair) are logged and
//! softened; genuinely unusable settings (bad port, bad base path) abort.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Secrets shorter than this are accepted with a warning.
const MIN_SECRET_LEN: usize = 32;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BASE_PATH: &str = "/api/v1/auth";
const DEFAULT_DATABASE: &str = "authgate.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Mount point for the auth routes.
    pub base_path: String,
    pub database_path: PathBuf,
    /// HS256 signing secret for session tokens.
    pub jwt_secret: String,
    /// Controls the `Secure` attribute on session cookies.
    pub production: bool,
    /// Admin identity; both halves or neither.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = get("AUTHGATE_HOST")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());

        let port = match get("AUTHGATE_PORT").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("AUTHGATE_PORT is not a valid port: {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        let base_path = get("AUTHGATE_BASE_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_PATH.to_owned());
        if !base_path.starts_with('/') {
            bail!("AUTHGATE_BASE_PATH must start with '/': {base_path:?}");
        }

        let database_path = get("AUTHGATE_DATABASE")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_DATABASE), PathBuf::from);

        let jwt_secret = resolve_secret(get("AUTHGATE_JWT_SECRET"));

        let production = get("AUTHGATE_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let admin_email = get("AUTHGATE_ADMIN_EMAIL").filter(|v| !v.trim().is_empty());
        let admin_password = get("AUTHGATE_ADMIN_PASSWORD").filter(|v| !v.trim().is_empty());
        let (admin_email, admin_password) = match (admin_email, admin_password) {
            (Some(email), Some(password)) => (Some(email), Some(password)),
            (None, None) => (None, None),
            _ => {
                tracing::warn!(
                    "Only one of AUTHGATE_ADMIN_EMAIL / AUTHGATE_ADMIN_PASSWORD is set — \
                     admin login disabled"
                );
                (None, None)
            }
        };

        Ok(Self {
            host,
            port,
            base_path,
            database_path,
            jwt_secret,
            production,
            admin_email,
            admin_password,
        })
    }
}

/// Signing secret policy: use what's configured, warn when it's short,
/// generate a per-process secret when it's absent (tokens then do not
/// survive restarts).
fn resolve_secret(configured: Option<String>) -> String {
    match configured.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()) {
        Some(secret) if secret.len() >= MIN_SECRET_LEN => secret,
        Some(secret) => {
            tracing::warn!(
                "AUTHGATE_JWT_SECRET is shorter than {MIN_SECRET_LEN} characters — \
                 consider a longer secret"
            );
            secret
        }
        None => {
            tracing::warn!(
                "AUTHGATE_JWT_SECRET not set — generating a random secret; \
                 issued tokens will not survive a restart"
            );
            use rand::Rng;
            let mut rng = rand::thread_rng();
            let bytes: Vec<u8> = (0..32).map(|_| rng.gen::<u8>()).collect();
            hex::encode(bytes)
        }
    }
}
