//! Server configuration loaded from environment variables.
//!
//! Everything except the JWT secret has a default suitable for local
//! development.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that must not reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `CRADLE_HOST`, default `0.0.0.0`.
    pub host: String,

    /// Env: `CRADLE_PORT`, default `3000`.
    pub port: u16,

    /// Env: `CRADLE_DB_PATH`, default `cradle.db`.
    pub db_path: PathBuf,

    /// HS256 signing key. Env: `CRADLE_JWT_SECRET`, required.
    pub jwt_secret: String,

    /// Env: `CRADLE_TOKEN_TTL_DAYS`, default 30.
    pub token_ttl_days: i64,

    /// Insert demo users and listings into an empty database.
    /// Env: `CRADLE_SEED_DEMO` (true/false), default false.
    pub seed_demo: bool,

    /// Accounts promoted to admin at startup.
    /// Env: `CRADLE_ADMIN_EMAILS`, comma separated.
    pub admin_emails: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            db_path: PathBuf::from("cradle.db"),
            jwt_secret: String::new(),
            token_ttl_days: 30,
            seed_demo: false,
            admin_emails: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        let secret = lookup("CRADLE_JWT_SECRET").unwrap_or_default();
        if secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
            bail!("CRADLE_JWT_SECRET is unset or still a placeholder");
        }
        config.jwt_secret = secret;

        if let Some(host) = lookup("CRADLE_HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("CRADLE_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("invalid CRADLE_PORT '{}'", port))?;
        }

        if let Some(path) = lookup("CRADLE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("CRADLE_TOKEN_TTL_DAYS") {
            match val.parse::<i64>() {
                Ok(days) if days > 0 => config.token_ttl_days = days,
                _ => tracing::warn!(value = %val, "Invalid CRADLE_TOKEN_TTL_DAYS, using default"),
            }
        }

        if let Some(val) = lookup("CRADLE_SEED_DEMO") {
            config.seed_demo = val == "true" || val == "1";
        }

        if let Some(val) = lookup("CRADLE_ADMIN_EMAILS") {
            config.admin_emails = val
                .split(',')
                .map(cradle_types::validation::normalize_email)
                .filter(|e| !e.is_empty())
                .collect();
        }

        Ok(config)
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = config(&[("CRADLE_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("cradle.db"));
        assert_eq!(cfg.token_ttl_days, 30);
        assert!(!cfg.seed_demo);
        assert_eq!(cfg.addr().unwrap(), "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn missing_or_placeholder_secret_is_fatal() {
        assert!(config(&[]).is_err());
        assert!(config(&[("CRADLE_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("CRADLE_JWT_SECRET", "a-real-secret"),
            ("CRADLE_HOST", "127.0.0.1"),
            ("CRADLE_PORT", "8081"),
            ("CRADLE_TOKEN_TTL_DAYS", "7"),
            ("CRADLE_SEED_DEMO", "true"),
            ("CRADLE_ADMIN_EMAILS", " Admin@Example.com, ,ops@example.com"),
        ])
        .unwrap();
        assert_eq!(cfg.addr().unwrap(), "127.0.0.1:8081".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.token_ttl_days, 7);
        assert!(cfg.seed_demo);
        assert_eq!(cfg.admin_emails, vec!["admin@example.com", "ops@example.com"]);
    }

    #[test]
    fn bad_values() {
        assert!(config(&[("CRADLE_JWT_SECRET", "s"), ("CRADLE_PORT", "http")]).is_err());
        let cfg = config(&[("CRADLE_JWT_SECRET", "s"), ("CRADLE_TOKEN_TTL_DAYS", "-1")]).unwrap();
        assert_eq!(cfg.token_ttl_days, 30);
    }
}
