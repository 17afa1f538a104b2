// src/config.rs

use std::env;
use std::str::FromStr;
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    /// Lifetime of a story before it disappears from the shelf.
    pub story_ttl_hours: i64,
    pub reconcile_on_startup: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://buddyscript.db".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:3000".to_string(),
                ]
            });

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5),
            story_ttl_hours: parse_or("STORY_TTL_HOURS", 24),
            reconcile_on_startup: parse_or("RECONCILE_ON_STARTUP", true),
            cors_origins,
        }
    }

    pub fn story_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.story_ttl_hours)
    }
}

/// Reads an optional variable, falling back to `default` when it is unset or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
