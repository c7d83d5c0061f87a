// ⚙️ Runtime configuration
// Defaults first, then MEMBER_REGISTRY_* environment overrides

use crate::member_number::DEFAULT_MAX_ATTEMPTS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DB: &str = "MEMBER_REGISTRY_DB";
pub const ENV_ADDR: &str = "MEMBER_REGISTRY_ADDR";
pub const ENV_MAX_ATTEMPTS: &str = "MEMBER_REGISTRY_MAX_ATTEMPTS";
pub const ENV_SEED_COUNT: &str = "MEMBER_REGISTRY_SEED_COUNT";
pub const ENV_ADMIN_EMAIL: &str = "MEMBER_REGISTRY_ADMIN_EMAIL";
pub const ENV_ADMIN_PASSWORD: &str = "MEMBER_REGISTRY_ADMIN_PASSWORD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Listen address for the REST server
    pub bind_addr: String,

    /// Retry ceiling for member number generation
    pub max_generation_attempts: usize,

    /// Random members added by `seed` on top of the named samples
    pub seed_random_members: usize,

    pub admin_email: String,

    #[serde(skip_serializing)]
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("members.db"),
            bind_addr: "0.0.0.0:3000".to_string(),
            max_generation_attempts: DEFAULT_MAX_ATTEMPTS,
            seed_random_members: 40,
            admin_email: "admin@test.com".to_string(),
            admin_password: "password".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (environment, test map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup(ENV_DB) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup(ENV_ADDR) {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            config.max_generation_attempts = parse_number(ENV_MAX_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SEED_COUNT) {
            config.seed_random_members = parse_number(ENV_SEED_COUNT, &raw)?;
        }
        if let Some(email) = lookup(ENV_ADMIN_EMAIL) {
            config.admin_email = email;
        }
        if let Some(password) = lookup(ENV_ADMIN_PASSWORD) {
            config.admin_password = password;
        }

        Ok(config)
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw))
}
