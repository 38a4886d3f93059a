use std::env;
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use chrono::FixedOffset;
use dotenvy::dotenv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MySql,
    Memory,
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,

    /// Fixed offset of the local calendar used for day/week/month totals
    pub local_offset: FixedOffset,
    pub log_level: tracing::Level,

    // Rate limiting
    pub rate_clock_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_query_per_min: u32,

    // Directory warmup
    pub cache_warmup_days: u32,
    pub warmup_batch_size: usize,

    pub api_prefix: String,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("mysql") => StoreBackend::MySql,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be 'mysql' or 'memory', got {other:?}"),
        };

        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::MySql && database_url.is_none() {
            bail!("DATABASE_URL must be set for the mysql backend");
        }

        let offset_secs: i32 = parse_or(&lookup, "LOCAL_UTC_OFFSET_SECONDS", -3 * 3600)?;
        let local_offset = FixedOffset::east_opt(offset_secs)
            .with_context(|| format!("LOCAL_UTC_OFFSET_SECONDS out of range: {offset_secs}"))?;

        Ok(Self {
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            store_backend,
            database_url,
            local_offset,
            log_level: parse_or(&lookup, "LOG_LEVEL", tracing::Level::INFO)?,
            rate_clock_per_min: parse_or(&lookup, "RATE_CLOCK_PER_MIN", 120)?,
            rate_register_per_min: parse_or(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_query_per_min: parse_or(&lookup, "RATE_QUERY_PER_MIN", 300)?,
            cache_warmup_days: parse_or(&lookup, "CACHE_WARMUP_DAYS", 30)?,
            warmup_batch_size: parse_or(&lookup, "WARMUP_BATCH_SIZE", 250)?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
        })
    }
}
