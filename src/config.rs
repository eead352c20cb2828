use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::engine::transitions::TransitionPolicy;
use crate::error::AppError;
use crate::notify::Platform;

/// Upper bound for `ESTIMATED_DELIVERY_DAYS`.
pub const MAX_ESTIMATED_DELIVERY_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub estimated_delivery_days: i64,
    pub platform: Platform,
    pub transition_policy: TransitionPolicy,
    pub store_backend: StoreBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            estimated_delivery_days: 3,
            platform: Platform::Server,
            transition_policy: TransitionPolicy::Permissive,
            store_backend: StoreBackend::Memory,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") | Err(_) => StoreBackend::Memory,
            Ok("file") => {
                let path = env::var("STORE_PATH").map_err(|_| {
                    AppError::NotConfigured("STORE_PATH is required for the file store".to_string())
                })?;
                StoreBackend::File(PathBuf::from(path))
            }
            Ok(other) => {
                return Err(AppError::NotConfigured(format!(
                    "unknown STORE_BACKEND: {other}"
                )));
            }
        };

        let estimated_delivery_days = validate_delivery_days(parse_or_default(
            "ESTIMATED_DELIVERY_DAYS",
            defaults.estimated_delivery_days,
        )?)?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            estimated_delivery_days,
            platform: parse_or_default("PLATFORM", defaults.platform)?,
            transition_policy: parse_or_default("TRANSITION_POLICY", defaults.transition_policy)?,
            store_backend,
        })
    }
}

fn validate_delivery_days(days: i64) -> Result<i64, AppError> {
    if (0..=MAX_ESTIMATED_DELIVERY_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(AppError::NotConfigured(format!(
            "ESTIMATED_DELIVERY_DAYS must be between 0 and {MAX_ESTIMATED_DELIVERY_DAYS}, got {days}"
        )))
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::NotConfigured(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
