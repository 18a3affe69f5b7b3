//! Helpers for reading configuration out of the environment.
use std::{env, str::FromStr, time::Duration};

use log::*;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads `key` from the environment and parses it. Missing values silently fall back to `default`; values that do not
/// parse are logged and also fall back to `default`.
pub fn env_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

/// Reads a millisecond count from the environment as a [`Duration`].
pub fn env_millis_or_default(key: &str, default: Duration) -> Duration {
    let ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_or_default(key, ms))
}
