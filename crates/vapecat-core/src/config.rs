use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let unit_interval = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value: f64 = parse_as(var, &or_default(var, default))?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("{value} is outside [0, 1]"),
            })
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("VAPECAT_ENV", "development"))?;
    let log_level = or_default("VAPECAT_LOG_LEVEL", "info");
    let results_dir = PathBuf::from(or_default("VAPECAT_RESULTS_DIR", "./results"));
    let rules_path = lookup("VAPECAT_RULES_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let db_max_connections = parse_as(
        "VAPECAT_DB_MAX_CONNECTIONS",
        &or_default("VAPECAT_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections = parse_as(
        "VAPECAT_DB_MIN_CONNECTIONS",
        &or_default("VAPECAT_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs = parse_as(
        "VAPECAT_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("VAPECAT_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    let similarity_threshold = unit_interval("VAPECAT_SIMILARITY_THRESHOLD", "0.95")?;
    if similarity_threshold <= 0.0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "VAPECAT_SIMILARITY_THRESHOLD".to_string(),
            reason: "threshold must be greater than 0".to_string(),
        });
    }
    let max_length_ratio = unit_interval("VAPECAT_MAX_LENGTH_RATIO", "0.3")?;
    let min_charset_jaccard = unit_interval("VAPECAT_MIN_CHARSET_JACCARD", "0.5")?;

    let grouping_batch_size: usize = parse_as(
        "VAPECAT_GROUPING_BATCH_SIZE",
        &or_default("VAPECAT_GROUPING_BATCH_SIZE", "64"),
    )?;
    if grouping_batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "VAPECAT_GROUPING_BATCH_SIZE".to_string(),
            reason: "batch size must be at least 1".to_string(),
        });
    }

    let unknown_brand_id = parse_as(
        "VAPECAT_UNKNOWN_BRAND_ID",
        &or_default("VAPECAT_UNKNOWN_BRAND_ID", "1"),
    )?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        results_dir,
        rules_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        similarity_threshold,
        max_length_ratio,
        min_charset_jaccard,
        grouping_batch_size,
        unknown_brand_id,
    })
}

fn parse_as<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "VAPECAT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
