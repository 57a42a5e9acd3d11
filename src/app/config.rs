use std::path::PathBuf;

use crate::adapters::attestation_api::DEFAULT_BASE_URL;
use crate::app::AppError;
use crate::domain::models::Credentials;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub origin: String,
    pub cookie_file: PathBuf,
    pub snapshot_file: PathBuf,
    pub http_timeout_secs: u64,
    pub flag_new_fields: bool,
    pub extra_ignored_fields: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            base_url: string_or_default(&lookup, "ATTEST_BASE_URL", DEFAULT_BASE_URL),
            origin: string_or_default(&lookup, "ATTEST_ORIGIN", "https://attestation.app"),
            cookie_file: PathBuf::from(string_or_default(
                &lookup,
                "ATTEST_COOKIE_FILE",
                "cookies.json",
            )),
            snapshot_file: PathBuf::from(string_or_default(
                &lookup,
                "ATTEST_SNAPSHOT_FILE",
                "attestation_dump.json",
            )),
            http_timeout_secs: parse_or_default(&lookup, "ATTEST_HTTP_TIMEOUT_SECS", 30_u64)?,
            flag_new_fields: parse_bool_or_default(&lookup, "ATTEST_FLAG_NEW_FIELDS", false)?,
            extra_ignored_fields: lookup("ATTEST_EXTRA_IGNORED_FIELDS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|field| !field.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

pub fn load_credentials() -> Result<Credentials, AppError> {
    credentials_from_lookup(|key| std::env::var(key).ok())
}

fn credentials_from_lookup<F>(lookup: F) -> Result<Credentials, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let username = lookup("ATTEST_USERNAME")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let password = lookup("ATTEST_PASSWORD").filter(|v| !v.is_empty());

    match (username, password) {
        (Some(username), Some(password)) => Ok(Credentials { username, password }),
        _ => Err(AppError::config(
            "ATTEST_USERNAME and ATTEST_PASSWORD are required",
        )),
    }
}

fn string_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn parse_bool_or_default<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(AppError::config(format!("{key} must be a boolean"))),
    }
}
