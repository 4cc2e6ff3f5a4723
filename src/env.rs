use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Where panel data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Sqlite(String),
    FixtureFile(PathBuf),
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_source: DataSource,
    pub poll_interval: Duration,
    pub load_timeout: Duration,
    pub allow_hard_delete: bool,
    pub activity_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_source: DataSource::Builtin,
            poll_interval: Duration::from_secs(30),
            load_timeout: Duration::from_secs(10),
            allow_hard_delete: false,
            activity_capacity: 200,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    dotenvy::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Internal(format!("{} has an invalid value '{}'", name, raw))),
        None => Ok(default),
    }
}

fn flag_var(name: &str) -> Result<bool, AppError> {
    match non_empty_var(name).map(|raw| raw.to_ascii_lowercase()) {
        None => Ok(false),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Internal(format!(
                "{} has an invalid value '{}'",
                name, raw
            ))),
        },
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Settings::default();

        let data_source = if let Some(url) = non_empty_var("DATABASE_URL") {
            DataSource::Sqlite(url)
        } else if let Some(path) = non_empty_var("FIXTURE_PATH") {
            DataSource::FixtureFile(PathBuf::from(path))
        } else {
            DataSource::Builtin
        };

        let poll_secs = parsed_var("POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())?;
        let timeout_secs = parsed_var("LOAD_TIMEOUT_SECS", defaults.load_timeout.as_secs())?;

        Ok(Self {
            data_source,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            load_timeout: Duration::from_secs(timeout_secs.max(1)),
            allow_hard_delete: flag_var("ALLOW_HARD_DELETE")?,
            activity_capacity: parsed_var("ACTIVITY_CAPACITY", defaults.activity_capacity)?,
        })
    }
}

#[cfg(test)]
pub fn load_test_environment() -> Result<(), Box<dyn std::error::Error>> {
    let test_env_files = vec!["config/common.env", ".secrets.env"];

    for env_file in test_env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}
