use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::rate_limit::{DEFAULT_RATE_LIMIT_MAX_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW};

use super::BoxError;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    /// JSON file mapping bearer tokens to session values
    pub session_store_path: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9001,
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            session_store_path: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BoxError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let host = env_var_non_empty("TRIAGE_SERVICE_HOST").unwrap_or(defaults.host);
        let port = env::var("TRIAGE_SERVICE_PORT")
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let rate_limit_max_requests = env::var("RATE_LIMIT_MAX_REQUESTS")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.rate_limit_max_requests);
        let rate_limit_window = env::var("RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);
        let session_store_path = env_var_non_empty("SESSION_STORE_PATH")
            .map(resolve_path)
            .transpose()?;
        let max_body_bytes = env::var("TRIAGE_MAX_BODY_BYTES")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.max_body_bytes);

        Ok(Self {
            host,
            port,
            rate_limit_max_requests,
            rate_limit_window,
            session_store_path,
            max_body_bytes,
        })
    }
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = env::current_dir()?;
        Ok(cwd.join(path))
    }
}
