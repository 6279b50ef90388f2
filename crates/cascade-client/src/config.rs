use std::time::Duration;

use cascade_core::AppError;
use url::Url;

const DEFAULT_API_VERSION: &str = "60.0";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings for reaching the remote platform.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub instance_url: Url,
    pub access_token: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(instance_url: &str, access_token: &str) -> Result<Self, AppError> {
        let instance_url = Url::parse(instance_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid instance URL '{instance_url}': {e}"))
        })?;
        if !matches!(instance_url.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "Instance URL scheme '{}' is not allowed (only http/https)",
                instance_url.scheme()
            )));
        }
        if access_token.trim().is_empty() {
            return Err(AppError::ConfigError("Access token is empty".into()));
        }

        Ok(Self {
            instance_url,
            access_token: access_token.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_api_version(mut self, version: &str) -> Result<Self, AppError> {
        let version = version.trim_start_matches('v');
        let valid = version
            .split_once('.')
            .is_some_and(|(major, minor)| {
                !major.is_empty()
                    && !minor.is_empty()
                    && major.bytes().all(|b| b.is_ascii_digit())
                    && minor.bytes().all(|b| b.is_ascii_digit())
            });
        if !valid {
            return Err(AppError::ConfigError(format!(
                "Invalid API version '{version}': expected <major>.<minor>, e.g. 60.0"
            )));
        }
        self.api_version = version.to_string();
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read configuration from environment variables.
    ///
    /// - `CASCADE_INSTANCE_URL` (required)
    /// - `CASCADE_ACCESS_TOKEN` (required)
    /// - `CASCADE_API_VERSION` (optional, defaults to 60.0)
    /// - `CASCADE_TIMEOUT_SECS` (optional, defaults to 120)
    pub fn from_env() -> Result<Self, AppError> {
        let instance_url = std::env::var("CASCADE_INSTANCE_URL").map_err(|_| {
            AppError::ConfigError("CASCADE_INSTANCE_URL not set. Required to connect.".into())
        })?;
        let access_token = std::env::var("CASCADE_ACCESS_TOKEN").map_err(|_| {
            AppError::ConfigError("CASCADE_ACCESS_TOKEN not set. Required to connect.".into())
        })?;

        let mut config = Self::new(&instance_url, &access_token)?;

        if let Ok(version) = std::env::var("CASCADE_API_VERSION") {
            config = config.with_api_version(&version)?;
        }

        if let Ok(raw) = std::env::var("CASCADE_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid CASCADE_TIMEOUT_SECS '{raw}': must be a positive integer"
                ))
            })?;
            if secs == 0 {
                return Err(AppError::ConfigError(
                    "CASCADE_TIMEOUT_SECS must be at least 1".into(),
                ));
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}
