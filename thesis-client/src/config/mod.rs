use serde::Deserialize;

use crate::error::ClientError;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub jobs: JobSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    /// Base URL of the thesis-management REST server.
    pub base_url: String,
    /// Timeout applied to every transport call, poll ticks included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Client-enforced access token lifetime; the server is authoritative.
    #[serde(default = "default_access_token_ttl_minutes")]
    pub access_token_ttl_minutes: i64,
    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobSettings {
    /// Interval between job status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Cap on the backoff applied after consecutive failed polls.
    #[serde(default = "default_poll_backoff_cap_ms")]
    pub poll_backoff_cap_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_access_token_ttl_minutes() -> i64 {
    60
}

fn default_refresh_token_ttl_days() -> i64 {
    7
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_poll_backoff_cap_ms() -> u64 {
    60_000
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            refresh_path: default_refresh_path(),
            access_token_ttl_minutes: default_access_token_ttl_minutes(),
            refresh_token_ttl_days: default_refresh_token_ttl_days(),
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_backoff_cap_ms: default_poll_backoff_cap_ms(),
        }
    }
}

impl Settings {
    /// Load settings from `configuration.yaml` (optional) overlaid with
    /// `APP_`-prefixed environment variables (`APP_API__BASE_URL`, ...).
    pub fn load() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("configuration").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Settings pointed at a given base URL with defaults everywhere else.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiSettings {
                base_url: base_url.into(),
                request_timeout_secs: default_request_timeout_secs(),
            },
            auth: AuthSettings::default(),
            jobs: JobSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_contract() {
        let settings = Settings::for_base_url("http://localhost:9000");
        assert_eq!(settings.jobs.poll_interval_ms, 5000);
        assert_eq!(settings.auth.access_token_ttl_minutes, 60);
        assert_eq!(settings.auth.refresh_token_ttl_days, 7);
        assert_eq!(settings.auth.refresh_path, "/auth/refresh");
    }
}
