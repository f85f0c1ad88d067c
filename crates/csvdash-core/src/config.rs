//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::gateway::DEFAULT_API_URL;
use crate::upload::ResolutionPolicy;

pub const ENV_API_URL: &str = "CSVDASH_API_URL";
pub const ENV_SESSION_FILE: &str = "CSVDASH_SESSION_FILE";
pub const ENV_TIMEOUT_SECS: &str = "CSVDASH_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Backend root URL (default: http://localhost:8000)
    pub api_url: String,
    /// Per-request timeout; `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
    /// Where the token and theme are persisted.
    pub session_path: PathBuf,
    /// How uploads wait for the backend to finish converting.
    pub resolution: ResolutionPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: None,
            session_path: default_session_path(),
            resolution: ResolutionPolicy::default(),
        }
    }
}

impl DashboardConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `CSVDASH_API_URL`, `CSVDASH_SESSION_FILE` and
    /// `CSVDASH_TIMEOUT_SECS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = env_var(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(path) = env_var(ENV_SESSION_FILE) {
            config.session_path = PathBuf::from(path);
        }
        if let Some(secs) = env_var(ENV_TIMEOUT_SECS).and_then(|s| s.parse::<u64>().ok()) {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        config
    }

    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_resolution(mut self, policy: ResolutionPolicy) -> Self {
        self.resolution = policy;
        self
    }
}

/// `<config dir>/csvdash/session.yaml`, or `.csvdash/session.yaml` when the
/// platform has no config directory.
pub fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("csvdash"))
        .unwrap_or_else(|| PathBuf::from(".csvdash"))
        .join("session.yaml")
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.request_timeout, None);
        assert!(config.session_path.ends_with("session.yaml"));
        assert_eq!(config.resolution, ResolutionPolicy::default());
    }

    #[test]
    fn test_builders() {
        let config = DashboardConfig::new("http://backend:9000")
            .with_session_path("/tmp/s.yaml")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.api_url, "http://backend:9000");
        assert_eq!(config.session_path, PathBuf::from("/tmp/s.yaml"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
    }
}
