//! Backend connection settings.

use std::env;
use std::time::Duration;

/// Where the backend lives and how long to wait for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, without a trailing slash.
    ///
    /// Default: `http://localhost:8000`
    pub base_url: String,

    /// Per-request timeout for plain calls; the event stream only uses it as
    /// a connect timeout.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Path of the device check-in endpoint.
    ///
    /// Default: `/checkin_devices/checkin`
    pub checkin_path: String,

    /// Path of the device verification endpoint.
    ///
    /// Default: `/checkin_devices/verify`
    pub verify_path: String,
}

impl ClientConfig {
    /// Config pointing at `base_url` with default timeouts and paths
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            ..Self::default()
        }
    }

    /// Load from the process environment.
    ///
    /// Absent or unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());

        Self {
            base_url: text("RYFTY_API_BASE_URL")
                .map_or(defaults.base_url, |url| url.trim_end_matches('/').to_owned()),
            request_timeout: text("RYFTY_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            checkin_path: text("RYFTY_CHECKIN_PATH").unwrap_or(defaults.checkin_path),
            verify_path: text("RYFTY_VERIFY_PATH").unwrap_or(defaults.verify_path),
        }
    }

    /// Absolute URL for `path`
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            request_timeout: Duration::from_secs(30),
            checkin_path: "/checkin_devices/checkin".to_owned(),
            verify_path: "/checkin_devices/verify".to_owned(),
        }
    }
}
