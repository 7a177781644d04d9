//! Kiosk configuration.

use ryfty_booking::config::FlowTimings;
use ryfty_client::ClientConfig;
use std::env;
use std::path::PathBuf;

/// Everything the kiosk needs at start-up
#[derive(Debug, Clone)]
pub struct KioskConfig {
    /// Backend connection
    pub client: ClientConfig,
    /// Debounce and display windows
    pub timings: FlowTimings,
    /// Where the device credential is kept
    pub credentials_path: PathBuf,
    /// Device token to verify and store before scanning
    pub device_token: Option<String>,
}

impl KioskConfig {
    /// Load from the process environment (after `.env` has been applied)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());

        Self {
            client: ClientConfig::from_lookup(&lookup),
            timings: FlowTimings::from_lookup(&lookup),
            credentials_path: text("RYFTY_CREDENTIALS_PATH")
                .map_or_else(|| PathBuf::from(".ryfty/credentials.json"), PathBuf::from),
            device_token: text("RYFTY_DEVICE_TOKEN"),
        }
    }
}
