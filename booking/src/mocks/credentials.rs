//! Mock credential provider for testing.

use super::lock;
use crate::credentials::{CredentialProvider, DeviceCredential};
use crate::types::UserId;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Build an unsigned JWT-shaped device token expiring at `expires_at`.
#[must_use]
pub fn device_token(expires_at: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"sub":"device-test","exp":{}}}"#,
        expires_at.timestamp()
    ));
    format!("{header}.{claims}.test-signature")
}

/// Mock credential provider.
///
/// Starts empty; use the builders or setters to log a user in or store a
/// device credential.
#[derive(Debug, Default)]
pub struct MockCredentials {
    user: Mutex<Option<UserId>>,
    token: Mutex<Option<String>>,
    device: Mutex<Option<DeviceCredential>>,
}

impl MockCredentials {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a user in.
    #[must_use]
    pub fn with_user(self, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        self.set_user(Some(UserId::new(user_id.clone())));
        *lock(&self.token) = Some(format!("token-{user_id}"));
        self
    }

    /// Store a device credential.
    #[must_use]
    pub fn with_device(self, credential: DeviceCredential) -> Self {
        self.set_device(Some(credential));
        self
    }

    /// Replace the logged-in user.
    pub fn set_user(&self, user_id: Option<UserId>) {
        *lock(&self.user) = user_id;
    }

    /// Replace the device credential.
    pub fn set_device(&self, credential: Option<DeviceCredential>) {
        *lock(&self.device) = credential;
    }
}

impl CredentialProvider for MockCredentials {
    fn current_user(&self) -> Option<UserId> {
        lock(&self.user).clone()
    }

    fn auth_token(&self) -> Option<String> {
        lock(&self.token).clone()
    }

    fn device_credential(&self) -> Option<DeviceCredential> {
        lock(&self.device).clone()
    }
}
