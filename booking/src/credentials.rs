//! Access to locally stored identity.
//!
//! Both flows read credentials through [`CredentialProvider`] and never touch
//! storage directly.

use crate::types::{DeviceInfo, UserId};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token authorizing this device to check guests in
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    /// Bearer token (a JWT issued by the backend)
    pub token: String,
    /// What the token is bound to, as returned by verification
    #[serde(default)]
    pub info: Option<DeviceInfo>,
}

impl DeviceCredential {
    /// Credential with no verification details
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            info: None,
        }
    }

    /// Attach verification details
    #[must_use]
    pub fn with_info(mut self, info: DeviceInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Expiry from the token's `exp` claim
    ///
    /// Returns `None` when the token is not a JWT or carries no `exp`.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        #[derive(Deserialize)]
        struct Claims {
            exp: Option<i64>,
        }

        let payload = self.token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;
        DateTime::from_timestamp(claims.exp?, 0)
    }

    /// Whether the token can no longer be used at `now`
    ///
    /// A token whose expiry cannot be read counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|exp| exp <= now)
    }
}

/// Read access to the current user session and device authorization
pub trait CredentialProvider: Send + Sync {
    /// Logged-in user, if any
    fn current_user(&self) -> Option<UserId>;

    /// Bearer token for user-scoped calls
    fn auth_token(&self) -> Option<String>;

    /// Stored device credential, if any
    fn device_credential(&self) -> Option<DeviceCredential>;

    /// Whether a device credential is stored
    fn has_device_credential(&self) -> bool {
        self.device_credential().is_some()
    }
}
