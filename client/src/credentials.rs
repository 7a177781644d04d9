//! Credential stores.
//!
//! [`MemoryCredentials`] keeps everything in process; [`FileCredentialStore`]
//! persists to a JSON file so a kiosk stays authorized across restarts.

use chrono::{DateTime, Utc};
use ryfty_booking::credentials::{CredentialProvider, DeviceCredential};
use ryfty_booking::types::UserId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Credential storage failures
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Reading or writing the store failed.
    #[error("credential store I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The store holds something that is not a credential file.
    #[error("credential store is malformed: {0}")]
    Serde(#[from] serde_json::Error),

    /// The credential is already past its expiry.
    #[error("device credential has expired")]
    Expired,
}

/// Everything a session needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Bearer token of the logged-in user
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Logged-in user
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Check-in device authorization
    #[serde(default)]
    pub device: Option<DeviceCredential>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    inner: RwLock<StoredCredentials>,
}

impl MemoryCredentials {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a logged-in user
    #[must_use]
    pub fn with_session(self, user_id: UserId, auth_token: impl Into<String>) -> Self {
        self.set_session(user_id, auth_token);
        self
    }

    /// Log a user in
    pub fn set_session(&self, user_id: UserId, auth_token: impl Into<String>) {
        let mut inner = write(&self.inner);
        inner.user_id = Some(user_id);
        inner.auth_token = Some(auth_token.into());
    }

    /// Log the user out
    pub fn clear_session(&self) {
        let mut inner = write(&self.inner);
        inner.user_id = None;
        inner.auth_token = None;
    }

    /// Store a device credential
    pub fn set_device(&self, credential: Option<DeviceCredential>) {
        write(&self.inner).device = credential;
    }
}

impl CredentialProvider for MemoryCredentials {
    fn current_user(&self) -> Option<UserId> {
        read(&self.inner).user_id.clone()
    }

    fn auth_token(&self) -> Option<String> {
        read(&self.inner).auth_token.clone()
    }

    fn device_credential(&self) -> Option<DeviceCredential> {
        read(&self.inner).device.clone()
    }
}

/// JSON-file credential store
///
/// Reads once on open and writes through on every change.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    inner: RwLock<StoredCredentials>,
}

impl FileCredentialStore {
    /// Open the store at `path`; a missing file is an empty store
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Io`] if the file exists but cannot be read
    /// and [`CredentialError::Serde`] if it is not a credential file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let stored = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoredCredentials::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            path = %path.display(),
            has_device = stored.device.is_some(),
            "credential store opened"
        );
        Ok(Self {
            path,
            inner: RwLock::new(stored),
        })
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a device credential, refusing one that has already expired at `now`
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Expired`] for an expired credential, or the
    /// I/O error from writing the file.
    pub fn save_device(
        &self,
        credential: DeviceCredential,
        now: DateTime<Utc>,
    ) -> Result<(), CredentialError> {
        if credential.is_expired(now) {
            return Err(CredentialError::Expired);
        }
        self.update(|stored| stored.device = Some(credential))
    }

    /// Forget the device credential
    ///
    /// # Errors
    ///
    /// Returns the I/O error from writing the file.
    pub fn remove_device(&self) -> Result<(), CredentialError> {
        self.update(|stored| stored.device = None)
    }

    /// Store the user session
    ///
    /// # Errors
    ///
    /// Returns the I/O error from writing the file.
    pub fn set_session(
        &self,
        user_id: UserId,
        auth_token: impl Into<String>,
    ) -> Result<(), CredentialError> {
        let auth_token = auth_token.into();
        self.update(|stored| {
            stored.user_id = Some(user_id);
            stored.auth_token = Some(auth_token);
        })
    }

    /// Forget the user session
    ///
    /// # Errors
    ///
    /// Returns the I/O error from writing the file.
    pub fn clear_session(&self) -> Result<(), CredentialError> {
        self.update(|stored| {
            stored.user_id = None;
            stored.auth_token = None;
        })
    }

    fn update(&self, change: impl FnOnce(&mut StoredCredentials)) -> Result<(), CredentialError> {
        let mut stored = write(&self.inner);
        let mut next = stored.clone();
        change(&mut next);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&next)?)?;

        *stored = next;
        Ok(())
    }
}

impl CredentialProvider for FileCredentialStore {
    fn current_user(&self) -> Option<UserId> {
        read(&self.inner).user_id.clone()
    }

    fn auth_token(&self) -> Option<String> {
        read(&self.inner).auth_token.clone()
    }

    fn device_credential(&self) -> Option<DeviceCredential> {
        read(&self.inner).device.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ryfty_booking::mocks::device_token;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap()
    }

    #[test]
    fn device_credential_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk").join("credentials.json");

        let store = FileCredentialStore::open(&path).unwrap();
        assert!(!store.has_device_credential());

        let credential = DeviceCredential::new(device_token(now() + Duration::hours(8)));
        store.save_device(credential.clone(), now()).unwrap();

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.device_credential(), Some(credential));

        reopened.remove_device().unwrap();
        assert!(!FileCredentialStore::open(&path).unwrap().has_device_credential());
    }

    #[test]
    fn expired_credential_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::open(dir.path().join("credentials.json")).unwrap();

        let expired = DeviceCredential::new(device_token(now() - Duration::minutes(1)));
        assert!(matches!(
            store.save_device(expired, now()),
            Err(CredentialError::Expired)
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, b"not json").unwrap();

        assert!(matches!(
            FileCredentialStore::open(&path),
            Err(CredentialError::Serde(_))
        ));
    }

    #[test]
    fn memory_session_round_trip() {
        let store = MemoryCredentials::new().with_session(UserId::new("user-1"), "token-1");
        assert_eq!(store.current_user(), Some(UserId::new("user-1")));
        assert_eq!(store.auth_token().as_deref(), Some("token-1"));

        store.clear_session();
        assert_eq!(store.current_user(), None);
    }
}
