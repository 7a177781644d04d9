//! # Ryfty Client
//!
//! Production adapters for the interfaces the booking flows depend on:
//!
//! - [`HttpGateway`]: reservations, check-ins and device verification over
//!   the backend's REST API
//! - [`SseNotificationChannel`]: payment status updates over server-sent
//!   events
//! - [`MemoryCredentials`] and [`FileCredentialStore`]: user session and
//!   device authorization storage
//!
//! ## Example
//!
//! ```rust,ignore
//! use ryfty_client::{ClientConfig, FileCredentialStore, HttpGateway, SseNotificationChannel};
//!
//! let config = ClientConfig::from_env();
//! let credentials = Arc::new(FileCredentialStore::open(".ryfty/credentials.json")?);
//! let gateway = Arc::new(HttpGateway::new(config.clone(), credentials.clone())?);
//! let channel = Arc::new(SseNotificationChannel::new(config)?);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod credentials;
pub mod http;
pub mod sse;

pub use config::ClientConfig;
pub use credentials::{CredentialError, FileCredentialStore, MemoryCredentials, StoredCredentials};
pub use http::HttpGateway;
pub use sse::{SseDecoder, SseFrame, SseNotificationChannel};
