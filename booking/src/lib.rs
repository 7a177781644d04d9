//! # Ryfty Booking
//!
//! Client-side state machines for the ryfty experience marketplace:
//!
//! - **Reservation flow**: a three-step booking wizard that submits a
//!   reservation and then follows the M-Pesa payment through a push
//!   notification channel until it succeeds, fails, times out or the channel
//!   drops.
//! - **Check-in flow**: the provider's kiosk loop that scans reservation QR
//!   codes, waits for the operator to confirm, and checks the guest in.
//!
//! Both flows are plain reducers. Every side effect (HTTP, push channel, camera,
//! timers) is described as an [`Effect`](ryfty_core::effect::Effect) and runs
//! through the interfaces in [`gateway`], [`notification`], [`scanner`] and
//! [`credentials`], so the flows are tested at memory speed against the
//! doubles in `mocks`.
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! ## Example: submitting a reservation
//!
//! ```rust,ignore
//! use ryfty_booking::reservation::*;
//! use ryfty_runtime::Store;
//!
//! let store = Store::new(ReservationState::new(), ReservationReducer::new(), env);
//! store.send(ReservationAction::SelectSlot { slot }).await?;
//! store.send(ReservationAction::SetPartySize { count: 2 }).await?;
//! // ... contact, Advance, Advance, payment account ...
//! store.send(ReservationAction::Submit).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod checkin;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod reservation;
pub mod scanner;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::FlowTimings;
pub use credentials::{CredentialProvider, DeviceCredential};
pub use error::{CaptureError, ChannelError, GatewayError, ScanRejection, ValidationError};
pub use gateway::ReservationGateway;
pub use notification::{NotificationChannel, PaymentSubscription};
pub use scanner::{parse_scan_payload, ScanSource, RESERVATION_PREFIX};
