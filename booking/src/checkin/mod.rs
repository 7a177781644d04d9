//! Check-in flow: kiosk scanning loop with operator confirmation.
//!
//! ```text
//! Idle ──StartScanning──▶ Acquiring ──▶ Scanning ──valid code──▶ PendingConfirm
//!  ▲                                      ▲   ▲                   │        │
//!  │                                      │   └────── Cancel ─────┘     Confirm
//!  │                                      │                              ▼
//!  └── StopScanning / feed ended     ShowingOutcome ◀──── reply ──── Confirming
//! ```
//!
//! Codes arriving outside `Scanning` are dropped; the scan source stays
//! acquired until `StopScanning`.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod types;

pub use actions::CheckinAction;
pub use environment::CheckinEnvironment;
pub use reducer::{CheckinReducer, CHECKIN_REQUEST, OUTCOME_TIMER, REJECTION_TIMER, SCANNER};
pub use types::{CheckinPhase, CheckinState, CheckinTally};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests;
