//! Check-in flow state.

use crate::error::ScanRejection;
use crate::types::{CameraFacing, CheckinOutcome, PendingCheckin};
use chrono::{DateTime, Utc};

/// Where the kiosk is
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckinPhase {
    /// No scan source held
    Idle {
        /// Why scanning stopped or could not start
        error: Option<String>,
    },
    /// Scan source being opened
    Acquiring {
        /// Facing being tried
        facing: CameraFacing,
    },
    /// Waiting for a code
    Scanning {
        /// Rejection of the last code, shown for a short window
        rejection: Option<ScanRejection>,
    },
    /// Valid code scanned, waiting for the operator
    PendingConfirm {
        /// What was scanned
        pending: PendingCheckin,
    },
    /// Check-in call in flight
    Confirming {
        /// What is being checked in
        pending: PendingCheckin,
    },
    /// Result on screen until the display window elapses
    ShowingOutcome {
        /// The result
        outcome: CheckinOutcome,
    },
}

impl CheckinPhase {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::Acquiring { .. } => "acquiring",
            Self::Scanning { .. } => "scanning",
            Self::PendingConfirm { .. } => "pending_confirm",
            Self::Confirming { .. } => "confirming",
            Self::ShowingOutcome { .. } => "showing_outcome",
        }
    }
}

impl Default for CheckinPhase {
    fn default() -> Self {
        Self::Idle { error: None }
    }
}

/// Running totals for the session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckinTally {
    /// Successful check-ins
    pub checked_in: u32,
    /// Guests admitted across them
    pub guests: u32,
    /// Reservations already checked in
    pub duplicates: u32,
    /// Unknown reservations
    pub not_found: u32,
    /// Failed confirmations
    pub errors: u32,
}

impl CheckinTally {
    /// Count an outcome
    pub fn record(&mut self, outcome: &CheckinOutcome) {
        match outcome {
            CheckinOutcome::Success { guest_count, .. } => {
                self.checked_in += 1;
                self.guests += guest_count;
            },
            CheckinOutcome::AlreadyCheckedIn => self.duplicates += 1,
            CheckinOutcome::NotFound => self.not_found += 1,
            CheckinOutcome::Error { .. } => self.errors += 1,
        }
    }
}

/// Check-in flow state for one kiosk session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckinState {
    /// Current phase
    pub phase: CheckinPhase,
    /// Capture time of the last scan that passed the debounce
    pub last_accepted: Option<DateTime<Utc>>,
    /// Bumped per scan/confirm cycle; guards timers and check-in replies
    pub cycle: u64,
    /// Bumped whenever the scan source is (re)acquired or released
    pub scanner_epoch: u64,
    /// Session totals
    pub tally: CheckinTally,
}

impl CheckinState {
    /// Fresh state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether codes are being processed
    #[must_use]
    pub const fn is_scanning(&self) -> bool {
        matches!(self.phase, CheckinPhase::Scanning { .. })
    }

    /// Whether no scan source is held
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.phase, CheckinPhase::Idle { .. })
    }

    /// The check-in awaiting confirmation or in flight
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingCheckin> {
        match &self.phase {
            CheckinPhase::PendingConfirm { pending } | CheckinPhase::Confirming { pending } => {
                Some(pending)
            },
            _ => None,
        }
    }

    /// The outcome on screen
    #[must_use]
    pub const fn outcome(&self) -> Option<&CheckinOutcome> {
        match &self.phase {
            CheckinPhase::ShowingOutcome { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// What the operator should see
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match &self.phase {
            CheckinPhase::Idle { error } => error.clone(),
            CheckinPhase::Acquiring { .. } => Some("Starting camera...".to_owned()),
            CheckinPhase::Scanning { rejection } => rejection.map(|r| r.to_string()),
            CheckinPhase::PendingConfirm { pending } => Some(format!(
                "Reservation {} scanned. Confirm check-in?",
                pending.reservation_id
            )),
            CheckinPhase::Confirming { .. } => Some("Checking in...".to_owned()),
            CheckinPhase::ShowingOutcome { outcome } => Some(outcome.message()),
        }
    }
}
