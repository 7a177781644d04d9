//! Check-in flow actions.

use crate::error::{CaptureError, GatewayError};
use crate::types::{CameraFacing, CheckinReply, ScanEvent};

/// Everything the check-in reducer reacts to
///
/// Scanner feedback carries the scanner epoch; timers and check-in replies
/// carry the cycle they belong to. Stale ones are dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckinAction {
    // Commands
    /// Acquire the scan source and start processing codes
    StartScanning,
    /// Check the pending reservation in
    Confirm,
    /// Discard the pending reservation and resume scanning
    Cancel,
    /// Release the scan source
    StopScanning,

    // Scanner feedback
    /// Scan source acquired
    ScannerAcquired {
        /// Scanner epoch
        epoch: u64,
        /// Facing that worked
        facing: CameraFacing,
    },
    /// Scan source could not be acquired
    ScannerFailed {
        /// Scanner epoch
        epoch: u64,
        /// Facing that was tried
        facing: CameraFacing,
        /// Why
        error: CaptureError,
    },
    /// A code was decoded
    ScanReceived {
        /// Scanner epoch
        epoch: u64,
        /// The code
        event: ScanEvent,
    },
    /// The feed ended on its own
    ScannerEnded {
        /// Scanner epoch
        epoch: u64,
    },

    // Timers and replies
    /// Rejection display window elapsed
    RejectionExpired {
        /// Cycle
        cycle: u64,
    },
    /// Check-in call finished
    CheckinCompleted {
        /// Cycle
        cycle: u64,
        /// Backend reply
        result: Result<CheckinReply, GatewayError>,
    },
    /// Outcome display window elapsed
    OutcomeExpired {
        /// Cycle
        cycle: u64,
    },
}
