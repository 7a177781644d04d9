//! Check-in flow reducer.
//!
//! Drives the kiosk loop: acquire the scan source, debounce and validate
//! codes, wait for the operator, call the backend, show the outcome, then
//! resume scanning.

use super::actions::CheckinAction;
use super::environment::CheckinEnvironment;
use super::types::{CheckinPhase, CheckinState};
use crate::credentials::DeviceCredential;
use crate::error::{CaptureError, GatewayError};
use crate::scanner::parse_scan_payload;
use crate::types::{CameraFacing, CheckinOutcome, CheckinReply, PendingCheckin, ScanEvent};
use futures::StreamExt;
use ryfty_core::effect::{Effect, EffectId};
use ryfty_core::reducer::Reducer;
use ryfty_core::{smallvec, SmallVec};
use std::sync::Arc;

/// Scan source feed
pub const SCANNER: EffectId = EffectId::new("scanner");

/// Clears a rejection after its display window
pub const REJECTION_TIMER: EffectId = EffectId::new("rejection-timer");

/// Returns to scanning after an outcome's display window
pub const OUTCOME_TIMER: EffectId = EffectId::new("outcome-timer");

/// Backend check-in call
pub const CHECKIN_REQUEST: EffectId = EffectId::new("checkin-request");

const NOT_AUTHORIZED: &str = "Device not authorized. Please scan the QR code from the provider.";
const AUTHORIZATION_EXPIRED: &str =
    "Device authorization expired. Please re-scan the device QR code.";
const CHECKIN_FAILED: &str = "Failed to process reservation. Please try again.";
const STREAM_ENDED: &str = "Camera stream ended. Please restart scanning.";

type Effects = SmallVec<[Effect<CheckinAction>; 4]>;

/// Reducer for the check-in flow
#[derive(Clone, Debug, Default)]
pub struct CheckinReducer;

impl CheckinReducer {
    /// Creates a new `CheckinReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn valid_credential(env: &CheckinEnvironment) -> Option<DeviceCredential> {
        let now = env.clock.now();
        env.credentials
            .device_credential()
            .filter(|credential| !credential.is_expired(now))
    }

    /// Acquires the scan source facing `facing` and forwards its codes.
    ///
    /// The feed lives inside the stream, so cancelling the effect releases
    /// the device.
    fn scanner_effect(
        env: &CheckinEnvironment,
        facing: CameraFacing,
        epoch: u64,
    ) -> Effect<CheckinAction> {
        let scanner = Arc::clone(&env.scanner);

        let stream = async_stream::stream! {
            let mut feed = match scanner.acquire(facing).await {
                Ok(feed) => feed,
                Err(error) => {
                    yield CheckinAction::ScannerFailed { epoch, facing, error };
                    return;
                },
            };
            yield CheckinAction::ScannerAcquired { epoch, facing };

            while let Some(event) = feed.next().await {
                yield CheckinAction::ScanReceived { epoch, event };
            }
            yield CheckinAction::ScannerEnded { epoch };
        };

        Effect::Stream(Box::pin(stream)).cancellable(SCANNER)
    }

    fn checkin_effect(
        env: &CheckinEnvironment,
        credential: DeviceCredential,
        pending: &PendingCheckin,
        cycle: u64,
    ) -> Effect<CheckinAction> {
        let gateway = Arc::clone(&env.gateway);
        let reservation_id = pending.reservation_id.clone();

        Effect::Future(Box::pin(async move {
            let result = gateway.checkin(credential.token, reservation_id).await;
            Some(CheckinAction::CheckinCompleted { cycle, result })
        }))
        .cancellable(CHECKIN_REQUEST)
    }

    fn release_all() -> Effects {
        smallvec![
            Effect::Cancel(SCANNER),
            Effect::Cancel(REJECTION_TIMER),
            Effect::Cancel(OUTCOME_TIMER),
            Effect::Cancel(CHECKIN_REQUEST),
        ]
    }

    fn outcome_from(result: Result<CheckinReply, GatewayError>) -> CheckinOutcome {
        match result {
            Ok(CheckinReply::Success {
                message,
                number_of_guests,
            }) => CheckinOutcome::success(&message, number_of_guests),
            Ok(CheckinReply::AlreadyCheckedIn) => CheckinOutcome::AlreadyCheckedIn,
            Ok(CheckinReply::NotFound) => CheckinOutcome::NotFound,
            Err(GatewayError::Unauthorized) => CheckinOutcome::Error {
                message: AUTHORIZATION_EXPIRED.to_owned(),
            },
            Err(error) => {
                tracing::warn!(error = %error, "check-in call failed");
                CheckinOutcome::Error {
                    message: CHECKIN_FAILED.to_owned(),
                }
            },
        }
    }

    fn start_scanning(state: &mut CheckinState, env: &CheckinEnvironment) -> Effects {
        if !state.is_idle() {
            tracing::debug!(phase = state.phase.name(), "already scanning");
            return SmallVec::new();
        }

        if Self::valid_credential(env).is_none() {
            tracing::warn!("scanning refused without a valid device credential");
            state.phase = CheckinPhase::Idle {
                error: Some(NOT_AUTHORIZED.to_owned()),
            };
            return SmallVec::new();
        }

        Self::acquire(state, env, CameraFacing::Environment)
    }

    fn acquire(state: &mut CheckinState, env: &CheckinEnvironment, facing: CameraFacing) -> Effects {
        state.scanner_epoch += 1;
        tracing::info!(facing = %facing, epoch = state.scanner_epoch, "acquiring scan source");
        state.phase = CheckinPhase::Acquiring { facing };
        smallvec![Self::scanner_effect(env, facing, state.scanner_epoch)]
    }

    fn on_scanner_failed(
        state: &mut CheckinState,
        env: &CheckinEnvironment,
        facing: CameraFacing,
        error: CaptureError,
    ) -> Effects {
        if !matches!(state.phase, CheckinPhase::Acquiring { .. }) {
            return SmallVec::new();
        }

        if error == CaptureError::Constraint && facing == CameraFacing::Environment {
            tracing::info!("rear camera unavailable; trying the front camera");
            return Self::acquire(state, env, CameraFacing::User);
        }

        metrics::counter!("checkin.scanner.failures", "kind" => error.kind()).increment(1);
        tracing::warn!(facing = %facing, error = %error, "scan source unavailable");
        state.phase = CheckinPhase::Idle {
            error: Some(error.remediation()),
        };
        SmallVec::new()
    }

    fn on_scan(state: &mut CheckinState, env: &CheckinEnvironment, event: ScanEvent) -> Effects {
        if !state.is_scanning() {
            tracing::trace!(phase = state.phase.name(), "scan ignored while paused");
            return SmallVec::new();
        }

        if let Some(last) = state.last_accepted {
            let window = chrono::Duration::from_std(env.timings.scan_debounce)
                .unwrap_or(chrono::Duration::MAX);
            if event.captured_at - last < window {
                tracing::trace!(captured_at = %event.captured_at, "scan debounced");
                return SmallVec::new();
            }
        }
        state.last_accepted = Some(event.captured_at);

        match parse_scan_payload(&event.payload) {
            Ok(reservation_id) => {
                tracing::info!(reservation_id = %reservation_id, "reservation code scanned");
                state.phase = CheckinPhase::PendingConfirm {
                    pending: PendingCheckin {
                        reservation_id,
                        scanned_at: event.captured_at,
                    },
                };
                smallvec![Effect::Cancel(REJECTION_TIMER)]
            },
            Err(rejection) => {
                state.cycle += 1;
                metrics::counter!("checkin.scans.rejected", "reason" => rejection.reason())
                    .increment(1);
                tracing::debug!(reason = rejection.reason(), "scan rejected");
                state.phase = CheckinPhase::Scanning {
                    rejection: Some(rejection),
                };
                smallvec![Effect::Delay {
                    duration: env.timings.rejection_display,
                    action: Box::new(CheckinAction::RejectionExpired { cycle: state.cycle }),
                }
                .cancellable(REJECTION_TIMER)]
            },
        }
    }

    fn confirm(state: &mut CheckinState, env: &CheckinEnvironment) -> Effects {
        let pending = match std::mem::take(&mut state.phase) {
            CheckinPhase::PendingConfirm { pending } => pending,
            other => {
                tracing::warn!(phase = other.name(), "confirm rejected");
                state.phase = other;
                return SmallVec::new();
            },
        };

        state.cycle += 1;
        let Some(credential) = Self::valid_credential(env) else {
            tracing::warn!(
                reservation_id = %pending.reservation_id,
                "device credential missing or expired at confirmation"
            );
            return Self::show_outcome(
                state,
                env,
                CheckinOutcome::Error {
                    message: AUTHORIZATION_EXPIRED.to_owned(),
                },
            );
        };

        tracing::info!(reservation_id = %pending.reservation_id, "checking in");
        let effect = Self::checkin_effect(env, credential, &pending, state.cycle);
        state.phase = CheckinPhase::Confirming { pending };
        smallvec![effect]
    }

    fn show_outcome(
        state: &mut CheckinState,
        env: &CheckinEnvironment,
        outcome: CheckinOutcome,
    ) -> Effects {
        state.tally.record(&outcome);
        metrics::counter!("checkin.outcome", "kind" => outcome.kind()).increment(1);

        let duration = match outcome {
            CheckinOutcome::Success { .. } => env.timings.success_display,
            _ => env.timings.duplicate_display,
        };
        state.phase = CheckinPhase::ShowingOutcome { outcome };

        smallvec![Effect::Delay {
            duration,
            action: Box::new(CheckinAction::OutcomeExpired { cycle: state.cycle }),
        }
        .cancellable(OUTCOME_TIMER)]
    }

    fn on_completed(
        state: &mut CheckinState,
        env: &CheckinEnvironment,
        result: Result<CheckinReply, GatewayError>,
    ) -> Effects {
        let pending = match std::mem::take(&mut state.phase) {
            CheckinPhase::Confirming { pending } => pending,
            other => {
                state.phase = other;
                return SmallVec::new();
            },
        };

        let outcome = Self::outcome_from(result);
        tracing::info!(
            reservation_id = %pending.reservation_id,
            outcome = outcome.kind(),
            "check-in finished"
        );
        Self::show_outcome(state, env, outcome)
    }

    fn stop(state: &mut CheckinState) -> Effects {
        if state.is_idle() {
            return SmallVec::new();
        }
        state.scanner_epoch += 1;
        state.cycle += 1;
        tracing::info!(phase = state.phase.name(), "scanning stopped");
        state.phase = CheckinPhase::Idle { error: None };
        Self::release_all()
    }
}

impl Reducer for CheckinReducer {
    type State = CheckinState;
    type Action = CheckinAction;
    type Environment = CheckinEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            CheckinAction::StartScanning => Self::start_scanning(state, env),

            CheckinAction::Confirm => Self::confirm(state, env),

            CheckinAction::Cancel => {
                match std::mem::take(&mut state.phase) {
                    CheckinPhase::PendingConfirm { pending } => {
                        tracing::debug!(reservation_id = %pending.reservation_id, "check-in cancelled");
                        state.phase = CheckinPhase::Scanning { rejection: None };
                    },
                    other => {
                        tracing::warn!(phase = other.name(), "cancel rejected");
                        state.phase = other;
                    },
                }
                SmallVec::new()
            },

            CheckinAction::StopScanning => Self::stop(state),

            // ========== Scanner feedback ==========
            CheckinAction::ScannerAcquired { epoch, .. }
            | CheckinAction::ScannerFailed { epoch, .. }
            | CheckinAction::ScanReceived { epoch, .. }
            | CheckinAction::ScannerEnded { epoch }
                if epoch != state.scanner_epoch =>
            {
                tracing::trace!(epoch, current = state.scanner_epoch, "stale scanner action dropped");
                SmallVec::new()
            },

            CheckinAction::ScannerAcquired { facing, .. } => {
                if matches!(state.phase, CheckinPhase::Acquiring { .. }) {
                    tracing::info!(facing = %facing, "scan source ready");
                    state.phase = CheckinPhase::Scanning { rejection: None };
                }
                SmallVec::new()
            },

            CheckinAction::ScannerFailed { facing, error, .. } => {
                Self::on_scanner_failed(state, env, facing, error)
            },

            CheckinAction::ScanReceived { event, .. } => Self::on_scan(state, env, event),

            CheckinAction::ScannerEnded { .. } => {
                if state.is_idle() {
                    return SmallVec::new();
                }
                tracing::warn!(phase = state.phase.name(), "scan feed ended");
                state.cycle += 1;
                state.phase = CheckinPhase::Idle {
                    error: Some(STREAM_ENDED.to_owned()),
                };
                Self::release_all()
            },

            // ========== Timers and replies ==========
            CheckinAction::RejectionExpired { cycle }
            | CheckinAction::OutcomeExpired { cycle }
            | CheckinAction::CheckinCompleted { cycle, .. }
                if cycle != state.cycle =>
            {
                tracing::trace!(cycle, current = state.cycle, "stale cycle action dropped");
                SmallVec::new()
            },

            CheckinAction::RejectionExpired { .. } => {
                if let CheckinPhase::Scanning { rejection } = &mut state.phase {
                    *rejection = None;
                }
                SmallVec::new()
            },

            CheckinAction::CheckinCompleted { result, .. } => Self::on_completed(state, env, result),

            CheckinAction::OutcomeExpired { .. } => {
                if matches!(state.phase, CheckinPhase::ShowingOutcome { .. }) {
                    state.phase = CheckinPhase::Scanning { rejection: None };
                }
                SmallVec::new()
            },
        }
    }
}
