use super::*;
use crate::credentials::DeviceCredential;
use crate::error::{CaptureError, GatewayError, ScanRejection};
use crate::mocks::{device_token, MockCredentials, MockGateway, MockScanSource};
use crate::types::{CameraFacing, CheckinOutcome, CheckinReply, PendingCheckin, ReservationId, ScanEvent};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use ryfty_core::reducer::Reducer;
use ryfty_testing::{assertions, test_clock, test_epoch, ReducerTest};
use std::sync::Arc;
use std::time::Duration;

fn valid_device() -> DeviceCredential {
    DeviceCredential::new(device_token(test_epoch() + ChronoDuration::hours(1)))
}

fn env_with(credentials: MockCredentials) -> CheckinEnvironment {
    CheckinEnvironment::new(
        Arc::new(MockScanSource::new()),
        Arc::new(MockGateway::new()),
        Arc::new(credentials),
        Arc::new(test_clock()),
    )
}

fn env() -> CheckinEnvironment {
    env_with(MockCredentials::new().with_device(valid_device()))
}

fn at(seconds: i64) -> DateTime<Utc> {
    test_epoch() + ChronoDuration::seconds(seconds)
}

fn scan(payload: &str, captured_at: DateTime<Utc>) -> CheckinAction {
    CheckinAction::ScanReceived {
        epoch: 1,
        event: ScanEvent::new(payload, captured_at),
    }
}

fn scanning() -> CheckinState {
    CheckinState {
        phase: CheckinPhase::Scanning { rejection: None },
        scanner_epoch: 1,
        ..CheckinState::default()
    }
}

fn pending() -> PendingCheckin {
    PendingCheckin {
        reservation_id: ReservationId::new("abc123"),
        scanned_at: at(0),
    }
}

fn with_phase(phase: CheckinPhase) -> CheckinState {
    CheckinState {
        phase,
        scanner_epoch: 1,
        cycle: 1,
        last_accepted: Some(at(0)),
        ..CheckinState::default()
    }
}

fn completed(result: Result<CheckinReply, GatewayError>) -> CheckinAction {
    CheckinAction::CheckinCompleted { cycle: 1, result }
}

// ========== Scanner lifecycle ==========

#[test]
fn start_requires_a_device_credential() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env_with(MockCredentials::new()))
        .given_state(CheckinState::new())
        .when_action(CheckinAction::StartScanning)
        .then_state(|state| {
            assert!(state.is_idle());
            assert_eq!(
                state.message().as_deref(),
                Some("Device not authorized. Please scan the QR code from the provider.")
            );
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn start_refuses_an_expired_credential() {
    let expired = DeviceCredential::new(device_token(test_epoch() - ChronoDuration::minutes(1)));

    ReducerTest::new(CheckinReducer::new())
        .with_env(env_with(MockCredentials::new().with_device(expired)))
        .given_state(CheckinState::new())
        .when_action(CheckinAction::StartScanning)
        .then_state(|state| assert!(state.is_idle()))
        .then_effects(assertions::assert_no_io)
        .run();
}

#[test]
fn start_acquires_the_rear_camera() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(CheckinState::new())
        .when_action(CheckinAction::StartScanning)
        .then_state(|state| {
            assert_eq!(
                state.phase,
                CheckinPhase::Acquiring {
                    facing: CameraFacing::Environment
                }
            );
            assert_eq!(state.scanner_epoch, 1);
        })
        .then_effects(|effects| {
            assertions::assert_starts(effects, SCANNER);
            assertions::assert_has_stream_effect(effects);
        })
        .run();
}

#[test]
fn start_while_scanning_is_a_no_op() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(scanning())
        .when_action(CheckinAction::StartScanning)
        .then_state(|state| {
            assert!(state.is_scanning());
            assert_eq!(state.scanner_epoch, 1);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn acquired_scanner_starts_scanning() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(CheckinState::new())
        .when_actions([
            CheckinAction::StartScanning,
            CheckinAction::ScannerAcquired {
                epoch: 1,
                facing: CameraFacing::Environment,
            },
        ])
        .then_state(|state| assert!(state.is_scanning()))
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn constraint_failure_falls_back_to_the_front_camera() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(CheckinState::new())
        .when_actions([
            CheckinAction::StartScanning,
            CheckinAction::ScannerFailed {
                epoch: 1,
                facing: CameraFacing::Environment,
                error: CaptureError::Constraint,
            },
        ])
        .then_state(|state| {
            assert_eq!(
                state.phase,
                CheckinPhase::Acquiring {
                    facing: CameraFacing::User
                }
            );
            assert_eq!(state.scanner_epoch, 2);
        })
        .then_effects(|effects| assertions::assert_starts(effects, SCANNER))
        .run();
}

#[test]
fn second_constraint_failure_gives_up() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(CheckinState::new())
        .when_actions([
            CheckinAction::StartScanning,
            CheckinAction::ScannerFailed {
                epoch: 1,
                facing: CameraFacing::Environment,
                error: CaptureError::Constraint,
            },
            CheckinAction::ScannerFailed {
                epoch: 2,
                facing: CameraFacing::User,
                error: CaptureError::Constraint,
            },
        ])
        .then_state(|state| {
            assert!(state.is_idle());
            assert_eq!(
                state.message().as_deref(),
                Some("Unable to access any camera. Please check your settings and try again.")
            );
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn permission_denied_shows_remediation() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(CheckinState::new())
        .when_actions([
            CheckinAction::StartScanning,
            CheckinAction::ScannerFailed {
                epoch: 1,
                facing: CameraFacing::Environment,
                error: CaptureError::PermissionDenied,
            },
        ])
        .then_state(|state| {
            assert_eq!(
                state.message().as_deref(),
                Some("Camera access denied. Please allow camera access to scan QR codes.")
            );
        })
        .run();
}

#[test]
fn feed_end_returns_to_idle() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(scanning())
        .when_action(CheckinAction::ScannerEnded { epoch: 1 })
        .then_state(|state| {
            assert!(state.is_idle());
            assert_eq!(
                state.message().as_deref(),
                Some("Camera stream ended. Please restart scanning.")
            );
        })
        .then_effects(|effects| assertions::assert_cancels(effects, SCANNER))
        .run();
}

#[test]
fn stale_scanner_actions_are_dropped() {
    let mut state = scanning();
    state.scanner_epoch = 2;

    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(state)
        .when_actions([
            CheckinAction::ScannerEnded { epoch: 1 },
            scan("ryfty_reservation_abc123", at(10)),
        ])
        .then_state(|state| {
            assert!(state.is_scanning());
            assert_eq!(state.last_accepted, None);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

// ========== Scanning ==========

#[test]
fn valid_code_pauses_for_confirmation() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(scanning())
        .when_action(scan("  ryfty_reservation_{abc123} ", at(0)))
        .then_state(|state| {
            assert_eq!(state.pending(), Some(&pending()));
            assert_eq!(state.last_accepted, Some(at(0)));
            assert_eq!(
                state.message().as_deref(),
                Some("Reservation abc123 scanned. Confirm check-in?")
            );
        })
        .then_effects(|effects| assertions::assert_cancels(effects, REJECTION_TIMER))
        .run();
}

#[test]
fn url_code_is_rejected_for_three_seconds() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(scanning())
        .when_action(scan("https://example.com", at(0)))
        .then_state(|state| {
            assert_eq!(
                state.phase,
                CheckinPhase::Scanning {
                    rejection: Some(ScanRejection::LooksLikeUrl)
                }
            );
            assert_eq!(state.cycle, 1);
        })
        .then_effects(|effects| {
            assertions::assert_starts(effects, REJECTION_TIMER);
            assertions::assert_delay(effects, Duration::from_secs(3));
            assertions::assert_no_io(effects);
        })
        .run();
}

#[test]
fn rejection_clears_when_its_timer_fires() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(scanning())
        .when_actions([
            scan("someone@example.com", at(0)),
            CheckinAction::RejectionExpired { cycle: 1 },
        ])
        .then_state(|state| {
            assert_eq!(state.phase, CheckinPhase::Scanning { rejection: None });
        })
        .run();
}

#[test]
fn superseded_rejection_timer_is_ignored() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(scanning())
        .when_actions([
            scan("short", at(0)),
            scan("https://example.com", at(3)),
            CheckinAction::RejectionExpired { cycle: 1 },
        ])
        .then_state(|state| {
            assert_eq!(
                state.phase,
                CheckinPhase::Scanning {
                    rejection: Some(ScanRejection::LooksLikeUrl)
                }
            );
        })
        .run();
}

#[test]
fn scans_inside_the_debounce_window_are_dropped() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(scanning())
        .when_actions([
            scan("not a reservation code", at(0)),
            CheckinAction::RejectionExpired { cycle: 1 },
            scan("ryfty_reservation_abc123", at(1)),
        ])
        .then_state(|state| {
            assert!(state.is_scanning());
            assert_eq!(state.last_accepted, Some(at(0)));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn scans_while_pending_do_not_move_the_debounce_reference() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::PendingConfirm { pending: pending() }))
        .when_action(scan("ryfty_reservation_other", at(30)))
        .then_state(|state| {
            assert_eq!(state.pending(), Some(&pending()));
            assert_eq!(state.last_accepted, Some(at(0)));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn cancel_discards_the_pending_check_in() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::PendingConfirm { pending: pending() }))
        .when_action(CheckinAction::Cancel)
        .then_state(|state| {
            assert_eq!(state.phase, CheckinPhase::Scanning { rejection: None });
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn cancel_outside_pending_is_rejected() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_action(CheckinAction::Cancel)
        .then_state(|state| {
            assert!(matches!(state.phase, CheckinPhase::Confirming { .. }));
        })
        .run();
}

// ========== Confirmation ==========

#[test]
fn confirm_calls_the_backend_once() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::PendingConfirm { pending: pending() }))
        .when_action(CheckinAction::Confirm)
        .then_state(|state| {
            assert_eq!(state.phase, CheckinPhase::Confirming { pending: pending() });
            assert_eq!(state.cycle, 2);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_starts(effects, CHECKIN_REQUEST);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn second_confirm_is_rejected_while_in_flight() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::PendingConfirm { pending: pending() }))
        .when_actions([CheckinAction::Confirm, CheckinAction::Confirm])
        .then_state(|state| assert_eq!(state.cycle, 2))
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn confirm_with_expired_credential_skips_the_network() {
    let expired = DeviceCredential::new(device_token(test_epoch() - ChronoDuration::hours(1)));

    ReducerTest::new(CheckinReducer::new())
        .with_env(env_with(MockCredentials::new().with_device(expired)))
        .given_state(with_phase(CheckinPhase::PendingConfirm { pending: pending() }))
        .when_action(CheckinAction::Confirm)
        .then_state(|state| {
            assert_eq!(
                state.outcome(),
                Some(&CheckinOutcome::Error {
                    message: "Device authorization expired. Please re-scan the device QR code."
                        .into()
                })
            );
            assert_eq!(state.tally.errors, 1);
        })
        .then_effects(|effects| {
            assertions::assert_no_io(effects);
            assertions::assert_untouched(effects, CHECKIN_REQUEST);
            assertions::assert_delay(effects, Duration::from_secs(3));
        })
        .run();
}

#[test]
fn success_shows_welcome_for_five_seconds() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_action(completed(Ok(CheckinReply::Success {
            message: "Jane Doe checked in successfully".into(),
            number_of_guests: Some(3),
        })))
        .then_state(|state| {
            assert_eq!(
                state.outcome(),
                Some(&CheckinOutcome::Success {
                    guest_count: 3,
                    welcome_name: "Welcome, Jane Doe!".into(),
                })
            );
            assert_eq!(state.tally.checked_in, 1);
            assert_eq!(state.tally.guests, 3);
        })
        .then_effects(|effects| {
            assertions::assert_starts(effects, OUTCOME_TIMER);
            assertions::assert_delay(effects, Duration::from_secs(5));
        })
        .run();
}

#[test]
fn already_checked_in_shows_for_three_seconds() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_action(completed(Ok(CheckinReply::AlreadyCheckedIn)))
        .then_state(|state| {
            assert_eq!(
                state.message().as_deref(),
                Some("This customer has already been checked in.")
            );
            assert_eq!(state.tally.duplicates, 1);
        })
        .then_effects(|effects| assertions::assert_delay(effects, Duration::from_secs(3)))
        .run();
}

#[test]
fn not_found_is_reported() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_action(completed(Ok(CheckinReply::NotFound)))
        .then_state(|state| {
            assert_eq!(state.outcome(), Some(&CheckinOutcome::NotFound));
            assert_eq!(state.tally.not_found, 1);
        })
        .run();
}

#[test]
fn unauthorized_reply_means_the_device_expired() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_action(completed(Err(GatewayError::Unauthorized)))
        .then_state(|state| {
            assert_eq!(
                state.message().as_deref(),
                Some("Device authorization expired. Please re-scan the device QR code.")
            );
        })
        .run();
}

#[test]
fn other_failures_get_the_generic_message() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_action(completed(Err(GatewayError::Transport("connection reset".into()))))
        .then_state(|state| {
            assert_eq!(
                state.message().as_deref(),
                Some("Failed to process reservation. Please try again.")
            );
            assert_eq!(state.tally.errors, 1);
        })
        .run();
}

#[test]
fn outcome_expiry_resumes_scanning() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_actions([
            completed(Ok(CheckinReply::NotFound)),
            CheckinAction::OutcomeExpired { cycle: 1 },
        ])
        .then_state(|state| {
            assert_eq!(state.phase, CheckinPhase::Scanning { rejection: None });
            assert_eq!(state.pending(), None);
        })
        .run();
}

#[test]
fn stale_reply_is_dropped() {
    let mut state = with_phase(CheckinPhase::Confirming { pending: pending() });
    state.cycle = 4;

    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(state)
        .when_action(completed(Ok(CheckinReply::NotFound)))
        .then_state(|state| {
            assert!(matches!(state.phase, CheckinPhase::Confirming { .. }));
            assert_eq!(state.tally, CheckinTally::default());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

// ========== Stop ==========

#[test]
fn stop_releases_everything() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_action(CheckinAction::StopScanning)
        .then_state(|state| {
            assert_eq!(state.phase, CheckinPhase::Idle { error: None });
            assert_eq!(state.scanner_epoch, 2);
        })
        .then_effects(|effects| {
            assertions::assert_cancels(effects, SCANNER);
            assertions::assert_cancels(effects, REJECTION_TIMER);
            assertions::assert_cancels(effects, OUTCOME_TIMER);
            assertions::assert_cancels(effects, CHECKIN_REQUEST);
        })
        .run();
}

#[test]
fn stop_when_idle_is_a_no_op() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(CheckinState::new())
        .when_action(CheckinAction::StopScanning)
        .then_state(|state| assert_eq!(state, &CheckinState::new()))
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn reply_after_stop_is_ignored() {
    ReducerTest::new(CheckinReducer::new())
        .with_env(env())
        .given_state(with_phase(CheckinPhase::Confirming { pending: pending() }))
        .when_actions([
            CheckinAction::StopScanning,
            completed(Ok(CheckinReply::AlreadyCheckedIn)),
        ])
        .then_state(|state| {
            assert!(state.is_idle());
            assert_eq!(state.tally.duplicates, 0);
        })
        .run();
}

proptest! {
    #[test]
    fn accepted_scans_are_at_least_the_debounce_window_apart(
        gaps in proptest::collection::vec(0_i64..5_000, 1..30)
    ) {
        let reducer = CheckinReducer::new();
        let env = env();
        let window = ChronoDuration::milliseconds(2_000);
        let mut state = scanning();
        let mut now = at(0);
        let mut accepted = Vec::new();

        for gap in gaps {
            now += ChronoDuration::milliseconds(gap);
            let before = state.last_accepted;
            let _ = reducer.reduce(&mut state, scan("garbage", now), &env);
            if state.last_accepted != before {
                accepted.push(now);
            }
        }

        for pair in accepted.windows(2) {
            prop_assert!(pair[1] - pair[0] >= window);
        }
    }
}
