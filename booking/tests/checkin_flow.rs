//! End-to-end check-in flow through the store runtime.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ryfty_booking::checkin::{
    CheckinAction, CheckinEnvironment, CheckinPhase, CheckinReducer, CheckinState, CHECKIN_REQUEST,
    SCANNER,
};
use ryfty_booking::credentials::DeviceCredential;
use ryfty_booking::error::{CaptureError, ScanRejection};
use ryfty_booking::mocks::{device_token, MockCredentials, MockGateway, MockScanSource};
use ryfty_booking::types::{CameraFacing, CheckinOutcome, CheckinReply, ReservationId};
use ryfty_runtime::Store;
use ryfty_testing::{test_clock, test_epoch};
use std::sync::Arc;
use std::time::Duration;

type CheckinStore = Store<CheckinState, CheckinAction, CheckinEnvironment, CheckinReducer>;

struct Harness {
    store: CheckinStore,
    scanner: Arc<MockScanSource>,
    gateway: Arc<MockGateway>,
    token: String,
}

fn harness() -> Harness {
    let token = device_token(test_epoch() + ChronoDuration::hours(8));
    let scanner = Arc::new(MockScanSource::new());
    let gateway = Arc::new(MockGateway::new());
    let credentials =
        Arc::new(MockCredentials::new().with_device(DeviceCredential::new(token.clone())));

    let env = CheckinEnvironment::new(
        scanner.clone(),
        gateway.clone(),
        credentials,
        Arc::new(test_clock()),
    );

    Harness {
        store: Store::new(CheckinState::new(), CheckinReducer::new(), env),
        scanner,
        gateway,
        token,
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    test_epoch() + ChronoDuration::seconds(seconds)
}

async fn phase(h: &Harness) -> CheckinPhase {
    h.store.state(|s| s.phase.clone()).await
}

async fn start(h: &Harness) {
    h.store.send(CheckinAction::StartScanning).await.unwrap();
    settle().await;
    assert_eq!(phase(h).await, CheckinPhase::Scanning { rejection: None });
}

#[tokio::test(start_paused = true)]
async fn braced_reservation_code_awaits_confirmation() {
    let h = harness();
    start(&h).await;

    assert!(h.scanner.scan("ryfty_reservation_{abc-123}", at(0)));
    settle().await;

    let pending = h.store.state(|s| s.pending().cloned()).await.unwrap();
    assert_eq!(pending.reservation_id, ReservationId::new("abc-123"));
    assert_eq!(h.gateway.checkin_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn website_code_is_rejected_then_cleared() {
    let h = harness();
    start(&h).await;

    h.scanner.scan("https://example.com", at(0));
    settle().await;

    assert_eq!(
        phase(&h).await,
        CheckinPhase::Scanning {
            rejection: Some(ScanRejection::LooksLikeUrl)
        }
    );
    assert_eq!(
        h.store.state(CheckinState::message).await.as_deref(),
        Some("This appears to be a website QR code. Please scan a reservation QR code.")
    );
    assert!(h.store.state(|s| s.pending().is_none()).await);

    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(phase(&h).await, CheckinPhase::Scanning { rejection: None });
}

#[tokio::test(start_paused = true)]
async fn duplicate_check_in_shows_for_three_seconds_then_resumes() {
    let h = harness();
    h.gateway.push_checkin(Ok(CheckinReply::AlreadyCheckedIn));
    start(&h).await;

    h.scanner.scan("ryfty_reservation_abc123", at(0));
    settle().await;
    h.store.send(CheckinAction::Confirm).await.unwrap();
    settle().await;

    assert_eq!(
        h.gateway.checkins(),
        vec![(h.token.clone(), ReservationId::new("abc123"))]
    );
    assert_eq!(
        phase(&h).await,
        CheckinPhase::ShowingOutcome {
            outcome: CheckinOutcome::AlreadyCheckedIn
        }
    );
    assert!(h.store.state(|s| s.pending().is_none()).await);

    tokio::time::advance(Duration::from_millis(2_900)).await;
    settle().await;
    assert!(matches!(phase(&h).await, CheckinPhase::ShowingOutcome { .. }));

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(phase(&h).await, CheckinPhase::Scanning { rejection: None });
}

#[tokio::test(start_paused = true)]
async fn scanner_stays_acquired_while_an_outcome_is_shown() {
    let h = harness();
    start(&h).await;

    h.scanner.scan("ryfty_reservation_abc123", at(0));
    settle().await;
    h.store.send(CheckinAction::Confirm).await.unwrap();
    settle().await;

    // Ignored while the welcome is on screen.
    h.scanner.scan("ryfty_reservation_other", at(3));
    settle().await;
    assert!(matches!(
        phase(&h).await,
        CheckinPhase::ShowingOutcome {
            outcome: CheckinOutcome::Success { .. }
        }
    ));
    assert_eq!(h.scanner.live_feeds(), 1);

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;

    h.scanner.scan("ryfty_reservation_other", at(10));
    settle().await;
    let pending = h.store.state(|s| s.pending().cloned()).await.unwrap();
    assert_eq!(pending.reservation_id, ReservationId::new("other"));
}

#[tokio::test(start_paused = true)]
async fn repeated_frames_are_debounced() {
    let h = harness();
    start(&h).await;

    h.scanner.scan("ryfty_reservation_abc123", at(0));
    settle().await;
    h.store.send(CheckinAction::Cancel).await.unwrap();

    h.scanner.scan("ryfty_reservation_abc123", at(1));
    settle().await;
    assert!(h.store.state(CheckinState::is_scanning).await);

    h.scanner.scan("ryfty_reservation_abc123", at(2));
    settle().await;
    assert!(h.store.state(|s| s.pending().is_some()).await);
}

#[tokio::test(start_paused = true)]
async fn front_camera_is_used_when_the_rear_one_cannot_be_constrained() {
    let h = harness();
    h.scanner.fail_next(CaptureError::Constraint);
    start(&h).await;

    assert_eq!(
        h.scanner.requested(),
        vec![CameraFacing::Environment, CameraFacing::User]
    );
    assert_eq!(h.scanner.live_feeds(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_releases_the_camera_and_abandons_the_request() {
    let h = harness();
    h.gateway.hold_checkins(true);
    start(&h).await;

    h.scanner.scan("ryfty_reservation_abc123", at(0));
    settle().await;
    h.store.send(CheckinAction::Confirm).await.unwrap();
    settle().await;
    assert_eq!(h.store.in_flight(CHECKIN_REQUEST), 1);

    h.store.send(CheckinAction::StopScanning).await.unwrap();
    settle().await;

    assert_eq!(phase(&h).await, CheckinPhase::Idle { error: None });
    assert_eq!(h.scanner.live_feeds(), 0);
    assert_eq!(h.store.in_flight(SCANNER), 0);
    assert_eq!(h.store.in_flight(CHECKIN_REQUEST), 0);
}

#[tokio::test(start_paused = true)]
async fn unplugged_camera_returns_to_idle() {
    let h = harness();
    start(&h).await;

    h.scanner.end_feed();
    settle().await;

    assert_eq!(
        phase(&h).await,
        CheckinPhase::Idle {
            error: Some("Camera stream ended. Please restart scanning.".into())
        }
    );
}
