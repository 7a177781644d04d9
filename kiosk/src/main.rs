//! Ryfty check-in kiosk.
//!
//! Reads codes from a keyboard-wedge scanner (or typed by hand) and drives the
//! check-in flow against the backend. Type `y` to confirm a scanned
//! reservation, `n` to skip it, `stop`/`start` to pause scanning, `q` to quit.

mod config;
mod input;

use anyhow::Context;
use chrono::Utc;
use config::KioskConfig;
use input::{KioskInput, LineScanner};
use ryfty_booking::checkin::{CheckinAction, CheckinEnvironment, CheckinReducer, CheckinState};
use ryfty_booking::credentials::DeviceCredential;
use ryfty_booking::gateway::ReservationGateway;
use ryfty_client::{FileCredentialStore, HttpGateway};
use ryfty_core::environment::SystemClock;
use ryfty_runtime::Store;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type KioskStore = Store<CheckinState, CheckinAction, CheckinEnvironment, CheckinReducer>;

/// Prints the operator-facing message whenever it changes
#[derive(Default)]
struct Screen {
    shown: Option<String>,
}

impl Screen {
    async fn render(&mut self, store: &KioskStore) {
        let (message, tally) = store.state(|s| (s.message(), s.tally)).await;
        if message == self.shown {
            return;
        }
        if let Some(text) = &message {
            println!(
                "{text}    [checked in {} | guests {} | repeats {}]",
                tally.checked_in, tally.guests, tally.duplicates
            );
        }
        self.shown = message;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ryfty_kiosk=info,ryfty_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = KioskConfig::from_env();
    info!(
        base_url = %config.client.base_url,
        credentials = %config.credentials_path.display(),
        "Starting check-in kiosk"
    );

    let credentials = Arc::new(
        FileCredentialStore::open(&config.credentials_path)
            .context("opening the credential store")?,
    );
    let gateway = Arc::new(
        HttpGateway::new(config.client.clone(), credentials.clone())
            .context("building the HTTP client")?,
    );

    if let Some(token) = config.device_token.clone() {
        let info = gateway
            .verify_device(token.clone())
            .await
            .context("verifying the device token")?;
        info!(
            device_name = ?info.device_name,
            experience_id = ?info.experience_id,
            slot_id = ?info.slot_id,
            "device verified"
        );
        credentials
            .save_device(DeviceCredential::new(token).with_info(info), Utc::now())
            .context("storing the device credential")?;
    }

    let scanner = Arc::new(LineScanner::new());
    let env = CheckinEnvironment::new(
        scanner.clone(),
        gateway,
        credentials,
        Arc::new(SystemClock),
    )
    .with_timings(config.timings);
    let store = Store::with_broadcast_capacity(CheckinState::new(), CheckinReducer::new(), env, 64);

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C; use `q` to quit");
            std::future::pending::<()>().await;
        }
    };
    run(&store, &scanner, BufReader::new(tokio::io::stdin()), interrupted).await?;

    store.send(CheckinAction::StopScanning).await.ok();
    if let Err(e) = store.shutdown(Duration::from_secs(5)).await {
        warn!(error = %e, "effects still running at exit");
    }
    info!("Kiosk stopped");
    Ok(())
}

/// Drive the flow from `input` until it ends, the operator quits or `shutdown` resolves
async fn run<I, S>(
    store: &KioskStore,
    scanner: &LineScanner,
    input: I,
    shutdown: S,
) -> anyhow::Result<()>
where
    I: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);
    let mut actions = store.subscribe_actions();
    let mut screen = Screen::default();

    store.send(CheckinAction::StartScanning).await?;
    screen.render(store).await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading input")? else {
                    break;
                };
                match KioskInput::parse(&line) {
                    KioskInput::Command(action) => {
                        store.send(action).await?;
                    },
                    KioskInput::Scan(payload) => {
                        if !scanner.push(&payload) {
                            println!("Not scanning. Type `start` to resume.");
                        }
                    },
                    KioskInput::Quit => break,
                    KioskInput::Empty => {},
                }
            },
            received = actions.recv() => {
                if matches!(received, Err(RecvError::Closed)) {
                    break;
                }
            },
            () = &mut shutdown => break,
        }
        screen.render(store).await;
    }
    Ok(())
}
