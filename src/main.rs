//! Demo binary: runs a full session lifecycle against the simulated pink
//! dice. Pair, connect, watch a few rolls, then tear everything down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::info;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use dice_bridge::config::BridgeConfig;
use dice_bridge::core::dice::DiceColor;
use dice_bridge::core::feedback::LogFeedback;
use dice_bridge::core::session::{self, DiceSession, SessionPhase};
use dice_bridge::sim::{SimulatedCentral, SimulatedPicker};

#[tokio::main]
async fn main() -> Result<()> {
    dice_bridge::setup_logging();

    let config_dir = PathBuf::from(".dice-bridge");
    let config = BridgeConfig::load_config(&config_dir).await?;

    let picker = Arc::new(SimulatedPicker::new(DiceColor::Pink));
    let central = Arc::new(SimulatedCentral::new(DiceColor::Pink, Duration::from_secs(2)));
    let (mut session, queue) = DiceSession::new(picker, central, Arc::new(LogFeedback), config);
    session.activate().await;

    let mut states = session.subscribe();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow().clone();
            info!("Session state: {:?}", state);
        }
    });

    let session = Arc::new(Mutex::new(session));
    let cancel = CancellationToken::new();
    let driver = tokio::spawn(session::run(session.clone(), queue, cancel.clone()));

    info!("Presenting the accessory picker...");
    session.lock().await.present_picker().await?;
    sleep(Duration::from_millis(300)).await;

    info!("Connecting to the dice...");
    for _ in 0..20 {
        session.lock().await.connect().await?;
        let phase = session.lock().await.phase();
        if matches!(phase, SessionPhase::Connecting | SessionPhase::Connected) {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    info!("Watching rolls; press Ctrl-C to stop early.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = sleep(Duration::from_secs(10)) => {}
    }

    info!("Removing the dice...");
    session.lock().await.remove_dice().await?;
    sleep(Duration::from_millis(300)).await;

    cancel.cancel();
    driver.await?;
    info!("Demo finished in phase {:?}", session.lock().await.phase());
    Ok(())
}
