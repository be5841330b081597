// src/main.rs
//
// Narrates an activity end to end on the local machine:
//
//     lessonflow <activity.json> [config.json]
//
// Each step is narrated (recorded audio or speech) and the lesson moves on
// once the narration completes, fails, or times out.

use anyhow::{bail, Context};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use lessonflow::application::{AppState, NarrationConfig};
use lessonflow::domain::ActivityInfo;
use lessonflow::events::{NarrationCommand, NarrationEvent, NarrationNotice};
use lessonflow::integrations::{AudioBackend, SystemBackend};
use lessonflow::repositories::{JsonFilePreferenceRepository, PreferenceRepository};
use lessonflow::services::NarrationSlot;

/// Upper bound on how long a single step may stay silent before moving on
const STEP_TIMEOUT: Duration = Duration::from_secs(120);
/// How long to wait for the speech retry that follows a recorded-audio error
const RETRY_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 1. ARGUMENTS
    let mut args = std::env::args().skip(1);
    let Some(activity_path) = args.next().map(PathBuf::from) else {
        bail!("usage: lessonflow <activity.json> [config.json]");
    };
    let config = match args.next() {
        Some(path) => NarrationConfig::load(&PathBuf::from(&path))
            .with_context(|| format!("loading config {}", path))?,
        None => NarrationConfig::default(),
    };

    // 2. ACTIVITY
    let activity = ActivityInfo::load(&activity_path)
        .with_context(|| format!("loading activity {}", activity_path.display()))?;

    // 3. INFRASTRUCTURE
    let backend: Arc<dyn AudioBackend> = Arc::new(SystemBackend::new(config.clone())?);
    let preferences: Arc<dyn PreferenceRepository> =
        Arc::new(JsonFilePreferenceRepository::default_location()?);

    // 4. APPLICATION STATE
    let state = AppState::new(config, backend, preferences);

    // 5. EVENT WIRING
    let (tx, mut narration) = mpsc::unbounded_channel::<(NarrationEvent, NarrationNotice)>();
    for event in [
        NarrationEvent::Started,
        NarrationEvent::Completed,
        NarrationEvent::Error,
    ] {
        let tx = tx.clone();
        state.event_bus.on(event.as_str(), move |data: &Value| {
            match serde_json::from_value::<NarrationNotice>(data.clone()) {
                Ok(notice) => {
                    let _ = tx.send((event, notice));
                }
                Err(e) => log::warn!("Unreadable {} notice: {}", event, e),
            }
        });
    }

    // 6. SESSION
    let mut session = state.open_session(activity)?;
    session.begin();

    loop {
        if !session.orchestrator().autoplay_enabled() {
            let slot = session.active_slot().unwrap_or(NarrationSlot::Main);
            state.event_bus.dispatch(
                NarrationEvent::Play.as_str(),
                serde_json::to_value(NarrationCommand { slot })?,
            );
        }

        if let Some(slot) = session.active_slot() {
            if let Some(line) = session.orchestrator().current(slot) {
                wait_for_step(&mut narration, slot, &line.step_id).await;
            }
        }

        if !session.complete_current_action() {
            break;
        }
    }

    session.end();
    log::info!(
        "Lesson '{}' finished ({} bus events)",
        session.activity().title,
        state.event_bus.get_event_log().len()
    );
    Ok(())
}

/// Next notice for `step_id` on `slot`; notices left over from earlier steps are skipped
async fn next_for_step(
    narration: &mut mpsc::UnboundedReceiver<(NarrationEvent, NarrationNotice)>,
    slot: NarrationSlot,
    step_id: &str,
) -> Option<NarrationEvent> {
    while let Some((event, notice)) = narration.recv().await {
        if notice.is_for(slot, step_id) {
            return Some(event);
        }
        log::debug!("Ignoring late {} for {:?}", event, notice.step_id);
    }
    None
}

/// Block until the current step's narration is over
async fn wait_for_step(
    narration: &mut mpsc::UnboundedReceiver<(NarrationEvent, NarrationNotice)>,
    slot: NarrationSlot,
    step_id: &str,
) {
    loop {
        let next = next_for_step(narration, slot, step_id);
        match tokio::time::timeout(STEP_TIMEOUT, next).await {
            Ok(Some(NarrationEvent::Completed)) => return,
            Ok(Some(NarrationEvent::Error)) => {
                let retry = next_for_step(narration, slot, step_id);
                match tokio::time::timeout(RETRY_GRACE, retry).await {
                    Ok(Some(NarrationEvent::Started)) => {
                        log::debug!("Retrying step narration with speech")
                    }
                    _ => return,
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(_) => {
                log::warn!("Step narration timed out, moving on");
                return;
            }
        }
    }
}
