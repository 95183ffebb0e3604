use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::TimerEvent;
use crate::services::attempt_engine::{AttemptEngine, AttemptPhase, SubmitTrigger, Tick};

/// Spawned countdown for one in-progress attempt. Each period it runs
/// one engine tick and publishes the outcome; when the clock hits zero
/// it triggers the expiry submission and stops. It reads the engine on
/// every tick, never a value captured at spawn time, so it always acts
/// on the current answers and attempt.
///
/// The task also stops when the attempt leaves `InProgress` (manual
/// submission) and is aborted when the handle is dropped, so an
/// abandoned view leaves no dangling periodic callback.
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn spawn(
        engine: Arc<AttemptEngine>,
        period: Duration,
        events: UnboundedSender<TimerEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let total = engine.remaining_seconds();
            let attempt_id = engine.attempt_id().unwrap_or_default();

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval fires immediately; consume that so the first
            // decrement lands one period after spawn
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match engine.tick() {
                    Tick::Running { remaining_seconds } => {
                        let _ = events.send(TimerEvent::tick(
                            attempt_id.clone(),
                            remaining_seconds,
                            total,
                        ));
                    }
                    Tick::Expired => {
                        let _ = events.send(TimerEvent::expired(attempt_id.clone()));
                        if let Err(e) = engine.submit(SubmitTrigger::Expiry).await {
                            tracing::error!(error = %e, "auto-submission on expiry failed");
                        }
                        break;
                    }
                    Tick::Idle => {
                        if engine.phase() != AttemptPhase::InProgress {
                            tracing::debug!("attempt left in-progress, countdown stopping");
                            break;
                        }
                    }
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
