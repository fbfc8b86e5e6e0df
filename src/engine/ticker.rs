// src/engine/ticker.rs

//! Periodic scheduled triggers.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::{RuntimeEvent, TriggerReason};

/// Send `Tick { Scheduled }` every `period`, starting one period from now.
///
/// Ticks missed while the runtime is busy are skipped, not bunched up. The
/// task ends when the runtime's channel closes.
pub fn spawn_ticker(period: Duration, tx: mpsc::Sender<RuntimeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = time::interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticks.tick().await;

        loop {
            ticks.tick().await;
            debug!("scheduled tick");
            let event = RuntimeEvent::Tick {
                reason: TriggerReason::Scheduled,
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticks_are_scheduled_and_not_immediate() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = spawn_ticker(Duration::from_millis(50), tx);

        assert!(rx.try_recv().is_err());

        let event = time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("tick within timeout")
            .expect("channel open");
        assert!(matches!(
            event,
            RuntimeEvent::Tick {
                reason: TriggerReason::Scheduled
            }
        ));

        handle.abort();
    }
}
