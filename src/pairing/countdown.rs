use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{PairingSession, PairingSessionTimer};

/// Drives a [`PairingSessionTimer`] once per second on a single task and
/// publishes each snapshot on a watch channel.
///
/// The task ends on expiry or when [`cancel`](Self::cancel) is called.
#[derive(Debug)]
pub struct PairingCountdown {
    updates: watch::Receiver<PairingSession>,
    cancel: CancellationToken,
    handle: JoinHandle<PairingSessionTimer>,
}

impl PairingCountdown {
    pub fn spawn(timer: PairingSessionTimer) -> Self {
        let (tx, updates) = watch::channel(timer.session());
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut timer = timer;
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            interval.tick().await;
            while !timer.is_expired() {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        timer.tick();
                        if tx.send(timer.session()).is_err() {
                            break;
                        }
                    }
                }
            }
            timer
        });
        Self {
            updates,
            cancel,
            handle,
        }
    }

    /// Receiver of per-second snapshots.
    pub fn subscribe(&self) -> watch::Receiver<PairingSession> {
        self.updates.clone()
    }

    /// Latest published snapshot.
    pub fn current(&self) -> PairingSession {
        self.updates.borrow().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the countdown to stop and get the timer back, e.g. to
    /// restart it.
    pub async fn join(self) -> Option<PairingSessionTimer> {
        self.handle.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_to_expiry() {
        let countdown = PairingCountdown::spawn(PairingSessionTimer::with_window(
            "loc-1",
            Duration::from_secs(3),
        ));
        let mut updates = countdown.subscribe();
        assert_eq!(updates.borrow().remaining_seconds, 3);

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().remaining_seconds, 2);

        let timer = countdown.join().await.unwrap();
        assert!(timer.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_before_expiry() {
        let countdown = PairingCountdown::spawn(PairingSessionTimer::start("loc-1"));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        countdown.cancel();

        let mut timer = countdown.join().await.unwrap();
        assert!(!timer.is_expired());
        assert_eq!(timer.remaining_seconds(), 58);
        timer.restart();
        assert_eq!(timer.remaining_seconds(), 60);
    }
}
