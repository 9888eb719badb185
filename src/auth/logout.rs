use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::AuthError;

/// Why the session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out.
    Requested,
    /// Refreshing the credentials failed; the session cannot continue.
    RefreshFailed(AuthError),
}

/// Receiver of the deferred "go back to login" action.
///
/// Implemented by whatever front-end hosts the client; it typically clears
/// view state and navigates to the login entry point.
pub trait LogoutHandler: Send + Sync {
    fn on_logout(&self, reason: &LogoutReason);
}

/// Handler that only records the logout in the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogoutHandler;

impl LogoutHandler for TracingLogoutHandler {
    fn on_logout(&self, reason: &LogoutReason) {
        tracing::info!(?reason, "session ended, redirecting to login");
    }
}

/// Fires the logout handler at most once per signed-in session.
///
/// The handler runs on a spawned task after `delay` so that any feedback
/// already on screen gets a chance to render before the redirect.
pub struct LogoutTrigger {
    handler: Arc<dyn LogoutHandler>,
    delay: Duration,
    fired: AtomicBool,
}

impl std::fmt::Debug for LogoutTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoutTrigger")
            .field("delay", &self.delay)
            .field("fired", &self.fired.load(Ordering::SeqCst))
            .finish()
    }
}

impl LogoutTrigger {
    pub fn new(handler: Arc<dyn LogoutHandler>, delay: Duration) -> Self {
        Self {
            handler,
            delay,
            fired: AtomicBool::new(false),
        }
    }

    /// Schedule the logout action. Returns `false` when one is already scheduled.
    pub fn schedule(&self, reason: LogoutReason) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(?reason, "logout already scheduled");
            return false;
        }
        tracing::warn!(?reason, delay_ms = self.delay.as_millis() as u64, "scheduling logout");
        let handler = self.handler.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handler.on_logout(&reason);
        });
        true
    }

    /// Allow the next terminal failure to schedule a logout again.
    pub fn rearm(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }

    pub fn is_scheduled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl LogoutHandler for Counter {
        fn on_logout(&self, _reason: &LogoutReason) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_fires_once_after_delay() {
        let counter = Arc::new(Counter::default());
        let trigger = LogoutTrigger::new(counter.clone(), Duration::from_millis(500));

        assert!(trigger.schedule(LogoutReason::Requested));
        assert!(!trigger.schedule(LogoutReason::Requested));
        tokio::task::yield_now().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_allows_a_new_logout() {
        let counter = Arc::new(Counter::default());
        let trigger = LogoutTrigger::new(counter.clone(), Duration::ZERO);

        trigger.schedule(LogoutReason::Requested);
        trigger.rearm();
        assert!(!trigger.is_scheduled());
        trigger.schedule(LogoutReason::Requested);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
