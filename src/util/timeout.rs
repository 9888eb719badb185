//! Timeout helper.

use std::future::Future;
use std::time::Duration;

/// Wrap a fallible future with a timeout, mapping expiry to the caller's error.
///
/// `on_timeout` receives the elapsed bound in milliseconds.
pub async fn with_timeout<T, E>(
    duration: Duration,
    future: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce(u64) -> E,
) -> Result<T, E> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_future_maps_to_caller_error() {
        let result: Result<(), String> = with_timeout(
            Duration::from_secs(10),
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            },
            |ms| format!("timed out after {ms}ms"),
        )
        .await;
        assert_eq!(result, Err("timed out after 10000ms".to_string()));
    }

    #[tokio::test]
    async fn completed_future_passes_through() {
        let result: Result<u8, String> =
            with_timeout(Duration::from_secs(1), async { Ok(7) }, |_| String::new()).await;
        assert_eq!(result, Ok(7));
    }
}
