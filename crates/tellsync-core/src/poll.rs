// ── Poll loop ──
//
// Each remote listing is polled by its own task. Polls are strictly
// sequential: the next request is scheduled only after the previous
// one finished, so a slow remote stretches the cycle instead of
// stacking requests. A transient failure earns one immediate retry;
// any other failure waits for the next cycle.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;

pub(crate) async fn run_poll_loop<F, Fut>(
    name: &'static str,
    min_interval: Duration,
    cancel: CancellationToken,
    mut op: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), CoreError>>,
{
    debug!(task = name, ?min_interval, "poll loop started");
    loop {
        let started = Instant::now();
        match op().await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                debug!(task = name, error = %e, "transient poll failure, retrying");
                if cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = op().await {
                    warn!(task = name, error = %e, "poll retry failed");
                }
            }
            Err(e) => warn!(task = name, error = %e, "poll failed"),
        }

        // The interval is measured from the start of the request, with
        // a floor of 1ms so an overrunning poll still yields.
        let delay = min_interval
            .checked_sub(started.elapsed())
            .unwrap_or_default()
            .max(Duration::from_millis(1));

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }
    debug!(task = name, "poll loop stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn polls_are_spaced_by_the_interval() {
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let task = {
            let stamps = Arc::clone(&stamps);
            let cancel = cancel.clone();
            tokio::spawn(run_poll_loop(
                "devices",
                Duration::from_secs(1),
                cancel,
                move || {
                    let stamps = Arc::clone(&stamps);
                    async move {
                        stamps.lock().unwrap().push(Instant::now());
                        Ok(())
                    }
                },
            ))
        };

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        cancel.cancel();
        task.await.unwrap();

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 4);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_retries_once_without_waiting() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let task = {
            let calls = Arc::clone(&calls);
            let cancel = cancel.clone();
            tokio::spawn(run_poll_loop(
                "sensors",
                Duration::from_secs(60),
                cancel,
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(CoreError::Connection {
                                reason: "connect timed out".into(),
                            })
                        } else {
                            Ok(())
                        }
                    }
                },
            ))
        };

        // Well inside the first interval both the poll and its retry
        // have run.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_waits_for_the_next_cycle() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let task = {
            let calls = Arc::clone(&calls);
            let cancel = cancel.clone();
            tokio::spawn(run_poll_loop(
                "devices",
                Duration::from_secs(10),
                cancel,
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(CoreError::Remote {
                            message: "401 unauthorized".into(),
                            status: Some(401),
                        })
                    }
                },
            ))
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }
}
