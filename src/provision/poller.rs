//! Readiness polling.
//!
//! [`wait_for_ready`] repeatedly invokes a refresh function until it reports
//! a target label, a failure, an unexpected label, or the deadline passes.
//! The engine knows nothing about resource kinds: everything kind-specific
//! lives in the refresh function.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::debug;

use crate::error::{ProvisionError, Result};

use super::cancel::CancelSignal;

/// Default time allowed for a resource to become ready.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default delay before the second poll.
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<T> {
    /// The fetched object.
    pub object: T,
    /// Its state label.
    pub label: String,
}

impl<T> Observation<T> {
    /// Creates a new observation.
    #[must_use]
    pub fn new(object: T, label: impl Into<String>) -> Self {
        Self {
            object,
            label: label.into(),
        }
    }
}

/// Parameters of a single wait.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Resource ID used in errors.
    pub resource_id: String,
    /// Labels that mean "keep waiting".
    pub pending: HashSet<String>,
    /// Labels that mean "done".
    pub target: HashSet<String>,
    /// Time allowed overall. Zero means [`DEFAULT_TIMEOUT`].
    pub timeout: Duration,
    /// Delay between polls. Zero means [`DEFAULT_POLL_INTERVAL`].
    pub poll_interval: Duration,
    /// Delay before the second poll. Zero means [`DEFAULT_MIN_POLL_INTERVAL`].
    pub min_poll_interval: Duration,
}

impl WaitConfig {
    /// Creates a wait configuration with default timings.
    #[must_use]
    pub fn new<P, T, L>(resource_id: impl Into<String>, pending: P, target: T) -> Self
    where
        P: IntoIterator<Item = L>,
        T: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            resource_id: resource_id.into(),
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            min_poll_interval: Duration::ZERO,
        }
    }

    /// Sets the overall timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the delay between polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the delay before the second poll.
    #[must_use]
    pub const fn with_min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    /// Returns the timeout with defaults applied.
    #[must_use]
    pub const fn effective_timeout(&self) -> Duration {
        or_default(self.timeout, DEFAULT_TIMEOUT)
    }

    /// Returns the poll interval with defaults applied.
    #[must_use]
    pub const fn effective_poll_interval(&self) -> Duration {
        or_default(self.poll_interval, DEFAULT_POLL_INTERVAL)
    }

    /// Returns the minimum poll interval with defaults applied.
    #[must_use]
    pub const fn effective_min_poll_interval(&self) -> Duration {
        or_default(self.min_poll_interval, DEFAULT_MIN_POLL_INTERVAL)
    }
}

const fn or_default(value: Duration, default: Duration) -> Duration {
    if value.is_zero() { default } else { value }
}

/// Successful end of a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome<T> {
    /// The ready object.
    pub object: T,
    /// Number of refreshes performed.
    pub attempts: u32,
    /// Number of sleeps between refreshes.
    pub sleeps: u32,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// Polls `refresh` until it reports a target label.
///
/// The first refresh happens immediately. The first sleep lasts the minimum
/// poll interval and later sleeps the regular poll interval; every sleep is
/// cut short at the deadline. Both refreshes and sleeps race `cancel`.
///
/// # Errors
///
/// - Any error returned by `refresh`, unchanged.
/// - [`ProvisionError::UnexpectedState`] for a label in neither set.
/// - [`ProvisionError::Timeout`] once the deadline passes.
/// - [`ProvisionError::Cancelled`] when `cancel` fires.
pub async fn wait_for_ready<T, F, Fut>(
    config: WaitConfig,
    cancel: &CancelSignal,
    mut refresh: F,
) -> Result<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<T>>>,
{
    let poll_interval = config.effective_poll_interval();
    let min_poll_interval = config.effective_min_poll_interval();
    let started = Instant::now();
    let deadline = started + config.effective_timeout();
    let id = config.resource_id.as_str();

    let mut attempts = 0_u32;
    let mut sleeps = 0_u32;
    let mut last_state: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(id));
        }
        attempts += 1;

        let observation = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled(id)),
            result = timeout_at(deadline, refresh()) => match result {
                Ok(observation) => observation?,
                Err(_) => return Err(timed_out(id, last_state, started)),
            },
        };

        debug!(
            "Poll {attempts} for {id}: {} after {:?}",
            observation.label,
            started.elapsed()
        );

        if config.target.contains(&observation.label) {
            return Ok(WaitOutcome {
                object: observation.object,
                attempts,
                sleeps,
                elapsed: started.elapsed(),
            });
        }

        if !config.pending.contains(&observation.label) {
            return Err(ProvisionError::UnexpectedState {
                id: id.to_string(),
                state: observation.label,
            }
            .into());
        }

        last_state = Some(observation.label);

        if Instant::now() >= deadline {
            return Err(timed_out(id, last_state, started));
        }

        let delay = if sleeps == 0 {
            min_poll_interval
        } else {
            poll_interval
        };
        let wake = (Instant::now() + delay).min(deadline);

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled(id)),
            () = sleep_until(wake) => {}
        }
        sleeps += 1;

        if Instant::now() >= deadline {
            return Err(timed_out(id, last_state, started));
        }
    }
}

fn cancelled(id: &str) -> crate::error::OsacError {
    ProvisionError::Cancelled { id: id.to_string() }.into()
}

fn timed_out(id: &str, last_state: Option<String>, started: Instant) -> crate::error::OsacError {
    ProvisionError::Timeout {
        id: id.to_string(),
        last_state,
        elapsed: started.elapsed(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OsacError;
    use crate::provision::cancel::CancelHandle;
    use std::future::{ready, Ready};

    const PROGRESSING: &str = "PROGRESSING";
    const READY: &str = "READY";
    const UNSPECIFIED: &str = "UNSPECIFIED";

    fn config() -> WaitConfig {
        WaitConfig::new("r-1", [UNSPECIFIED, PROGRESSING], [READY])
    }

    /// Replays `labels`, repeating the last one forever.
    fn scripted<'a>(
        labels: &'static [&'static str],
        calls: &'a mut u32,
    ) -> impl FnMut() -> Ready<Result<Observation<u32>>> + 'a {
        move || {
            let index = usize::try_from(*calls).unwrap().min(labels.len() - 1);
            *calls += 1;
            ready(Ok(Observation::new(*calls, labels[index])))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_two_pending_polls() {
        let mut calls = 0;
        let outcome = wait_for_ready(
            config(),
            &CancelSignal::never(),
            scripted(&[PROGRESSING, PROGRESSING, READY], &mut calls),
        )
        .await
        .unwrap();

        assert_eq!(outcome.object, 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.sleeps, 2);
        assert_eq!(
            outcome.elapsed,
            DEFAULT_MIN_POLL_INTERVAL + DEFAULT_POLL_INTERVAL
        );
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_while_pending() {
        let mut calls = 0;
        let config = config()
            .with_timeout(Duration::from_millis(50))
            .with_poll_interval(Duration::from_millis(20))
            .with_min_poll_interval(Duration::from_millis(10));

        let result = wait_for_ready(
            config,
            &CancelSignal::never(),
            scripted(&[PROGRESSING], &mut calls),
        )
        .await;

        match result {
            Err(OsacError::Provision(ProvisionError::Timeout {
                id,
                last_state,
                elapsed,
            })) => {
                assert_eq!(id, "r-1");
                assert_eq!(last_state.as_deref(), Some(PROGRESSING));
                assert_eq!(elapsed, Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_stops_immediately() {
        let started = Instant::now();
        let mut calls = 0;
        let refresh = || {
            calls += 1;
            ready(Err::<Observation<()>, _>(OsacError::from(
                ProvisionError::ResourceFailed {
                    kind: "cluster",
                    id: "r-1".to_string(),
                    state: "FAILED".to_string(),
                },
            )))
        };

        let result = wait_for_ready(config(), &CancelSignal::never(), refresh).await;

        assert!(matches!(
            result,
            Err(OsacError::Provision(ProvisionError::ResourceFailed { .. }))
        ));
        assert_eq!(calls, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_label() {
        let mut calls = 0;
        let result = wait_for_ready(
            config(),
            &CancelSignal::never(),
            scripted(&["DELETING"], &mut calls),
        )
        .await;

        assert!(matches!(
            result,
            Err(OsacError::Provision(ProvisionError::UnexpectedState { ref state, .. }))
                if state == "DELETING"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep() {
        let handle = CancelHandle::new();
        let signal = handle.signal();
        let mut calls = 0;

        let wait = wait_for_ready(config(), &signal, scripted(&[PROGRESSING], &mut calls));
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(12)).await;
            handle.cancel();
        };
        let (result, ()) = tokio::join!(wait, canceller);

        assert!(matches!(
            result,
            Err(OsacError::Provision(ProvisionError::Cancelled { ref id })) if id == "r-1"
        ));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_poll() {
        let handle = CancelHandle::new();
        handle.cancel();
        let mut calls = 0;

        let result = wait_for_ready(
            config(),
            &handle.signal(),
            scripted(&[READY], &mut calls),
        )
        .await;

        assert!(result.is_err_and(|e| e.is_cancelled()));
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_in_flight_at_deadline() {
        let config = config().with_timeout(Duration::from_secs(1));
        let refresh = || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, OsacError>(Observation::new((), READY))
        };

        let result = wait_for_ready(config, &CancelSignal::never(), refresh).await;

        match result {
            Err(OsacError::Provision(ProvisionError::Timeout {
                last_state,
                elapsed,
                ..
            })) => {
                assert!(last_state.is_none());
                assert_eq!(elapsed, Duration::from_secs(1));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_is_deterministic() {
        let script: &'static [&'static str] = &[UNSPECIFIED, PROGRESSING, PROGRESSING, READY];

        let mut first_calls = 0;
        let first = wait_for_ready(
            config(),
            &CancelSignal::never(),
            scripted(script, &mut first_calls),
        )
        .await
        .unwrap();

        let mut second_calls = 0;
        let second = wait_for_ready(
            config(),
            &CancelSignal::never(),
            scripted(script, &mut second_calls),
        )
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(first_calls, second_calls);
    }

    #[test]
    fn test_zero_values_use_defaults() {
        let config = config();
        assert_eq!(config.effective_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.effective_poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(config.effective_min_poll_interval(), DEFAULT_MIN_POLL_INTERVAL);

        let config = config.with_poll_interval(Duration::from_secs(1));
        assert_eq!(config.effective_poll_interval(), Duration::from_secs(1));
    }
}
