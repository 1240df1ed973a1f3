//! Resilience patterns: backend readiness probing, retry with backoff
//!
//! Both loops run against an injected [`Clock`] so they can be driven in
//! tests without real time passing.

use crate::{RelayError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Time source used by the retry and readiness loops
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Suspend for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on or advanced; records every sleep
#[derive(Debug, Default)]
pub struct ManualClock {
    inner: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += by;
    }

    /// Every duration slept so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sleeps
            .clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).now
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now += duration;
        state.sleeps.push(duration);
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// No new attempt starts once this much time has passed since the first
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_elapsed: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with 0-based index `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, the attempts run out or the time budget is spent
///
/// On exhaustion the last attempt's error is returned unchanged; an expired
/// budget yields [`RelayError::Timeout`].
pub async fn retry_with_backoff<C, F, Fut, T>(clock: &C, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = clock.now();
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        let elapsed = clock.now().saturating_sub(start);
        if elapsed > policy.max_elapsed {
            error!("Retry budget of {:?} exhausted", policy.max_elapsed);
            return Err(RelayError::timeout(format!(
                "Retry timeout after {}ms",
                policy.max_elapsed.as_millis()
            )));
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt + 1 < policy.max_attempts {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Attempt {} failed: {}. Retrying in {}ms",
                        attempt + 1,
                        e,
                        delay.as_millis()
                    );
                    clock.sleep(delay).await;
                } else {
                    error!("All {} attempts failed: {}", policy.max_attempts, e);
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| RelayError::other("Retry policy allows no attempts")))
}

/// Backend availability as seen by the chat client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Probing in progress
    Checking,
    /// A probe succeeded
    Ready,
    /// Probing gave up; terminal
    Unavailable,
}

/// What to do after a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    RetryAfter(Duration),
    GaveUp,
}

/// Bounded probe loop: `Checking` until a probe succeeds or attempts run out
#[derive(Debug, Clone)]
pub struct ReadinessMonitor {
    max_attempts: u32,
    interval: Duration,
    attempts: u32,
    state: Readiness,
}

impl Default for ReadinessMonitor {
    fn default() -> Self {
        Self::new(60, Duration::from_secs(2))
    }
}

impl ReadinessMonitor {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            attempts: 0,
            state: Readiness::Checking,
        }
    }

    pub fn state(&self) -> Readiness {
        self.state
    }

    /// Failed probes so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Feed one probe result
    ///
    /// Terminal states are sticky: once `Ready` or `Unavailable`, further
    /// probes do not change anything.
    pub fn record_probe(&mut self, ok: bool) -> ProbeOutcome {
        match self.state {
            Readiness::Ready => return ProbeOutcome::Ready,
            Readiness::Unavailable => return ProbeOutcome::GaveUp,
            Readiness::Checking => {}
        }

        if ok {
            self.state = Readiness::Ready;
            return ProbeOutcome::Ready;
        }

        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            self.state = Readiness::Unavailable;
            ProbeOutcome::GaveUp
        } else {
            ProbeOutcome::RetryAfter(self.interval)
        }
    }

    /// Probe until the backend answers or the attempts run out
    pub async fn wait_until_ready<C, F, Fut>(&mut self, clock: &C, mut probe: F) -> Readiness
    where
        C: Clock + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        info!("Waiting for ADK backend");
        loop {
            if self.state != Readiness::Checking {
                return self.state;
            }
            match self.record_probe(probe().await) {
                ProbeOutcome::Ready => {
                    info!("ADK backend ready after {} failed probes", self.attempts);
                    return Readiness::Ready;
                }
                ProbeOutcome::RetryAfter(delay) => {
                    debug!("Backend not ready yet (attempt {})", self.attempts);
                    clock.sleep(delay).await;
                }
                ProbeOutcome::GaveUp => {
                    error!(
                        "Backend failed to start within {} attempts",
                        self.max_attempts
                    );
                    return Readiness::Unavailable;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (0..6).map(|k| policy.delay_for(k).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000, 5000]);
        assert_eq!(policy.delay_for(40), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let clock = ManualClock::new();
        let calls = &AtomicU32::new(0);
        let result = retry_with_backoff(&clock, &RetryPolicy::default(), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RelayError::upstream("not yet"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let clock = ManualClock::new();
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let result: Result<()> = retry_with_backoff(&clock, &policy, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(RelayError::upstream(format!("failure {}", n)))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.unwrap_err().to_string().contains("failure 2"));
        // no sleep after the last attempt
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_times_out() {
        let clock = ManualClock::new();
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&clock, &RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            clock.advance(Duration::from_secs(50));
            async { Err(RelayError::upstream("slow")) }
        })
        .await;

        assert!(matches!(result, Err(RelayError::Timeout(_))));
        // elapsed before each attempt: 0s, 51s, 103s, then 157s > 120s
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_monitor_transitions() {
        let mut monitor = ReadinessMonitor::new(3, Duration::from_secs(2));
        assert_eq!(monitor.state(), Readiness::Checking);
        assert_eq!(
            monitor.record_probe(false),
            ProbeOutcome::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(monitor.record_probe(true), ProbeOutcome::Ready);
        assert_eq!(monitor.state(), Readiness::Ready);
        assert_eq!(monitor.record_probe(false), ProbeOutcome::Ready);
    }

    #[tokio::test]
    async fn test_monitor_gives_up_after_sixty_probes() {
        let clock = ManualClock::new();
        let probes = &AtomicU32::new(0);
        let mut monitor = ReadinessMonitor::default();
        let state = monitor
            .wait_until_ready(&clock, move || async move {
                probes.fetch_add(1, Ordering::SeqCst);
                false
            })
            .await;

        assert_eq!(state, Readiness::Unavailable);
        assert_eq!(probes.load(Ordering::SeqCst), 60);
        assert_eq!(clock.sleeps().len(), 59);
        assert!(clock.sleeps().iter().all(|d| *d == Duration::from_secs(2)));

        // terminal: no further probes
        let again = monitor.wait_until_ready(&clock, || async { true }).await;
        assert_eq!(again, Readiness::Unavailable);
    }

    #[tokio::test]
    async fn test_monitor_ready_on_first_success() {
        let clock = ManualClock::new();
        let probes = &AtomicU32::new(0);
        let mut monitor = ReadinessMonitor::default();
        let state = monitor
            .wait_until_ready(&clock, move || async move {
                probes.fetch_add(1, Ordering::SeqCst) >= 4
            })
            .await;
        assert_eq!(state, Readiness::Ready);
        assert_eq!(probes.load(Ordering::SeqCst), 5);
        assert_eq!(clock.now(), Duration::from_secs(8));
    }
}
