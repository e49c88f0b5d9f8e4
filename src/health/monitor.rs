//! Backend availability monitor.
//!
//! # Responsibilities
//! - Periodically probe the backend health endpoint
//! - Debounce failures before declaring the backend offline
//! - Back off while the backend stays unhealthy
//! - Publish `AvailabilityState` to any number of observers
//!
//! # Design Decisions
//! - One task per running monitor: probe → apply → sleep, so probes never overlap
//! - Results are applied under a lock together with a generation check;
//!   `stop()` bumps the generation, so abandoned probes never touch state
//! - Probe failures are logged and folded into state, never returned

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::health::policy::MonitorPolicy;
use crate::health::probe::{HealthProbe, ProbeError};
use crate::health::state::{AvailabilityState, HealthTracker, Transition};
use crate::observability::metrics;

/// Watches one backend and exposes its debounced availability.
///
/// Must be started from within a Tokio runtime. Dropping the monitor stops it.
pub struct AvailabilityMonitor<P: HealthProbe> {
    probe: Arc<P>,
    policy: Arc<ArcSwap<MonitorPolicy>>,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    core: Mutex<Core>,
    state_tx: watch::Sender<AvailabilityState>,
}

struct Core {
    /// Identifies the live probe chain; anything else is stale.
    generation: u64,
    tracker: HealthTracker,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: HealthProbe> AvailabilityMonitor<P> {
    /// Create a stopped monitor in the initial (offline, checking) state.
    pub fn new(probe: P, policy: MonitorPolicy) -> Self {
        let (state_tx, _) = watch::channel(AvailabilityState::default());

        Self {
            probe: Arc::new(probe),
            policy: Arc::new(ArcSwap::from_pointee(policy)),
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    generation: 0,
                    tracker: HealthTracker::new(),
                }),
                state_tx,
            }),
            task: Mutex::new(None),
        }
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<AvailabilityState> {
        self.shared.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AvailabilityState {
        self.shared.state_tx.borrow().clone()
    }

    /// The policy currently in effect.
    pub fn policy(&self) -> Arc<MonitorPolicy> {
        self.policy.load_full()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Begin probing, first probe immediately.
    ///
    /// Restarting a running monitor replaces its probe chain.
    pub fn start(&self) {
        let mut task = lock(&self.task);

        let generation = {
            let mut core = lock(&self.shared.core);
            core.generation += 1;
            core.generation
        };

        if let Some(previous) = task.take() {
            tracing::debug!("Availability monitor restarted, cancelling previous probe chain");
            previous.abort();
        }

        let chain = ProbeChain {
            probe: Arc::clone(&self.probe),
            policy: Arc::clone(&self.policy),
            shared: Arc::clone(&self.shared),
            generation,
        };
        *task = Some(tokio::spawn(chain.run()));

        tracing::info!(generation, "Availability monitor started");
    }

    /// Cancel the pending timer and abandon any in-flight probe.
    pub fn stop(&self) {
        let mut task = lock(&self.task);

        // Invalidate first: a probe resolving concurrently must not apply.
        lock(&self.shared.core).generation += 1;

        if let Some(handle) = task.take() {
            handle.abort();
            tracing::info!("Availability monitor stopped");
        }
    }

    /// Swap the scheduling policy; applies from the next scheduling decision.
    pub fn reconfigure(&self, policy: MonitorPolicy) {
        tracing::info!(
            failure_threshold = policy.failure_threshold,
            healthy_interval = ?policy.healthy_interval,
            unhealthy_max_interval = ?policy.unhealthy_max_interval,
            "Availability monitor policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    #[cfg(test)]
    fn consecutive_failures(&self) -> u32 {
        lock(&self.shared.core).tracker.consecutive_failures()
    }
}

impl<P: HealthProbe> Drop for AvailabilityMonitor<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ProbeChain<P> {
    probe: Arc<P>,
    policy: Arc<ArcSwap<MonitorPolicy>>,
    shared: Arc<Shared>,
    generation: u64,
}

impl<P: HealthProbe> ProbeChain<P> {
    async fn run(self) {
        loop {
            let Some(initial) = self.begin() else {
                return;
            };

            let policy = self.policy.load_full();
            let started = Instant::now();
            let outcome = match time::timeout(policy.probe_timeout, self.probe.probe()).await {
                Ok(result) => result,
                // The probe future is dropped here, cancelling the request.
                Err(_) => Err(ProbeError::Timeout(policy.probe_timeout)),
            };

            let Some(delay) = self.complete(initial, outcome, started.elapsed(), &policy) else {
                return;
            };

            time::sleep(delay).await;
        }
    }

    /// Returns whether this is the initial check, or `None` if the chain is stale.
    fn begin(&self) -> Option<bool> {
        let core = lock(&self.shared.core);
        if core.generation != self.generation {
            return None;
        }

        let initial = self.shared.state_tx.borrow().is_initial_check();
        if initial {
            self.shared.state_tx.send_if_modified(|state| {
                let changed = !state.is_checking;
                state.is_checking = true;
                changed
            });
        }

        tracing::debug!(initial, "Probing backend health");
        Some(initial)
    }

    /// Fold a probe outcome into state; returns the delay before the next probe.
    fn complete(
        &self,
        initial: bool,
        outcome: Result<(), ProbeError>,
        elapsed: Duration,
        policy: &MonitorPolicy,
    ) -> Option<Duration> {
        let mut core = lock(&self.shared.core);
        if core.generation != self.generation {
            tracing::debug!("Discarding result of abandoned probe");
            return None;
        }
        metrics::record_probe(&outcome, elapsed);

        let succeeded = outcome.is_ok();
        let transition = match &outcome {
            Ok(()) => core.tracker.record_success(),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    consecutive_failures = core.tracker.consecutive_failures() + 1,
                    "Health probe failed"
                );
                core.tracker.record_failure(policy.failure_threshold)
            }
        };

        let failures = core.tracker.consecutive_failures();
        let is_online = core.tracker.is_online();
        let delay = policy.next_delay(succeeded, failures);

        match transition {
            Transition::CameOnline => tracing::info!("Backend is online"),
            Transition::WentOffline => tracing::warn!(
                consecutive_failures = failures,
                "Backend is offline"
            ),
            Transition::None => {}
        }

        self.shared.state_tx.send_modify(|state| {
            state.is_online = is_online;
            state.last_checked = Some(Utc::now());
            if initial {
                state.is_checking = false;
            }
        });

        metrics::record_availability(is_online, failures);
        metrics::record_next_delay(delay);
        tracing::debug!(next_probe_in = ?delay, is_online, "Next health probe scheduled");

        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Semaphore;
    use tokio::time::Instant as TokioInstant;

    #[derive(Clone)]
    struct ScriptedProbe {
        inner: Arc<ScriptInner>,
    }

    struct ScriptInner {
        outcomes: Mutex<VecDeque<Result<(), ProbeError>>>,
        fallback: Result<(), ProbeError>,
        calls: Mutex<Vec<TokioInstant>>,
        gate: Option<Semaphore>,
        latency: Duration,
    }

    impl ScriptedProbe {
        fn new(outcomes: Vec<Result<(), ProbeError>>, fallback: Result<(), ProbeError>) -> Self {
            Self::build(outcomes, fallback, None, Duration::ZERO)
        }

        fn gated(fallback: Result<(), ProbeError>) -> Self {
            Self::build(Vec::new(), fallback, Some(Semaphore::new(0)), Duration::ZERO)
        }

        fn slow(latency: Duration) -> Self {
            Self::build(Vec::new(), Ok(()), None, latency)
        }

        fn build(
            outcomes: Vec<Result<(), ProbeError>>,
            fallback: Result<(), ProbeError>,
            gate: Option<Semaphore>,
            latency: Duration,
        ) -> Self {
            Self {
                inner: Arc::new(ScriptInner {
                    outcomes: Mutex::new(outcomes.into()),
                    fallback,
                    calls: Mutex::new(Vec::new()),
                    gate,
                    latency,
                }),
            }
        }

        fn release(&self) {
            if let Some(gate) = &self.inner.gate {
                gate.add_permits(1);
            }
        }

        fn calls(&self) -> Vec<TokioInstant> {
            self.inner.calls.lock().unwrap().clone()
        }
    }

    impl HealthProbe for ScriptedProbe {
        async fn probe(&self) -> Result<(), ProbeError> {
            self.inner.calls.lock().unwrap().push(TokioInstant::now());

            if let Some(gate) = &self.inner.gate {
                gate.acquire().await.unwrap().forget();
            }
            if !self.inner.latency.is_zero() {
                time::sleep(self.inner.latency).await;
            }

            let next = self.inner.outcomes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.inner.fallback.clone())
        }
    }

    fn refused() -> Result<(), ProbeError> {
        Err(ProbeError::Transport("connection refused".into()))
    }

    /// Sleep until `secs` after `t0`, plus a millisecond so timers due at
    /// exactly `secs` have fired.
    async fn advance_to(t0: TokioInstant, secs: u64) {
        time::sleep_until(t0 + Duration::from_secs(secs) + Duration::from_millis(1)).await;
    }

    fn offsets(t0: TokioInstant, calls: &[TokioInstant]) -> Vec<u64> {
        calls.iter().map(|c| (*c - t0).as_secs()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_while_first_probe_in_flight() {
        let probe = ScriptedProbe::gated(Ok(()));
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        assert_eq!(monitor.state(), AvailabilityState::default());

        monitor.start();
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(probe.calls().len(), 1);
        assert_eq!(monitor.state(), AvailabilityState::default());

        probe.release();
        time::sleep(Duration::from_millis(1)).await;
        let state = monitor.state();
        assert!(state.is_online);
        assert!(!state.is_checking);
        assert!(state.last_checked.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_then_two_failures_scenario() {
        let probe = ScriptedProbe::new(vec![Ok(()), refused(), refused()], refused());
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let t0 = TokioInstant::now();
        monitor.start();

        advance_to(t0, 0).await;
        let first = monitor.state();
        assert!(first.is_online);
        assert!(!first.is_checking);
        assert!(first.last_checked.is_some());

        advance_to(t0, 30).await;
        let second = monitor.state();
        assert!(second.is_online, "one failure must not flip the state");
        assert!(!second.is_checking);
        assert!(second.last_checked >= first.last_checked);
        assert_eq!(monitor.consecutive_failures(), 1);

        advance_to(t0, 60).await;
        let third = monitor.state();
        assert!(!third.is_online);
        assert!(!third.is_checking);
        assert_eq!(monitor.consecutive_failures(), 2);

        advance_to(t0, 90).await;
        assert_eq!(offsets(t0, &probe.calls()), vec![0, 30, 60, 90]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_while_down() {
        let probe = ScriptedProbe::new(Vec::new(), refused());
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let t0 = TokioInstant::now();
        monitor.start();

        advance_to(t0, 1080).await;
        let calls = offsets(t0, &probe.calls());
        assert_eq!(calls, vec![0, 30, 60, 120, 240, 480, 780, 1080]);

        let gaps: Vec<u64> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps, vec![30, 30, 60, 120, 240, 300, 300]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_after_long_outage() {
        // Failures at 0, 30, 60, 120, 240; success at 480
        let probe = ScriptedProbe::new(
            vec![refused(), refused(), refused(), refused(), refused(), Ok(())],
            Ok(()),
        );
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let t0 = TokioInstant::now();
        monitor.start();

        advance_to(t0, 240).await;
        assert!(!monitor.state().is_online);
        assert_eq!(monitor.consecutive_failures(), 5);

        advance_to(t0, 480).await;
        assert!(monitor.state().is_online);
        assert_eq!(monitor.consecutive_failures(), 0);

        advance_to(t0, 510).await;
        assert_eq!(offsets(t0, &probe.calls()), vec![0, 30, 60, 120, 240, 480, 510]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_checks_are_silent() {
        let probe = ScriptedProbe::gated(refused());
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let t0 = TokioInstant::now();
        monitor.start();

        probe.release();
        advance_to(t0, 0).await;
        assert!(!monitor.state().is_checking);

        // Second probe starts at 30s and stays in flight
        advance_to(t0, 30).await;
        assert_eq!(probe.calls().len(), 2);
        assert!(!monitor.state().is_checking);

        for _ in 0..3 {
            probe.release();
            time::sleep(Duration::from_secs(400)).await;
            let state = monitor.state();
            assert!(!state.is_checking);
            assert!(!state.is_online);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let probe = ScriptedProbe::slow(Duration::from_secs(10));
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let t0 = TokioInstant::now();
        monitor.start();

        advance_to(t0, 5).await;
        let state = monitor.state();
        assert!(!state.is_online);
        assert!(!state.is_checking);
        assert!(state.last_checked.is_some());
        assert_eq!(monitor.consecutive_failures(), 1);

        // Next probe after the base interval, counted from the timeout
        advance_to(t0, 35).await;
        assert_eq!(offsets(t0, &probe.calls()), vec![0, 35]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_keeps_single_chain() {
        let probe = ScriptedProbe::new(Vec::new(), Ok(()));
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let t0 = TokioInstant::now();
        monitor.start();
        monitor.start();
        assert!(monitor.is_running());

        advance_to(t0, 95).await;
        assert_eq!(offsets(t0, &probe.calls()), vec![0, 30, 60, 90]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_probe() {
        let probe = ScriptedProbe::gated(Ok(()));
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let mut rx = monitor.subscribe();
        monitor.start();

        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(probe.calls().len(), 1);

        monitor.stop();
        assert!(!monitor.is_running());
        probe.release();
        time::sleep(Duration::from_secs(120)).await;

        assert_eq!(monitor.state(), AvailabilityState::default());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(probe.calls().len(), 1);
    }

    mod counting {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        use metrics::{
            Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
        };

        /// Counts `backend_status_probes_total` increments, ignores the rest.
        #[derive(Default)]
        pub struct CheckCounter {
            total: Arc<AtomicU64>,
        }

        impl CheckCounter {
            pub fn total(&self) -> u64 {
                self.total.load(Ordering::SeqCst)
            }
        }

        impl Recorder for CheckCounter {
            fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

            fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
                if key.name() == "backend_status_probes_total" {
                    Counter::from_arc(Arc::clone(&self.total))
                } else {
                    Counter::noop()
                }
            }

            fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
                Gauge::noop()
            }

            fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
                Histogram::noop()
            }
        }
    }

    /// Run `scenario` on a paused current-thread runtime with `recorder` installed.
    fn with_counter<F>(recorder: &counting::CheckCounter, scenario: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        ::metrics::with_local_recorder(recorder, || runtime.block_on(scenario));
    }

    #[test]
    fn test_completed_check_is_counted() {
        let recorder = counting::CheckCounter::default();
        with_counter(&recorder, async {
            let probe = ScriptedProbe::new(Vec::new(), Ok(()));
            let monitor = AvailabilityMonitor::new(probe, MonitorPolicy::default());
            monitor.start();
            time::sleep(Duration::from_millis(1)).await;
            assert!(monitor.state().is_online);
            monitor.stop();
        });
        assert_eq!(recorder.total(), 1);
    }

    #[test]
    fn test_stale_result_is_not_counted() {
        let recorder = counting::CheckCounter::default();
        with_counter(&recorder, async {
            let probe = ScriptedProbe::gated(Ok(()));
            let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
            monitor.start();
            time::sleep(Duration::from_millis(1)).await;
            assert_eq!(probe.calls().len(), 1);

            // Invalidate the chain without aborting it, as a concurrent stop would
            lock(&monitor.shared.core).generation += 1;
            probe.release();
            time::sleep(Duration::from_secs(60)).await;

            assert_eq!(monitor.state(), AvailabilityState::default());
            assert_eq!(probe.calls().len(), 1);
        });
        assert_eq!(recorder.total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_resumes_probing() {
        let probe = ScriptedProbe::new(Vec::new(), Ok(()));
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        monitor.start();
        time::sleep(Duration::from_millis(1)).await;
        monitor.stop();

        time::sleep(Duration::from_secs(100)).await;
        assert_eq!(probe.calls().len(), 1);

        monitor.start();
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(probe.calls().len(), 2);
        assert!(!monitor.state().is_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_probing() {
        let probe = ScriptedProbe::new(Vec::new(), Ok(()));
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        monitor.start();
        time::sleep(Duration::from_millis(1)).await;
        drop(monitor);

        time::sleep(Duration::from_secs(300)).await;
        assert_eq!(probe.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_applies_to_next_schedule() {
        let probe = ScriptedProbe::new(Vec::new(), Ok(()));
        let monitor = AvailabilityMonitor::new(probe.clone(), MonitorPolicy::default());
        let t0 = TokioInstant::now();
        monitor.start();
        advance_to(t0, 0).await;

        monitor.reconfigure(MonitorPolicy {
            healthy_interval: Duration::from_secs(10),
            ..MonitorPolicy::default()
        });
        assert_eq!(monitor.policy().healthy_interval, Duration::from_secs(10));

        // Already-armed 30s timer is kept, later ones use 10s
        advance_to(t0, 50).await;
        assert_eq!(offsets(t0, &probe.calls()), vec![0, 30, 40, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_updates() {
        let probe = ScriptedProbe::new(Vec::new(), Ok(()));
        let monitor = AvailabilityMonitor::new(probe, MonitorPolicy::default());
        let mut rx = monitor.subscribe();
        monitor.start();

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(state.is_online);
        assert!(state.last_checked.is_some());
    }
}
