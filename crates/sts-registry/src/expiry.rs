//! Periodic expiry sweeps.
//!
//! An [`ExpiryScheduler`] owns a tokio task that wakes up every `period` and
//! runs each registered [`Sweep`]. It does nothing until [`start`] is called
//! and stops for good on [`stop`].
//!
//! [`start`]: ExpiryScheduler::start
//! [`stop`]: ExpiryScheduler::stop

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sts_core::Clock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::error::{RegistryError, RegistryResult};
use crate::token::{RegisteredToken, TokenRegistry};

/// Notified for every token removed by an expiry sweep.
pub trait EvictionListener: Send + Sync + Debug {
    /// Called after `token` has been removed.
    fn on_evicted(&self, token: &RegisteredToken);
}

/// One unit of periodic cleanup.
pub trait Sweep: Send + Sync + Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Removes whatever has expired and returns how many entries went away.
    ///
    /// ## Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn sweep(&self) -> RegistryResult<usize>;
}

/// Removes expired tokens from a [`TokenRegistry`].
#[derive(Debug)]
pub struct TokenRegistrySweep {
    registry: Arc<dyn TokenRegistry>,
    clock: Arc<dyn Clock>,
    listeners: Vec<Arc<dyn EvictionListener>>,
}

impl TokenRegistrySweep {
    /// Creates a sweep over `registry`, judging expiry by `clock`.
    #[must_use]
    pub fn new(registry: Arc<dyn TokenRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            clock,
            listeners: Vec::new(),
        }
    }

    /// Adds a listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn EvictionListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

impl Sweep for TokenRegistrySweep {
    fn name(&self) -> &str {
        "token-registry"
    }

    fn sweep(&self) -> RegistryResult<usize> {
        let evicted = self.registry.remove_expired(self.clock.now())?;
        for token in &evicted {
            tracing::debug!(token_id = %token.id, token_type = %token.token_type, "token evicted");
            for listener in &self.listeners {
                listener.on_evicted(token);
            }
        }
        Ok(evicted.len())
    }
}

#[derive(Debug)]
struct RunningTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic task running a fixed set of sweeps.
#[derive(Debug)]
pub struct ExpiryScheduler {
    period: Duration,
    sweeps: Arc<[Arc<dyn Sweep>]>,
    running: Mutex<Option<RunningTask>>,
}

impl ExpiryScheduler {
    /// Creates a scheduler running `sweeps` every `period`.
    #[must_use]
    pub fn new(period: Duration, sweeps: Vec<Arc<dyn Sweep>>) -> Self {
        Self {
            period,
            sweeps: sweeps.into(),
            running: Mutex::new(None),
        }
    }

    /// Returns the sweep period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Runs every sweep once on the calling thread.
    ///
    /// Failures are logged and do not stop the remaining sweeps.
    pub fn run_once(&self) -> usize {
        run_sweeps(&self.sweeps)
    }

    /// Spawns the periodic task on the current tokio runtime.
    ///
    /// The first sweep runs one period after start. Each round of sweeps runs
    /// on the blocking thread pool.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if the scheduler is already running, the
    /// period is zero, or there is no tokio runtime.
    pub fn start(&self) -> RegistryResult<()> {
        if self.period.is_zero() {
            return Err(RegistryError::Configuration(
                "expiry period must be non-zero".to_string(),
            ));
        }
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(RegistryError::Configuration(
                "expiry scheduler already started".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| RegistryError::Configuration(format!("no tokio runtime: {err}")))?;

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let sweeps = Arc::clone(&self.sweeps);
        let period = self.period;

        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        // Sweeps may block on file I/O.
                        let batch = Arc::clone(&sweeps);
                        let round = tokio::task::spawn_blocking(move || run_sweeps(&batch));
                        if let Err(err) = round.await {
                            tracing::warn!(error = %err, "expiry sweep task failed");
                        }
                    }
                }
            }
            tracing::debug!("expiry scheduler stopped");
        });

        tracing::info!(period = ?period, sweeps = self.sweeps.len(), "expiry scheduler started");
        *running = Some(RunningTask { shutdown, handle });
        Ok(())
    }

    /// Stops the periodic task and waits for it to finish. Does nothing if it
    /// is not running.
    pub async fn stop(&self) {
        let task = self.running.lock().take();
        if let Some(RunningTask { shutdown, handle }) = task {
            // The task may already be gone; either way it is done.
            let _ = shutdown.send(());
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "expiry scheduler task failed");
            }
        }
    }

    /// Returns true between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.running.get_mut().take() {
            task.handle.abort();
        }
    }
}

fn run_sweeps(sweeps: &[Arc<dyn Sweep>]) -> usize {
    let mut total = 0;
    for sweep in sweeps {
        match sweep.sweep() {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(sweep = sweep.name(), removed, "sweep finished");
                }
                total += removed;
            }
            Err(err) => tracing::warn!(sweep = sweep.name(), error = %err, "sweep failed"),
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeDelta, Utc};
    use sts_core::ManualClock;

    use super::*;
    use crate::token::InMemoryTokenRegistry;

    #[derive(Debug, Default)]
    struct CountingSweep {
        runs: AtomicUsize,
    }

    impl Sweep for CountingSweep {
        fn name(&self) -> &str {
            "counting"
        }

        fn sweep(&self) -> RegistryResult<usize> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    #[derive(Debug)]
    struct FailingSweep;

    impl Sweep for FailingSweep {
        fn name(&self) -> &str {
            "failing"
        }

        fn sweep(&self) -> RegistryResult<usize> {
            Err(RegistryError::Io("unavailable".to_string()))
        }
    }

    #[derive(Debug, Default)]
    struct RecordingListener {
        evicted: Mutex<Vec<String>>,
    }

    impl EvictionListener for RecordingListener {
        fn on_evicted(&self, token: &RegisteredToken) {
            self.evicted.lock().push(token.id.clone());
        }
    }

    #[test]
    fn registry_sweep_notifies_listeners() {
        let clock = Arc::new(ManualClock::starting_now());
        let registry = Arc::new(InMemoryTokenRegistry::new());
        let listener = Arc::new(RecordingListener::default());
        let expires = clock.now() + TimeDelta::seconds(7);
        registry
            .add_token(
                "ID_1",
                RegisteredToken::new("ID_1", "urn:test", "", clock.now()).with_expiry(expires),
            )
            .unwrap();

        let sweep = TokenRegistrySweep::new(registry.clone(), clock.clone())
            .with_listener(listener.clone());

        assert_eq!(sweep.sweep().unwrap(), 0);
        clock.advance_millis(7_000);
        assert_eq!(sweep.sweep().unwrap(), 1);
        assert!(registry.is_empty());
        assert_eq!(*listener.evicted.lock(), vec!["ID_1".to_string()]);
    }

    #[test]
    fn run_once_continues_past_failures() {
        let counting = Arc::new(CountingSweep::default());
        let sweeps: Vec<Arc<dyn Sweep>> = vec![Arc::new(FailingSweep), counting.clone()];
        let scheduler = ExpiryScheduler::new(Duration::from_secs(1), sweeps);
        assert_eq!(scheduler.run_once(), 0);
        assert_eq!(counting.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_requires_runtime() {
        let scheduler = ExpiryScheduler::new(Duration::from_secs(1), Vec::new());
        assert!(matches!(
            scheduler.start(),
            Err(RegistryError::Configuration(_))
        ));
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_every_period_until_stopped() {
        let counting = Arc::new(CountingSweep::default());
        let sweeps: Vec<Arc<dyn Sweep>> = vec![counting.clone()];
        let scheduler = ExpiryScheduler::new(Duration::from_secs(10), sweeps);

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.start().is_err());

        tokio::time::sleep(Duration::from_millis(30_001)).await;
        assert_eq!(counting.runs.load(Ordering::SeqCst), 3);

        scheduler.stop().await;
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counting.runs.load(Ordering::SeqCst), 3);
    }

    #[derive(Debug, Default)]
    struct ThreadRecordingSweep {
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl Sweep for ThreadRecordingSweep {
        fn name(&self) -> &str {
            "thread-recording"
        }

        fn sweep(&self) -> RegistryResult<usize> {
            self.threads.lock().push(std::thread::current().id());
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_run_off_the_runtime_thread() {
        let recording = Arc::new(ThreadRecordingSweep::default());
        let sweeps: Vec<Arc<dyn Sweep>> = vec![recording.clone()];
        let scheduler = ExpiryScheduler::new(Duration::from_secs(1), sweeps);

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        scheduler.stop().await;

        let threads = recording.threads.lock();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_on_schedule() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = Arc::new(InMemoryTokenRegistry::new());
        registry
            .add_token(
                "ID_1",
                RegisteredToken::new("ID_1", "urn:test", "", clock.now())
                    .with_expiry(clock.now() + TimeDelta::seconds(5)),
            )
            .unwrap();

        let sweep: Arc<dyn Sweep> =
            Arc::new(TokenRegistrySweep::new(registry.clone(), clock.clone()));
        let scheduler = ExpiryScheduler::new(Duration::from_secs(1), vec![sweep]);
        scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(registry.len(), 1);

        clock.advance_millis(5_000);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(registry.is_empty());

        scheduler.stop().await;
    }
}
