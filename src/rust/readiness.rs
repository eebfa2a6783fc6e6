//! One-time, thread-safe construction of an expensive shared resource.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::classifier::AssessmentError;

/// Lifecycle of a [`ReadinessCoordinator`].
///
/// `NotReady -> Warming -> Ready | Failed`. `Ready` is terminal; `Failed` is terminal
/// until [`ReadinessCoordinator::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    NotReady = 0,
    Warming = 1,
    Ready = 2,
    Failed = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Warming,
            2 => Phase::Ready,
            3 => Phase::Failed,
            _ => Phase::NotReady,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

type Factory<T> = Box<dyn Fn() -> Result<T, AssessmentError> + Send + Sync>;

/// Guards lazy construction of a resource `T` that many threads share read-only.
///
/// Exactly one caller runs the factory (double-checked locking around `init_lock`);
/// afterwards every access is a lock-free read of the published `Arc<T>`. A failed
/// construction is remembered and re-surfaced as `ProviderUnavailable` to every later
/// caller instead of being retried.
///
/// ```
/// use std::time::Duration;
/// use inkcheck::readiness::ReadinessCoordinator;
///
/// let coordinator = ReadinessCoordinator::new(|| Ok(vec![1, 2, 3]));
/// assert!(!coordinator.is_ready());
/// let value = coordinator.warm_up()?;
/// assert_eq!(value.len(), 3);
/// assert!(coordinator.is_ready());
/// # Ok::<(), inkcheck::AssessmentError>(())
/// ```
pub struct ReadinessCoordinator<T> {
    phase: AtomicU8,
    init_lock: Mutex<()>,
    failure: Mutex<Option<String>>,
    resources: OnceLock<Arc<T>>,
    factory: Factory<T>,
    poll_interval: Duration,
}

impl<T> fmt::Debug for ReadinessCoordinator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessCoordinator")
            .field("phase", &self.phase())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl<T> ReadinessCoordinator<T> {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<T, AssessmentError> + Send + Sync + 'static,
    {
        Self {
            phase: AtomicU8::new(Phase::NotReady as u8),
            init_lock: Mutex::new(()),
            failure: Mutex::new(None),
            resources: OnceLock::new(),
            factory: Box::new(factory),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Non-blocking.
    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// Reason recorded by the failed warm-up, if any.
    pub fn failure_reason(&self) -> Option<String> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn unavailable(&self) -> AssessmentError {
        AssessmentError::ProviderUnavailable(
            self.failure_reason().unwrap_or_else(|| "warm-up failed".to_string()),
        )
    }

    /// The published resource, without waiting.
    pub fn get(&self) -> Option<Arc<T>> {
        self.resources.get().cloned()
    }

    /// Builds the resource on the calling thread unless another thread already has.
    /// Blocks while a concurrent warm-up holds the lock.
    ///
    /// # Errors
    /// - `ProviderUnavailable` if this or an earlier warm-up failed or panicked
    pub fn warm_up(&self) -> Result<Arc<T>, AssessmentError> {
        if let Some(resources) = self.get() {
            return Ok(resources);
        }
        if self.phase() == Phase::Failed {
            return Err(self.unavailable());
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(resources) = self.get() {
            return Ok(resources);
        }
        if self.phase() == Phase::Failed {
            return Err(self.unavailable());
        }

        self.set_phase(Phase::Warming);
        info!("Warming up shared assessment resources");
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.factory)())).unwrap_or_else(|payload| {
            Err(AssessmentError::ProviderUnavailable(format!(
                "warm-up panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
        match outcome {
            Ok(value) => {
                let resources = Arc::new(value);
                let published = Arc::clone(self.resources.get_or_init(|| resources));
                self.set_phase(Phase::Ready);
                info!("Warm-up finished in {:?}", started.elapsed());
                Ok(published)
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Warm-up failed after {:?}: {}", started.elapsed(), reason);
                *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());
                self.set_phase(Phase::Failed);
                Err(AssessmentError::ProviderUnavailable(reason))
            }
        }
    }

    /// Waits until the resource is ready, polling every `poll_interval`. Starts a
    /// background warm-up first if nobody has.
    ///
    /// # Errors
    /// - `NotReadyTimeout` if `timeout` elapses first
    /// - `ProviderUnavailable` if warm-up failed
    pub fn ensure_ready(self: &Arc<Self>, timeout: Duration) -> Result<Arc<T>, AssessmentError>
    where
        T: Send + Sync + 'static,
    {
        if let Some(resources) = self.get() {
            return Ok(resources);
        }
        self.spawn_warm_up();

        let deadline = Instant::now() + timeout;
        loop {
            match self.phase() {
                Phase::Ready => {
                    if let Some(resources) = self.get() {
                        return Ok(resources);
                    }
                }
                Phase::Failed => return Err(self.unavailable()),
                Phase::NotReady | Phase::Warming => {}
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Not ready after {:?}", timeout);
                return Err(AssessmentError::NotReadyTimeout(timeout));
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Starts warm-up on a background thread. Returns `None` when warm-up has already
    /// been started, finished or failed.
    pub fn spawn_warm_up(self: &Arc<Self>) -> Option<JoinHandle<()>>
    where
        T: Send + Sync + 'static,
    {
        self.phase
            .compare_exchange(
                Phase::NotReady as u8,
                Phase::Warming as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        let coordinator = Arc::clone(self);
        let spawned = thread::Builder::new().name("inkcheck-warmup".into()).spawn(move || {
            // failures are recorded in the coordinator
            let _ = coordinator.warm_up();
        });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                let reason = format!("could not start warm-up thread: {}", e);
                error!("{}", reason);
                *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
                self.set_phase(Phase::Failed);
                None
            }
        }
    }

    /// Returns to `NotReady`, dropping any published resource and recorded failure.
    /// Meant for tests; requires exclusive access.
    #[doc(hidden)]
    pub fn reset(&mut self) {
        self.resources.take();
        *self.failure.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
        self.set_phase(Phase::NotReady);
    }
}
