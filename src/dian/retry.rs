use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How many times to try and how long to back off between tries.
/// The delay grows linearly with the attempt number.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Defaults used for document submission: three tries, two-second base.
pub const SUBMIT_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(2));

/// Status queries are cheaper and retried once.
pub const STATUS_RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_secs(1));

/// Caller-imposed bounds on a retrying operation. A budget can carry a
/// wall-clock deadline, a cooperative cancel flag, both, or neither.
#[derive(Debug, Clone, Default)]
pub struct RetryBudget {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl RetryBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    pub fn cancellable(flag: Arc<AtomicBool>) -> Self {
        Self {
            deadline: None,
            cancel: Some(flag),
        }
    }

    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True when another attempt may start.
    pub fn allows_attempt(&self) -> bool {
        !self.cancelled() && !self.expired()
    }

    /// Sleeps in short slices so cancellation and the deadline are
    /// observed promptly. Returns false when the pause was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(50);
        let wake = Instant::now() + duration;
        loop {
            if !self.allows_attempt() {
                return false;
            }
            let now = Instant::now();
            if now >= wake {
                return true;
            }
            std::thread::sleep(SLICE.min(wake - now));
        }
    }
}
