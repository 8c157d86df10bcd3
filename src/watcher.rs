//! Change watching: debounced refresh on mutation, bounded startup polling.
//!
//! Time comes from an injected [`Clock`], so the schedule can be driven by a
//! [`ManualClock`] in tests and by [`MonotonicClock`] in the binary.

use crate::controller::{Controller, RefreshOutcome};
use crate::table::TableAccess;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of elapsed time.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Wall clock, measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Scheduling parameters for [`ChangeWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Quiet period after the last mutation before refreshing
    pub debounce: Duration,
    /// Gap between startup refresh attempts
    pub poll_interval: Duration,
    /// Startup attempts before giving up for good
    pub max_attempts: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            poll_interval: Duration::from_millis(1000),
            max_attempts: 30,
        }
    }
}

impl WatchConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Single-shot timer that restarts on every notification.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Duration>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Cancel any pending deadline and schedule a fresh one.
    pub fn notify(&mut self, now: Duration) {
        self.deadline = Some(now + self.delay);
    }

    /// Whether the pending deadline has passed. Consumes it if so.
    pub fn fire(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

/// Fixed-interval retry loop with a hard attempt cap.
#[derive(Debug, Clone)]
pub struct StartupPoller {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
    next_due: Duration,
}

impl StartupPoller {
    /// First attempt is due one interval after `now`.
    pub fn new(now: Duration, interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            attempts: 0,
            next_due: now + interval,
        }
    }

    pub fn is_due(&self, now: Duration) -> bool {
        !self.is_exhausted() && now >= self.next_due
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
        self.next_due += self.interval;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn next_due(&self) -> Option<Duration> {
        (!self.is_exhausted()).then_some(self.next_due)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    /// Polling for the first successful refresh
    Starting,
    /// Refreshing on debounced mutations
    Observing,
    /// Startup poll exhausted; nothing more will happen
    GaveUp,
}

/// Drives the controller's refresh cycle from polls and mutations.
#[derive(Debug)]
pub struct ChangeWatcher<C: Clock> {
    clock: C,
    phase: WatchPhase,
    debouncer: Debouncer,
    poller: StartupPoller,
}

impl<C: Clock> ChangeWatcher<C> {
    pub fn new(clock: C, config: &WatchConfig) -> Self {
        let poller = StartupPoller::new(clock.now(), config.poll_interval, config.max_attempts);
        Self {
            clock,
            phase: WatchPhase::Starting,
            debouncer: Debouncer::new(config.debounce),
            poller,
        }
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// Record a structural change to the table.
    ///
    /// Only observed once startup has succeeded.
    pub fn notify_mutation(&mut self) {
        if self.phase == WatchPhase::Observing {
            self.debouncer.notify(self.clock.now());
        }
    }

    /// Run whatever is due at the current time.
    ///
    /// Returns the outcome of the refresh if one ran.
    pub fn tick<T: TableAccess>(
        &mut self,
        controller: &mut Controller,
        table: &mut T,
    ) -> Option<RefreshOutcome> {
        let now = self.clock.now();
        match self.phase {
            WatchPhase::Starting => {
                if !self.poller.is_due(now) {
                    return None;
                }
                self.poller.record_attempt();
                let outcome = controller.refresh(table);
                if outcome.is_ready() {
                    self.phase = WatchPhase::Observing;
                    log::info!(
                        "Three-low columns ready after {} attempt(s): {}",
                        self.poller.attempts(),
                        outcome
                    );
                } else if self.poller.is_exhausted() {
                    self.phase = WatchPhase::GaveUp;
                    log::warn!(
                        "Giving up after {} attempts: {}",
                        self.poller.attempts(),
                        outcome
                    );
                } else {
                    log::debug!("Startup attempt {}: {}", self.poller.attempts(), outcome);
                }
                Some(outcome)
            }
            WatchPhase::Observing => {
                if !self.debouncer.fire(now) {
                    return None;
                }
                let outcome = controller.refresh(table);
                log::debug!("Debounced refresh: {}", outcome);
                Some(outcome)
            }
            WatchPhase::GaveUp => None,
        }
    }

    /// When the next scheduled event is due, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        match self.phase {
            WatchPhase::Starting => self.poller.next_due(),
            WatchPhase::Observing => self.debouncer.deadline(),
            WatchPhase::GaveUp => None,
        }
    }
}
