//! Timers polled from the host's event loop
//!
//! Nothing here spawns a thread. The host calls the `fire`/`poll`
//! methods from its own timer tick with the current [`Instant`], and acts
//! on whatever comes due.

use std::time::{Duration, Instant};

/// Single-shot timer; scheduling again restarts the wait
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    due: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self { delay, due: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the wait from `now`
    pub fn schedule(&mut self, now: Instant) {
        self.due = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// True once, when the wait has elapsed
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// Recurring timer that can be paused
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next: Option<Instant>,
}

impl Interval {
    /// Create a stopped interval
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start (or restart) counting a full period from `now`
    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// True when a period has elapsed; missed periods collapse into one
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now >= next => {
                self.next = Some(now + self.period);
                true
            }
            _ => false,
        }
    }
}

/// Steps that come due one after another at increasing delays
///
/// Each step's delay counts from [`Staged::start`], and a step never
/// fires before the one scheduled ahead of it.
#[derive(Debug, Clone)]
pub struct Staged<T> {
    steps: Vec<(Duration, T)>,
    started: Option<Instant>,
    next: usize,
}

impl<T: Clone> Staged<T> {
    /// Steps must be given in order of increasing delay
    pub fn new(steps: Vec<(Duration, T)>) -> Self {
        debug_assert!(steps.windows(2).all(|w| w[0].0 <= w[1].0));
        Self {
            steps,
            started: None,
            next: 0,
        }
    }

    /// Begin (or restart) the sequence at `now`
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
        self.next = 0;
    }

    pub fn cancel(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Steps that have come due since the last poll, in order
    pub fn poll(&mut self, now: Instant) -> Vec<T> {
        let Some(started) = self.started else {
            return Vec::new();
        };
        let mut due = Vec::new();
        while let Some((delay, step)) = self.steps.get(self.next) {
            if now < started + *delay {
                break;
            }
            due.push(step.clone());
            self.next += 1;
        }
        if self.next >= self.steps.len() {
            self.started = None;
        }
        due
    }
}
