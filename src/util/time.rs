//! Timer service abstraction for the game engines
//!
//! Engines never touch wall-clock time directly. Every transition that can
//! arm or disarm a timer takes a [`Clock`], so the session host supplies a
//! tokio-backed implementation while tests drive a [`ManualClock`].

use std::time::Duration;

/// Identifies one scheduled one-shot timer for later cancellation.
///
/// Handles are unique for the lifetime of a clock instance and are never
/// reused, so a stale handle compares unequal to every live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// One-shot timer service injected into each engine.
pub trait Clock {
    /// Current monotonic time in milliseconds since the clock's origin.
    fn now_ms(&self) -> u64;

    /// Arrange for a timer to fire once, `delay` from now.
    fn schedule(&mut self, delay: Duration) -> TimerHandle;

    /// Drop a pending timer. Unknown or already-fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Deterministic clock for tests and scripted playback.
///
/// Time only moves when [`ManualClock::advance`] is called; the caller
/// receives the handles that came due and delivers them to the engines,
/// mirroring what the session loop does with real deadlines.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: u64,
    next_handle: u64,
    /// (handle, absolute deadline in ms)
    pending: Vec<(TimerHandle, u64)>,
    cancelled: Vec<TimerHandle>,
    /// (handle, requested delay in ms), in schedule order
    scheduled: Vec<(TimerHandle, u64)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward and return the handles that came due, in deadline
    /// order.
    pub fn advance(&mut self, ms: u64) -> Vec<TimerHandle> {
        self.now_ms += ms;
        let now = self.now_ms;

        let mut due: Vec<(TimerHandle, u64)> = Vec::new();
        self.pending.retain(|&(handle, at)| {
            if at <= now {
                due.push((handle, at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(handle, at)| (at, handle));
        due.into_iter().map(|(handle, _)| handle).collect()
    }

    /// Number of timers still waiting to fire.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether `handle` was explicitly cancelled at some point.
    pub fn was_cancelled(&self, handle: TimerHandle) -> bool {
        self.cancelled.contains(&handle)
    }

    /// The delay requested by the most recent `schedule` call.
    pub fn last_scheduled_delay_ms(&self) -> Option<u64> {
        self.scheduled.last().map(|&(_, delay)| delay)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;

        let delay_ms = delay.as_millis() as u64;
        self.pending.push((handle, self.now_ms + delay_ms));
        self.scheduled.push((handle, delay_ms));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.retain(|&(h, _)| h != handle);
        self.cancelled.push(handle);
    }
}
