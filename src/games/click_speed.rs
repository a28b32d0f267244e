//! Click speed engine
//!
//! Counts taps inside a fixed 10-second window. The countdown runs on a
//! re-armed one-shot tick, so the engine holds at most one timer like the
//! other games.

use std::time::Duration;

use tracing::info;

use crate::session::protocol::ClickSpeedView;
use crate::util::time::{Clock, TimerHandle};

/// Length of one round, in seconds.
pub const ROUND_SECS: u32 = 10;

const TICK_MS: u64 = 1000;

/// Round phase. Clicks and the tick timer only exist while running, so a
/// stopped round with a live countdown cannot be constructed.
#[derive(Debug, Clone, Copy)]
enum RoundPhase {
    Idle,
    Running {
        clicks: u32,
        remaining_secs: u32,
        tick: TimerHandle,
    },
    Finished {
        score: u32,
    },
}

/// Authoritative click speed state.
pub struct ClickSpeedGame {
    phase: RoundPhase,
    /// Best completed round this session; survives restarts.
    high_score: u32,
}

impl ClickSpeedGame {
    pub fn new() -> Self {
        Self {
            phase: RoundPhase::Idle,
            high_score: 0,
        }
    }

    /// Begin a round. Ignored while one is already running.
    pub fn start(&mut self, clock: &mut impl Clock) {
        if matches!(self.phase, RoundPhase::Running { .. }) {
            return;
        }
        self.phase = RoundPhase::Running {
            clicks: 0,
            remaining_secs: ROUND_SECS,
            tick: clock.schedule(Duration::from_millis(TICK_MS)),
        };
    }

    /// Count a tap. Taps outside a running round are no-ops.
    pub fn tap(&mut self) {
        if let RoundPhase::Running { clicks, .. } = &mut self.phase {
            *clicks += 1;
        }
    }

    /// Countdown tick: decrement the clock, finish the round at zero,
    /// otherwise re-arm for the next second. Stale handles are ignored.
    pub fn on_timer(&mut self, clock: &mut impl Clock, fired: TimerHandle) {
        let RoundPhase::Running {
            clicks,
            remaining_secs,
            tick,
        } = self.phase
        else {
            return;
        };
        if tick != fired {
            return;
        }

        let remaining_secs = remaining_secs - 1;
        if remaining_secs == 0 {
            self.high_score = self.high_score.max(clicks);
            info!(
                score = clicks,
                high_score = self.high_score,
                "click round finished"
            );
            self.phase = RoundPhase::Finished { score: clicks };
        } else {
            self.phase = RoundPhase::Running {
                clicks,
                remaining_secs,
                tick: clock.schedule(Duration::from_millis(TICK_MS)),
            };
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, RoundPhase::Running { .. })
    }

    /// Score of the most recent completed round, cleared by `start`.
    pub fn last_score(&self) -> Option<u32> {
        match self.phase {
            RoundPhase::Finished { score } => Some(score),
            _ => None,
        }
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn view(&self) -> ClickSpeedView {
        match self.phase {
            RoundPhase::Idle => ClickSpeedView {
                running: false,
                clicks: 0,
                remaining_secs: ROUND_SECS,
                last_score: None,
                clicks_per_second: None,
                high_score: self.high_score,
            },
            RoundPhase::Running {
                clicks,
                remaining_secs,
                ..
            } => ClickSpeedView {
                running: true,
                clicks,
                remaining_secs,
                last_score: None,
                clicks_per_second: None,
                high_score: self.high_score,
            },
            RoundPhase::Finished { score } => ClickSpeedView {
                running: false,
                clicks: score,
                remaining_secs: 0,
                last_score: Some(score),
                clicks_per_second: Some(score as f32 / ROUND_SECS as f32),
                high_score: self.high_score,
            },
        }
    }
}

impl Default for ClickSpeedGame {
    fn default() -> Self {
        Self::new()
    }
}
