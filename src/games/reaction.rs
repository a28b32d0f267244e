//! Reaction timer engine
//!
//! Measures the delay between the go signal and the player's tap. A tap
//! before the signal is a false start, and the armed timer must be
//! cancelled so it cannot fire into a later round.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::session::protocol::{ReactionPanel, ReactionView};
use crate::util::time::{Clock, TimerHandle};

/// Bounds for the random arming delay, in milliseconds.
pub const ARM_DELAY_MIN_MS: u64 = 2000;
pub const ARM_DELAY_MAX_MS: u64 = 5000;

/// Qualitative rating of a scored reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionGrade {
    Amazing,
    Great,
    Good,
}

impl ReactionGrade {
    pub fn for_latency(latency_ms: u64) -> Self {
        if latency_ms < 250 {
            ReactionGrade::Amazing
        } else if latency_ms < 350 {
            ReactionGrade::Great
        } else {
            ReactionGrade::Good
        }
    }
}

/// Round phase. The armed timer handle lives in its variant, so an armed
/// phase without a pending timer cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionPhase {
    Idle,
    /// Counting down the random delay before the go signal.
    Armed { timer: TimerHandle },
    /// Go signal shown; waiting for the player's tap.
    Live { since_ms: u64 },
    Scored { latency_ms: u64 },
    FalseStart,
}

/// Authoritative reaction game state.
pub struct ReactionGame {
    phase: ReactionPhase,
    /// Fastest reaction this session; survives round resets.
    best_ms: Option<u64>,
    rng: ChaCha8Rng,
}

impl ReactionGame {
    pub fn new(seed: u64) -> Self {
        Self {
            phase: ReactionPhase::Idle,
            best_ms: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The single input. What it does depends on the current phase: start a
    /// round, false-start, score the reaction, or return to idle.
    pub fn tap(&mut self, clock: &mut impl Clock) {
        self.phase = match self.phase {
            ReactionPhase::Idle => {
                let delay_ms = self.rng.gen_range(ARM_DELAY_MIN_MS..ARM_DELAY_MAX_MS);
                let timer = clock.schedule(Duration::from_millis(delay_ms));
                debug!(delay_ms, "reaction round armed");
                ReactionPhase::Armed { timer }
            }
            ReactionPhase::Armed { timer } => {
                // Tap before the go signal. The timer belongs to a round
                // that no longer exists and must not fire later.
                clock.cancel(timer);
                debug!("false start");
                ReactionPhase::FalseStart
            }
            ReactionPhase::Live { since_ms } => {
                let latency_ms = clock.now_ms().saturating_sub(since_ms);
                let improved = self.best_ms.map_or(true, |best| latency_ms < best);
                if improved {
                    self.best_ms = Some(latency_ms);
                    info!(latency_ms, "new best reaction time");
                } else {
                    debug!(latency_ms, "reaction scored");
                }
                ReactionPhase::Scored { latency_ms }
            }
            ReactionPhase::Scored { .. } | ReactionPhase::FalseStart => ReactionPhase::Idle,
        };
    }

    /// Arming-timer expiry: show the go signal and start timing.
    ///
    /// Only honored while armed with exactly this handle; anything else is
    /// a stale timer and ignored.
    pub fn on_timer(&mut self, clock: &mut impl Clock, fired: TimerHandle) {
        if let ReactionPhase::Armed { timer } = self.phase {
            if timer == fired {
                self.phase = ReactionPhase::Live {
                    since_ms: clock.now_ms(),
                };
            }
        }
    }

    pub fn phase(&self) -> ReactionPhase {
        self.phase
    }

    pub fn best_ms(&self) -> Option<u64> {
        self.best_ms
    }

    pub fn view(&self) -> ReactionPanel {
        let phase = match self.phase {
            ReactionPhase::Idle => ReactionView::Idle,
            ReactionPhase::Armed { .. } => ReactionView::Armed,
            ReactionPhase::Live { .. } => ReactionView::Live,
            ReactionPhase::Scored { latency_ms } => ReactionView::Scored {
                latency_ms,
                grade: ReactionGrade::for_latency(latency_ms),
            },
            ReactionPhase::FalseStart => ReactionView::FalseStart,
        };
        ReactionPanel {
            phase,
            best_ms: self.best_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::ManualClock;

    fn run_timers(game: &mut ReactionGame, clock: &mut ManualClock, ms: u64) {
        for handle in clock.advance(ms) {
            game.on_timer(clock, handle);
        }
    }

    /// Drive one full round ending with a tap `latency_ms` after the go
    /// signal.
    fn play_round(game: &mut ReactionGame, clock: &mut ManualClock, latency_ms: u64) -> u64 {
        game.tap(clock);
        let delay = clock.last_scheduled_delay_ms().unwrap();
        run_timers(game, clock, delay);
        assert!(matches!(game.phase(), ReactionPhase::Live { .. }));

        clock.advance(latency_ms);
        game.tap(clock);
        match game.phase() {
            ReactionPhase::Scored { latency_ms } => {
                game.tap(clock); // back to idle
                latency_ms
            }
            other => panic!("expected scored phase, got {other:?}"),
        }
    }

    #[test]
    fn arming_delay_stays_in_range() {
        let mut game = ReactionGame::new(11);
        let mut clock = ManualClock::new();

        for _ in 0..50 {
            game.tap(&mut clock); // arm
            let delay = clock.last_scheduled_delay_ms().unwrap();
            assert!((ARM_DELAY_MIN_MS..ARM_DELAY_MAX_MS).contains(&delay));
            game.tap(&mut clock); // false start
            game.tap(&mut clock); // idle
        }
    }

    #[test]
    fn premature_tap_false_starts_and_cancels_the_timer() {
        let mut game = ReactionGame::new(2);
        let mut clock = ManualClock::new();

        game.tap(&mut clock);
        let ReactionPhase::Armed { timer } = game.phase() else {
            panic!("expected armed phase");
        };

        clock.advance(500);
        game.tap(&mut clock);
        assert_eq!(game.phase(), ReactionPhase::FalseStart);
        assert!(clock.was_cancelled(timer));

        // Even long after the original deadline nothing fires, so the go
        // signal never appears.
        run_timers(&mut game, &mut clock, ARM_DELAY_MAX_MS * 2);
        assert_eq!(game.phase(), ReactionPhase::FalseStart);

        game.tap(&mut clock);
        assert_eq!(game.phase(), ReactionPhase::Idle);
    }

    #[test]
    fn tap_after_go_signal_scores_the_latency() {
        let mut game = ReactionGame::new(3);
        let mut clock = ManualClock::new();

        let latency = play_round(&mut game, &mut clock, 217);
        assert_eq!(latency, 217);
        assert_eq!(game.best_ms(), Some(217));
        assert_eq!(game.phase(), ReactionPhase::Idle);
    }

    #[test]
    fn best_time_never_gets_worse() {
        let mut game = ReactionGame::new(4);
        let mut clock = ManualClock::new();

        play_round(&mut game, &mut clock, 300);
        assert_eq!(game.best_ms(), Some(300));

        play_round(&mut game, &mut clock, 180);
        assert_eq!(game.best_ms(), Some(180));

        play_round(&mut game, &mut clock, 260);
        assert_eq!(game.best_ms(), Some(180));
    }

    #[test]
    fn stale_timer_handle_is_ignored() {
        let mut game = ReactionGame::new(5);
        let mut clock = ManualClock::new();

        game.on_timer(&mut clock, crate::util::time::TimerHandle::new(77));
        assert_eq!(game.phase(), ReactionPhase::Idle);

        // A fresh round's timer is a different handle; an old one does not
        // trigger the go signal.
        game.tap(&mut clock);
        game.on_timer(&mut clock, crate::util::time::TimerHandle::new(77));
        assert!(matches!(game.phase(), ReactionPhase::Armed { .. }));
    }

    #[test]
    fn grades_follow_latency_thresholds() {
        assert_eq!(ReactionGrade::for_latency(120), ReactionGrade::Amazing);
        assert_eq!(ReactionGrade::for_latency(249), ReactionGrade::Amazing);
        assert_eq!(ReactionGrade::for_latency(250), ReactionGrade::Great);
        assert_eq!(ReactionGrade::for_latency(349), ReactionGrade::Great);
        assert_eq!(ReactionGrade::for_latency(350), ReactionGrade::Good);
        assert_eq!(ReactionGrade::for_latency(800), ReactionGrade::Good);
    }
}
