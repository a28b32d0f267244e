//! Arcade session: the host task that mounts all three games
//!
//! A session is what one page visit gets: the engines side by side, an
//! action channel in, a snapshot channel out. The session task is the only
//! place engine state is touched, which gives the strictly-ordered,
//! single-threaded event model the engines assume.

pub mod protocol;

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::games::{ClickSpeedGame, MemoryGame, ReactionGame};
use crate::session::protocol::{ArcadeSnapshot, PlayerAction};
use crate::util::time::{Clock, TimerHandle};

/// Tokio-backed [`Clock`] owned by the session task.
///
/// Scheduling only records a deadline; the run loop sleeps until the
/// earliest one and delivers whatever came due. Dropping the clock drops
/// every pending timer with it.
struct SessionClock {
    origin: Instant,
    next_handle: u64,
    /// (handle, absolute deadline)
    pending: Vec<(TimerHandle, Instant)>,
}

impl SessionClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            next_handle: 0,
            pending: Vec::new(),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|&(_, at)| at).min()
    }

    /// Remove and return everything due at `now`, in deadline order.
    fn take_due(&mut self, now: Instant) -> Vec<TimerHandle> {
        let mut due: Vec<(TimerHandle, Instant)> = Vec::new();
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
}

impl Clock for SessionClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn schedule(&mut self, delay: Duration) -> TimerHandle {
        let handle = TimerHandle::new(self.next_handle);
        self.next_handle += 1;
        self.pending.push((handle, Instant::now() + delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.retain(|&(h, _)| h != handle);
    }
}

/// Handle held by the host while the session runs.
///
/// Dropping the last clone of `action_tx` closes the channel and shuts the
/// session down.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub action_tx: mpsc::Sender<PlayerAction>,
    pub snapshot_rx: watch::Receiver<ArcadeSnapshot>,
}

/// One visitor's arcade: all three engines plus their shared event loop.
pub struct ArcadeSession {
    id: Uuid,
    clock: SessionClock,
    memory: MemoryGame,
    reaction: ReactionGame,
    click_speed: ClickSpeedGame,
    action_rx: mpsc::Receiver<PlayerAction>,
    snapshot_tx: watch::Sender<ArcadeSnapshot>,
    seq: u64,
}

impl ArcadeSession {
    /// Create a session and the handle its host keeps.
    ///
    /// `seed` makes shuffles and arming delays reproducible; `None` seeds
    /// from entropy.
    pub fn new(seed: Option<u64>) -> (Self, SessionHandle) {
        let id = Uuid::new_v4();
        let seed = seed.unwrap_or_else(rand::random);
        let mut root = ChaCha8Rng::seed_from_u64(seed);

        let memory = MemoryGame::new(root.gen());
        let reaction = ReactionGame::new(root.gen());
        let click_speed = ClickSpeedGame::new();

        let (action_tx, action_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(ArcadeSnapshot {
            seq: 0,
            memory: memory.view(),
            reaction: reaction.view(),
            click_speed: click_speed.view(),
        });

        info!(session_id = %id, seed, "arcade session created");

        let session = Self {
            id,
            clock: SessionClock::new(),
            memory,
            reaction,
            click_speed,
            action_rx,
            snapshot_tx,
            seq: 0,
        };
        let handle = SessionHandle {
            id,
            action_tx,
            snapshot_rx,
        };
        (session, handle)
    }

    /// Run the event loop until the host drops its handle.
    pub async fn run(mut self) {
        info!(session_id = %self.id, "arcade session started");

        loop {
            let deadline = self.clock.next_deadline();

            tokio::select! {
                action = self.action_rx.recv() => match action {
                    Some(action) => self.dispatch(action),
                    None => {
                        info!(session_id = %self.id, "host detached");
                        break;
                    }
                },
                _ = sleep_until_or_forever(deadline) => self.fire_due(),
            }

            self.publish();
        }

        // Whatever is still pending belongs to games nobody is watching.
        let dropped = self.clock.pending.len();
        if dropped > 0 {
            debug!(session_id = %self.id, dropped, "discarding pending timers");
        }
        info!(session_id = %self.id, "arcade session closed");
    }

    fn dispatch(&mut self, action: PlayerAction) {
        debug!(session_id = %self.id, ?action, "player action");
        match action {
            PlayerAction::MemoryReveal { index } => self.memory.reveal(&mut self.clock, index),
            PlayerAction::MemoryNewGame => self.memory.new_game(&mut self.clock),
            PlayerAction::ReactionTap => self.reaction.tap(&mut self.clock),
            PlayerAction::ClickStart => self.click_speed.start(&mut self.clock),
            PlayerAction::ClickTap => self.click_speed.tap(),
        }
    }

    /// Deliver every timer that reached its deadline.
    ///
    /// Handles are unique per session and engines ignore handles they do
    /// not carry, so each one is simply offered to all three games.
    fn fire_due(&mut self) {
        for handle in self.clock.take_due(Instant::now()) {
            self.memory.on_timer(&mut self.clock, handle);
            self.reaction.on_timer(&mut self.clock, handle);
            self.click_speed.on_timer(&mut self.clock, handle);
        }
    }

    fn publish(&mut self) {
        self.seq += 1;
        let snapshot = ArcadeSnapshot {
            seq: self.seq,
            memory: self.memory.view(),
            reaction: self.reaction.view(),
            click_speed: self.click_speed.view(),
        };
        let _ = self.snapshot_tx.send(snapshot);
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
