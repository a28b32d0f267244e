//! Action and snapshot types exchanged with the host
//! These are the only types a rendering layer needs to drive the arcade.

use serde::{Deserialize, Serialize};

use crate::games::memory::Symbol;
use crate::games::reaction::ReactionGrade;

/// Player interactions, dispatched to the owning engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Flip the memory card at `index` face-up
    MemoryReveal { index: usize },

    /// Deal a fresh memory board
    MemoryNewGame,

    /// The reaction game's single input: start, false-start, score, or
    /// reset depending on the current phase
    ReactionTap,

    /// Begin a click-speed round
    ClickStart,

    /// Count one click-speed tap
    ClickTap,
}

/// One memory card as the renderer sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardView {
    pub id: u8,
    /// Face symbol; present even while face-down, as the renderer owns the
    /// flip animation
    pub symbol: Symbol,
    /// Showing its face (true for matched cards until the next reset)
    pub face_up: bool,
    pub matched: bool,
}

/// Memory game snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryView {
    pub cards: Vec<CardView>,
    /// Resolved attempts so far, matched or not
    pub moves: u32,
    pub solved: bool,
}

/// Reaction game phase as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReactionView {
    /// Waiting for the player to start a round
    Idle,
    /// Random delay counting down; tapping now is a false start
    Armed,
    /// Go signal showing
    Live,
    /// Round complete
    Scored {
        latency_ms: u64,
        grade: ReactionGrade,
    },
    /// Tapped before the go signal
    FalseStart,
}

/// Reaction game snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionPanel {
    pub phase: ReactionView,
    /// Fastest reaction this session
    pub best_ms: Option<u64>,
}

/// Click speed snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickSpeedView {
    pub running: bool,
    pub clicks: u32,
    pub remaining_secs: u32,
    /// Score of the last completed round, cleared on restart
    pub last_score: Option<u32>,
    /// Throughput of the last completed round
    pub clicks_per_second: Option<f32>,
    pub high_score: u32,
}

/// Full arcade state published after every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcadeSnapshot {
    /// Monotonic publication counter for staleness checks
    pub seq: u64,
    pub memory: MemoryView,
    pub reaction: ReactionPanel,
    pub click_speed: ClickSpeedView,
}
