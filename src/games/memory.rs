//! Memory match engine
//!
//! A 16-card board where the player reveals two cards per turn and keeps
//! matched pairs face-up. A mismatched pair stays visible for a short delay,
//! then flips back down.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::session::protocol::{CardView, MemoryView};
use crate::util::time::{Clock, TimerHandle};

/// Number of cards on the board (eight pairs).
pub const DECK_SIZE: usize = 16;

/// How long a mismatched pair stays face-up, in milliseconds.
pub const MISMATCH_HIDE_MS: u64 = 800;

/// Card faces; each appears exactly twice in a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    Rocket,
    Laptop,
    Bolt,
    Palette,
    Flame,
    Bulb,
    Target,
    Star,
}

impl Symbol {
    pub const ALL: [Symbol; 8] = [
        Symbol::Rocket,
        Symbol::Laptop,
        Symbol::Bolt,
        Symbol::Palette,
        Symbol::Flame,
        Symbol::Bulb,
        Symbol::Target,
        Symbol::Star,
    ];
}

/// One card on the board.
///
/// A matched card keeps `revealed` set until the next reset, so `revealed`
/// alone decides whether the face is showing.
#[derive(Debug, Clone, Copy)]
pub struct Card {
    pub id: u8,
    pub symbol: Symbol,
    pub revealed: bool,
    pub matched: bool,
}

/// Progress within the current attempt.
#[derive(Debug, Clone, Copy)]
enum Turn {
    /// Zero or one card face-up, waiting for the player's next pick.
    Picking { first: Option<usize> },
    /// A mismatched pair stays face-up until the hide timer fires.
    Mismatch {
        first: usize,
        second: usize,
        hide: TimerHandle,
    },
}

/// Authoritative memory game state.
pub struct MemoryGame {
    deck: Vec<Card>,
    turn: Turn,
    moves: u32,
    solved: bool,
    rng: ChaCha8Rng,
}

impl MemoryGame {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let deck = Self::shuffled_deck(&mut rng);
        Self {
            deck,
            turn: Turn::Picking { first: None },
            moves: 0,
            solved: false,
            rng,
        }
    }

    /// Deal a fresh board: eight symbols duplicated, then a Fisher-Yates
    /// shuffle so every ordering of the 16 cards is equally likely.
    fn shuffled_deck(rng: &mut ChaCha8Rng) -> Vec<Card> {
        let mut symbols: Vec<Symbol> = Symbol::ALL
            .iter()
            .chain(Symbol::ALL.iter())
            .copied()
            .collect();
        symbols.shuffle(rng);

        symbols
            .into_iter()
            .enumerate()
            .map(|(i, symbol)| Card {
                id: i as u8,
                symbol,
                revealed: false,
                matched: false,
            })
            .collect()
    }

    /// Reset to a freshly shuffled board, discarding all progress.
    ///
    /// A pending hide timer belongs to the board being thrown away and is
    /// cancelled so it cannot flip cards on the new one.
    pub fn new_game(&mut self, clock: &mut impl Clock) {
        if let Turn::Mismatch { hide, .. } = self.turn {
            clock.cancel(hide);
        }
        self.deck = Self::shuffled_deck(&mut self.rng);
        self.turn = Turn::Picking { first: None };
        self.moves = 0;
        self.solved = false;
    }

    /// Flip the card at `index` face-up.
    ///
    /// Ignored while a mismatched pair is showing, and for cards that are
    /// out of range, already face-up, or already matched.
    pub fn reveal(&mut self, clock: &mut impl Clock, index: usize) {
        let Some(card) = self.deck.get(index) else {
            return;
        };
        if card.revealed || card.matched {
            return;
        }

        match self.turn {
            Turn::Mismatch { .. } => {}
            Turn::Picking { first: None } => {
                self.deck[index].revealed = true;
                self.turn = Turn::Picking { first: Some(index) };
            }
            Turn::Picking { first: Some(first) } => {
                self.deck[index].revealed = true;
                self.moves += 1;

                if self.deck[first].symbol == self.deck[index].symbol {
                    self.deck[first].matched = true;
                    self.deck[index].matched = true;
                    self.turn = Turn::Picking { first: None };

                    self.solved = self.deck.iter().all(|c| c.matched);
                    if self.solved {
                        info!(moves = self.moves, "memory board solved");
                    }
                } else {
                    let hide = clock.schedule(Duration::from_millis(MISMATCH_HIDE_MS));
                    self.turn = Turn::Mismatch {
                        first,
                        second: index,
                        hide,
                    };
                }
            }
        }
    }

    /// Hide-timer expiry: flip the mismatched pair back down.
    ///
    /// Handles that do not match the pending hide timer are stale and
    /// ignored.
    pub fn on_timer(&mut self, _clock: &mut impl Clock, fired: TimerHandle) {
        if let Turn::Mismatch {
            first,
            second,
            hide,
        } = self.turn
        {
            if hide == fired {
                self.deck[first].revealed = false;
                self.deck[second].revealed = false;
                self.turn = Turn::Picking { first: None };
            }
        }
    }

    pub fn deck(&self) -> &[Card] {
        &self.deck
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Indices currently picked this attempt, in pick order.
    pub fn selection(&self) -> Vec<usize> {
        match self.turn {
            Turn::Picking { first: None } => vec![],
            Turn::Picking { first: Some(i) } => vec![i],
            Turn::Mismatch { first, second, .. } => vec![first, second],
        }
    }

    pub fn view(&self) -> MemoryView {
        MemoryView {
            cards: self
                .deck
                .iter()
                .map(|c| CardView {
                    id: c.id,
                    symbol: c.symbol,
                    face_up: c.revealed,
                    matched: c.matched,
                })
                .collect(),
            moves: self.moves,
            solved: self.solved,
        }
    }
}
