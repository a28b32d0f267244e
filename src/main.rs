//! Mini Arcade demo driver
//!
//! Boots an arcade session and plays a scripted pass through all three
//! games: a click-speed round, a reaction round (with a deliberate false
//! start), and a full memory-board solve. This is a headless host
//! exercising the engines end to end, not a user interface.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_arcade::config::Config;
use mini_arcade::session::protocol::{ArcadeSnapshot, CardView, PlayerAction, ReactionView};
use mini_arcade::session::{ArcadeSession, SessionHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    info!("Starting mini arcade demo");

    let (session, handle) = ArcadeSession::new(config.seed);
    let session_task = tokio::spawn(session.run());

    tokio::select! {
        result = exhibition(handle.clone()) => result?,
        _ = shutdown_signal() => info!("Interrupted, shutting down"),
    }

    // Detach the host; the session discards pending timers and exits.
    drop(handle);
    session_task.await?;

    info!("Demo complete");
    Ok(())
}

/// Scripted playthrough of all three games.
async fn exhibition(mut handle: SessionHandle) -> anyhow::Result<()> {
    click_speed_leg(&mut handle).await?;
    reaction_leg(&mut handle).await?;
    memory_leg(&mut handle).await?;

    let closing = handle.snapshot_rx.borrow().clone();
    println!("{}", serde_json::to_string_pretty(&closing)?);
    Ok(())
}

async fn click_speed_leg(handle: &mut SessionHandle) -> anyhow::Result<()> {
    info!("Click speed: starting a 10 second round");
    handle.action_tx.send(PlayerAction::ClickStart).await?;

    // A steady ~6.5 clicks/second burst, finishing before the timer does.
    for _ in 0..42 {
        handle.action_tx.send(PlayerAction::ClickTap).await?;
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    let snapshot = wait_for(&mut handle.snapshot_rx, |s| {
        s.click_speed.last_score.is_some()
    })
    .await?;
    info!(
        score = snapshot.click_speed.last_score,
        clicks_per_second = snapshot.click_speed.clicks_per_second,
        high_score = snapshot.click_speed.high_score,
        "Click round finished"
    );
    Ok(())
}

async fn reaction_leg(handle: &mut SessionHandle) -> anyhow::Result<()> {
    info!("Reaction: tapping early on purpose");
    handle.action_tx.send(PlayerAction::ReactionTap).await?; // arm
    handle.action_tx.send(PlayerAction::ReactionTap).await?; // too early
    wait_for(&mut handle.snapshot_rx, |s| {
        s.reaction.phase == ReactionView::FalseStart
    })
    .await?;
    info!("False start registered, the armed timer is gone");
    handle.action_tx.send(PlayerAction::ReactionTap).await?; // back to idle

    info!("Reaction: armed for real, waiting for the go signal");
    handle.action_tx.send(PlayerAction::ReactionTap).await?;
    wait_for(&mut handle.snapshot_rx, |s| {
        s.reaction.phase == ReactionView::Live
    })
    .await?;

    handle.action_tx.send(PlayerAction::ReactionTap).await?;
    let snapshot = wait_for(&mut handle.snapshot_rx, |s| {
        matches!(s.reaction.phase, ReactionView::Scored { .. })
    })
    .await?;
    if let ReactionView::Scored { latency_ms, grade } = snapshot.reaction.phase {
        info!(
            latency_ms,
            ?grade,
            best_ms = snapshot.reaction.best_ms,
            "Reaction scored"
        );
    }
    handle.action_tx.send(PlayerAction::ReactionTap).await?; // reset
    Ok(())
}

async fn memory_leg(handle: &mut SessionHandle) -> anyhow::Result<()> {
    info!("Memory: one mismatch, then solving the board");
    let snapshot = handle.snapshot_rx.borrow().clone();
    let pairs = pair_up(&snapshot.memory.cards);

    // First cards of two different pairs: guaranteed mismatch.
    let (a, _) = pairs[0];
    let (b, _) = pairs[1];
    handle
        .action_tx
        .send(PlayerAction::MemoryReveal { index: a })
        .await?;
    handle
        .action_tx
        .send(PlayerAction::MemoryReveal { index: b })
        .await?;
    wait_for(&mut handle.snapshot_rx, |s| {
        s.memory.moves == 1 && !s.memory.cards[a].face_up && !s.memory.cards[b].face_up
    })
    .await?;
    info!("Mismatched pair flipped back down");

    for (first, second) in pairs {
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: first })
            .await?;
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: second })
            .await?;
    }
    let snapshot = wait_for(&mut handle.snapshot_rx, |s| s.memory.solved).await?;
    info!(moves = snapshot.memory.moves, "Board solved");
    Ok(())
}

/// Pair up card indices by symbol.
fn pair_up(cards: &[CardView]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut used = vec![false; cards.len()];
    for i in 0..cards.len() {
        if used[i] {
            continue;
        }
        for j in i + 1..cards.len() {
            if !used[j] && cards[j].symbol == cards[i].symbol {
                pairs.push((i, j));
                used[i] = true;
                used[j] = true;
                break;
            }
        }
    }
    pairs
}

/// Wait until a published snapshot satisfies `pred`.
async fn wait_for<F>(
    rx: &mut watch::Receiver<ArcadeSnapshot>,
    mut pred: F,
) -> anyhow::Result<ArcadeSnapshot>
where
    F: FnMut(&ArcadeSnapshot) -> bool,
{
    loop {
        {
            let snapshot = rx.borrow();
            if pred(&snapshot) {
                return Ok(snapshot.clone());
            }
        }
        rx.changed().await?;
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown on ctrl-c
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}
