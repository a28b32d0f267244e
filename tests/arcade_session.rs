//! End-to-end session tests over paused tokio time.
//!
//! These drive the arcade the way a host would: actions through the
//! handle, state back through the watch channel, with the runtime's
//! mocked clock standing in for real delays.

use std::time::Duration;

use tokio::sync::watch;
use tokio_test::assert_ok;

use mini_arcade::games::reaction::ReactionGrade;
use mini_arcade::session::protocol::{ArcadeSnapshot, PlayerAction, ReactionView};
use mini_arcade::ArcadeSession;

/// Wait until a published snapshot satisfies `pred`.
async fn wait_for<F>(rx: &mut watch::Receiver<ArcadeSnapshot>, mut pred: F) -> ArcadeSnapshot
where
    F: FnMut(&ArcadeSnapshot) -> bool,
{
    loop {
        {
            let snapshot = rx.borrow();
            if pred(&snapshot) {
                return snapshot.clone();
            }
        }
        rx.changed().await.expect("session closed unexpectedly");
    }
}

#[tokio::test(start_paused = true)]
async fn click_rounds_score_taps_and_keep_the_high_score() {
    let (session, mut handle) = ArcadeSession::new(Some(7));
    let task = tokio::spawn(session.run());

    assert_ok!(handle.action_tx.send(PlayerAction::ClickStart).await);
    for _ in 0..7 {
        assert_ok!(handle.action_tx.send(PlayerAction::ClickTap).await);
    }

    // The ten countdown ticks elapse on the mocked clock.
    let snapshot = wait_for(&mut handle.snapshot_rx, |s| {
        s.click_speed.last_score == Some(7)
    })
    .await;
    assert_eq!(snapshot.click_speed.high_score, 7);
    assert_eq!(snapshot.click_speed.clicks_per_second, Some(0.7));

    // A slower second round keeps the earlier high score.
    assert_ok!(handle.action_tx.send(PlayerAction::ClickStart).await);
    for _ in 0..3 {
        assert_ok!(handle.action_tx.send(PlayerAction::ClickTap).await);
    }
    let snapshot = wait_for(&mut handle.snapshot_rx, |s| {
        s.click_speed.last_score == Some(3)
    })
    .await;
    assert_eq!(snapshot.click_speed.high_score, 7);

    drop(handle);
    assert_ok!(task.await);
}

#[tokio::test(start_paused = true)]
async fn premature_tap_never_produces_a_go_signal() {
    let (session, mut handle) = ArcadeSession::new(Some(11));
    let task = tokio::spawn(session.run());

    assert_ok!(handle.action_tx.send(PlayerAction::ReactionTap).await); // arm
    assert_ok!(handle.action_tx.send(PlayerAction::ReactionTap).await); // too early
    wait_for(&mut handle.snapshot_rx, |s| {
        s.reaction.phase == ReactionView::FalseStart
    })
    .await;

    // Far past where the armed timer would have fired: the cancelled
    // timer stays dead, so the phase never becomes Live.
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(
        handle.snapshot_rx.borrow().reaction.phase,
        ReactionView::FalseStart
    );

    assert_ok!(handle.action_tx.send(PlayerAction::ReactionTap).await);
    wait_for(&mut handle.snapshot_rx, |s| {
        s.reaction.phase == ReactionView::Idle
    })
    .await;

    drop(handle);
    assert_ok!(task.await);
}

#[tokio::test(start_paused = true)]
async fn reaction_round_measures_latency_on_the_session_clock() {
    let (session, mut handle) = ArcadeSession::new(Some(21));
    let task = tokio::spawn(session.run());

    assert_ok!(handle.action_tx.send(PlayerAction::ReactionTap).await);
    wait_for(&mut handle.snapshot_rx, |s| {
        s.reaction.phase == ReactionView::Armed
    })
    .await;

    // The mocked clock jumps straight to the arming deadline.
    wait_for(&mut handle.snapshot_rx, |s| {
        s.reaction.phase == ReactionView::Live
    })
    .await;

    tokio::time::advance(Duration::from_millis(180)).await;
    assert_ok!(handle.action_tx.send(PlayerAction::ReactionTap).await);
    let snapshot = wait_for(&mut handle.snapshot_rx, |s| {
        matches!(s.reaction.phase, ReactionView::Scored { .. })
    })
    .await;

    match snapshot.reaction.phase {
        ReactionView::Scored { latency_ms, grade } => {
            assert_eq!(latency_ms, 180);
            assert_eq!(grade, ReactionGrade::Amazing);
        }
        other => panic!("expected a scored phase, got {other:?}"),
    }
    assert_eq!(snapshot.reaction.best_ms, Some(180));

    drop(handle);
    assert_ok!(task.await);
}

#[tokio::test(start_paused = true)]
async fn mismatched_cards_hide_after_the_delay_and_reset_cancels_it() {
    let (session, mut handle) = ArcadeSession::new(Some(5));
    let task = tokio::spawn(session.run());

    let deck = handle.snapshot_rx.borrow().memory.cards.clone();
    let a = 0;
    let b = deck
        .iter()
        .position(|c| c.symbol != deck[a].symbol)
        .unwrap();

    assert_ok!(
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: a })
            .await
    );
    assert_ok!(
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: b })
            .await
    );
    wait_for(&mut handle.snapshot_rx, |s| {
        s.memory.cards[a].face_up && s.memory.cards[b].face_up
    })
    .await;

    // One millisecond short of the hide delay the pair is still showing.
    tokio::time::advance(Duration::from_millis(799)).await;
    assert!(handle.snapshot_rx.borrow().memory.cards[a].face_up);

    let snapshot = wait_for(&mut handle.snapshot_rx, |s| {
        s.memory.moves == 1 && !s.memory.cards[a].face_up && !s.memory.cards[b].face_up
    })
    .await;
    assert!(!snapshot.memory.solved);

    // Mismatch again, then reset mid-window: the hide timer is cancelled,
    // so nothing ever mutates the fresh board.
    assert_ok!(
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: a })
            .await
    );
    assert_ok!(
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: b })
            .await
    );
    assert_ok!(handle.action_tx.send(PlayerAction::MemoryNewGame).await);
    let snapshot = wait_for(&mut handle.snapshot_rx, |s| s.memory.moves == 0).await;
    assert!(snapshot.memory.cards.iter().all(|c| !c.face_up));

    let seq = snapshot.seq;
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(handle.snapshot_rx.borrow().seq, seq);

    drop(handle);
    assert_ok!(task.await);
}

#[tokio::test(start_paused = true)]
async fn matching_pair_locks_through_the_session() {
    let (session, mut handle) = ArcadeSession::new(Some(9));
    let task = tokio::spawn(session.run());

    let deck = handle.snapshot_rx.borrow().memory.cards.clone();
    let a = 0;
    let b = deck
        .iter()
        .enumerate()
        .position(|(i, c)| i != a && c.symbol == deck[a].symbol)
        .unwrap();

    assert_ok!(
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: a })
            .await
    );
    assert_ok!(
        handle
            .action_tx
            .send(PlayerAction::MemoryReveal { index: b })
            .await
    );
    let snapshot = wait_for(&mut handle.snapshot_rx, |s| s.memory.cards[a].matched).await;
    assert!(snapshot.memory.cards[b].matched);
    assert_eq!(snapshot.memory.moves, 1);

    drop(handle);
    assert_ok!(task.await);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_session() {
    let (session, handle) = ArcadeSession::new(Some(3));
    let task = tokio::spawn(session.run());

    // Leave a timer pending so shutdown also discards a live deadline.
    assert_ok!(handle.action_tx.send(PlayerAction::ReactionTap).await);

    drop(handle);
    assert_ok!(task.await);
}

#[tokio::test(start_paused = true)]
async fn snapshots_and_actions_speak_tagged_json() {
    let (session, handle) = ArcadeSession::new(Some(1));
    let task = tokio::spawn(session.run());

    let value: serde_json::Value =
        serde_json::to_value(handle.snapshot_rx.borrow().clone()).unwrap();
    assert_eq!(value["memory"]["cards"].as_array().unwrap().len(), 16);
    assert_eq!(value["reaction"]["phase"]["phase"], "idle");
    assert_eq!(value["click_speed"]["remaining_secs"], 10);

    let action: PlayerAction =
        serde_json::from_str(r#"{"type":"memory_reveal","index":3}"#).unwrap();
    assert!(matches!(action, PlayerAction::MemoryReveal { index: 3 }));
    let action: PlayerAction = serde_json::from_str(r#"{"type":"reaction_tap"}"#).unwrap();
    assert!(matches!(action, PlayerAction::ReactionTap));

    drop(handle);
    assert_ok!(task.await);
}
