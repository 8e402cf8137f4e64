//! Battle lifecycle tests
//!
//! Drive the whole engine (admission worker, orchestration, watchdog, lock
//! service) over the in-memory store with a scripted protocol client. All
//! tests run on a paused clock so timeouts elapse instantly.

use std::time::Duration;

use arena_api::{AgentMessage, BattleEventRequest};
use arena_core::{ArenaError, BattleOutcome, BattleState, DRAW, SYSTEM_REPORTER};
use arena_test_utils::{assert_rating, assert_released, green_agent, green_agent_with_roles, red_agent, AgentStatus, DEFAULT_RATING};

#[path = "support/engine.rs"]
mod engine;

use engine::{test_config, Call, TestArena};

fn result(winner: &str) -> BattleEventRequest {
    BattleEventRequest {
        is_result: true,
        message: Some("game over".to_string()),
        detail: Some(serde_json::json!({"score": [3, 1]})),
        winner: Some(winner.to_string()),
        timestamp: None,
        reported_by: Some("green_agent".to_string()),
    }
}

/// Wait until the green agent received the kickoff message.
async fn wait_for_kickoff(arena: &TestArena, green: &arena_core::Agent) {
    for _ in 0..2_000 {
        let kicked_off = arena
            .client
            .messages_to(green)
            .iter()
            .any(|m| matches!(m, AgentMessage::BattleStart(_)));
        if kicked_off {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("battle was never kicked off");
}

// ============================================================================
// SCENARIO A: HAPPY PATH TO RUNNING
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_a_battle_runs_with_both_agents_locked() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    assert_eq!(view.battle.state, BattleState::Queued);
    assert_eq!(view.queue_position, Some(1));

    let battle_id = view.battle.battle_id;
    wait_for_kickoff(&arena, &green).await;

    let battle = arena.battle(battle_id).await;
    assert_eq!(battle.state, BattleState::Running);
    assert_eq!(arena.agent(&green).await.status, AgentStatus::Locked);
    assert_eq!(arena.agent(&red).await.status, AgentStatus::Locked);

    // Both launchers were reset, green first
    assert_eq!(arena.client.resets(), vec![green.agent_id, red.agent_id]);

    // Everyone got battle info; only green got the kickoff
    let red_messages = arena.client.messages_to(&red);
    assert_eq!(red_messages.len(), 1);
    match &red_messages[0] {
        AgentMessage::BattleInfo(info) => {
            assert_eq!(info.agent_name, "red");
            assert_eq!(info.battle_id, battle_id);
            assert_eq!(info.backend_url, "http://arena.test");
        }
        other => panic!("unexpected message {:?}", other),
    }

    let kickoff = arena
        .client
        .messages_to(&green)
        .into_iter()
        .find_map(|m| match m {
            AgentMessage::BattleStart(start) => Some(start),
            _ => None,
        })
        .expect("kickoff sent");
    assert_eq!(kickoff.green_battle_context.agent_name, "green_agent");
    assert_eq!(
        kickoff.green_battle_context.task_config,
        Some(green.register_info.task_config.clone())
    );
    assert_eq!(kickoff.opponent_infos.len(), 1);
    assert_eq!(kickoff.opponent_infos[0].agent_id, red.agent_id);
    assert_eq!(
        kickoff.red_battle_contexts[&red.register_info.agent_url].agent_name,
        "red"
    );

    // System notices were mirrored into the interaction log
    assert!(battle
        .interact_history
        .iter()
        .any(|e| e.reported_by == SYSTEM_REPORTER && e.message == "Battle started"));
}

// ============================================================================
// SCENARIO B: LOCKED OPPONENT REJECTED
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_b_locked_opponent_is_rejected() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let mut red = red_agent("red-1");
    red.lock();
    arena.register(&[&green, &red]).await;

    let err = arena
        .submit(&green, &[("red", &red)])
        .await
        .expect_err("locked opponent");
    assert_eq!(err, ArenaError::AgentNotUnlocked { agent_id: red.agent_id });

    assert!(arena.store().battle_list().await.expect("list").is_empty());
    assert!(arena.state.queue.is_empty().await);
}

// ============================================================================
// SCENARIO C: READY TIMEOUT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_c_ready_timeout_ends_in_error() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;
    arena.client.never_ready(&red);

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle = arena.wait_for(view.battle.battle_id, BattleState::Error).await;

    let reason = battle.error.expect("failure reason");
    assert!(reason.contains("not ready"), "reason was {}", reason);
    assert!(battle.result.is_none());

    let red_after = arena.agent(&red).await;
    assert_released(&red_after);
    assert_eq!(red_after.elo.stats.errors, 1);
    assert_eq!(red_after.elo.stats.total_battles, 1);
    assert_rating(&red_after, DEFAULT_RATING);

    let green_after = arena.agent(&green).await;
    assert_released(&green_after);
    assert_eq!(green_after.elo.stats.errors, 1);

    // No kickoff after a failed ready wait
    assert!(arena
        .client
        .messages_to(&green)
        .iter()
        .all(|m| !matches!(m, AgentMessage::BattleStart(_))));
}

// ============================================================================
// SCENARIO D: WATCHDOG TIMEOUT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_d_watchdog_settles_as_draw() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle = arena.wait_for(view.battle.battle_id, BattleState::Finished).await;

    let result = battle.result.expect("result");
    assert_eq!(result.winner, DRAW);
    assert_eq!(result.detail["reason"], "timeout");

    let red_after = arena.agent(&red).await;
    assert_released(&red_after);
    assert_rating(&red_after, DEFAULT_RATING);
    assert_eq!(red_after.elo.stats.draws, 1);
    assert_eq!(red_after.elo.battle_history.len(), 1);
    assert_eq!(red_after.elo.battle_history[0].elo_change, 0);

    let green_after = arena.agent(&green).await;
    assert_released(&green_after);
    assert_eq!(green_after.elo.rating, None);
    assert_eq!(green_after.elo.battle_history[0].result, BattleOutcome::Draw);
}

#[tokio::test(start_paused = true)]
async fn green_declared_timeout_overrides_default() {
    let arena = TestArena::new(test_config());
    let mut green = green_agent();
    green.register_info.battle_timeout_seconds = Some(5);
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    wait_for_kickoff(&arena, &green).await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    let battle = arena.battle(view.battle.battle_id).await;
    assert_eq!(battle.state, BattleState::Finished);
}

// ============================================================================
// SCENARIO E: SETTLEMENT BEATS THE WATCHDOG
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_e_settlement_before_watchdog() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle_id = view.battle.battle_id;
    wait_for_kickoff(&arena, &green).await;

    let settled = arena
        .state
        .orchestrator
        .report_result(battle_id, red.agent_id.to_string(), result(&red.agent_id.to_string()))
        .await
        .expect("settle");
    assert_eq!(settled.state, BattleState::Finished);
    assert_eq!(settled.result.as_ref().map(|r| r.winner.clone()), Some(red.agent_id.to_string()));
    assert!(settled.interact_history.iter().any(|e| e.is_result));

    // Let the watchdog fire; it must not touch the battle again
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(
        arena.state.orchestrator.settle_timeout(battle_id).await.expect("late watchdog"),
        None
    );

    let battle = arena.battle(battle_id).await;
    assert_eq!(battle.state, BattleState::Finished);
    assert_eq!(battle.result, settled.result);

    let red_after = arena.agent(&red).await;
    assert_released(&red_after);
    assert_rating(&red_after, DEFAULT_RATING + 15);
    assert_eq!(red_after.elo.stats.wins, 1);
    assert_eq!(red_after.elo.battle_history.len(), 1);

    let green_after = arena.agent(&green).await;
    assert_released(&green_after);
    assert_eq!(green_after.elo.rating, None);
    assert_eq!(green_after.elo.stats.losses, 1);
}

#[tokio::test(start_paused = true)]
async fn result_by_role_name_moves_ratings_both_ways() {
    let arena = TestArena::new(test_config());
    let green = green_agent_with_roles(&["red", "blue"]);
    let red = red_agent("red-1");
    let blue = red_agent("blue-1");
    arena.register(&[&green, &red, &blue]).await;

    let view = arena
        .submit(&green, &[("red", &red), ("blue", &blue)])
        .await
        .expect("submit");
    wait_for_kickoff(&arena, &green).await;

    arena
        .state
        .orchestrator
        .report_result(view.battle.battle_id, "blue".to_string(), result("blue"))
        .await
        .expect("settle");

    assert_rating(&arena.agent(&blue).await, DEFAULT_RATING + 15);
    assert_rating(&arena.agent(&red).await, DEFAULT_RATING - 15);
}

#[tokio::test(start_paused = true)]
async fn unknown_winner_settles_as_draw() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    wait_for_kickoff(&arena, &green).await;

    let battle = arena
        .state
        .orchestrator
        .report_result(view.battle.battle_id, "nobody".to_string(), result("nobody"))
        .await
        .expect("settle");

    assert_eq!(battle.result.map(|r| r.winner), Some(DRAW.to_string()));
    assert_rating(&arena.agent(&red).await, DEFAULT_RATING);
}

// ============================================================================
// FAILURE PATHS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn refused_reset_names_the_agent() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;
    arena.client.refuse_reset(&red);

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle = arena.wait_for(view.battle.battle_id, BattleState::Error).await;

    let reason = battle.error.expect("reason");
    assert!(reason.contains(&red.agent_id.to_string()), "reason was {}", reason);
    assert_released(&arena.agent(&green).await);
    assert_released(&arena.agent(&red).await);
}

#[tokio::test(start_paused = true)]
async fn unreachable_green_agent_ends_in_error_and_watchdog_stays_quiet() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;
    arena.client.unreachable(&green);

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle_id = view.battle.battle_id;
    let battle = arena.wait_for(battle_id, BattleState::Error).await;
    assert!(battle.error.is_some());

    // Battle info to green already failed, so no kickoff was attempted
    assert!(arena
        .client
        .calls()
        .iter()
        .all(|c| !matches!(c, Call::Notify { message: AgentMessage::BattleStart(_), .. })));

    tokio::time::sleep(Duration::from_secs(120)).await;
    let battle = arena.battle(battle_id).await;
    assert_eq!(battle.state, BattleState::Error);
    assert!(battle.result.is_none());
    assert_eq!(arena.agent(&red).await.elo.stats.errors, 1);
    assert_eq!(arena.agent(&red).await.elo.stats.draws, 0);
}

#[tokio::test(start_paused = true)]
async fn missing_participant_fails_before_locking() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let ghost = red_agent("ghost");
    arena.register(&[&green]).await;

    // Bypass submission validation to admit a battle naming an unknown agent
    let battle = arena_test_utils::battle_between(&green, &[("red", &ghost)]);
    let view = arena
        .state
        .orchestrator
        .admit(battle, &arena.state.queue)
        .await
        .expect("admit");
    arena.state.ensure_worker();

    let battle = arena.wait_for(view.battle.battle_id, BattleState::Error).await;
    let reason = battle.error.expect("reason");
    assert!(reason.contains(&ghost.agent_id.to_string()), "reason was {}", reason);

    let green_after = arena.agent(&green).await;
    assert_released(&green_after);
    assert_eq!(green_after.elo.stats.errors, 1);
    assert!(arena.client.resets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failure_keeps_agents_locked_by_other_battles() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let mut red = red_agent("red-1");
    red.lock();
    arena.register(&[&green, &red]).await;

    // Bypass submission validation; red is held by another battle
    let battle = arena_test_utils::battle_between(&green, &[("red", &red)]);
    let view = arena
        .state
        .orchestrator
        .admit(battle, &arena.state.queue)
        .await
        .expect("admit");
    arena.state.ensure_worker();

    let battle = arena.wait_for(view.battle.battle_id, BattleState::Error).await;
    let reason = battle.error.expect("reason");
    assert!(reason.contains("not unlocked"), "reason was {}", reason);

    assert_released(&arena.agent(&green).await);
    assert_eq!(arena.agent(&red).await.status, AgentStatus::Locked);
}

#[tokio::test(start_paused = true)]
async fn driver_panic_ends_in_error_and_releases_locked_agents() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;
    arena.client.panic_on_reset(&red);

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle = arena.wait_for(view.battle.battle_id, BattleState::Error).await;
    let reason = battle.error.expect("reason");
    assert!(reason.starts_with("internal error"), "reason was {}", reason);

    let green_after = arena.agent(&green).await;
    let red_after = arena.agent(&red).await;
    assert_released(&green_after);
    assert_released(&red_after);
    assert_eq!(red_after.elo.stats.errors, 1);

    // The worker survives the panic and drives the next battle
    let next = arena.submit(&green, &[("red", &red)]).await.expect("resubmit");
    let next = arena.wait_for(next.battle.battle_id, BattleState::Error).await;
    assert!(next.error.is_some());
}

// ============================================================================
// SETTLEMENT DURING STARTUP
// ============================================================================

#[tokio::test(start_paused = true)]
async fn result_during_ready_wait_abandons_kickoff() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;
    arena.client.never_ready(&red);

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle_id = view.battle.battle_id;

    // Both launchers reset; the driver is now polling for red
    for _ in 0..200 {
        if arena.client.resets().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(arena.client.resets().len(), 2);

    arena
        .state
        .orchestrator
        .report_result(battle_id, DRAW.to_string(), result(DRAW))
        .await
        .expect("settle");

    // Agents finish resetting after the battle was settled
    for agent in [&green, &red] {
        arena
            .store()
            .agent_modify(agent.agent_id, |record| {
                record.ready = true;
                Ok(())
            })
            .await
            .expect("ready");
    }
    tokio::time::sleep(Duration::from_secs(3)).await;
    arena.settle_tasks().await;

    let battle = arena.battle(battle_id).await;
    assert_eq!(battle.state, BattleState::Finished);
    assert_eq!(battle.result.expect("result").winner, DRAW);

    // No battle info and no kickoff went out for the settled battle
    assert!(arena.client.messages_to(&green).is_empty());
    assert!(arena.client.messages_to(&red).is_empty());

    assert_released(&arena.agent(&green).await);
    assert_released(&arena.agent(&red).await);

    // No watchdog was armed: a second settlement never lands
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(arena.agent(&red).await.elo.battle_history.len(), 1);
}

// ============================================================================
// EVENT INGESTION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn events_append_until_terminal() {
    let arena = TestArena::new(test_config());
    let green = green_agent();
    let red = red_agent("red-1");
    arena.register(&[&green, &red]).await;

    let view = arena.submit(&green, &[("red", &red)]).await.expect("submit");
    let battle_id = view.battle.battle_id;
    wait_for_kickoff(&arena, &green).await;

    let event = BattleEventRequest {
        is_result: false,
        message: Some("red attacks".to_string()),
        detail: None,
        winner: None,
        timestamp: None,
        reported_by: Some("red".to_string()),
    };
    let battle = arena
        .state
        .orchestrator
        .append_event(battle_id, event.clone())
        .await
        .expect("append");
    let last = battle.interact_history.last().expect("entry");
    assert_eq!(last.message, "red attacks");
    assert_eq!(last.reported_by, "red");
    assert!(!last.is_result);

    arena
        .state
        .orchestrator
        .report_result(battle_id, "draw".to_string(), result("draw"))
        .await
        .expect("settle");

    let err = arena
        .state
        .orchestrator
        .append_event(battle_id, event)
        .await
        .expect_err("terminal battle");
    assert!(matches!(err, ArenaError::InvalidStateTransition { from: BattleState::Finished, .. }));

    let err = arena
        .state
        .orchestrator
        .report_result(battle_id, "draw".to_string(), result("draw"))
        .await
        .expect_err("second settlement");
    assert!(matches!(err, ArenaError::InvalidStateTransition { .. }));
}

// ============================================================================
// QUEUE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn battles_are_driven_in_submission_order() {
    let arena = TestArena::new(test_config());
    let green_a = green_agent();
    let mut green_b = green_agent();
    green_b.register_info.alias = "green-b".to_string();
    green_b.register_info.launcher_url = "http://127.0.0.1:9100/green-b/launcher".to_string();
    green_b.register_info.agent_url = "http://127.0.0.1:9100/green-b/agent".to_string();
    let red_a = red_agent("red-a");
    let red_b = red_agent("red-b");
    arena.register(&[&green_a, &green_b, &red_a, &red_b]).await;

    let first = arena.submit(&green_a, &[("red", &red_a)]).await.expect("first");
    let second = arena.submit(&green_b, &[("red", &red_b)]).await.expect("second");
    assert_eq!(first.queue_position, Some(1));
    assert_eq!(second.queue_position, Some(2));

    wait_for_kickoff(&arena, &green_b).await;
    let resets = arena.client.resets();
    let first_reset = resets.iter().position(|id| *id == green_a.agent_id);
    let second_reset = resets.iter().position(|id| *id == green_b.agent_id);
    assert!(first_reset < second_reset);

    assert_eq!(arena.battle(first.battle.battle_id).await.state, BattleState::Running);
    assert_eq!(arena.battle(second.battle.battle_id).await.state, BattleState::Running);
}
