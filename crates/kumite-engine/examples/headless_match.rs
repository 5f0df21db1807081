//! Headless match demo -- a background loader builds the roster, then a
//! paced scheduler plays the match out with scripted input.
//!
//! Run with:
//!   cargo run --example headless_match -p kumite-engine
//!
//! Set `RUST_LOG=kumite_engine=debug,kumite_sim=debug` for per-round detail.

use std::time::Duration;

use kumite_engine::prelude::*;

// ---------------------------------------------------------------------------
// Scripted players
// ---------------------------------------------------------------------------

/// Deals steady damage while both sides have control.
struct ScriptedBrawl {
    damage: [i32; 2],
}

impl FrameHooks for ScriptedBrawl {
    fn world_tick(
        &mut self,
        phase: WorldPhase,
        state: &mut MatchState,
        _input: &InputFrame,
        _assertions: &mut Assertions,
    ) {
        if phase != WorldPhase::Main || state.round.is_finished() {
            return;
        }
        if !state.roster.fighters.iter().all(|f| f.control) {
            return;
        }
        // The harder hitter swaps every round.
        let damage = if state.round.round % 2 == 1 {
            self.damage
        } else {
            [self.damage[1], self.damage[0]]
        };
        for attacker in Side::BOTH {
            let target = attacker.opponent().index();
            state.roster.fighters[target].apply_damage(damage[attacker.index()]);
        }
    }

    fn on_round_event(&mut self, event: RoundEvent, state: &MatchState) {
        if let RoundEvent::OutcomeLatched(finish) = event {
            tracing::info!(
                round = state.round.round,
                finish = ?finish,
                win_team = ?state.round.win_team,
                "round_decided"
            );
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    init_tracing("info");

    let mut config = MatchConfig::default();
    config.pacer.target_fps = 600;
    config.timing.round_time = 30 * 60;

    // Build the roster off-thread; the queue carries "uploads" back.
    let queue = TaskQueue::bounded(config.task_queue_capacity);
    let loader = Loader::spawn(
        |ctx: &LoadContext| {
            let mut roster = Roster::new();
            for (side, x) in [(Side::P1, -70.0), (Side::P2, 70.0)] {
                if ctx.is_cancelled() {
                    anyhow::bail!("cancelled while loading {side:?}");
                }
                ctx.sender()
                    .submit(move || tracing::debug!(side = ?side, "fighter_assets_uploaded"))
                    .map_err(anyhow::Error::new)?;
                roster.push(Fighter::new(side, 1000).leader().at(x, 0.0));
            }
            std::thread::sleep(Duration::from_millis(20));
            Ok(roster)
        },
        queue.sender(),
        config.loader_poll_interval(),
    );
    let roster = loader.wait(&queue)?;

    let hooks = ScriptedBrawl {
        damage: [13, 11],
    };
    let mut scheduler = Scheduler::new(config, roster, LocalSync, hooks)?.with_task_queue(queue);

    let outcome = scheduler.run();
    let state = scheduler.state();
    tracing::info!(
        outcome = ?outcome,
        rounds = state.round.round,
        wins = ?state.score.wins,
        draws = state.score.draws,
        match_ticks = state.clock.match_tick(),
        pacer = ?scheduler.pacer().stats(),
        "demo_finished"
    );

    if outcome != IterationOutcome::MatchOver {
        anyhow::bail!("match did not finish: {outcome:?}");
    }
    Ok(())
}
