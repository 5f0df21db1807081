//! The complete simulation state of a match.
//!
//! [`MatchState`] is the single owner of everything a rollback snapshot must
//! contain: the clock, the current round, the pause flags, the roster, the
//! score and the debug speed multiplier. Subsystems receive references to it instead of reaching into
//! globals.

use serde::{Deserialize, Serialize};

use crate::clock::SimulationClock;
use crate::config::MatchConfig;
use crate::pause::PauseState;
use crate::roster::Roster;
use crate::round::RoundContext;
use crate::score::MatchScore;

/// Owned simulation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub clock: SimulationClock,
    pub round: RoundContext,
    pub pause: PauseState,
    pub roster: Roster,
    pub score: MatchScore,
    /// Number of synchronization points passed. Replay and netplay key
    /// confirmed input by this counter.
    pub frame: u64,
    /// Debug fast-forward multiplier on top of the game speed. It changes
    /// how ticks fall, so it travels with snapshots.
    #[serde(default = "unit_accel")]
    pub accel: f64,
}

fn unit_accel() -> f64 {
    1.0
}

impl MatchState {
    /// Round 1 of a new match.
    pub fn new(roster: Roster, config: &MatchConfig) -> Self {
        let mut state = Self {
            clock: SimulationClock::with_step(config.speed.game_speed),
            round: RoundContext::new(1, &config.timing),
            pause: PauseState::default(),
            roster,
            score: MatchScore::default(),
            frame: 0,
            accel: 1.0,
        };
        state.roster.reset_for_round();
        state
    }

    /// Record the finished round and set up the next one.
    ///
    /// The clock's per-round counters are reset; its speed is kept.
    pub fn next_round(&mut self, config: &MatchConfig) {
        self.score.record(self.round.finish, self.round.win_team);
        let number = self.round.round + 1;
        self.begin_round(number, config);
        tracing::info!(
            round = number,
            wins = ?self.score.wins,
            draws = self.score.draws,
            "round_started"
        );
    }

    /// Run the current round again from the start, score untouched.
    pub fn reset_round(&mut self, config: &MatchConfig) {
        let number = self.round.round;
        self.begin_round(number, config);
        tracing::info!(round = number, "round_reset");
    }

    /// Settle a finished round. Returns `true` when the result ends the
    /// match; otherwise the next round is set up.
    pub fn conclude_round(&mut self, config: &MatchConfig) -> bool {
        let mut score = self.score.clone();
        score.record(self.round.finish, self.round.win_team);
        if score.is_match_over(config.match_wins, config.max_draw_games) {
            self.score = score;
            tracing::info!(
                rounds = self.round.round,
                wins = ?self.score.wins,
                draws = self.score.draws,
                "match_over"
            );
            return true;
        }
        self.next_round(config);
        false
    }

    /// Whether the score ends the match.
    pub fn is_match_over(&self, config: &MatchConfig) -> bool {
        self.score
            .is_match_over(config.match_wins, config.max_draw_games)
    }

    fn begin_round(&mut self, number: i32, config: &MatchConfig) {
        self.round = RoundContext::new(number, &config.timing);
        self.round.decisive_round = self.score.decisive_round(config.match_wins);
        self.clock.reset_round();
        self.roster.reset_for_round();
    }
}
