//! Round outcome evaluation.
//!
//! [`evaluate`] is a pure function of the round and roster that reports what
//! the round outcome *would* be this tick. [`apply_outcome`] performs the
//! latching mutation on [`RoundContext`]: the first non-`Ongoing` outcome
//! sticks until the next round.
//!
//! Within one evaluation the KO check takes precedence over the time-over
//! check, so a fighter falling on the exact tick the timer hits zero still
//! registers as a KO (or double KO) instead of a time over.

use crate::config::KoRules;
use crate::roster::{Roster, Side, TeamMode};
use crate::round::{FinishType, RoundContext, WinType};

/// Life comparison resolution at time over.
const LIFE_SCALE: f64 = 1000.0;

// ---------------------------------------------------------------------------
// RoundOutcome
// ---------------------------------------------------------------------------

/// Result of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Ongoing,
    Ko { winner: Side, perfect: bool },
    DoubleKo,
    TimeOver { winner: Side, perfect: bool },
    TimeOverDraw,
}

impl RoundOutcome {
    /// The finish type this outcome latches.
    pub fn finish_type(self) -> FinishType {
        match self {
            RoundOutcome::Ongoing => FinishType::NotYet,
            RoundOutcome::Ko { .. } => FinishType::Ko,
            RoundOutcome::DoubleKo => FinishType::DoubleKo,
            RoundOutcome::TimeOver { .. } => FinishType::TimeOver,
            RoundOutcome::TimeOverDraw => FinishType::TimeOverDraw,
        }
    }

    /// The winning side, if any.
    pub fn winner(self) -> Option<Side> {
        match self {
            RoundOutcome::Ko { winner, .. } | RoundOutcome::TimeOver { winner, .. } => Some(winner),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate the outcome for the current tick.
///
/// Returns `Ongoing` while the intro is still running. The time-over check
/// applies when `time == 0`; the KO check applies while `intro >= -1` and
/// overrides a time-over result.
pub fn evaluate(round: &RoundContext, roster: &Roster, rules: &KoRules) -> RoundOutcome {
    if round.intro > 0 {
        return RoundOutcome::Ongoing;
    }

    let mut outcome = RoundOutcome::Ongoing;
    if round.time == 0 {
        outcome = time_over(roster);
    }
    if round.intro >= -1 {
        if let Some(ko) = ko_check(roster, rules) {
            outcome = ko;
        }
    }
    outcome
}

/// Whether `side` is knocked out.
///
/// Every active member down, or the leader down when the team mode says the
/// leader carries the team. A side with no active members is never KO'd.
pub fn side_is_ko(roster: &Roster, side: Side, rules: &KoRules) -> bool {
    let mut members = roster.members(side).peekable();
    if members.peek().is_none() {
        return false;
    }
    if members.all(|f| !f.alive) {
        return true;
    }

    let leader_carries = match roster.team_mode[side.index()] {
        TeamMode::Simul => rules.lose_simul && roster.ai_level[side.index()] == 0,
        TeamMode::Tag => rules.lose_tag,
        TeamMode::Single | TeamMode::Turns => false,
    };
    leader_carries && roster.leader(side).is_some_and(|leader| !leader.alive)
}

/// Whether no active member of `side` lost life this round.
pub fn is_untouched(roster: &Roster, side: Side) -> bool {
    roster.members(side).all(|f| !f.damaged)
}

fn ko_check(roster: &Roster, rules: &KoRules) -> Option<RoundOutcome> {
    let ko = Side::BOTH.map(|side| side_is_ko(roster, side, rules));
    match ko {
        [true, true] => Some(RoundOutcome::DoubleKo),
        [true, false] => Some(RoundOutcome::Ko {
            winner: Side::P2,
            perfect: is_untouched(roster, Side::P2),
        }),
        [false, true] => Some(RoundOutcome::Ko {
            winner: Side::P1,
            perfect: is_untouched(roster, Side::P1),
        }),
        [false, false] => None,
    }
}

/// Normalized remaining life of a side, in `[0, 1]` for sane inputs.
///
/// Sharing team modes divide by the number of active members; other modes
/// field one member at a time.
pub fn life_ratio(roster: &Roster, side: Side) -> f64 {
    let members: Vec<_> = roster.members(side).collect();
    if members.is_empty() {
        return 0.0;
    }
    let divisor = if roster.team_mode[side.index()].shares_life() {
        members.len() as f64
    } else {
        1.0
    };
    members
        .iter()
        .map(|f| f.life_fraction() / divisor)
        .sum()
}

fn time_over(roster: &Roster) -> RoundOutcome {
    let l = Side::BOTH.map(|side| life_ratio(roster, side));
    time_over_from_ratios(l, Side::BOTH.map(|side| is_untouched(roster, side)))
}

/// Time-over decision from per-side life ratios and untouched flags.
///
/// Ratios are compared at a resolution of 1/1000. A side at full life beats
/// a side that is not, even when both round to 1000.
pub fn time_over_from_ratios(l: [f64; 2], untouched: [bool; 2]) -> RoundOutcome {
    let rounded = l.map(|v| (v * LIFE_SCALE).round() as i64);
    let full = l.map(|v| v >= 1.0);

    if rounded[0] == rounded[1] && full[0] == full[1] {
        return RoundOutcome::TimeOverDraw;
    }

    let winner = if rounded[0] != rounded[1] {
        if rounded[0] > rounded[1] {
            Side::P1
        } else {
            Side::P2
        }
    } else if full[0] {
        Side::P1
    } else {
        Side::P2
    };
    let i = winner.index();
    RoundOutcome::TimeOver {
        winner,
        perfect: rounded[i] == LIFE_SCALE as i64 && untouched[i],
    }
}

// ---------------------------------------------------------------------------
// Latching
// ---------------------------------------------------------------------------

/// Latch `outcome` into `round` if no outcome is latched yet.
///
/// Returns `true` when the finish type changed this call. Win triggers and
/// win types are only recomputed on that change.
pub fn apply_outcome(round: &mut RoundContext, outcome: RoundOutcome, roster: &Roster) -> bool {
    if round.is_finished() || outcome == RoundOutcome::Ongoing {
        return false;
    }

    round.finish = outcome.finish_type();
    round.win_team = outcome.winner();
    match outcome {
        RoundOutcome::Ko { winner, perfect } | RoundOutcome::TimeOver { winner, perfect } => {
            round.perfect[winner.index()] = perfect;
        }
        _ => {}
    }

    if round.finish.is_ko() {
        escalate_win_triggers(round, roster);
    }

    match outcome {
        RoundOutcome::Ko { winner, .. } => {
            round.win_type[winner.index()] = round.win_trigger[winner.index()];
        }
        RoundOutcome::TimeOver { winner, .. } => {
            round.win_type[winner.index()] = WinType::Time;
        }
        RoundOutcome::DoubleKo | RoundOutcome::TimeOverDraw => {
            round.win_type = [WinType::Draw; 2];
        }
        RoundOutcome::Ongoing => {}
    }

    tracing::info!(
        round = round.round,
        finish = ?round.finish,
        win_team = ?round.win_team,
        perfect = ?round.perfect,
        "outcome_latched"
    );
    true
}

/// Classify the hits that finished each KO'd side.
///
/// For every knocked-out side, the opposing members' recorded hits against
/// that side's members are scanned: a hyper hit makes the trigger `Hyper`,
/// otherwise a special hit upgrades a `Normal` trigger to `Special`.
pub fn escalate_win_triggers(round: &mut RoundContext, roster: &Roster) {
    let knocked_out: Vec<Side> = match round.finish {
        FinishType::Ko => round.win_team.map(Side::opponent).into_iter().collect(),
        FinishType::DoubleKo => Side::BOTH.to_vec(),
        _ => Vec::new(),
    };

    for victim_side in knocked_out {
        let attacker_side = victim_side.opponent();
        let victims: Vec<usize> = roster
            .indexed_members(victim_side)
            .filter(|(_, f)| !f.alive)
            .map(|(i, _)| i)
            .collect();

        let trigger = &mut round.win_trigger[attacker_side.index()];
        for attacker in roster.members(attacker_side) {
            for hit in attacker.hits.iter().filter(|h| victims.contains(&h.victim)) {
                if hit.attr.hyper {
                    *trigger = WinType::Hyper;
                } else if hit.attr.special && *trigger == WinType::Normal {
                    *trigger = WinType::Special;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundTiming;
    use crate::roster::{Fighter, HitAttr};

    fn fighting_round() -> RoundContext {
        let mut round = RoundContext::new(1, &RoundTiming::default());
        round.intro = 0;
        round.time = 100;
        round
    }

    fn versus() -> Roster {
        Roster::versus(Fighter::new(Side::P1, 1000), Fighter::new(Side::P2, 1000))
    }

    fn rules() -> KoRules {
        KoRules::default()
    }

    // -- 1. Ongoing ---------------------------------------------------------

    #[test]
    fn intro_running_is_ongoing() {
        let mut round = fighting_round();
        round.intro = 5;
        let mut roster = versus();
        roster.fighters[0].apply_damage(1000);
        assert_eq!(evaluate(&round, &roster, &rules()), RoundOutcome::Ongoing);
    }

    #[test]
    fn both_alive_is_ongoing() {
        assert_eq!(
            evaluate(&fighting_round(), &versus(), &rules()),
            RoundOutcome::Ongoing
        );
    }

    // -- 2. KO --------------------------------------------------------------

    #[test]
    fn single_ko_independent_of_time() {
        let mut roster = versus();
        roster.fighters[0].apply_damage(1000);
        for time in [-1, 0, 50] {
            let mut round = fighting_round();
            round.intro = -1;
            round.time = time;
            assert_eq!(
                evaluate(&round, &roster, &rules()),
                RoundOutcome::Ko {
                    winner: Side::P2,
                    perfect: true
                }
            );
        }
    }

    #[test]
    fn ko_check_skipped_deep_in_outcome() {
        let mut round = fighting_round();
        round.intro = -2;
        let mut roster = versus();
        roster.fighters[1].apply_damage(1000);
        assert_eq!(evaluate(&round, &roster, &rules()), RoundOutcome::Ongoing);
    }

    #[test]
    fn ko_perfect_requires_untouched_winner() {
        let mut roster = versus();
        roster.fighters[0].apply_damage(10);
        roster.fighters[1].apply_damage(1000);
        assert_eq!(
            evaluate(&fighting_round(), &roster, &rules()),
            RoundOutcome::Ko {
                winner: Side::P1,
                perfect: false
            }
        );
    }

    #[test]
    fn double_ko() {
        let mut roster = versus();
        roster.fighters[0].apply_damage(1000);
        roster.fighters[1].apply_damage(1000);
        assert_eq!(
            evaluate(&fighting_round(), &roster, &rules()),
            RoundOutcome::DoubleKo
        );
    }

    // -- 3. Team modes ------------------------------------------------------

    fn simul_roster() -> Roster {
        let mut roster = Roster::new()
            .with_team_mode(Side::P1, TeamMode::Simul)
            .with_team_mode(Side::P2, TeamMode::Simul);
        roster.push(Fighter::new(Side::P1, 1000).leader());
        roster.push(Fighter::new(Side::P2, 1000).leader());
        roster.push(Fighter::new(Side::P1, 1000));
        roster.push(Fighter::new(Side::P2, 1000));
        roster
    }

    #[test]
    fn simul_needs_all_members_down_by_default() {
        let mut roster = simul_roster();
        roster.fighters[0].apply_damage(1000);
        assert!(!side_is_ko(&roster, Side::P1, &rules()));
        roster.fighters[2].apply_damage(1000);
        assert!(side_is_ko(&roster, Side::P1, &rules()));
    }

    #[test]
    fn simul_lose_on_leader_only_for_humans() {
        let rules = KoRules {
            lose_simul: true,
            lose_tag: false,
        };
        let mut roster = simul_roster();
        roster.fighters[0].apply_damage(1000);
        assert!(side_is_ko(&roster, Side::P1, &rules));

        roster.ai_level[0] = 4;
        assert!(!side_is_ko(&roster, Side::P1, &rules));
    }

    #[test]
    fn tag_lose_on_leader() {
        let rules = KoRules {
            lose_simul: false,
            lose_tag: true,
        };
        let mut roster = simul_roster()
            .with_team_mode(Side::P2, TeamMode::Tag);
        roster.fighters[1].apply_damage(1000);
        assert!(side_is_ko(&roster, Side::P2, &rules));
    }

    #[test]
    fn inactive_members_are_ignored() {
        let mut roster = simul_roster();
        roster.fighters[0].apply_damage(1000);
        roster.fighters[2].teamside = None;
        assert!(side_is_ko(&roster, Side::P1, &rules()));
    }

    #[test]
    fn empty_side_is_never_ko() {
        let mut roster = Roster::new();
        roster.push(Fighter::new(Side::P1, 1000).leader());
        assert!(!side_is_ko(&roster, Side::P2, &rules()));
    }

    // -- 4. Time over -------------------------------------------------------

    #[test]
    fn time_over_rounds_to_thousandths() {
        assert_eq!(
            time_over_from_ratios([0.851, 0.850], [false, false]),
            RoundOutcome::TimeOver {
                winner: Side::P1,
                perfect: false
            }
        );
    }

    #[test]
    fn time_over_exact_tie_is_draw() {
        assert_eq!(
            time_over_from_ratios([0.700, 0.700], [false, false]),
            RoundOutcome::TimeOverDraw
        );
    }

    #[test]
    fn sub_resolution_difference_is_draw() {
        assert_eq!(
            time_over_from_ratios([0.7001, 0.7002], [false, false]),
            RoundOutcome::TimeOverDraw
        );
    }

    #[test]
    fn full_life_beats_rounded_full() {
        assert_eq!(
            time_over_from_ratios([0.9996, 1.0], [false, true]),
            RoundOutcome::TimeOver {
                winner: Side::P2,
                perfect: true
            }
        );
    }

    #[test]
    fn time_over_from_roster() {
        let mut round = fighting_round();
        round.time = 0;
        let mut roster = versus();
        roster.fighters[0].apply_damage(149);
        roster.fighters[1].apply_damage(150);
        assert_eq!(
            evaluate(&round, &roster, &rules()),
            RoundOutcome::TimeOver {
                winner: Side::P1,
                perfect: false
            }
        );
    }

    #[test]
    fn simul_life_ratio_averages_members() {
        let mut roster = simul_roster();
        roster.fighters[0].apply_damage(500);
        assert!((life_ratio(&roster, Side::P1) - 0.75).abs() < 1e-12);
        assert!((life_ratio(&roster, Side::P2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ko_overrides_time_over_draw_on_zero_tick() {
        let mut round = fighting_round();
        round.time = 0;
        let mut roster = versus();
        roster.fighters[0].apply_damage(1000);
        roster.fighters[1].apply_damage(1000);
        // Both at 0 life would be a time-over draw; both down is a double KO.
        assert_eq!(evaluate(&round, &roster, &rules()), RoundOutcome::DoubleKo);
    }

    // -- 5. Latching --------------------------------------------------------

    #[test]
    fn outcome_latches_once() {
        let mut round = fighting_round();
        let roster = versus();
        let first = RoundOutcome::Ko {
            winner: Side::P1,
            perfect: false,
        };
        assert!(apply_outcome(&mut round, first, &roster));
        assert_eq!(round.finish, FinishType::Ko);
        assert_eq!(round.win_team, Some(Side::P1));

        assert!(!apply_outcome(&mut round, RoundOutcome::DoubleKo, &roster));
        assert_eq!(round.finish, FinishType::Ko);
        assert_eq!(round.win_team, Some(Side::P1));
    }

    #[test]
    fn ongoing_does_not_latch() {
        let mut round = fighting_round();
        assert!(!apply_outcome(&mut round, RoundOutcome::Ongoing, &versus()));
        assert_eq!(round.finish, FinishType::NotYet);
    }

    #[test]
    fn draws_clear_win_team() {
        let mut round = fighting_round();
        apply_outcome(&mut round, RoundOutcome::TimeOverDraw, &versus());
        assert_eq!(round.win_team, None);
        assert_eq!(round.win_type, [WinType::Draw; 2]);
    }

    #[test]
    fn time_over_win_type() {
        let mut round = fighting_round();
        apply_outcome(
            &mut round,
            RoundOutcome::TimeOver {
                winner: Side::P2,
                perfect: true,
            },
            &versus(),
        );
        assert_eq!(round.win_type[1], WinType::Time);
        assert_eq!(round.perfect, [false, true]);
    }

    // -- 6. Win triggers ----------------------------------------------------

    #[test]
    fn hyper_finish_sets_hyper_trigger() {
        let mut roster = versus();
        roster.record_hit(
            0,
            1,
            HitAttr {
                special: true,
                ..Default::default()
            },
        );
        roster.record_hit(
            0,
            1,
            HitAttr {
                hyper: true,
                ..Default::default()
            },
        );
        roster.fighters[1].apply_damage(1000);

        let mut round = fighting_round();
        let outcome = evaluate(&round, &roster, &rules());
        assert!(apply_outcome(&mut round, outcome, &roster));
        assert_eq!(round.win_trigger[0], WinType::Hyper);
        assert_eq!(round.win_type[0], WinType::Hyper);
    }

    #[test]
    fn special_finish_sets_special_trigger() {
        let mut roster = versus();
        roster.record_hit(
            0,
            1,
            HitAttr {
                special: true,
                ..Default::default()
            },
        );
        roster.fighters[1].apply_damage(1000);

        let mut round = fighting_round();
        let outcome = evaluate(&round, &roster, &rules());
        apply_outcome(&mut round, outcome, &roster);
        assert_eq!(round.win_trigger[0], WinType::Special);
    }

    #[test]
    fn hits_on_survivors_do_not_count() {
        let mut roster = simul_roster();
        // Hyper on the P2 member that survives, normal hit on the one that falls.
        roster.record_hit(
            0,
            3,
            HitAttr {
                hyper: true,
                ..Default::default()
            },
        );
        roster.record_hit(0, 1, HitAttr::default());
        roster.fighters[1].apply_damage(1000);
        roster.fighters[3].apply_damage(1000);
        roster.fighters[3].alive = true;
        roster.fighters[3].life = 1;

        let mut round = fighting_round();
        round.finish = FinishType::Ko;
        round.win_team = Some(Side::P1);
        escalate_win_triggers(&mut round, &roster);
        assert_eq!(round.win_trigger[0], WinType::Normal);
    }
}
