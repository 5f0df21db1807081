//! Round wins across a match.

use serde::{Deserialize, Serialize};

use crate::roster::Side;
use crate::round::FinishType;

/// Accumulated round results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub wins: [u32; 2],
    pub draws: u32,
}

impl MatchScore {
    /// Count a finished round.
    pub fn record(&mut self, finish: FinishType, win_team: Option<Side>) {
        match (finish, win_team) {
            (FinishType::Ko | FinishType::TimeOver, Some(side)) => self.wins[side.index()] += 1,
            (FinishType::NotYet, _) => {}
            _ => self.draws += 1,
        }
    }

    /// Which sides would take the match by winning the next round.
    pub fn decisive_round(&self, match_wins: u32) -> [bool; 2] {
        self.wins.map(|w| w + 1 >= match_wins)
    }

    /// A side reached `match_wins`, or more draws than allowed were played.
    pub fn is_match_over(&self, match_wins: u32, max_draw_games: u32) -> bool {
        self.wins.iter().any(|&w| w >= match_wins) || self.draws > max_draw_games
    }

    /// The side with more round wins, `None` on a tie.
    pub fn leader(&self) -> Option<Side> {
        match self.wins[0].cmp(&self.wins[1]) {
            std::cmp::Ordering::Greater => Some(Side::P1),
            std::cmp::Ordering::Less => Some(Side::P2),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wins_and_draws_are_counted() {
        let mut score = MatchScore::default();
        score.record(FinishType::Ko, Some(Side::P1));
        score.record(FinishType::TimeOver, Some(Side::P2));
        score.record(FinishType::DoubleKo, None);
        score.record(FinishType::NotYet, None);
        assert_eq!(score.wins, [1, 1]);
        assert_eq!(score.draws, 1);
        assert_eq!(score.leader(), None);
    }

    #[test]
    fn match_over_after_enough_wins() {
        let mut score = MatchScore::default();
        assert_eq!(score.decisive_round(2), [false, false]);
        score.record(FinishType::Ko, Some(Side::P2));
        assert_eq!(score.decisive_round(2), [false, true]);
        assert!(!score.is_match_over(2, 1));
        score.record(FinishType::Ko, Some(Side::P2));
        assert!(score.is_match_over(2, 1));
        assert_eq!(score.leader(), Some(Side::P2));
    }

    #[test]
    fn match_over_after_too_many_draws() {
        let mut score = MatchScore::default();
        score.record(FinishType::TimeOverDraw, None);
        assert!(!score.is_match_over(2, 1));
        score.record(FinishType::DoubleKo, None);
        assert!(score.is_match_over(2, 1));
    }
}
