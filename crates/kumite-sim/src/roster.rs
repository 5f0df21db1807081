//! Aggregate fighter state read by the round machine and win evaluator.
//!
//! The character simulation itself lives outside this crate. The world layer
//! mirrors the few facts round logic needs into a [`Roster`] each tick: life,
//! whether a fighter is alive, which hits it landed, and whether it has
//! reached a terminal pose. The round machine writes back a handful of
//! lifecycle effects (position reset, control grant, state requests).

use serde::{Deserialize, Serialize};

/// Standing state requested when control is granted.
pub const STATE_STAND: i32 = 0;
/// Lose pose after a time over.
pub const STATE_LOSE_TIME_OVER: i32 = 170;
/// Draw pose.
pub const STATE_DRAW: i32 = 175;
/// Win pose.
pub const STATE_WIN: i32 = 180;

// ---------------------------------------------------------------------------
// Side / TeamMode
// ---------------------------------------------------------------------------

/// One of the two teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    P1,
    P2,
}

impl Side {
    /// Both sides in index order.
    pub const BOTH: [Side; 2] = [Side::P1, Side::P2];

    /// Array index for per-side tables.
    pub fn index(self) -> usize {
        match self {
            Side::P1 => 0,
            Side::P2 => 1,
        }
    }

    /// The other side.
    pub fn opponent(self) -> Side {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
        }
    }
}

/// How a side fields its members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamMode {
    #[default]
    Single,
    Simul,
    Turns,
    Tag,
}

impl TeamMode {
    /// Whether several members share the life comparison at time over.
    pub fn shares_life(self) -> bool {
        matches!(self, TeamMode::Simul | TeamMode::Tag)
    }
}

// ---------------------------------------------------------------------------
// Hits
// ---------------------------------------------------------------------------

/// Attack attributes that matter for win classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitAttr {
    pub special: bool,
    pub hyper: bool,
    pub throw: bool,
}

/// A hit landed by a fighter, keyed by the victim's roster index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    pub victim: usize,
    pub attr: HitAttr,
}

// ---------------------------------------------------------------------------
// Fighter
// ---------------------------------------------------------------------------

/// Round-relevant state of one fighter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fighter {
    /// Player slot side.
    pub side: Side,
    /// Team the fighter counts for. `None` keeps it out of KO and life
    /// checks (the `teamside == -1` case).
    pub teamside: Option<Side>,
    pub life: i32,
    pub life_max: i32,
    pub alive: bool,
    /// First member of the team.
    pub leader: bool,
    /// Life dropped below maximum at some point this round.
    pub damaged: bool,
    pub control: bool,
    pub pos: [f32; 2],
    pub start_pos: [f32; 2],
    /// Keeps position and state across the fight-start transition.
    pub intro_reset_exempt: bool,
    /// Reached a pose acceptable for ending the round.
    pub ready: bool,
    /// State change requested by round logic, consumed by the world layer.
    pub pending_state: Option<i32>,
    /// Hits landed this round, most recent last.
    pub hits: Vec<HitRecord>,
}

impl Fighter {
    /// A full-life fighter fighting for `side`.
    pub fn new(side: Side, life_max: i32) -> Self {
        Self {
            side,
            teamside: Some(side),
            life: life_max,
            life_max,
            alive: true,
            leader: false,
            damaged: false,
            control: false,
            pos: [0.0; 2],
            start_pos: [0.0; 2],
            intro_reset_exempt: false,
            ready: true,
            pending_state: None,
            hits: Vec::new(),
        }
    }

    /// Builder: mark as team leader.
    pub fn leader(mut self) -> Self {
        self.leader = true;
        self
    }

    /// Builder: starting position.
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.start_pos = [x, y];
        self.pos = [x, y];
        self
    }

    /// Whether the fighter takes part in team checks.
    pub fn is_active(&self) -> bool {
        self.teamside.is_some()
    }

    /// Remove life, clamping at zero. A fighter at zero life is not alive.
    pub fn apply_damage(&mut self, amount: i32) {
        self.life = (self.life - amount).clamp(0, self.life_max);
        if self.life < self.life_max {
            self.damaged = true;
        }
        if self.life == 0 {
            self.alive = false;
        }
    }

    /// Life as a fraction of maximum.
    pub fn life_fraction(&self) -> f64 {
        if self.life_max <= 0 {
            return 0.0;
        }
        f64::from(self.life) / f64::from(self.life_max)
    }

    fn reset_for_round(&mut self) {
        self.life = self.life_max;
        self.alive = true;
        self.damaged = false;
        self.control = false;
        self.pos = self.start_pos;
        self.ready = true;
        self.pending_state = None;
        self.hits.clear();
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Every fighter in the match plus per-side team settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub fighters: Vec<Fighter>,
    pub team_mode: [TeamMode; 2],
    /// AI difficulty per side; `0` means human-controlled.
    pub ai_level: [u8; 2],
}

impl Roster {
    /// An empty roster with both sides in `Single` mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// One leader per side, single mode.
    pub fn versus(p1: Fighter, p2: Fighter) -> Self {
        let mut roster = Self::new();
        roster.push(p1.leader());
        roster.push(p2.leader());
        roster
    }

    /// Add a fighter, returning its roster index.
    pub fn push(&mut self, fighter: Fighter) -> usize {
        self.fighters.push(fighter);
        self.fighters.len() - 1
    }

    /// Builder: team mode for a side.
    pub fn with_team_mode(mut self, side: Side, mode: TeamMode) -> Self {
        self.team_mode[side.index()] = mode;
        self
    }

    /// Active members fighting for `side`.
    pub fn members(&self, side: Side) -> impl Iterator<Item = &Fighter> {
        self.fighters
            .iter()
            .filter(move |f| f.teamside == Some(side))
    }

    /// Active members fighting for `side`, with their roster indices.
    pub fn indexed_members(&self, side: Side) -> impl Iterator<Item = (usize, &Fighter)> {
        self.fighters
            .iter()
            .enumerate()
            .filter(move |(_, f)| f.teamside == Some(side))
    }

    /// The leader of `side`, if one is marked.
    pub fn leader(&self, side: Side) -> Option<&Fighter> {
        self.members(side).find(|f| f.leader)
    }

    /// Record that fighter `attacker` hit fighter `victim`.
    pub fn record_hit(&mut self, attacker: usize, victim: usize, attr: HitAttr) {
        if let Some(f) = self.fighters.get_mut(attacker) {
            f.hits.push(HitRecord { victim, attr });
        }
    }

    /// Restore every fighter to its round-start state.
    pub fn reset_for_round(&mut self) {
        for fighter in &mut self.fighters {
            fighter.reset_for_round();
        }
    }

    /// Move non-exempt fighters back to their start positions. Returns how
    /// many were moved.
    pub fn reset_positions(&mut self) -> usize {
        let mut moved = 0;
        for fighter in self.fighters.iter_mut().filter(|f| !f.intro_reset_exempt) {
            fighter.pos = fighter.start_pos;
            moved += 1;
        }
        moved
    }

    /// Give control to every living active fighter and request the standing
    /// state for those not exempt.
    pub fn grant_control(&mut self) {
        for fighter in self
            .fighters
            .iter_mut()
            .filter(|f| f.is_active() && f.alive)
        {
            fighter.control = true;
            if !fighter.intro_reset_exempt {
                fighter.pending_state = Some(STATE_STAND);
            }
        }
    }

    /// Whether every active fighter reached a terminal pose.
    pub fn all_ready(&self) -> bool {
        self.fighters
            .iter()
            .filter(|f| f.is_active())
            .all(|f| f.ready)
    }

    /// Request win, lose or draw poses once the outcome is locked.
    pub fn start_win_poses(&mut self, win_team: Option<Side>, time_over: bool) {
        for fighter in self
            .fighters
            .iter_mut()
            .filter(|f| f.is_active() && f.alive)
        {
            fighter.control = false;
            fighter.pending_state = match win_team {
                Some(side) if fighter.teamside == Some(side) => Some(STATE_WIN),
                Some(_) if time_over => Some(STATE_LOSE_TIME_OVER),
                Some(_) => fighter.pending_state,
                None => Some(STATE_DRAW),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_on_two() -> Roster {
        let mut roster = Roster::new()
            .with_team_mode(Side::P1, TeamMode::Simul)
            .with_team_mode(Side::P2, TeamMode::Simul);
        roster.push(Fighter::new(Side::P1, 1000).leader().at(-70.0, 0.0));
        roster.push(Fighter::new(Side::P2, 1000).leader().at(70.0, 0.0));
        roster.push(Fighter::new(Side::P1, 1000).at(-110.0, 0.0));
        roster.push(Fighter::new(Side::P2, 1000).at(110.0, 0.0));
        roster
    }

    #[test]
    fn members_filter_by_teamside() {
        let mut roster = two_on_two();
        assert_eq!(roster.members(Side::P1).count(), 2);
        roster.fighters[2].teamside = None;
        assert_eq!(roster.members(Side::P1).count(), 1);
        assert_eq!(roster.leader(Side::P2).map(|f| f.start_pos[0]), Some(70.0));
    }

    #[test]
    fn damage_marks_and_kills() {
        let mut fighter = Fighter::new(Side::P1, 100);
        fighter.apply_damage(30);
        assert!(fighter.damaged);
        assert!(fighter.alive);
        assert!((fighter.life_fraction() - 0.7).abs() < 1e-12);
        fighter.apply_damage(500);
        assert_eq!(fighter.life, 0);
        assert!(!fighter.alive);
    }

    #[test]
    fn position_reset_respects_exemption() {
        let mut roster = two_on_two();
        for f in &mut roster.fighters {
            f.pos = [0.0, 0.0];
        }
        roster.fighters[1].intro_reset_exempt = true;
        assert_eq!(roster.reset_positions(), 3);
        assert_eq!(roster.fighters[0].pos, [-70.0, 0.0]);
        assert_eq!(roster.fighters[1].pos, [0.0, 0.0]);
    }

    #[test]
    fn grant_control_skips_dead_and_inactive() {
        let mut roster = two_on_two();
        roster.fighters[2].alive = false;
        roster.fighters[3].teamside = None;
        roster.fighters[1].intro_reset_exempt = true;
        roster.grant_control();

        assert!(roster.fighters[0].control);
        assert_eq!(roster.fighters[0].pending_state, Some(STATE_STAND));
        assert!(roster.fighters[1].control);
        assert_eq!(roster.fighters[1].pending_state, None);
        assert!(!roster.fighters[2].control);
        assert!(!roster.fighters[3].control);
    }

    #[test]
    fn win_poses_by_outcome() {
        let mut roster = two_on_two();
        roster.start_win_poses(Some(Side::P1), true);
        assert_eq!(roster.fighters[0].pending_state, Some(STATE_WIN));
        assert_eq!(roster.fighters[1].pending_state, Some(STATE_LOSE_TIME_OVER));

        let mut roster = two_on_two();
        roster.start_win_poses(None, true);
        assert!(roster
            .fighters
            .iter()
            .all(|f| f.pending_state == Some(STATE_DRAW)));
    }

    #[test]
    fn reset_for_round_restores_life_and_clears_hits() {
        let mut roster = two_on_two();
        roster.fighters[0].apply_damage(1000);
        roster.record_hit(1, 0, HitAttr::default());
        roster.reset_for_round();
        assert!(roster.fighters[0].alive);
        assert_eq!(roster.fighters[0].life, 1000);
        assert!(!roster.fighters[0].damaged);
        assert!(roster.fighters[1].hits.is_empty());
    }
}
