// Battle royale elimination simulator.
//
// Pure and synchronous: consumes a roster, a prize pool, a weapon loadout and
// a randomness source, and produces structured events plus a scoreboard.
// Pacing, announcements and bookkeeping belong to the caller.

pub mod loadout;
pub mod probabilities;
pub mod sampling;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use loadout::Loadout;
pub use probabilities::Probabilities;
pub use sampling::{elimination_count, Entropy, RngEntropy};

pub const MIN_PARTICIPANTS: usize = 2;

pub const KILL_POINTS: i64 = 1;
pub const BOMB_OR_MELEE_BONUS: i64 = 1;
pub const EXOTIC_BONUS: i64 = 10;
pub const SHUTDOWN_BONUS: i64 = 1;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("a battle royale needs at least {MIN_PARTICIPANTS} participants, got {0}")]
    InvalidRoster(usize),
    #[error("participant '{0}' appears more than once")]
    DuplicateParticipant(String),
    #[error("invalid probability configuration: {0}")]
    InvalidProbability(String),
    #[error("prize pool must not be negative, got {0}")]
    InvalidPool(i64),
}

/// Bonus awarded on top of the base kill point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "bonus", content = "points", rename_all = "snake_case")]
pub enum BonusNote {
    Bomb,
    Melee,
    Exotic,
    /// Consecutive kill number `n` by the same killer, worth `n` points.
    Streak(u32),
    Shutdown,
}

impl BonusNote {
    pub fn points(self) -> i64 {
        match self {
            BonusNote::Bomb | BonusNote::Melee => BOMB_OR_MELEE_BONUS,
            BonusNote::Exotic => EXOTIC_BONUS,
            BonusNote::Streak(n) => i64::from(n),
            BonusNote::Shutdown => SHUTDOWN_BONUS,
        }
    }
}

impl fmt::Display for BonusNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BonusNote::Bomb => write!(f, "Bomb kill bonus: {}", self.points()),
            BonusNote::Melee => write!(f, "Melee kill bonus: {}", self.points()),
            BonusNote::Exotic => write!(f, "Exotic kill bonus: {}", self.points()),
            BonusNote::Streak(n) => write!(f, "Streak bonus: {n}"),
            BonusNote::Shutdown => write!(f, "Shutdown bonus: {}", self.points()),
        }
    }
}

/// Outcome of one scheduled elimination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundEvent {
    Suicide {
        victim: String,
    },
    Block {
        attacker: String,
        defender: String,
    },
    Kill {
        attacker: String,
        victim: String,
        weapon: String,
        notes: Vec<BonusNote>,
    },
}

impl RoundEvent {
    /// Participant removed from the roster by this event, if any.
    pub fn eliminated(&self) -> Option<&str> {
        match self {
            RoundEvent::Suicide { victim } | RoundEvent::Kill { victim, .. } => Some(victim),
            RoundEvent::Block { .. } => None,
        }
    }

    /// Points credited to the attacker by this event.
    pub fn points(&self) -> i64 {
        match self {
            RoundEvent::Kill { notes, .. } => {
                KILL_POINTS + notes.iter().map(|n| n.points()).sum::<i64>()
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Round {
    pub number: u32,
    pub events: Vec<RoundEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakRecord {
    pub holder: String,
    pub length: u32,
}

/// Kill-and-bonus points per participant. The prize pool is never included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scoreboard {
    scores: BTreeMap<String, i64>,
    kills: BTreeMap<String, u32>,
}

impl Scoreboard {
    pub fn score(&self, participant: &str) -> i64 {
        self.scores.get(participant).copied().unwrap_or(0)
    }

    pub fn kills(&self, participant: &str) -> u32 {
        self.kills.get(participant).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.scores.values().sum()
    }

    /// Participants with a non-zero score.
    pub fn entries(&self) -> impl Iterator<Item = (&str, i64)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Highest scorer; ties go to the lexicographically smallest name.
    pub fn top(&self) -> Option<(&str, i64)> {
        self.entries()
            .fold(None, |best: Option<(&str, i64)>, (name, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((name, score)),
            })
    }

    fn credit(&mut self, participant: &str, points: i64) {
        *self.scores.entry(participant.to_string()).or_insert(0) += points;
    }

    fn count_kill(&mut self, participant: &str) {
        *self.kills.entry(participant.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Default)]
struct StreakState {
    last_killer: Option<String>,
    count: u32,
}

/// Final result of a completed battle.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub participants: Vec<String>,
    pub winner: String,
    pub pool: i64,
    pub rounds: u32,
    pub events: Vec<RoundEvent>,
    pub scoreboard: Scoreboard,
    pub longest_streak: Option<StreakRecord>,
}

impl Outcome {
    /// Reporting view: every participant with the pool added to the winner,
    /// highest first. Ties keep roster order.
    pub fn standings(&self) -> Vec<(String, i64)> {
        let mut standings: Vec<(String, i64)> = self
            .participants
            .iter()
            .map(|p| {
                let mut score = self.scoreboard.score(p);
                if *p == self.winner {
                    score += self.pool;
                }
                (p.clone(), score)
            })
            .collect();
        standings.sort_by(|a, b| b.1.cmp(&a.1));
        standings
    }
}

/// A battle in progress, advanced one round at a time.
///
/// Each `Battle` owns its roster and scoreboard; running several battles at
/// once only requires separate instances and separate entropy sources.
#[derive(Debug, Clone)]
pub struct Battle {
    participants: Vec<String>,
    roster: Vec<String>,
    pool: i64,
    loadout: Loadout,
    odds: Probabilities,
    scoreboard: Scoreboard,
    streak: StreakState,
    longest_streak: Option<StreakRecord>,
    rounds: u32,
    log: Vec<RoundEvent>,
}

impl Battle {
    pub fn new(
        roster: Vec<String>,
        pool: i64,
        loadout: Loadout,
        odds: Probabilities,
    ) -> Result<Self, SimulationError> {
        if roster.len() < MIN_PARTICIPANTS {
            return Err(SimulationError::InvalidRoster(roster.len()));
        }
        let mut seen = HashSet::new();
        for participant in &roster {
            if !seen.insert(participant.as_str()) {
                return Err(SimulationError::DuplicateParticipant(participant.clone()));
            }
        }
        odds.validate()?;
        if pool < 0 {
            return Err(SimulationError::InvalidPool(pool));
        }

        Ok(Self {
            participants: roster.clone(),
            roster,
            pool,
            loadout,
            odds,
            scoreboard: Scoreboard::default(),
            streak: StreakState::default(),
            longest_streak: None,
            rounds: 0,
            log: Vec::new(),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.roster.len() <= 1
    }

    /// Participants still in the arena.
    pub fn remaining(&self) -> &[String] {
        &self.roster
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds
    }

    /// Play one round. Returns `None` once a single participant remains.
    pub fn next_round<E: Entropy + ?Sized>(&mut self, entropy: &mut E) -> Option<Round> {
        if self.is_finished() {
            return None;
        }

        let scheduled = if self.roster.len() > 3 {
            elimination_count(self.roster.len(), entropy.unit())
        } else {
            1
        };

        let mut events = Vec::with_capacity(scheduled);
        for _ in 0..scheduled {
            if self.is_finished() {
                break;
            }
            let event = self.resolve_elimination(entropy);
            self.log.push(event.clone());
            events.push(event);
        }

        self.rounds += 1;
        Some(Round {
            number: self.rounds,
            events,
        })
    }

    /// Play all remaining rounds and return the outcome.
    pub fn run_to_end<E: Entropy + ?Sized>(mut self, entropy: &mut E) -> Outcome {
        while self.next_round(entropy).is_some() {}
        self.finish()
    }

    /// Final outcome, or the unfinished battle back if more than one
    /// participant remains.
    pub fn into_outcome(self) -> Result<Outcome, Self> {
        if !self.is_finished() {
            return Err(self);
        }
        Ok(self.finish())
    }

    fn finish(mut self) -> Outcome {
        let winner = self.roster.swap_remove(0);
        Outcome {
            participants: self.participants,
            winner,
            pool: self.pool,
            rounds: self.rounds,
            events: self.log,
            scoreboard: self.scoreboard,
            longest_streak: self.longest_streak,
        }
    }

    fn resolve_elimination<E: Entropy + ?Sized>(&mut self, entropy: &mut E) -> RoundEvent {
        let target_idx = entropy.index(self.roster.len());
        let draw = entropy.unit();

        if draw < self.odds.suicide {
            let victim = self.roster.remove(target_idx);
            return RoundEvent::Suicide { victim };
        }

        // Uniform over everyone except the target.
        let mut killer_idx = entropy.index(self.roster.len() - 1);
        if killer_idx >= target_idx {
            killer_idx += 1;
        }
        let killer = self.roster[killer_idx].clone();

        if draw >= self.odds.kill_threshold() {
            return RoundEvent::Block {
                attacker: killer,
                defender: self.roster[target_idx].clone(),
            };
        }

        let victim = self.roster.remove(target_idx);
        let mut notes = Vec::new();

        let weapon = if draw < self.odds.bomb_or_melee_threshold() {
            if draw < self.odds.bomb_threshold() {
                notes.push(BonusNote::Bomb);
                loadout::BOMB_TOKEN.to_string()
            } else {
                notes.push(BonusNote::Melee);
                loadout::MELEE_TOKEN.to_string()
            }
        } else if draw < self.odds.exotic_threshold() {
            notes.push(BonusNote::Exotic);
            self.loadout.pick_exotic(entropy)
        } else {
            self.loadout.weapon_for(&killer).to_string()
        };

        if self.streak.last_killer.as_deref() == Some(killer.as_str()) {
            self.streak.count += 1;
            notes.push(BonusNote::Streak(self.streak.count));
            let beaten = self
                .longest_streak
                .as_ref()
                .map_or(true, |record| self.streak.count > record.length);
            if beaten {
                self.longest_streak = Some(StreakRecord {
                    holder: killer.clone(),
                    length: self.streak.count,
                });
            }
        } else {
            if self.streak.count > 1 && self.streak.last_killer.as_deref() == Some(victim.as_str())
            {
                notes.push(BonusNote::Shutdown);
            }
            self.streak = StreakState {
                last_killer: Some(killer.clone()),
                count: 1,
            };
        }

        let points = KILL_POINTS + notes.iter().map(|n| n.points()).sum::<i64>();
        self.scoreboard.credit(&killer, points);
        self.scoreboard.count_kill(&killer);

        RoundEvent::Kill {
            attacker: killer,
            victim,
            weapon,
            notes,
        }
    }
}

/// Run a complete battle royale.
pub fn run<E: Entropy + ?Sized>(
    roster: Vec<String>,
    pool: i64,
    loadout: Loadout,
    odds: Probabilities,
    entropy: &mut E,
) -> Result<Outcome, SimulationError> {
    let battle = Battle::new(roster, pool, loadout, odds)?;
    Ok(battle.run_to_end(entropy))
}


#[cfg(test)]
mod tests {
    use super::testing::Scripted;
    use super::*;

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rejects_small_rosters() {
        let odds = Probabilities::default();
        let mut entropy = Scripted::new(&[], &[]);
        assert_eq!(
            run(vec![], 0, Loadout::default(), odds, &mut entropy).unwrap_err(),
            SimulationError::InvalidRoster(0)
        );
        assert_eq!(
            run(roster(&["a"]), 0, Loadout::default(), odds, &mut entropy).unwrap_err(),
            SimulationError::InvalidRoster(1)
        );
    }

    #[test]
    fn test_rejects_duplicates_and_negative_pool() {
        let odds = Probabilities::default();
        let err = Battle::new(roster(&["a", "b", "a"]), 0, Loadout::default(), odds).unwrap_err();
        assert_eq!(err, SimulationError::DuplicateParticipant("a".into()));

        let err = Battle::new(roster(&["a", "b"]), -5, Loadout::default(), odds).unwrap_err();
        assert_eq!(err, SimulationError::InvalidPool(-5));
    }

    #[test]
    fn test_three_participant_scenario() {
        // Round 1: target A (0), killer B (index 0 of [B, C]).
        // Round 2: target C (1 of [B, C]), killer B (index 0 of [B]).
        let mut entropy = Scripted::new(&[0.5, 0.5], &[0, 0, 1, 0]);
        let outcome = run(
            roster(&["A", "B", "C"]),
            30,
            Loadout::default(),
            Probabilities::weapon_kills_only(),
            &mut entropy,
        )
        .unwrap();

        assert!(entropy.is_drained());
        assert_eq!(outcome.winner, "B");
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.scoreboard.kills("B"), 2);
        // Two base kills plus the streak bonus for the second consecutive kill.
        assert_eq!(outcome.scoreboard.score("B"), 4);
        assert_eq!(outcome.scoreboard.score("A"), 0);
        assert_eq!(outcome.scoreboard.score("C"), 0);
        assert!(outcome
            .events
            .iter()
            .all(|e| matches!(e, RoundEvent::Kill { .. })));
        assert_eq!(
            outcome.longest_streak,
            Some(StreakRecord {
                holder: "B".into(),
                length: 2
            })
        );

        let standings = outcome.standings();
        assert_eq!(standings[0], ("B".to_string(), 34));
    }

    #[test]
    fn test_block_keeps_roster() {
        let odds = Probabilities {
            block: 0.5,
            ..Probabilities::weapon_kills_only()
        };
        // Draw 0.9 >= 1 - 0.5 -> blocked.
        let mut battle = Battle::new(roster(&["a", "b"]), 0, Loadout::default(), odds).unwrap();
        let mut entropy = Scripted::new(&[0.9], &[0, 0]);
        let round = battle.next_round(&mut entropy).unwrap();

        assert_eq!(
            round.events,
            vec![RoundEvent::Block {
                attacker: "b".into(),
                defender: "a".into()
            }]
        );
        assert_eq!(battle.remaining().len(), 2);
        assert_eq!(battle.scoreboard().total(), 0);
        assert!(!battle.is_finished());
    }

    #[test]
    fn test_bomb_melee_and_exotic_bands() {
        let odds = Probabilities {
            suicide: 0.0,
            block: 0.0,
            bomb_or_melee: 0.2,
            exotic: 0.1,
        };
        let loadout = Loadout::new(BTreeMap::new(), vec![":dragon:".into()]);

        let cases = [
            (0.05, BonusNote::Bomb, loadout::BOMB_TOKEN),
            (0.15, BonusNote::Melee, loadout::MELEE_TOKEN),
            (0.25, BonusNote::Exotic, ":dragon:"),
        ];
        for (draw, note, token) in cases {
            let mut battle =
                Battle::new(roster(&["a", "b"]), 0, loadout.clone(), odds).unwrap();
            let extra = if note == BonusNote::Exotic { 3 } else { 2 };
            let indices: Vec<usize> = vec![0, 0, 0][..extra].to_vec();
            let mut entropy = Scripted::new(&[draw], &indices);
            let round = battle.next_round(&mut entropy).unwrap();
            match &round.events[0] {
                RoundEvent::Kill { weapon, notes, .. } => {
                    assert_eq!(weapon, token);
                    assert_eq!(notes, &vec![note]);
                }
                other => panic!("expected kill, got {other:?}"),
            }
            assert_eq!(battle.scoreboard().score("b"), 1 + note.points());
        }
    }

    #[test]
    fn test_plain_kill_uses_assigned_weapon() {
        let mut weapons = BTreeMap::new();
        weapons.insert("b".to_string(), ":axe:".to_string());
        let loadout = Loadout::new(weapons, vec![]);
        let mut entropy = Scripted::new(&[0.5], &[0, 0]);
        let outcome = run(
            roster(&["a", "b"]),
            10,
            loadout,
            Probabilities::default(),
            &mut entropy,
        )
        .unwrap();

        assert_eq!(
            outcome.events,
            vec![RoundEvent::Kill {
                attacker: "b".into(),
                victim: "a".into(),
                weapon: ":axe:".into(),
                notes: vec![],
            }]
        );
        assert_eq!(outcome.winner, "b");
    }

    #[test]
    fn test_bonus_note_display() {
        assert_eq!(BonusNote::Bomb.to_string(), "Bomb kill bonus: 1");
        assert_eq!(BonusNote::Melee.to_string(), "Melee kill bonus: 1");
        assert_eq!(BonusNote::Exotic.to_string(), "Exotic kill bonus: 10");
        assert_eq!(BonusNote::Streak(4).to_string(), "Streak bonus: 4");
        assert_eq!(BonusNote::Shutdown.to_string(), "Shutdown bonus: 1");
    }

    #[test]
    fn test_unfinished_battle_has_no_outcome() {
        let battle = Battle::new(
            roster(&["a", "b", "c"]),
            0,
            Loadout::default(),
            Probabilities::default(),
        )
        .unwrap();
        assert!(battle.into_outcome().is_err());
    }

    #[test]
    fn test_event_serialization() {
        let event = RoundEvent::Kill {
            attacker: "a".into(),
            victim: "b".into(),
            weapon: ":gun:".into(),
            notes: vec![BonusNote::Streak(2)],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"kill\""));
        assert!(json.contains("\"bonus\":\"streak\""));
        assert!(json.contains("\"points\":2"));
    }
}
