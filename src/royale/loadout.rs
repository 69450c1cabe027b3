// Weapon tokens used when rendering kills.

use std::collections::{BTreeMap, HashMap};

use super::sampling::Entropy;

pub const BOMB_TOKEN: &str = ":bomb:";
pub const MELEE_TOKEN: &str = ":right_facing_fist:";
pub const SHIELD_TOKEN: &str = ":shield:";

/// Used when a killer has no assigned weapon.
pub const DEFAULT_WEAPON: &str = ":gun:";
/// Used for exotic kills when no exotic tokens are configured.
pub const DEFAULT_EXOTIC: &str = ":comet:";

/// Weapon assignment for one battle plus the pool of exotic tokens.
///
/// Assignments are fixed once the battle starts.
#[derive(Debug, Clone, Default)]
pub struct Loadout {
    weapons: BTreeMap<String, String>,
    exotics: Vec<String>,
}

impl Loadout {
    pub fn new(weapons: BTreeMap<String, String>, exotics: Vec<String>) -> Self {
        Self { weapons, exotics }
    }

    /// Give every participant their custom weapon if they have one, otherwise
    /// a random token from `pool`.
    pub fn assign<E: Entropy + ?Sized>(
        roster: &[String],
        custom: &HashMap<String, String>,
        pool: &[String],
        exotics: Vec<String>,
        entropy: &mut E,
    ) -> Self {
        let weapons = roster
            .iter()
            .map(|participant| {
                let weapon = match custom.get(participant) {
                    Some(w) => w.clone(),
                    None if !pool.is_empty() => pool[entropy.index(pool.len())].clone(),
                    None => DEFAULT_WEAPON.to_string(),
                };
                (participant.clone(), weapon)
            })
            .collect();
        Self { weapons, exotics }
    }

    pub fn weapon_for(&self, participant: &str) -> &str {
        self.weapons
            .get(participant)
            .map(String::as_str)
            .unwrap_or(DEFAULT_WEAPON)
    }

    pub fn weapons(&self) -> &BTreeMap<String, String> {
        &self.weapons
    }

    pub(crate) fn pick_exotic<E: Entropy + ?Sized>(&self, entropy: &mut E) -> String {
        if self.exotics.is_empty() {
            return DEFAULT_EXOTIC.to_string();
        }
        self.exotics[entropy.index(self.exotics.len())].clone()
    }
}
