// Flavor texts and emotes for battle royale announcements, loaded from
// `<data_dir>/gambling.json`.

use std::collections::HashMap;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use crate::config::ConfigError;

pub const FLAVOR_FILE: &str = "gambling.json";
pub const USER_PLACEHOLDER: &str = "[USER]";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Flavor {
    /// Lobby opening lines; `[USER]` is replaced with the host's name.
    pub arena_init_texts: Vec<String>,
    pub custom_weapons: HashMap<String, String>,
    pub custom_suicides: HashMap<String, String>,
    pub suicide_emotes: Vec<String>,
    pub exotic_weapons: Vec<String>,
    pub weapon_emotes: Vec<String>,
}

impl Default for Flavor {
    fn default() -> Self {
        let strings = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            arena_init_texts: strings(&[
                "[USER] has called for a battle royale! Who dares to step into the arena?",
                "The gates of the arena open. [USER] is looking for a fight!",
                "[USER] sharpens their blade and waits for challengers.",
            ]),
            custom_weapons: HashMap::new(),
            custom_suicides: HashMap::new(),
            suicide_emotes: strings(&[":skull:", ":coffin:", ":boom:"]),
            exotic_weapons: strings(&[":dragon:", ":unicorn:", ":comet:"]),
            weapon_emotes: strings(&[":gun:", ":dagger:", ":bow_and_arrow:", ":axe:", ":crossed_swords:"]),
        }
    }
}

impl Flavor {
    /// Load flavor texts from the data directory. A missing file falls back
    /// to the built-in defaults.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(FLAVOR_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Flavor file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io { path, source: e }),
        };
        Self::from_json(&contents).map_err(|e| ConfigError::Flavor { path, source: e })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Pick an opening line for `host`, avoiding `previous` when there is
    /// any alternative.
    pub fn opening_text<R: Rng + ?Sized>(&self, host: &str, previous: &str, rng: &mut R) -> String {
        let candidates: Vec<String> = self
            .arena_init_texts
            .iter()
            .map(|t| t.replace(USER_PLACEHOLDER, host))
            .collect();

        let fresh: Vec<&String> = candidates.iter().filter(|t| *t != previous).collect();
        match fresh.choose(rng) {
            Some(text) => (*text).clone(),
            None => candidates
                .first()
                .cloned()
                .unwrap_or_else(|| format!("{host} has called for a battle royale!")),
        }
    }

    pub fn suicide_emote<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.suicide_emotes
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(":skull:")
    }
}
