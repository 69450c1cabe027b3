// Chat-style rendering of battle royale events, lobby messages and results.

use rand::Rng;

use crate::flavor::Flavor;
use crate::royale::loadout::SHIELD_TOKEN;
use crate::royale::{Outcome, RoundEvent};

pub const PREFIX: &str = "**[BATTLE ROYALE]** ";

/// Maximum length of one chat message.
pub const MESSAGE_LIMIT: usize = 2000;
const CODE_FENCE: &str = "```";
const CODE_BLOCK_LIMIT: usize = MESSAGE_LIMIT - 2 * CODE_FENCE.len();

const CONFETTI: &str = ":confetti_ball: :confetti_ball: :confetti_ball:";

pub fn prefixed(text: &str) -> String {
    format!("{PREFIX}{text}")
}

/// Render one round event. Suicides use the victim's custom text when
/// present, otherwise a random suicide emote.
pub fn event_line<R: Rng + ?Sized>(event: &RoundEvent, flavor: &Flavor, rng: &mut R) -> String {
    match event {
        RoundEvent::Suicide { victim } => match flavor.custom_suicides.get(victim) {
            Some(text) => prefixed(&format!("{victim} {text}")),
            None => {
                let emote = flavor.suicide_emote(rng);
                prefixed(&format!("{victim} {emote} {victim}"))
            }
        },
        RoundEvent::Block { attacker, defender } => {
            prefixed(&format!("{attacker} {SHIELD_TOKEN} {defender}"))
        }
        RoundEvent::Kill {
            attacker,
            victim,
            weapon,
            notes,
        } => {
            let mut line = prefixed(&format!("{attacker} {weapon} {victim}"));
            for note in notes {
                line.push_str(&format!(" *({note})*"));
            }
            line
        }
    }
}

pub fn winner_line(winner: &str, pool: i64, currency: &str) -> String {
    prefixed(&format!(
        "{CONFETTI} {winner} wins, taking home the pool of {pool} {currency}s! {CONFETTI}"
    ))
}

/// Final scoreboard as a code block. The winner's score includes the pool;
/// participants without points are listed with 0.
pub fn scoreboard(outcome: &Outcome) -> String {
    let indent = outcome
        .participants
        .iter()
        .map(|p| p.chars().count())
        .max()
        .unwrap_or(0);

    let mut result = format!("{CODE_FENCE}Scoreboard \n\n");
    for (name, score) in outcome.standings() {
        result.push_str(&format!("{name:<indent$}   {score}\n"));
    }
    result.push_str(CODE_FENCE);
    result
}

// ── Lobby ────────────────────────────────────────────────────────────

pub fn entry_prompt(bet: i64) -> String {
    prefixed(&format!(
        "Type !joinbr (entry fee is {bet}) to join the ranks of the challengers."
    ))
}

pub fn joined(user: &str, pool: i64, currency: &str) -> String {
    prefixed(&format!(
        "{user} has joined the challengers! The prize pool is now at {pool} {currency}s."
    ))
}

pub fn one_minute_left() -> String {
    prefixed("Battle royale will start in 1 minute. Type !joinbr to take part!")
}

pub fn thirty_seconds_left() -> String {
    prefixed("Battle royale will start in 30 seconds. Type !joinbr to take part!")
}

pub fn waiting_for_players(min_users: usize) -> String {
    prefixed(&format!(
        "Waiting for more people to join the bloodshed (min {min_users} participants)."
    ))
}

pub fn cancelled(min_users: usize) -> String {
    prefixed(&format!(
        "The battle royale has been canceled due to a lack of interest in the bloodshed. Cowards! (min {min_users} participants)."
    ))
}

pub fn stopped(refunded: usize) -> String {
    prefixed(&format!(
        "The battle royale has been stopped by an admin. Entry fees were returned to {refunded} fighters."
    ))
}

pub fn battle_start(fighters: usize, host: &str, pool: i64, currency: &str) -> String {
    prefixed(&format!(
        "Ladies and gentlemen, the battle royale is about to begin. {fighters} brave fighters have stepped into the arena after {host} called for a grand battle. They fight over {pool} {currency}s. Additionally, at least 1 {currency} is granted for each kill on the field. Good luck! :drum:"
    ))
}

pub fn settlement_failure(operation: &str, user: Option<&str>) -> String {
    match user {
        Some(user) => format!("**[ERROR]** Could not apply {operation} for {user}."),
        None => format!("**[ERROR]** Could not apply {operation}."),
    }
}

/// Split `text` into messages that fit the chat limit. A message wrapped in
/// a code block is split inside the block and every chunk re-wrapped.
pub fn chunk_message(text: &str) -> Vec<String> {
    let inner = text
        .strip_prefix(CODE_FENCE)
        .and_then(|t| t.strip_suffix(CODE_FENCE))
        .filter(|_| text.len() >= 2 * CODE_FENCE.len());

    let (body, size, fenced) = match inner {
        Some(inner) => (inner, CODE_BLOCK_LIMIT, true),
        None => (text, MESSAGE_LIMIT, false),
    };

    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() {
        return vec![text.to_string()];
    }

    chars
        .chunks(size)
        .map(|chunk| {
            let chunk: String = chunk.iter().collect();
            if fenced {
                format!("{CODE_FENCE}{chunk}{CODE_FENCE}")
            } else {
                chunk
            }
        })
        .collect()
}
