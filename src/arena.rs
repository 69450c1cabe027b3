// Battle royale arena: one lobby at a time, paced round by round, with every
// announcement broadcast to subscribers as JSON.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

use crate::announce;
use crate::config::BattleSettings;
use crate::flavor::Flavor;
use crate::ledger::{Ledger, LedgerError, SettlementReport};
use crate::metrics;
use crate::royale::{Battle, Loadout, Outcome, Round, RoundEvent, RngEntropy, SimulationError};

/// Join windows granted before a lobby without enough fighters is cancelled.
pub const JOIN_WINDOWS: u32 = 3;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("there is already a battle royale in progress")]
    AlreadyRunning,
    #[error("the entry fee must be at least {min}, got {bet}")]
    BetTooLow { bet: i64, min: i64 },
    #[error("the entry fee must not exceed {max}, got {bet}")]
    BetTooHigh { bet: i64, max: i64 },
    #[error("there is no open battle royale to join")]
    LobbyClosed,
    #[error("{0} is already taking part in this battle royale")]
    AlreadyJoined(String),
    #[error("no battle royale is in progress")]
    NotRunning,
    #[error("lobby {0} is not the current lobby")]
    UnknownLobby(Uuid),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyPhase {
    Open,
    Fighting,
    /// The last round is over; payouts are being applied.
    Settling,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lobby {
    pub id: Uuid,
    pub host: String,
    pub bet: i64,
    pub pool: i64,
    pub participants: Vec<String>,
    pub phase: LobbyPhase,
}

/// Messages broadcast to arena subscribers.
#[derive(Clone, Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaMessage {
    /// One chat line, already chunked to the message limit.
    Announcement { text: String },
    /// Structured events of a finished round.
    Round(Round),
    /// Final standings, pool included for the winner.
    Result {
        winner: String,
        pool: i64,
        standings: Vec<(String, i64)>,
    },
}

/// How a lobby ended.
#[derive(Debug)]
pub enum LobbyResult {
    /// Too few fighters joined; entry fees were returned.
    Cancelled { refunds: SettlementReport },
    /// An admin stopped the lobby or battle; entry fees were returned.
    Stopped { refunds: SettlementReport },
    Finished {
        outcome: Outcome,
        settlement: SettlementReport,
    },
}

pub struct Arena {
    settings: BattleSettings,
    flavor: Flavor,
    currency: String,
    ledger: Ledger,
    lobby: Mutex<Option<Lobby>>,
    last_opening: Mutex<String>,
    stop_requested: AtomicBool,
    stop_signal: Notify,
    broadcast_tx: broadcast::Sender<String>,
}

impl Arena {
    pub fn new(settings: BattleSettings, flavor: Flavor, currency: String, ledger: Ledger) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            settings,
            flavor,
            currency,
            ledger,
            lobby: Mutex::new(None),
            last_opening: Mutex::new(String::new()),
            stop_requested: AtomicBool::new(false),
            stop_signal: Notify::new(),
            broadcast_tx: tx,
        }
    }

    /// Subscribe to arena announcements (JSON-encoded `ArenaMessage`s).
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    pub fn settings(&self) -> &BattleSettings {
        &self.settings
    }

    /// Snapshot of the current lobby, if any.
    pub async fn status(&self) -> Option<Lobby> {
        self.lobby.lock().await.clone()
    }

    /// Open a lobby hosted by `user` with entry fee `bet`. The host pays
    /// immediately. Call `run_lobby` with the returned id to drive it.
    pub async fn start(&self, user: &str, bet: i64) -> Result<Lobby, ArenaError> {
        let mut lobby = self.lobby.lock().await;
        if lobby.is_some() {
            return Err(ArenaError::AlreadyRunning);
        }
        if bet < self.settings.min_bet {
            return Err(ArenaError::BetTooLow {
                bet,
                min: self.settings.min_bet,
            });
        }
        if let Some(max) = self.settings.max_bet {
            if bet > max {
                return Err(ArenaError::BetTooHigh { bet, max });
            }
        }

        self.ledger.ensure_account(user).await?;
        self.ledger.charge_entry(user, bet).await?;

        let opened = Lobby {
            id: Uuid::new_v4(),
            host: user.to_string(),
            bet,
            pool: bet,
            participants: vec![user.to_string()],
            phase: LobbyPhase::Open,
        };
        *lobby = Some(opened.clone());
        drop(lobby);

        let opening = {
            let mut last = self.last_opening.lock().await;
            let mut rng = self.make_rng();
            let text = self.flavor.opening_text(user, &last, &mut rng);
            *last = text.clone();
            text
        };

        tracing::info!(lobby = %opened.id, host = user, bet, "Battle royale lobby opened");
        metrics::BATTLES_STARTED_TOTAL.inc();
        metrics::LOBBY_PARTICIPANTS.set(1);

        self.announce(&announce::prefixed(&opening));
        self.announce(&announce::entry_prompt(bet));
        Ok(opened)
    }

    /// Add `user` to the open lobby and charge the entry fee.
    pub async fn join(&self, user: &str) -> Result<Lobby, ArenaError> {
        let mut guard = self.lobby.lock().await;
        let lobby = match guard.as_mut() {
            Some(lobby) if lobby.phase == LobbyPhase::Open => lobby,
            _ => return Err(ArenaError::LobbyClosed),
        };
        if lobby.participants.iter().any(|p| p == user) {
            return Err(ArenaError::AlreadyJoined(user.to_string()));
        }

        self.ledger.ensure_account(user).await?;
        self.ledger.charge_entry(user, lobby.bet).await?;

        lobby.participants.push(user.to_string());
        lobby.pool += lobby.bet;
        metrics::LOBBY_PARTICIPANTS.set(lobby.participants.len() as i64);
        tracing::info!(lobby = %lobby.id, user, pool = lobby.pool, "Participant joined");

        let snapshot = lobby.clone();
        drop(guard);

        self.announce(&announce::joined(user, snapshot.pool, &self.currency));
        Ok(snapshot)
    }

    /// Ask the current lobby or battle to stop at its next pause. Entry fees
    /// are returned by the task running the lobby. A battle that is already
    /// settling can no longer be stopped.
    pub async fn stop(&self) -> Result<Uuid, ArenaError> {
        let lobby = self.lobby.lock().await;
        let id = match lobby.as_ref() {
            Some(l) if l.phase != LobbyPhase::Settling => l.id,
            _ => return Err(ArenaError::NotRunning),
        };
        self.stop_requested.store(true, Ordering::Relaxed);
        self.stop_signal.notify_one();
        tracing::info!(lobby = %id, "Battle royale stop requested");
        Ok(id)
    }

    /// Drive lobby `id` to completion: wait for fighters, then fight, settle
    /// and close the lobby.
    pub async fn run_lobby(&self, id: Uuid) -> Result<LobbyResult, ArenaError> {
        match self.lobby.lock().await.as_ref() {
            Some(lobby) if lobby.id == id => {}
            _ => return Err(ArenaError::UnknownLobby(id)),
        }

        let result = self.run_current(id).await;

        // The flag belongs to this lobby; reset it before another can open.
        let mut guard = self.lobby.lock().await;
        self.stop_requested.store(false, Ordering::Relaxed);
        *guard = None;
        drop(guard);
        metrics::LOBBY_PARTICIPANTS.set(0);
        metrics::ACTIVE_BATTLES.set(0);
        result
    }

    async fn run_current(&self, id: Uuid) -> Result<LobbyResult, ArenaError> {
        let min_users = self.settings.min_users;
        let mut windows = 0;
        while self.participant_count().await < min_users && windows < JOIN_WINDOWS {
            if self.wait_join_window().await {
                return Ok(self.abandon(id, "stopped").await);
            }
            if self.participant_count().await < min_users {
                self.announce(&announce::waiting_for_players(min_users));
            }
            windows += 1;
        }

        let lobby = {
            let mut guard = self.lobby.lock().await;
            match guard.as_mut() {
                Some(lobby) => {
                    lobby.phase = LobbyPhase::Fighting;
                    lobby.clone()
                }
                None => return Err(ArenaError::UnknownLobby(id)),
            }
        };

        if self.stop_requested.load(Ordering::Relaxed) {
            return Ok(self.abandon(id, "stopped").await);
        }
        if lobby.participants.len() < min_users {
            self.announce(&announce::cancelled(min_users));
            return Ok(self.abandon(id, "cancelled").await);
        }

        self.fight(lobby).await
    }

    async fn fight(&self, lobby: Lobby) -> Result<LobbyResult, ArenaError> {
        let mut entropy = RngEntropy(self.make_rng());
        let fighters = lobby.participants.len();

        self.announce(&announce::battle_start(
            fighters,
            &lobby.host,
            lobby.pool,
            &self.currency,
        ));

        let loadout = Loadout::assign(
            &lobby.participants,
            &self.flavor.custom_weapons,
            &self.flavor.weapon_emotes,
            self.flavor.exotic_weapons.clone(),
            &mut entropy,
        );
        let mut battle = match Battle::new(
            lobby.participants.clone(),
            lobby.pool,
            loadout,
            self.settings.odds,
        ) {
            Ok(battle) => battle,
            Err(e) => {
                tracing::error!(lobby = %lobby.id, "Battle could not start: {e}");
                self.refund_all(&lobby).await;
                return Err(e.into());
            }
        };

        metrics::ACTIVE_BATTLES.set(1);
        tracing::info!(lobby = %lobby.id, fighters, pool = lobby.pool, "Battle royale started");

        while !battle.is_finished() {
            let interval = self
                .settings
                .round_intervals_secs
                .choose(&mut entropy.0)
                .copied()
                .unwrap_or(0);
            if self.pause(interval).await {
                return Ok(self.abandon(lobby.id, "stopped").await);
            }

            let Some(round) = battle.next_round(&mut entropy) else {
                break;
            };
            for event in &round.events {
                record_event_metrics(event);
                let line = announce::event_line(event, &self.flavor, &mut entropy.0);
                self.announce(&line);
            }
            self.send(&ArenaMessage::Round(round));
        }

        if self.begin_settling().await {
            return Ok(self.abandon(lobby.id, "stopped").await);
        }

        let outcome = battle.run_to_end(&mut entropy);
        let standings = outcome.standings();

        self.announce(&announce::winner_line(
            &outcome.winner,
            outcome.pool,
            &self.currency,
        ));
        self.announce(&announce::scoreboard(&outcome));
        self.send(&ArenaMessage::Result {
            winner: outcome.winner.clone(),
            pool: outcome.pool,
            standings,
        });

        let settlement = self.ledger.settle(&outcome, lobby.bet).await;
        for failure in &settlement.failures {
            self.announce(&announce::settlement_failure(
                failure.step.operation,
                failure.step.user.as_deref(),
            ));
        }

        metrics::BATTLES_COMPLETED_TOTAL.inc();
        metrics::BATTLE_ROUNDS.observe(f64::from(outcome.rounds));
        metrics::BATTLE_SIZE.observe(fighters as f64);
        tracing::info!(
            lobby = %lobby.id,
            winner = %outcome.winner,
            rounds = outcome.rounds,
            failures = settlement.failures.len(),
            "Battle royale finished"
        );

        Ok(LobbyResult::Finished {
            outcome,
            settlement,
        })
    }

    /// Move the lobby to `Settling` unless a stop slipped in after the last
    /// pause. Returns true when the battle must be abandoned instead.
    async fn begin_settling(&self) -> bool {
        let mut guard = self.lobby.lock().await;
        if self.stop_requested.load(Ordering::Relaxed) {
            return true;
        }
        if let Some(lobby) = guard.as_mut() {
            lobby.phase = LobbyPhase::Settling;
        }
        false
    }

    /// Return every entry fee and report how the lobby ended.
    async fn abandon(&self, id: Uuid, reason: &'static str) -> LobbyResult {
        let lobby = self.lobby.lock().await.clone();
        let refunds = match lobby {
            Some(lobby) => self.refund_all(&lobby).await,
            None => SettlementReport::default(),
        };

        metrics::BATTLES_ABANDONED_TOTAL
            .with_label_values(&[reason])
            .inc();
        tracing::info!(lobby = %id, reason, refunded = refunds.applied.len(), "Battle royale abandoned");

        if reason == "stopped" {
            self.announce(&announce::stopped(refunds.applied.len()));
            LobbyResult::Stopped { refunds }
        } else {
            LobbyResult::Cancelled { refunds }
        }
    }

    async fn refund_all(&self, lobby: &Lobby) -> SettlementReport {
        let mut report = SettlementReport::default();
        for participant in &lobby.participants {
            let result = self.ledger.refund_entry(participant, lobby.bet).await;
            report.record("refund_entry", Some(participant.as_str()), result);
        }
        for failure in &report.failures {
            self.announce(&announce::settlement_failure(
                failure.step.operation,
                failure.step.user.as_deref(),
            ));
        }
        report
    }

    /// One join window, with reminders when it is longer than a minute.
    /// Returns true when a stop was requested.
    async fn wait_join_window(&self) -> bool {
        let delay = self.settings.delay_secs;
        if delay <= 60 {
            return self.pause(delay).await;
        }
        if self.pause(delay - 60).await {
            return true;
        }
        self.announce(&announce::one_minute_left());
        if self.pause(30).await {
            return true;
        }
        self.announce(&announce::thirty_seconds_left());
        self.pause(30).await
    }

    /// Sleep for `secs`, waking early on a stop request. Returns true when
    /// a stop was requested.
    async fn pause(&self, secs: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(secs);
        while !self.stop_requested.load(Ordering::Relaxed) {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                _ = self.stop_signal.notified() => {}
            }
        }
        self.stop_requested.load(Ordering::Relaxed)
    }

    async fn participant_count(&self) -> usize {
        self.lobby
            .lock()
            .await
            .as_ref()
            .map_or(0, |l| l.participants.len())
    }

    fn make_rng(&self) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn announce(&self, text: &str) {
        tracing::debug!("{text}");
        for chunk in announce::chunk_message(text) {
            self.send(&ArenaMessage::Announcement { text: chunk });
        }
    }

    fn send(&self, msg: &ArenaMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                // No subscribers is not an error
                let _ = self.broadcast_tx.send(json);
            }
            Err(e) => tracing::error!("Failed to encode arena message: {e}"),
        }
    }
}

fn record_event_metrics(event: &RoundEvent) {
    match event {
        RoundEvent::Suicide { .. } => metrics::ELIMINATIONS_TOTAL
            .with_label_values(&["suicide"])
            .inc(),
        RoundEvent::Kill { .. } => metrics::ELIMINATIONS_TOTAL
            .with_label_values(&["kill"])
            .inc(),
        RoundEvent::Block { .. } => metrics::BLOCKS_TOTAL.inc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::Database;

    async fn test_arena(settings: BattleSettings) -> Arena {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ledger = Ledger::new(Arc::new(db), 100);
        Arena::new(settings, Flavor::default(), "coin".to_string(), ledger)
    }

    fn quick_settings() -> BattleSettings {
        BattleSettings {
            delay_secs: 0,
            round_intervals_secs: vec![0],
            seed: Some(7),
            ..BattleSettings::default()
        }
    }

    #[tokio::test]
    async fn test_start_validates_bet() {
        let arena = test_arena(BattleSettings {
            max_bet: Some(50),
            ..quick_settings()
        })
        .await;

        assert!(matches!(
            arena.start("amy", 1).await.unwrap_err(),
            ArenaError::BetTooLow { bet: 1, min: 5 }
        ));
        assert!(matches!(
            arena.start("amy", 80).await.unwrap_err(),
            ArenaError::BetTooHigh { bet: 80, max: 50 }
        ));
        assert!(matches!(
            arena.start("amy", 500).await.unwrap_err(),
            ArenaError::BetTooHigh { .. }
        ));
        assert!(arena.status().await.is_none());
    }

    #[tokio::test]
    async fn test_start_rejects_insufficient_funds() {
        let arena = test_arena(quick_settings()).await;
        let err = arena.start("amy", 150).await.unwrap_err();
        assert!(matches!(
            err,
            ArenaError::Ledger(LedgerError::InsufficientFunds { balance: 100, .. })
        ));
        assert!(arena.status().await.is_none());
    }

    #[tokio::test]
    async fn test_one_lobby_at_a_time() {
        let arena = test_arena(quick_settings()).await;
        let lobby = arena.start("amy", 10).await.unwrap();
        assert_eq!(lobby.pool, 10);
        assert_eq!(lobby.participants, vec!["amy"]);

        assert!(matches!(
            arena.start("bob", 10).await.unwrap_err(),
            ArenaError::AlreadyRunning
        ));
    }

    #[tokio::test]
    async fn test_join_rules() {
        let arena = test_arena(quick_settings()).await;
        assert!(matches!(
            arena.join("bob").await.unwrap_err(),
            ArenaError::LobbyClosed
        ));

        arena.start("amy", 10).await.unwrap();
        let lobby = arena.join("bob").await.unwrap();
        assert_eq!(lobby.pool, 20);
        assert_eq!(lobby.participants, vec!["amy", "bob"]);

        assert!(matches!(
            arena.join("bob").await.unwrap_err(),
            ArenaError::AlreadyJoined(_)
        ));
        assert!(matches!(
            arena.join("amy").await.unwrap_err(),
            ArenaError::AlreadyJoined(_)
        ));
    }

    #[tokio::test]
    async fn test_stop_without_lobby() {
        let arena = test_arena(quick_settings()).await;
        assert!(matches!(
            arena.stop().await.unwrap_err(),
            ArenaError::NotRunning
        ));
    }

    #[tokio::test]
    async fn test_stop_refused_while_settling() {
        let arena = test_arena(quick_settings()).await;
        arena.start("amy", 10).await.unwrap();
        arena.lobby.lock().await.as_mut().unwrap().phase = LobbyPhase::Settling;

        assert!(matches!(
            arena.stop().await.unwrap_err(),
            ArenaError::NotRunning
        ));
        assert!(!arena.stop_requested.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_late_stop_wins_over_settling() {
        let arena = test_arena(quick_settings()).await;
        arena.start("amy", 10).await.unwrap();
        arena.stop().await.unwrap();

        assert!(arena.begin_settling().await);
        assert_eq!(arena.status().await.unwrap().phase, LobbyPhase::Open);
    }

    #[tokio::test]
    async fn test_finished_lobby_leaves_no_stop_behind() {
        let arena = test_arena(quick_settings()).await;
        let lobby = arena.start("amy", 10).await.unwrap();
        arena.stop().await.unwrap();
        arena.run_lobby(lobby.id).await.unwrap();
        assert!(!arena.stop_requested.load(Ordering::Relaxed));

        // A stop on the next lobby is its own, and is honoured.
        let next = arena.start("bob", 10).await.unwrap();
        arena.join("cat").await.unwrap();
        arena.join("dan").await.unwrap();
        arena.stop().await.unwrap();
        assert!(matches!(
            arena.run_lobby(next.id).await.unwrap(),
            LobbyResult::Stopped { .. }
        ));
    }

    #[tokio::test]
    async fn test_run_unknown_lobby() {
        let arena = test_arena(quick_settings()).await;
        let id = Uuid::new_v4();
        assert!(matches!(
            arena.run_lobby(id).await.unwrap_err(),
            ArenaError::UnknownLobby(_)
        ));
    }

    #[tokio::test]
    async fn test_opening_and_prompt_are_broadcast() {
        let arena = test_arena(quick_settings()).await;
        let mut rx = arena.subscribe();
        arena.start("amy", 10).await.unwrap();

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "announcement");
        assert!(first["text"]
            .as_str()
            .unwrap()
            .starts_with(announce::PREFIX));

        let second: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert!(second["text"].as_str().unwrap().contains("entry fee is 10"));
    }
}
