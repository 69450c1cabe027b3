// Economy bookkeeping for battle royales: entry fees, payouts, stats and
// all-time records. Every operation reports its own result.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::db::{Account, AccountDelta, Database, Record, RecordKind};
use crate::metrics;
use crate::royale::Outcome;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{user} has a balance of {balance}, the entry fee is {bet}")]
    InsufficientFunds {
        user: String,
        balance: i64,
        bet: i64,
    },
    #[error("no account for {0}")]
    UnknownAccount(String),
}

/// One bookkeeping step of a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementStep {
    pub operation: &'static str,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementFailure {
    #[serde(flatten)]
    pub step: SettlementStep,
    pub error: String,
}

/// What a settlement did. Failed steps do not stop the remaining ones.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementReport {
    pub applied: Vec<SettlementStep>,
    pub failures: Vec<SettlementFailure>,
}

impl SettlementReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record(
        &mut self,
        operation: &'static str,
        user: Option<&str>,
        result: Result<(), LedgerError>,
    ) {
        let step = SettlementStep {
            operation,
            user: user.map(String::from),
        };
        match result {
            Ok(()) => self.applied.push(step),
            Err(e) => {
                tracing::error!(operation, user = ?step.user, "Settlement step failed: {e}");
                metrics::LEDGER_FAILURES_TOTAL
                    .with_label_values(&[operation])
                    .inc();
                self.failures.push(SettlementFailure {
                    step,
                    error: e.to_string(),
                });
            }
        }
    }
}

fn record_date() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

#[derive(Clone)]
pub struct Ledger {
    db: Arc<Database>,
    starting_balance: i64,
}

impl Ledger {
    pub fn new(db: Arc<Database>, starting_balance: i64) -> Self {
        Self {
            db,
            starting_balance,
        }
    }

    /// Look up an account, creating it with the starting balance when missing.
    pub async fn ensure_account(&self, user: &str) -> Result<Account, LedgerError> {
        Ok(self
            .db
            .get_or_create_account(user, self.starting_balance)
            .await?)
    }

    pub async fn account(&self, user: &str) -> Result<Account, LedgerError> {
        self.db
            .get_account(user)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(user.to_string()))
    }

    pub async fn records(&self) -> Result<Vec<Record>, LedgerError> {
        Ok(self.db.list_records().await?)
    }

    /// Take the entry fee. The balance check and the debit happen in one
    /// statement, so a short balance never goes negative.
    pub async fn charge_entry(&self, user: &str, bet: i64) -> Result<(), LedgerError> {
        if self.db.debit_if_funded(user, bet).await? {
            return Ok(());
        }
        match self.db.get_account(user).await? {
            Some(account) => Err(LedgerError::InsufficientFunds {
                user: user.to_string(),
                balance: account.balance,
                bet,
            }),
            None => Err(LedgerError::UnknownAccount(user.to_string())),
        }
    }

    pub async fn refund_entry(&self, user: &str, bet: i64) -> Result<(), LedgerError> {
        self.apply(
            user,
            AccountDelta {
                balance: bet,
                gambling_profit: bet,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn pay_winner(&self, user: &str, pool: i64) -> Result<(), LedgerError> {
        self.apply(
            user,
            AccountDelta {
                balance: pool,
                gambling_profit: pool,
                br_winnings: pool,
                br_wins: 1,
                ..Default::default()
            },
        )
        .await
    }

    /// Pay out kill points. Winnings only move when the score beats the
    /// entry fee or the participant won.
    pub async fn reward_participant(
        &self,
        user: &str,
        score: i64,
        bet: i64,
        won: bool,
    ) -> Result<(), LedgerError> {
        if score <= 0 {
            return Ok(());
        }
        let br_winnings = if score > bet || won { score - bet } else { 0 };
        self.apply(
            user,
            AccountDelta {
                balance: score,
                gambling_profit: score,
                br_score: score,
                br_winnings,
                ..Default::default()
            },
        )
        .await?;

        let account = self.account(user).await?;
        if self
            .db
            .raise_record(
                RecordKind::HighestTotalOwned,
                account.balance,
                user,
                "None",
                &record_date(),
            )
            .await?
        {
            tracing::info!(user, balance = account.balance, "New highest total owned");
        }
        Ok(())
    }

    pub async fn count_participation(&self, user: &str) -> Result<(), LedgerError> {
        self.apply(
            user,
            AccountDelta {
                brs: 1,
                ..Default::default()
            },
        )
        .await
    }

    /// Bump the battle counter and raise every all-time record this
    /// outcome beats.
    pub async fn update_records(&self, outcome: &Outcome) -> Result<(), LedgerError> {
        let date = record_date();
        let winner = outcome.winner.as_str();
        let winner_score = outcome.scoreboard.score(winner).to_string();

        self.db.increment_record(RecordKind::BattleCount).await?;

        if let Some((top, score)) = outcome.scoreboard.top() {
            self.db
                .raise_record(RecordKind::HighestScore, score, top, winner, &date)
                .await?;
        }
        self.db
            .raise_record(RecordKind::HighestPool, outcome.pool, winner, &winner_score, &date)
            .await?;
        if let Some(streak) = &outcome.longest_streak {
            self.db
                .raise_record(
                    RecordKind::LongestStreak,
                    i64::from(streak.length),
                    &streak.holder,
                    winner,
                    &date,
                )
                .await?;
        }
        self.db
            .raise_record(
                RecordKind::LargestBattle,
                outcome.participants.len() as i64,
                winner,
                &winner_score,
                &date,
            )
            .await?;
        Ok(())
    }

    /// Apply every payout and statistic for a finished battle.
    pub async fn settle(&self, outcome: &Outcome, bet: i64) -> SettlementReport {
        let mut report = SettlementReport::default();
        let winner = outcome.winner.as_str();

        let result = self.pay_winner(winner, outcome.pool).await;
        report.record("pay_winner", Some(winner), result);

        for participant in &outcome.participants {
            let score = outcome.scoreboard.score(participant);
            if score > 0 {
                let result = self
                    .reward_participant(participant, score, bet, participant == winner)
                    .await;
                report.record("reward_participant", Some(participant.as_str()), result);
            }
        }

        let result = self.update_records(outcome).await;
        report.record("update_records", None, result);

        for participant in &outcome.participants {
            let result = self.count_participation(participant).await;
            report.record("count_participation", Some(participant.as_str()), result);
        }

        report
    }

    async fn apply(&self, user: &str, delta: AccountDelta) -> Result<(), LedgerError> {
        if self.db.apply_delta(user, delta).await? {
            Ok(())
        } else {
            Err(LedgerError::UnknownAccount(user.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::royale::testing::Scripted;
    use crate::royale::{run, Loadout, Probabilities};

    async fn test_ledger() -> Ledger {
        let db = Database::new("sqlite::memory:").await.unwrap();
        Ledger::new(Arc::new(db), 100)
    }

    #[tokio::test]
    async fn test_charge_and_refund() {
        let ledger = test_ledger().await;
        ledger.ensure_account("alice").await.unwrap();

        ledger.charge_entry("alice", 60).await.unwrap();
        let err = ledger.charge_entry("alice", 60).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 40,
                bet: 60,
                ..
            }
        ));

        ledger.refund_entry("alice", 60).await.unwrap();
        let acc = ledger.account("alice").await.unwrap();
        assert_eq!(acc.balance, 100);
        assert_eq!(acc.gambling_profit, 0);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let ledger = test_ledger().await;
        assert!(matches!(
            ledger.charge_entry("ghost", 5).await.unwrap_err(),
            LedgerError::UnknownAccount(_)
        ));
        assert!(matches!(
            ledger.pay_winner("ghost", 5).await.unwrap_err(),
            LedgerError::UnknownAccount(_)
        ));
    }

    #[tokio::test]
    async fn test_reward_participant_winnings_rule() {
        let ledger = test_ledger().await;
        for user in ["low", "high", "champ"] {
            ledger.ensure_account(user).await.unwrap();
        }

        // Score below the bet: paid, but no winnings
        ledger.reward_participant("low", 3, 10, false).await.unwrap();
        // Score above the bet: winnings grow by the difference
        ledger.reward_participant("high", 15, 10, false).await.unwrap();
        // Winner: difference applied even when negative
        ledger.reward_participant("champ", 4, 10, true).await.unwrap();

        let low = ledger.account("low").await.unwrap();
        assert_eq!(low.balance, 103);
        assert_eq!(low.br_winnings, 0);
        assert_eq!(low.br_score, 3);

        let high = ledger.account("high").await.unwrap();
        assert_eq!(high.br_winnings, 5);

        let champ = ledger.account("champ").await.unwrap();
        assert_eq!(champ.br_winnings, -6);

        let record = ledger
            .records()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == "highest_total_owned")
            .unwrap();
        assert_eq!(record.value, 115);
        assert_eq!(record.person1, "high");
    }

    #[tokio::test]
    async fn test_settle_full_battle() {
        let ledger = test_ledger().await;
        let roster: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        for user in &roster {
            ledger.ensure_account(user).await.unwrap();
            ledger.charge_entry(user, 10).await.unwrap();
        }

        let mut entropy = Scripted::new(&[0.5, 0.5], &[0, 0, 1, 0]);
        let outcome = run(
            roster,
            30,
            Loadout::default(),
            Probabilities::weapon_kills_only(),
            &mut entropy,
        )
        .unwrap();

        let report = ledger.settle(&outcome, 10).await;
        assert!(report.is_clean());
        // pay_winner + one reward + update_records + three participations
        assert_eq!(report.applied.len(), 6);

        let b = ledger.account("B").await.unwrap();
        assert_eq!(b.balance, 90 + 30 + 4);
        assert_eq!(b.gambling_profit, -10 + 30 + 4);
        assert_eq!(b.br_wins, 1);
        assert_eq!(b.brs, 1);
        assert_eq!(b.br_score, 4);
        assert_eq!(b.br_winnings, 30 + (4 - 10));

        let a = ledger.account("A").await.unwrap();
        assert_eq!(a.balance, 90);
        assert_eq!(a.brs, 1);

        let records = ledger.records().await.unwrap();
        let value = |name: &str| records.iter().find(|r| r.name == name).unwrap().value;
        assert_eq!(value("amnt_brs"), 1);
        assert_eq!(value("highest_br_pool"), 30);
        assert_eq!(value("largest_br"), 3);
        assert_eq!(value("most_br_score"), 4);
        assert_eq!(value("longest_streak"), 2);
    }

    #[tokio::test]
    async fn test_settle_reports_failures_without_aborting() {
        let ledger = test_ledger().await;
        // Only B has an account
        ledger.ensure_account("B").await.unwrap();

        let mut entropy = Scripted::new(&[0.5, 0.5], &[0, 0, 1, 0]);
        let outcome = run(
            vec!["A".into(), "B".into(), "C".into()],
            30,
            Loadout::default(),
            Probabilities::weapon_kills_only(),
            &mut entropy,
        )
        .unwrap();

        let report = ledger.settle(&outcome, 10).await;
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .all(|f| f.step.operation == "count_participation"));
        assert_eq!(ledger.account("B").await.unwrap().br_wins, 1);
    }
}
