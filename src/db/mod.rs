// Database access layer (SQLite via sqlx).

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub user: String,
    pub balance: i64,
    pub gambling_profit: i64,
    pub brs: i64,
    pub br_wins: i64,
    pub br_score: i64,
    pub br_winnings: i64,
    pub created_at: String,
}

/// Relative change applied to an account in a single statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountDelta {
    pub balance: i64,
    pub gambling_profit: i64,
    pub brs: i64,
    pub br_wins: i64,
    pub br_score: i64,
    pub br_winnings: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Record {
    pub name: String,
    pub value: i64,
    pub person1: String,
    pub person2: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Label {
    pub iid: String,
    pub url: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shortcut {
    pub shortcut: String,
    pub name: String,
}

/// All-time battle royale records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    BattleCount,
    HighestPool,
    LargestBattle,
    HighestScore,
    LongestStreak,
    HighestTotalOwned,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::BattleCount,
        RecordKind::HighestPool,
        RecordKind::LargestBattle,
        RecordKind::HighestScore,
        RecordKind::LongestStreak,
        RecordKind::HighestTotalOwned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::BattleCount => "amnt_brs",
            RecordKind::HighestPool => "highest_br_pool",
            RecordKind::LargestBattle => "largest_br",
            RecordKind::HighestScore => "most_br_score",
            RecordKind::LongestStreak => "longest_streak",
            RecordKind::HighestTotalOwned => "highest_total_owned",
        }
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                user TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0,
                gambling_profit INTEGER NOT NULL DEFAULT 0,
                brs INTEGER NOT NULL DEFAULT 0,
                br_wins INTEGER NOT NULL DEFAULT 0,
                br_score INTEGER NOT NULL DEFAULT 0,
                br_winnings INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL DEFAULT 0,
                person1 TEXT NOT NULL DEFAULT '',
                person2 TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS labels (
                iid TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shortcuts (
                shortcut TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        for kind in RecordKind::ALL {
            sqlx::query("INSERT OR IGNORE INTO records (name) VALUES (?)")
                .bind(kind.as_str())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    // ── Accounts ──────────────────────────────────────────────────────

    pub async fn get_account(&self, user: &str) -> Result<Option<Account>, sqlx::Error> {
        let row = sqlx::query_as::<_, Account>(
            "SELECT user, balance, gambling_profit, brs, br_wins, br_score, br_winnings, created_at FROM accounts WHERE user = ?",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Create the account with `balance` unless it already exists, then return it.
    pub async fn get_or_create_account(
        &self,
        user: &str,
        balance: i64,
    ) -> Result<Account, sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO accounts (user, balance) VALUES (?, ?)")
            .bind(user)
            .bind(balance)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query_as::<_, Account>(
            "SELECT user, balance, gambling_profit, brs, br_wins, br_score, br_winnings, created_at FROM accounts WHERE user = ?",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Account>(
            "SELECT user, balance, gambling_profit, brs, br_wins, br_score, br_winnings, created_at FROM accounts ORDER BY user",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Debit `amount` from balance and gambling profit, only if the balance
    /// covers it. Returns false when the account is missing or short.
    pub async fn debit_if_funded(&self, user: &str, amount: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET balance = balance - ?, gambling_profit = gambling_profit - ? WHERE user = ? AND balance >= ?",
        )
        .bind(amount)
        .bind(amount)
        .bind(user)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a relative change to every counter of an account.
    /// Returns false when the account does not exist.
    pub async fn apply_delta(&self, user: &str, delta: AccountDelta) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                balance = balance + ?,
                gambling_profit = gambling_profit + ?,
                brs = brs + ?,
                br_wins = br_wins + ?,
                br_score = br_score + ?,
                br_winnings = br_winnings + ?
            WHERE user = ?
        "#,
        )
        .bind(delta.balance)
        .bind(delta.gambling_profit)
        .bind(delta.brs)
        .bind(delta.br_wins)
        .bind(delta.br_score)
        .bind(delta.br_winnings)
        .bind(user)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Records ───────────────────────────────────────────────────────

    pub async fn get_record(&self, kind: RecordKind) -> Result<Option<Record>, sqlx::Error> {
        let row = sqlx::query_as::<_, Record>(
            "SELECT name, value, person1, person2, date FROM records WHERE name = ?",
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_records(&self) -> Result<Vec<Record>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Record>(
            "SELECT name, value, person1, person2, date FROM records ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Replace a record only when `value` beats the stored one.
    pub async fn raise_record(
        &self,
        kind: RecordKind,
        value: i64,
        person1: &str,
        person2: &str,
        date: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE records SET value = ?, person1 = ?, person2 = ?, date = ? WHERE name = ? AND value < ?",
        )
        .bind(value)
        .bind(person1)
        .bind(person2)
        .bind(date)
        .bind(kind.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_record(&self, kind: RecordKind) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE records SET value = value + 1 WHERE name = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Labels ────────────────────────────────────────────────────────

    pub async fn get_label(&self, iid: &str) -> Result<Option<Label>, sqlx::Error> {
        let row =
            sqlx::query_as::<_, Label>("SELECT iid, url, updated_at FROM labels WHERE iid = ?")
                .bind(iid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Insert or update a label. Returns true when the label was new.
    pub async fn upsert_label(&self, iid: &str, url: &str) -> Result<bool, sqlx::Error> {
        let updated = sqlx::query(
            "UPDATE labels SET url = ?, updated_at = datetime('now') WHERE iid = ?",
        )
        .bind(url)
        .bind(iid)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query("INSERT INTO labels (iid, url) VALUES (?, ?)")
            .bind(iid)
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    pub async fn list_labels(&self) -> Result<Vec<Label>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Label>("SELECT iid, url, updated_at FROM labels ORDER BY iid")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn delete_label(&self, iid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM labels WHERE iid = ?")
            .bind(iid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Shortcuts ─────────────────────────────────────────────────────

    pub async fn list_shortcuts(&self) -> Result<Vec<Shortcut>, sqlx::Error> {
        let rows =
            sqlx::query_as::<_, Shortcut>("SELECT shortcut, name FROM shortcuts ORDER BY shortcut")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn upsert_shortcut(&self, shortcut: &str, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO shortcuts (shortcut, name) VALUES (?, ?) ON CONFLICT(shortcut) DO UPDATE SET name = excluded.name",
        )
        .bind(shortcut)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
