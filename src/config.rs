// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::royale::{Probabilities, SimulationError};

/// Lowest participant count the lobby accepts as a minimum.
pub const MIN_LOBBY_USERS: usize = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("minimum number of battle royale participants is {MIN_LOBBY_USERS}, got {0}")]
    TooFewUsers(usize),
    #[error("minimum bet must be positive, got {0}")]
    InvalidMinBet(i64),
    #[error("at least one round interval is required")]
    NoRoundIntervals,
    #[error(transparent)]
    Probabilities(#[from] SimulationError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Flavor {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Battle royale tuning.
#[derive(Debug, Clone)]
pub struct BattleSettings {
    /// Length of one join window in seconds.
    pub delay_secs: u64,
    pub min_bet: i64,
    /// Optional cap on the entry fee.
    pub max_bet: Option<i64>,
    pub min_users: usize,
    pub odds: Probabilities,
    /// Pause between rounds is picked at random from these values (seconds).
    pub round_intervals_secs: Vec<u64>,
    /// Fixed seed for reproducible battles; random when unset.
    pub seed: Option<u64>,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            delay_secs: 180,
            min_bet: 5,
            max_bet: None,
            min_users: MIN_LOBBY_USERS,
            odds: Probabilities::default(),
            round_intervals_secs: vec![10, 12, 14, 16, 18, 20],
            seed: None,
        }
    }
}

impl BattleSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_users < MIN_LOBBY_USERS {
            return Err(ConfigError::TooFewUsers(self.min_users));
        }
        if self.min_bet <= 0 {
            return Err(ConfigError::InvalidMinBet(self.min_bet));
        }
        if self.round_intervals_secs.is_empty() {
            return Err(ConfigError::NoRoundIntervals);
        }
        self.odds.validate()?;
        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory containing `gambling.json`.
    pub data_dir: PathBuf,
    /// Names allowed to run admin-only commands.
    pub admins: Vec<String>,
    pub description: String,
    pub additional_info_text: String,
    pub currency_name: String,
    /// Label shown next to the local time.
    pub timezone: String,
    /// Balance given to an account on first use.
    pub starting_balance: i64,
    pub battle: BattleSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:economy.db?mode=rwc".to_string(),
            port: 3000,
            data_dir: PathBuf::from("data"),
            admins: Vec::new(),
            description: "An economy bot with minigames.".to_string(),
            additional_info_text: String::new(),
            currency_name: "point".to_string(),
            timezone: "UTC".to_string(),
            starting_balance: 100,
            battle: BattleSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:economy.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `DATA_DIR` - directory holding `gambling.json` (default: `data`)
    /// - `ADMINS` - comma-separated admin names
    /// - `BOT_DESCRIPTION`, `ADDITIONAL_INFO_TEXT`, `CURRENCY_NAME`, `TIMEZONE`
    /// - `STARTING_BALANCE` (default: 100)
    /// - `BR_DELAY`, `BR_MIN_BET`, `BR_MAX_BET`, `BR_MIN_USERS`, `BR_SEED`
    /// - `BR_ROUND_INTERVALS` - comma-separated seconds
    /// - `P_SUICIDE`, `P_BLOCK`, `P_BOMB_OR_MELEE`, `P_EXOTIC`
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--data-dir <DIR>` - Override the data directory
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a configuration from CLI arguments and an environment lookup.
    pub fn from_sources<F>(args: &[String], env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let battle_defaults = BattleSettings::default();

        let database_url = env("DATABASE_URL").unwrap_or(defaults.database_url);

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = match Self::parse_cli_value(args, "--port") {
            Some(v) => parse_value("--port", &v)?,
            None => parse_env(&env, "PORT", defaults.port)?,
        };

        let data_dir = Self::parse_cli_value(args, "--data-dir")
            .or_else(|| env("DATA_DIR"))
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let admins = env("ADMINS").map(|v| split_list(&v)).unwrap_or_default();

        let max_bet = match env("BR_MAX_BET") {
            Some(v) => Some(parse_value("BR_MAX_BET", &v)?),
            None => None,
        };
        let seed = match env("BR_SEED") {
            Some(v) => Some(parse_value("BR_SEED", &v)?),
            None => None,
        };
        let round_intervals_secs = match env("BR_ROUND_INTERVALS") {
            Some(v) => split_list(&v)
                .iter()
                .map(|s| parse_value("BR_ROUND_INTERVALS", s))
                .collect::<Result<Vec<u64>, _>>()?,
            None => battle_defaults.round_intervals_secs,
        };

        let odds = Probabilities {
            suicide: parse_env(&env, "P_SUICIDE", battle_defaults.odds.suicide)?,
            block: parse_env(&env, "P_BLOCK", battle_defaults.odds.block)?,
            bomb_or_melee: parse_env(&env, "P_BOMB_OR_MELEE", battle_defaults.odds.bomb_or_melee)?,
            exotic: parse_env(&env, "P_EXOTIC", battle_defaults.odds.exotic)?,
        };

        let battle = BattleSettings {
            delay_secs: parse_env(&env, "BR_DELAY", battle_defaults.delay_secs)?,
            min_bet: parse_env(&env, "BR_MIN_BET", battle_defaults.min_bet)?,
            max_bet,
            min_users: parse_env(&env, "BR_MIN_USERS", battle_defaults.min_users)?,
            odds,
            round_intervals_secs,
            seed,
        };
        battle.validate()?;

        Ok(Config {
            database_url,
            port,
            data_dir,
            admins,
            description: env("BOT_DESCRIPTION").unwrap_or(defaults.description),
            additional_info_text: env("ADDITIONAL_INFO_TEXT")
                .unwrap_or(defaults.additional_info_text),
            currency_name: env("CURRENCY_NAME").unwrap_or(defaults.currency_name),
            timezone: env("TIMEZONE").unwrap_or(defaults.timezone),
            starting_balance: parse_env(&env, "STARTING_BALANCE", defaults.starting_balance)?,
            battle,
        })
    }

    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.iter().any(|a| a == user)
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_env<T, F>(env: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
