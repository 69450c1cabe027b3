// Core info commands: bot description, local time and user shortcuts.

use chrono::{DateTime, TimeZone};
use thiserror::Error;

use crate::config::Config;
use crate::db::{Database, Shortcut};

#[derive(Debug, Error)]
pub enum InfoError {
    #[error("{0} is not allowed to create shortcuts")]
    NotAdmin(String),
    #[error("shortcut and name must not be empty")]
    EmptyShortcut,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

const LABELS_INFO: &str = "The label feature allows users to store (!set) and retrieve (!show) pieces of information - such as images or generic text - in a database for frequent use.";

/// Bot information as a code block.
pub fn info_text(config: &Config) -> String {
    let mut text = String::from("```\n\n");
    text.push_str(&config.description);
    text.push_str("\n\nAdmins:");
    for admin in &config.admins {
        text.push_str(&format!("\n  {admin}"));
    }
    text.push_str("\n\n");
    text.push_str(&config.additional_info_text);
    text.push_str("\n\nType !help to see a list of available commands.\n\n");
    text.push_str(&format!("Labels:\n  {LABELS_INFO}\n\n"));
    text.push_str(&format!(
        "Some additional information:\n  Please be aware of the fact that there may be bugs in the system. There are fail-safe mechanisms, but they may not always prevent a loss of {}s in case of an error.",
        config.currency_name
    ));
    text.push_str("```");
    text
}

pub fn time_text<Tz: TimeZone>(now: &DateTime<Tz>, timezone: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "Current time is {} ({timezone}).",
        now.format("%Y-%m-%d %H:%M")
    )
}

/// Shortcut table as a code block, sorted by shortcut.
pub fn shortcuts_table(shortcuts: &[Shortcut]) -> String {
    if shortcuts.is_empty() {
        return "**[INFO]** There are no shortcuts.".to_string();
    }

    let indent = shortcuts
        .iter()
        .map(|s| s.shortcut.chars().count())
        .max()
        .unwrap_or(0);

    let mut sorted: Vec<&Shortcut> = shortcuts.iter().collect();
    sorted.sort_by(|a, b| a.shortcut.cmp(&b.shortcut));

    let mut result = String::from("```Shortcut    Nickname\n\n");
    for s in sorted {
        result.push_str(&format!("{:<indent$}  {}\n", s.shortcut, s.name));
    }
    result.push_str("```");
    result
}

/// Register a shortcut for a user name. Admins only.
pub async fn add_shortcut(
    config: &Config,
    db: &Database,
    requester: &str,
    shortcut: &str,
    name: &str,
) -> Result<String, InfoError> {
    if !config.is_admin(requester) {
        return Err(InfoError::NotAdmin(requester.to_string()));
    }
    if shortcut.trim().is_empty() || name.trim().is_empty() {
        return Err(InfoError::EmptyShortcut);
    }

    db.upsert_shortcut(shortcut, name).await?;
    tracing::info!(shortcut, name, requester, "Shortcut created");
    Ok(format!(
        "{requester} has created a new shortcut \"{shortcut}\"."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config() -> Config {
        Config {
            admins: vec!["root".into(), "ops".into()],
            description: "Test bot.".into(),
            additional_info_text: "Be nice.".into(),
            currency_name: "coin".into(),
            ..Config::default()
        }
    }

    #[test]
    fn test_info_text_sections() {
        let text = info_text(&config());
        assert!(text.starts_with("```"));
        assert!(text.ends_with("```"));
        assert!(text.contains("Test bot."));
        assert!(text.contains("Admins:\n  root\n  ops"));
        assert!(text.contains("Be nice."));
        assert!(text.contains("Labels:"));
        assert!(text.contains("loss of coins"));
    }

    #[test]
    fn test_time_text() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(
            time_text(&now, "CET"),
            "Current time is 2024-03-09 07:05 (CET)."
        );
    }

    #[test]
    fn test_shortcuts_table() {
        let shortcuts = vec![
            Shortcut {
                shortcut: "jd".into(),
                name: "John Doe".into(),
            },
            Shortcut {
                shortcut: "abc".into(),
                name: "Anna Bell".into(),
            },
        ];
        assert_eq!(
            shortcuts_table(&shortcuts),
            "```Shortcut    Nickname\n\nabc  Anna Bell\njd   John Doe\n```"
        );
        assert_eq!(shortcuts_table(&[]), "**[INFO]** There are no shortcuts.");
    }

    #[tokio::test]
    async fn test_add_shortcut_admin_only() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let config = config();

        assert!(matches!(
            add_shortcut(&config, &db, "mallory", "m", "Mallory").await.unwrap_err(),
            InfoError::NotAdmin(_)
        ));
        assert!(matches!(
            add_shortcut(&config, &db, "root", " ", "x").await.unwrap_err(),
            InfoError::EmptyShortcut
        ));

        let message = add_shortcut(&config, &db, "root", "jd", "John Doe")
            .await
            .unwrap();
        assert_eq!(message, "root has created a new shortcut \"jd\".");
        assert_eq!(db.list_shortcuts().await.unwrap().len(), 1);
    }
}
