// Label store: short lowercase keys mapped to arbitrary text or image links.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::db::Database;
use crate::metrics;

/// Size at which a label listing is split into another message.
const LIST_CHUNK_LIMIT: usize = 1997;
const CODE_FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("label '{0}' contains uppercase letters; only lowercase labels are allowed")]
    Uppercase(String),
    #[error("label must not be empty")]
    Empty,
    #[error("the label {0} does not exist")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelWrite {
    Created,
    Updated,
}

impl LabelWrite {
    pub fn message(self, user: &str, label: &str) -> String {
        match self {
            LabelWrite::Created => format!("**[INFO]** {user} has set a new label {label}."),
            LabelWrite::Updated => format!("**[INFO]** {user} has updated the label {label}."),
        }
    }
}

#[derive(Clone)]
pub struct Labels {
    db: Arc<Database>,
}

impl Labels {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create or update a label.
    pub async fn set(&self, label: &str, value: &str) -> Result<LabelWrite, LabelError> {
        if label.is_empty() {
            return Err(LabelError::Empty);
        }
        if label.chars().any(char::is_uppercase) {
            return Err(LabelError::Uppercase(label.to_string()));
        }

        let write = if self.db.upsert_label(label, value).await? {
            LabelWrite::Created
        } else {
            LabelWrite::Updated
        };
        let action = match write {
            LabelWrite::Created => "created",
            LabelWrite::Updated => "updated",
        };
        metrics::LABEL_WRITES_TOTAL.with_label_values(&[action]).inc();
        tracing::info!(label, action, "Label written");
        Ok(write)
    }

    pub async fn show(&self, label: &str) -> Result<String, LabelError> {
        self.db
            .get_label(label)
            .await?
            .map(|l| l.url)
            .ok_or_else(|| LabelError::NotFound(label.to_string()))
    }

    /// Sorted label names.
    pub async fn names(&self) -> Result<Vec<String>, LabelError> {
        Ok(self
            .db
            .list_labels()
            .await?
            .into_iter()
            .map(|l| l.iid)
            .collect())
    }

    /// Label listing as one or more code-block messages.
    pub async fn list(&self) -> Result<Vec<String>, LabelError> {
        Ok(listing_messages(&self.names().await?))
    }

    pub async fn delete(&self, label: &str) -> Result<(), LabelError> {
        if !self.db.delete_label(label).await? {
            return Err(LabelError::NotFound(label.to_string()));
        }
        metrics::LABEL_WRITES_TOTAL
            .with_label_values(&["deleted"])
            .inc();
        tracing::info!(label, "Label deleted");
        Ok(())
    }
}

/// Render label names as code-block messages under the chat limit.
pub fn listing_messages(names: &[String]) -> Vec<String> {
    if names.is_empty() {
        return vec!["**[INFO]** There are no labels.".to_string()];
    }

    let mut messages = Vec::new();
    let mut current = format!("{CODE_FENCE}Labels: \n");
    for name in names {
        let part = format!("  {name}\n");
        if current.len() + part.len() > LIST_CHUNK_LIMIT {
            messages.push(format!("{current}{CODE_FENCE}"));
            current = CODE_FENCE.to_string();
        }
        current.push_str(&part);
    }
    messages.push(format!("{current}{CODE_FENCE}"));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_labels() -> Labels {
        let db = Database::new("sqlite::memory:").await.unwrap();
        Labels::new(Arc::new(db))
    }

    #[tokio::test]
    async fn test_set_show_update_delete() {
        let labels = test_labels().await;

        assert_eq!(
            labels.set("cat", "https://img/cat.png").await.unwrap(),
            LabelWrite::Created
        );
        assert_eq!(
            labels.set("cat", "https://img/cat2.png").await.unwrap(),
            LabelWrite::Updated
        );
        assert_eq!(labels.show("cat").await.unwrap(), "https://img/cat2.png");

        labels.delete("cat").await.unwrap();
        assert!(matches!(
            labels.show("cat").await.unwrap_err(),
            LabelError::NotFound(_)
        ));
        assert!(matches!(
            labels.delete("cat").await.unwrap_err(),
            LabelError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_rejects_uppercase() {
        let labels = test_labels().await;
        assert!(matches!(
            labels.set("Cat", "x").await.unwrap_err(),
            LabelError::Uppercase(_)
        ));
        assert!(matches!(
            labels.set("", "x").await.unwrap_err(),
            LabelError::Empty
        ));
        assert!(labels.names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let labels = test_labels().await;
        labels.set("zebra", "z").await.unwrap();
        labels.set("apple", "a").await.unwrap();

        let messages = labels.list().await.unwrap();
        assert_eq!(messages, vec!["```Labels: \n  apple\n  zebra\n```".to_string()]);
    }

    #[test]
    fn test_listing_empty_and_chunked() {
        assert_eq!(
            listing_messages(&[]),
            vec!["**[INFO]** There are no labels.".to_string()]
        );

        let names: Vec<String> = (0..300).map(|i| format!("label{i:04}")).collect();
        let messages = listing_messages(&names);
        assert!(messages.len() > 1);
        for message in &messages {
            assert!(message.starts_with(CODE_FENCE));
            assert!(message.ends_with(CODE_FENCE));
            assert!(message.len() <= 2000);
        }
        let total: usize = messages.iter().map(|m| m.matches("  label").count()).sum();
        assert_eq!(total, 300);
    }

    #[test]
    fn test_write_messages() {
        assert_eq!(
            LabelWrite::Created.message("amy", "cat"),
            "**[INFO]** amy has set a new label cat."
        );
        assert_eq!(
            LabelWrite::Updated.message("amy", "cat"),
            "**[INFO]** amy has updated the label cat."
        );
    }
}
