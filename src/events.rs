use crate::errors::StorageError;
use crate::models::CompletionEvent;
use crate::storage::{append_csv, ensure_csv, parse_date, read_csv, EVENTS_FILE};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const EVENT_COLUMNS: [&str; 3] = ["date", "habit_name", "user_name"];

/// Append-only log of completion events.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: &CompletionEvent) -> Result<(), StorageError>;

    /// Every event with a readable date, in append order. Read failures are
    /// logged and yield an empty list.
    async fn load(&self) -> Vec<CompletionEvent>;

    async fn dates_for(&self, habit_name: &str) -> Vec<NaiveDate> {
        self.load()
            .await
            .into_iter()
            .filter(|event| event.habit_name == habit_name)
            .map(|event| event.date)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EventRow {
    #[serde(default)]
    date: String,
    #[serde(default)]
    habit_name: String,
    #[serde(default)]
    user_name: Option<String>,
}

impl From<&CompletionEvent> for EventRow {
    fn from(event: &CompletionEvent) -> Self {
        Self {
            date: event.date.format("%Y-%m-%d").to_string(),
            habit_name: event.habit_name.clone(),
            user_name: event.user_name.clone(),
        }
    }
}

pub struct CsvEventLog {
    path: PathBuf,
}

impl CsvEventLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(EVENTS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<CompletionEvent>, StorageError> {
        ensure_csv(&self.path, &EVENT_COLUMNS).await?;
        let rows: Vec<EventRow> = read_csv(&self.path).await?;
        let events = rows
            .into_iter()
            .filter_map(|row| match parse_date(&row.date) {
                Some(date) => Some(CompletionEvent {
                    date,
                    habit_name: row.habit_name,
                    user_name: row.user_name.filter(|user| !user.is_empty()),
                }),
                None => {
                    debug!("skipping event with unreadable date {:?}", row.date);
                    None
                }
            })
            .collect();
        Ok(events)
    }
}

#[async_trait]
impl EventLog for CsvEventLog {
    async fn append(&self, event: &CompletionEvent) -> Result<(), StorageError> {
        append_csv(&self.path, &EVENT_COLUMNS, &EventRow::from(event)).await
    }

    async fn load(&self) -> Vec<CompletionEvent> {
        match self.read_all().await {
            Ok(events) => events,
            Err(err) => {
                error!("failed to load events from {}: {err}", self.path.display());
                Vec::new()
            }
        }
    }
}
