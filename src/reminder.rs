use crate::errors::{StorageError, TrackerError};
use crate::storage::{atomic_write, REMINDER_FILE};
use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::{error, info, warn};

/// Daily reminder time of day, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderTime(NaiveTime);

impl ReminderTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }
}

impl Default for ReminderTime {
    fn default() -> Self {
        Self(NaiveTime::MIN + chrono::Duration::hours(20))
    }
}

impl FromStr for ReminderTime {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| {
                TrackerError::InvalidReminder(format!(
                    "'{}' is not a valid time (00:00-23:59)",
                    raw.trim()
                ))
            })
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for ReminderTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// The saved reminder, or 20:00 when none is saved or it cannot be read.
    async fn load(&self) -> ReminderTime;

    async fn save(&self, time: ReminderTime) -> Result<(), StorageError>;
}

pub struct FileReminderStore {
    path: PathBuf,
}

impl FileReminderStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(REMINDER_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReminderStore for FileReminderStore {
    async fn load(&self) -> ReminderTime {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return ReminderTime::default(),
            Err(err) => {
                error!("failed to read reminder from {}: {err}", self.path.display());
                return ReminderTime::default();
            }
        };
        if raw.trim().is_empty() {
            return ReminderTime::default();
        }

        raw.parse().unwrap_or_else(|err| {
            warn!("ignoring saved reminder: {err}");
            ReminderTime::default()
        })
    }

    async fn save(&self, time: ReminderTime) -> Result<(), StorageError> {
        atomic_write(&self.path, time.to_string().as_bytes()).await?;
        info!("reminder set for {time}");
        Ok(())
    }
}
