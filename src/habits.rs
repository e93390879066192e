use crate::errors::{StorageError, TrackerError};
use crate::models::{today, Completion, Habit};
use crate::storage::{ensure_csv, read_csv, write_csv, HABITS_FILE};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const HABIT_COLUMNS: [&str; 4] = ["habit_name", "days_completed", "total_days", "last_date"];

/// Durable table of habits and their day counters.
///
/// Lookups are by exact name and the first matching row wins. Case-insensitive
/// duplicate detection belongs to the caller.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All habits in storage order. Read failures are logged and yield an
    /// empty list.
    async fn load(&self) -> Vec<Habit>;

    async fn add(&self, name: &str) -> Result<(), TrackerError>;

    async fn mark_done_on(&self, name: &str, today: NaiveDate) -> Result<Completion, TrackerError>;

    /// Counts a tracked day without a completion. `false` when no habit matched.
    async fn skip(&self, name: &str) -> Result<bool, TrackerError>;

    async fn delete(&self, name: &str) -> Result<bool, TrackerError>;

    /// Renames in place, keeping counters. `false` when `old_name` is unknown.
    async fn rename(&self, old_name: &str, new_name: &str) -> Result<bool, TrackerError>;

    async fn mark_done(&self, name: &str) -> Result<Completion, TrackerError> {
        self.mark_done_on(name, today()).await
    }
}

pub struct CsvHabitStore {
    path: PathBuf,
}

impl CsvHabitStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(HABITS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read used by every mutation, so an unreadable table is never
    /// replaced by a partial one.
    async fn read_all(&self) -> Result<Vec<Habit>, StorageError> {
        ensure_csv(&self.path, &HABIT_COLUMNS).await?;
        read_csv(&self.path).await
    }

    async fn save(&self, habits: &[Habit]) -> Result<(), StorageError> {
        write_csv(&self.path, &HABIT_COLUMNS, habits).await
    }
}

#[async_trait]
impl RecordStore for CsvHabitStore {
    async fn load(&self) -> Vec<Habit> {
        match self.read_all().await {
            Ok(habits) => habits,
            Err(err) => {
                error!("failed to load habits from {}: {err}", self.path.display());
                Vec::new()
            }
        }
    }

    async fn add(&self, name: &str) -> Result<(), TrackerError> {
        let mut habits = self.read_all().await?;
        if habits.iter().any(|habit| habit.habit_name == name) {
            return Err(TrackerError::AlreadyExists(name.to_string()));
        }

        habits.push(Habit::new(name));
        self.save(&habits).await?;
        info!("habit added: {name}");
        Ok(())
    }

    async fn mark_done_on(&self, name: &str, today: NaiveDate) -> Result<Completion, TrackerError> {
        let mut habits = self.read_all().await?;
        let Some(habit) = habits.iter_mut().find(|habit| habit.habit_name == name) else {
            return Ok(Completion::NotFound);
        };
        if habit.last_date == Some(today) {
            return Ok(Completion::AlreadyDoneToday);
        }

        habit.days_completed = habit.days_completed.saturating_add(1);
        habit.total_days = habit.total_days.saturating_add(1);
        habit.last_date = Some(today);
        self.save(&habits).await?;
        Ok(Completion::Recorded)
    }

    async fn skip(&self, name: &str) -> Result<bool, TrackerError> {
        let mut habits = self.read_all().await?;
        let Some(habit) = habits.iter_mut().find(|habit| habit.habit_name == name) else {
            return Ok(false);
        };

        habit.total_days = habit.total_days.saturating_add(1);
        self.save(&habits).await?;
        Ok(true)
    }

    async fn delete(&self, name: &str) -> Result<bool, TrackerError> {
        let mut habits = self.read_all().await?;
        let before = habits.len();
        habits.retain(|habit| habit.habit_name != name);
        if habits.len() == before {
            return Ok(false);
        }

        self.save(&habits).await?;
        info!("habit deleted: {name}");
        Ok(true)
    }

    async fn rename(&self, old_name: &str, new_name: &str) -> Result<bool, TrackerError> {
        let mut habits = self.read_all().await?;
        if new_name != old_name && habits.iter().any(|habit| habit.habit_name == new_name) {
            warn!("cannot rename {old_name}: habit '{new_name}' already exists");
            return Err(TrackerError::NameConflict(new_name.to_string()));
        }

        let mut renamed = false;
        for habit in habits.iter_mut().filter(|habit| habit.habit_name == old_name) {
            habit.habit_name = new_name.to_string();
            renamed = true;
        }
        if !renamed {
            return Ok(false);
        }

        self.save(&habits).await?;
        info!("habit renamed: {old_name} -> {new_name}");
        Ok(true)
    }
}
