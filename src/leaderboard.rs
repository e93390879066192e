use crate::errors::StorageError;
use crate::models::{today, LeaderboardEntry};
use crate::storage::{ensure_csv, read_csv, write_csv, LEADERBOARD_FILE};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::error;

pub const LEADERBOARD_COLUMNS: [&str; 3] = ["user_name", "score", "last_updated"];
pub const DEFAULT_TOP: usize = 10;

/// One row per user holding their latest completion rate.
#[async_trait]
pub trait Leaderboard: Send + Sync {
    /// Upserts the user's score. `false` when the table could not be written.
    async fn update_on(&self, user_name: &str, score: u64, today: NaiveDate) -> bool;

    /// Up to `n` entries, best score first; ties keep storage order.
    async fn top(&self, n: usize) -> Vec<LeaderboardEntry>;

    async fn update(&self, user_name: &str, score: u64) -> bool {
        self.update_on(user_name, score, today()).await
    }
}

pub struct CsvLeaderboard {
    path: PathBuf,
}

impl CsvLeaderboard {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LEADERBOARD_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<LeaderboardEntry>, StorageError> {
        ensure_csv(&self.path, &LEADERBOARD_COLUMNS).await?;
        read_csv(&self.path).await
    }

    async fn upsert(&self, user_name: &str, score: u64, today: NaiveDate) -> Result<(), StorageError> {
        let mut entries = self.read_all().await?;
        match entries
            .iter_mut()
            .find(|entry| entry.user_name.trim() == user_name)
        {
            Some(entry) => {
                entry.score = score;
                entry.last_updated = Some(today);
            }
            None => entries.push(LeaderboardEntry {
                user_name: user_name.to_string(),
                score,
                last_updated: Some(today),
            }),
        }
        write_csv(&self.path, &LEADERBOARD_COLUMNS, &entries).await
    }
}

#[async_trait]
impl Leaderboard for CsvLeaderboard {
    async fn update_on(&self, user_name: &str, score: u64, today: NaiveDate) -> bool {
        match self.upsert(user_name.trim(), score, today).await {
            Ok(()) => true,
            Err(err) => {
                error!("failed to update leaderboard for {user_name}: {err}");
                false
            }
        }
    }

    async fn top(&self, n: usize) -> Vec<LeaderboardEntry> {
        let mut entries = match self.read_all().await {
            Ok(entries) => entries,
            Err(err) => {
                error!("failed to load leaderboard from {}: {err}", self.path.display());
                return Vec::new();
            }
        };
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(n);
        entries
    }
}
