use crate::errors::StorageError;
use crate::models::{now, PointsBook, Reward, UserPoints};
use crate::storage::{ensure_json, read_json, write_json, POINTS_FILE};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_POINTS_PER_COMPLETION: u64 = 10;

/// Point thresholds and the badge each one unlocks, lowest first.
pub const MILESTONES: [(u64, &str); 3] = [
    (50, "Bronze Badge 🥉"),
    (100, "Silver Badge 🥈"),
    (200, "Gold Badge 🥇"),
];

/// Per-user point balances and unlocked rewards.
#[async_trait]
pub trait PointsLedger: Send + Sync {
    /// The whole ledger. Read failures are logged and yield an empty one.
    async fn load(&self) -> PointsBook;

    /// Adds `amount` and returns the new balance.
    async fn add_points_at(
        &self,
        user_name: &str,
        amount: u64,
        now: NaiveDateTime,
    ) -> Result<u64, StorageError>;

    /// Grants every milestone the balance has reached and the user does not
    /// hold yet. Returns the names granted by this call.
    async fn check_rewards_at(
        &self,
        user_name: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<String>, StorageError>;

    async fn get(&self, user_name: &str) -> UserPoints {
        self.load().await.remove(user_name).unwrap_or_default()
    }

    async fn add_points(&self, user_name: &str, amount: u64) -> Result<u64, StorageError> {
        self.add_points_at(user_name, amount, now()).await
    }

    async fn check_rewards(&self, user_name: &str) -> Result<Vec<String>, StorageError> {
        self.check_rewards_at(user_name, now()).await
    }
}

/// Appends the milestones `user` has newly reached, in threshold order.
pub fn grant_milestones(user: &mut UserPoints, now: NaiveDateTime) -> Vec<String> {
    let mut granted = Vec::new();
    for (threshold, name) in MILESTONES {
        if user.points >= threshold && !user.has_reward(name) {
            user.rewards.push(Reward {
                name: name.to_string(),
                earned_at: Some(now),
                points_at_earn: Some(user.points),
            });
            granted.push(name.to_string());
        }
    }
    granted
}

pub struct JsonPointsLedger {
    path: PathBuf,
}

impl JsonPointsLedger {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(POINTS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<PointsBook, StorageError> {
        ensure_json(&self.path).await?;
        read_json(&self.path).await
    }
}

#[async_trait]
impl PointsLedger for JsonPointsLedger {
    async fn load(&self) -> PointsBook {
        match self.read_all().await {
            Ok(book) => book,
            Err(err) => {
                error!("failed to load points from {}: {err}", self.path.display());
                PointsBook::new()
            }
        }
    }

    async fn add_points_at(
        &self,
        user_name: &str,
        amount: u64,
        now: NaiveDateTime,
    ) -> Result<u64, StorageError> {
        let mut book = self.read_all().await?;
        let user = book.entry(user_name.to_string()).or_default();
        user.points = user.points.saturating_add(amount);
        user.last_point_earned = Some(now);
        let total = user.points;

        write_json(&self.path, &book).await?;
        Ok(total)
    }

    async fn check_rewards_at(
        &self,
        user_name: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<String>, StorageError> {
        let mut book = self.read_all().await?;
        let Some(user) = book.get_mut(user_name) else {
            return Ok(Vec::new());
        };

        let granted = grant_milestones(user, now);
        if granted.is_empty() {
            return Ok(granted);
        }

        for name in &granted {
            info!("user {user_name} earned reward {name} at {} points", user.points);
        }
        write_json(&self.path, &book).await?;
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tokio::fs;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn names(user: &UserPoints) -> Vec<&str> {
        user.rewards.iter().map(|reward| reward.name.as_str()).collect()
    }

    #[tokio::test]
    async fn points_accumulate_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonPointsLedger::new(dir.path());

        assert_eq!(ledger.add_points_at("alice", 10, at(8)).await.unwrap(), 10);
        assert_eq!(ledger.add_points_at("alice", 10, at(9)).await.unwrap(), 20);
        assert_eq!(ledger.add_points_at("bob", 5, at(9)).await.unwrap(), 5);

        let alice = ledger.get("alice").await;
        assert_eq!(alice.points, 20);
        assert_eq!(alice.last_point_earned, Some(at(9)));
        assert!(alice.rewards.is_empty());
    }

    #[tokio::test]
    async fn zero_amount_never_lowers_balance() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonPointsLedger::new(dir.path());

        ledger.add_points_at("alice", 30, at(8)).await.unwrap();
        assert_eq!(ledger.add_points_at("alice", 0, at(9)).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn big_jump_unlocks_every_milestone_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonPointsLedger::new(dir.path());
        ledger.add_points_at("alice", 250, at(8)).await.unwrap();

        let granted = ledger.check_rewards_at("alice", at(8)).await.unwrap();
        assert_eq!(granted, vec!["Bronze Badge 🥉", "Silver Badge 🥈", "Gold Badge 🥇"]);

        ledger.add_points_at("alice", 100, at(9)).await.unwrap();
        assert!(ledger.check_rewards_at("alice", at(9)).await.unwrap().is_empty());

        let alice = ledger.get("alice").await;
        assert_eq!(
            names(&alice),
            vec!["Bronze Badge 🥉", "Silver Badge 🥈", "Gold Badge 🥇"]
        );
        assert!(alice.rewards.iter().all(|reward| reward.points_at_earn == Some(250)));
    }

    #[tokio::test]
    async fn milestones_unlock_as_points_grow() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonPointsLedger::new(dir.path());

        ledger.add_points_at("bob", 40, at(8)).await.unwrap();
        assert!(ledger.check_rewards_at("bob", at(8)).await.unwrap().is_empty());

        ledger.add_points_at("bob", 10, at(9)).await.unwrap();
        assert_eq!(ledger.check_rewards_at("bob", at(9)).await.unwrap(), vec!["Bronze Badge 🥉"]);

        let bob = ledger.get("bob").await;
        assert_eq!(bob.rewards[0].earned_at, Some(at(9)));
        assert_eq!(bob.rewards[0].points_at_earn, Some(50));
    }

    #[tokio::test]
    async fn legacy_bare_names_are_not_granted_again() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonPointsLedger::new(dir.path());
        fs::write(
            ledger.path(),
            r#"{"carol": {"points": 120, "rewards": ["Bronze Badge 🥉"]}}"#,
        )
        .await
        .unwrap();

        let granted = ledger.check_rewards_at("carol", at(8)).await.unwrap();
        assert_eq!(granted, vec!["Silver Badge 🥈"]);

        let text = fs::read_to_string(ledger.path()).await.unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["carol"]["rewards"][0]["name"], "Bronze Badge 🥉");
        assert_eq!(raw["carol"]["rewards"][1]["points_at_earn"], 120);
    }

    #[tokio::test]
    async fn nothing_is_written_without_new_rewards() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonPointsLedger::new(dir.path());
        fs::write(ledger.path(), r#"{"dave": {"points": 10, "rewards": []}}"#)
            .await
            .unwrap();

        assert!(ledger.check_rewards_at("dave", at(8)).await.unwrap().is_empty());
        assert!(ledger.check_rewards_at("nobody", at(8)).await.unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(ledger.path()).await.unwrap(),
            r#"{"dave": {"points": 10, "rewards": []}}"#
        );
    }

    #[tokio::test]
    async fn corrupt_ledger_reads_empty_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonPointsLedger::new(dir.path());
        fs::write(ledger.path(), "{broken").await.unwrap();

        assert!(ledger.load().await.is_empty());
        assert_eq!(ledger.get("alice").await, UserPoints::default());
        assert!(ledger.add_points_at("alice", 10, at(8)).await.is_err());
        assert_eq!(fs::read_to_string(ledger.path()).await.unwrap(), "{broken");
    }

    #[test]
    fn grant_milestones_is_idempotent() {
        let mut user = UserPoints {
            points: 100,
            ..UserPoints::default()
        };
        assert_eq!(grant_milestones(&mut user, at(1)).len(), 2);
        assert!(grant_milestones(&mut user, at(2)).is_empty());
        assert_eq!(user.rewards.len(), 2);
    }
}
