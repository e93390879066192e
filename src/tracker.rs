//! Orchestrates habit actions across the record store, event log, points
//! ledger, leaderboard and reminder setting. The tracker never touches files
//! itself; every backing store sits behind its trait so another storage
//! engine can be swapped in.

use crate::errors::TrackerError;
use crate::events::{CsvEventLog, EventLog};
use crate::habits::{CsvHabitStore, RecordStore};
use crate::leaderboard::{CsvLeaderboard, Leaderboard};
use crate::models::{
    now, today, CalendarQuery, Completion, CompletionEvent, CompletionReport, Dashboard,
    HabitSummary, LeaderboardEntry, TrendPoint, UserPoints,
};
use crate::points::{JsonPointsLedger, PointsLedger, DEFAULT_POINTS_PER_COMPLETION};
use crate::reminder::{FileReminderStore, ReminderStore, ReminderTime};
use crate::stats;
use crate::streak::streak_from_dates;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Tracker {
    habits: Arc<dyn RecordStore>,
    events: Arc<dyn EventLog>,
    points: Arc<dyn PointsLedger>,
    leaderboard: Arc<dyn Leaderboard>,
    reminder: Arc<dyn ReminderStore>,
}

impl Tracker {
    pub fn new(
        habits: Arc<dyn RecordStore>,
        events: Arc<dyn EventLog>,
        points: Arc<dyn PointsLedger>,
        leaderboard: Arc<dyn Leaderboard>,
        reminder: Arc<dyn ReminderStore>,
    ) -> Self {
        Self {
            habits,
            events,
            points,
            leaderboard,
            reminder,
        }
    }

    /// File-backed tracker keeping all of its data files under `data_dir`.
    pub fn open(data_dir: &Path) -> Self {
        Self::new(
            Arc::new(CsvHabitStore::new(data_dir)),
            Arc::new(CsvEventLog::new(data_dir)),
            Arc::new(JsonPointsLedger::new(data_dir)),
            Arc::new(CsvLeaderboard::new(data_dir)),
            Arc::new(FileReminderStore::new(data_dir)),
        )
    }

    pub async fn add_habit(&self, name: &str) -> Result<(), TrackerError> {
        let name = clean_name(name)?;
        let lowered = name.to_lowercase();
        let duplicate = self
            .habits
            .load()
            .await
            .iter()
            .any(|habit| habit.habit_name.to_lowercase() == lowered);
        if duplicate {
            warn!("duplicate habit attempted: {name}");
            return Err(TrackerError::AlreadyExists(name.to_string()));
        }
        self.habits.add(name).await
    }

    pub async fn complete(
        &self,
        name: &str,
        user_name: Option<&str>,
    ) -> Result<CompletionReport, TrackerError> {
        self.complete_at(name, user_name, now()).await
    }

    /// Marks the habit done for the day of `now`. Only a newly recorded
    /// completion logs an event and earns points.
    pub async fn complete_at(
        &self,
        name: &str,
        user_name: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<CompletionReport, TrackerError> {
        let name = clean_name(name)?;
        let user_name = user_name.map(str::trim).filter(|user| !user.is_empty());
        let today = now.date();

        let outcome = self.habits.mark_done_on(name, today).await?;
        let mut report = CompletionReport {
            outcome,
            streak: 0,
            points: None,
            new_rewards: Vec::new(),
        };
        if outcome != Completion::Recorded {
            report.streak = self.streak_on(name, today).await;
            return Ok(report);
        }

        let event = CompletionEvent {
            date: today,
            habit_name: name.to_string(),
            user_name: user_name.map(str::to_string),
        };
        if let Err(err) = self.events.append(&event).await {
            error!("failed to record completion event for {name}: {err}");
        }
        report.streak = self.streak_on(name, today).await;

        // The completion is already on disk; later failures only cost the bonus.
        if let Some(user) = user_name {
            match self
                .points
                .add_points_at(user, DEFAULT_POINTS_PER_COMPLETION, now)
                .await
            {
                Ok(total) => {
                    info!("user {user} earned {DEFAULT_POINTS_PER_COMPLETION} points (total: {total})");
                    report.points = Some(total);
                    match self.points.check_rewards_at(user, now).await {
                        Ok(granted) => report.new_rewards = granted,
                        Err(err) => error!("reward check failed for {user}: {err}"),
                    }
                }
                Err(err) => error!("failed to award points to {user}: {err}"),
            }
            self.refresh_leaderboard_on(user, today).await;
        }

        Ok(report)
    }

    pub async fn skip(&self, name: &str) -> Result<bool, TrackerError> {
        let name = clean_name(name)?;
        let skipped = self.habits.skip(name).await?;
        if skipped {
            info!("habit skipped: {name}");
        }
        Ok(skipped)
    }

    pub async fn delete(&self, name: &str) -> Result<bool, TrackerError> {
        self.habits.delete(clean_name(name)?).await
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<bool, TrackerError> {
        self.habits
            .rename(clean_name(old_name)?, clean_name(new_name)?)
            .await
    }

    pub async fn dashboard(&self, user_name: Option<&str>) -> Dashboard {
        self.dashboard_on(user_name, today()).await
    }

    /// Habits with their rates and streaks plus the user's points. Viewing the
    /// dashboard as a user refreshes that user's leaderboard score.
    pub async fn dashboard_on(&self, user_name: Option<&str>, today: NaiveDate) -> Dashboard {
        let user_name = user_name.map(str::trim).filter(|user| !user.is_empty());
        let habits = self.habits.load().await;
        let events = self.events.load().await;
        let overall_rate = stats::overall_rate(&habits);

        let summaries = habits
            .into_iter()
            .map(|habit| {
                let dates = events
                    .iter()
                    .filter(|event| event.habit_name == habit.habit_name)
                    .map(|event| event.date);
                let streak = streak_from_dates(dates, today);
                HabitSummary {
                    rate: stats::habit_rate(&habit),
                    streak,
                    habit,
                }
            })
            .collect();

        let account = match user_name {
            Some(user) => {
                self.leaderboard
                    .update_on(user, u64::from(overall_rate), today)
                    .await;
                self.points.get(user).await
            }
            None => UserPoints::default(),
        };

        Dashboard {
            habits: summaries,
            overall_rate,
            user_name: user_name.map(str::to_string),
            points: account.points,
            rewards: account.rewards,
            reminder: self.reminder.load().await,
        }
    }

    pub async fn reminder(&self) -> ReminderTime {
        self.reminder.load().await
    }

    /// Validates `raw` as `HH:MM` and persists it as the daily reminder.
    pub async fn set_reminder(&self, raw: &str) -> Result<ReminderTime, TrackerError> {
        let time: ReminderTime = raw.parse()?;
        self.reminder.save(time).await?;
        Ok(time)
    }

    pub async fn user_points(&self, user_name: &str) -> UserPoints {
        self.points.get(user_name.trim()).await
    }

    pub async fn streak(&self, name: &str) -> u32 {
        self.streak_on(name, today()).await
    }

    pub async fn weekly_trend(&self) -> Vec<TrendPoint> {
        stats::weekly_trend(&self.habits.load().await)
    }

    pub async fn calendar_counts(&self, query: &CalendarQuery) -> BTreeMap<u32, u32> {
        stats::calendar_counts(&self.events.load().await, query)
    }

    pub async fn leaderboard(&self, n: usize) -> Vec<LeaderboardEntry> {
        self.leaderboard.top(n).await
    }

    async fn streak_on(&self, name: &str, today: NaiveDate) -> u32 {
        streak_from_dates(self.events.dates_for(name).await, today)
    }

    async fn refresh_leaderboard_on(&self, user_name: &str, today: NaiveDate) {
        let rate = stats::overall_rate(&self.habits.load().await);
        self.leaderboard
            .update_on(user_name, u64::from(rate), today)
            .await;
    }
}

fn clean_name(name: &str) -> Result<&str, TrackerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrackerError::InvalidName("name must not be empty".to_string()));
    }
    Ok(name)
}
