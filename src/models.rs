use crate::reminder::ReminderTime;
use crate::storage::{lenient_count, lenient_date};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One row of the habit table. Field order is the on-disk column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub habit_name: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub days_completed: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_days: u64,
    /// `None` means the habit was never completed.
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_date: Option<NaiveDate>,
}

impl Habit {
    pub fn new(habit_name: impl Into<String>) -> Self {
        Self {
            habit_name: habit_name.into(),
            days_completed: 0,
            total_days: 0,
            last_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub date: NaiveDate,
    pub habit_name: String,
    pub user_name: Option<String>,
}

/// Result of marking a habit done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Recorded,
    AlreadyDoneToday,
    NotFound,
}

/// An unlocked milestone. Older ledgers stored only the name; those entries
/// load with no timestamp and are written back in this structured form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredReward")]
pub struct Reward {
    pub name: String,
    pub earned_at: Option<NaiveDateTime>,
    pub points_at_earn: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredReward {
    Legacy(String),
    Earned {
        #[serde(default)]
        name: String,
        #[serde(default, deserialize_with = "lenient_timestamp")]
        earned_at: Option<NaiveDateTime>,
        #[serde(default)]
        points_at_earn: Option<u64>,
    },
}

impl From<StoredReward> for Reward {
    fn from(stored: StoredReward) -> Self {
        match stored {
            StoredReward::Legacy(name) => Self {
                name,
                earned_at: None,
                points_at_earn: None,
            },
            StoredReward::Earned {
                name,
                earned_at,
                points_at_earn,
            } => Self {
                name,
                earned_at,
                points_at_earn,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoints {
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub last_point_earned: Option<NaiveDateTime>,
}

impl UserPoints {
    pub fn has_reward(&self, name: &str) -> bool {
        self.rewards.iter().any(|reward| reward.name == name)
    }
}

/// The whole points ledger, keyed by user name.
pub type PointsBook = BTreeMap<String, UserPoints>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_name: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub score: u64,
    #[serde(default, deserialize_with = "lenient_date")]
    pub last_updated: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HabitSummary {
    #[serde(flatten)]
    pub habit: Habit,
    pub rate: u32,
    pub streak: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub habits: Vec<HabitSummary>,
    pub overall_rate: u32,
    pub user_name: Option<String>,
    pub points: u64,
    pub rewards: Vec<Reward>,
    pub reminder: ReminderTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub outcome: Completion,
    pub streak: u32,
    pub points: Option<u64>,
    pub new_rewards: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub rate: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub user: Option<String>,
    pub habit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HabitRequest {
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReminderRequest {
    pub time: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct WeeklyResponse {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub top: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub counts: BTreeMap<u32, u32>,
    pub max: u32,
}

#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub time: ReminderTime,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub message: String,
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse::<NaiveDateTime>().ok()))
}
