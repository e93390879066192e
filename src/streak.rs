use crate::events::EventLog;
use crate::models::today;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

pub async fn streak(log: &dyn EventLog, habit_name: &str) -> u32 {
    streak_at(log, habit_name, today()).await
}

pub async fn streak_at(log: &dyn EventLog, habit_name: &str, today: NaiveDate) -> u32 {
    streak_from_dates(log.dates_for(habit_name).await, today)
}

/// Counts consecutive completion days walking back from `today`.
///
/// The run may start today or yesterday; each further day must be the day
/// before the previous one. The first gap ends the walk.
pub fn streak_from_dates<I>(dates: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let distinct: BTreeSet<NaiveDate> = dates.into_iter().collect();

    let mut streak = 0;
    let mut cursor = today;
    for date in distinct.into_iter().rev() {
        if date == cursor || date == cursor - Duration::days(1) {
            streak += 1;
            cursor = date;
        } else {
            break;
        }
    }
    streak
}
