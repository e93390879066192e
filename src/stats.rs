use crate::models::{today, CalendarQuery, CompletionEvent, Habit, TrendPoint};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Whole-percent completion rate of one habit, rounded down and capped at
/// 100 for hand-edited rows where `days_completed` exceeds `total_days`.
pub fn habit_rate(habit: &Habit) -> u32 {
    if habit.total_days == 0 {
        return 0;
    }
    (habit.days_completed.saturating_mul(100) / habit.total_days).min(100) as u32
}

/// Mean of the per-habit rates, rounded down. Used as the leaderboard score.
pub fn overall_rate(habits: &[Habit]) -> u32 {
    if habits.is_empty() {
        return 0;
    }
    let sum: u64 = habits.iter().map(|habit| u64::from(habit_rate(habit))).sum();
    (sum / habits.len() as u64) as u32
}

/// `sum(days_completed) / sum(total_days)` as a percentage with one decimal.
pub fn aggregate_rate(habits: &[Habit]) -> f64 {
    let done: u64 = habits.iter().map(|habit| habit.days_completed).sum();
    let total: u64 = habits.iter().map(|habit| habit.total_days).sum();
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 1000.0).round() / 10.0
}

pub fn weekly_trend(habits: &[Habit]) -> Vec<TrendPoint> {
    weekly_trend_at(today(), habits)
}

/// Seven points for the week ending `today`, oldest first.
///
/// No per-day history is stored, so every point carries the current
/// aggregate rate.
pub fn weekly_trend_at(today: NaiveDate, habits: &[Habit]) -> Vec<TrendPoint> {
    let rate = aggregate_rate(habits);
    (0..7)
        .rev()
        .map(|offset| TrendPoint {
            date: today - Duration::days(offset),
            rate,
        })
        .collect()
}

pub fn calendar_counts(events: &[CompletionEvent], query: &CalendarQuery) -> BTreeMap<u32, u32> {
    calendar_counts_at(today(), events, query)
}

/// Completion events per day of the queried month. Month and year default to
/// the ones containing `today`; empty user or habit filters match everything.
pub fn calendar_counts_at(
    today: NaiveDate,
    events: &[CompletionEvent],
    query: &CalendarQuery,
) -> BTreeMap<u32, u32> {
    let month = query.month.filter(|month| *month != 0).unwrap_or(today.month());
    let year = query.year.filter(|year| *year != 0).unwrap_or(today.year());
    let user = query.user.as_deref().filter(|user| !user.is_empty());
    let habit = query.habit.as_deref().filter(|habit| !habit.is_empty());

    let mut counts = BTreeMap::new();
    for event in events {
        if event.date.month() != month || event.date.year() != year {
            continue;
        }
        if user.is_some_and(|user| event.user_name.as_deref() != Some(user)) {
            continue;
        }
        if habit.is_some_and(|habit| event.habit_name != habit) {
            continue;
        }
        *counts.entry(event.date.day()).or_insert(0) += 1;
    }
    counts
}
