use crate::errors::AppError;
use crate::leaderboard::DEFAULT_TOP;
use crate::models::{
    ActionResponse, CalendarQuery, CalendarResponse, CompletionReport, Dashboard, HabitRequest,
    LeaderboardQuery, LeaderboardResponse, ReminderRequest, ReminderResponse, RenameRequest,
    UserPoints, UserQuery, WeeklyResponse,
};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

const ANONYMOUS: &str = "anonymous";

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<Dashboard> {
    let tracker = state.tracker.lock().await;
    Json(tracker.dashboard(query.user.as_deref()).await)
}

pub async fn add_habit(
    State(state): State<AppState>,
    Json(payload): Json<HabitRequest>,
) -> Result<(StatusCode, Json<ActionResponse>), AppError> {
    limit(&state, payload.user.as_deref())?;
    let tracker = state.tracker.lock().await;
    tracker.add_habit(&payload.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(ActionResponse {
            ok: true,
            message: format!("Habit '{}' added successfully!", payload.name.trim()),
        }),
    ))
}

pub async fn complete_habit(
    State(state): State<AppState>,
    Json(payload): Json<HabitRequest>,
) -> Result<Json<CompletionReport>, AppError> {
    limit(&state, payload.user.as_deref())?;
    let tracker = state.tracker.lock().await;
    let report = tracker
        .complete(&payload.name, payload.user.as_deref())
        .await?;
    if !report.new_rewards.is_empty() {
        info!("rewards unlocked: {}", report.new_rewards.join(", "));
    }
    Ok(Json(report))
}

pub async fn skip_habit(
    State(state): State<AppState>,
    Json(payload): Json<HabitRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    limit(&state, payload.user.as_deref())?;
    let tracker = state.tracker.lock().await;
    let skipped = tracker.skip(&payload.name).await?;
    Ok(Json(ActionResponse {
        ok: skipped,
        message: if skipped { "Skipped" } else { "Habit not found" }.to_string(),
    }))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Json(payload): Json<HabitRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    limit(&state, payload.user.as_deref())?;
    let tracker = state.tracker.lock().await;
    let deleted = tracker.delete(&payload.name).await?;
    let message = if deleted {
        format!("Habit '{}' deleted!", payload.name.trim())
    } else {
        "Habit not found".to_string()
    };
    Ok(Json(ActionResponse {
        ok: deleted,
        message,
    }))
}

pub async fn rename_habit(
    State(state): State<AppState>,
    Json(payload): Json<RenameRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    limit(&state, None)?;
    let tracker = state.tracker.lock().await;
    let renamed = tracker.rename(&payload.old_name, &payload.new_name).await?;
    let message = if renamed {
        format!("Habit renamed to '{}'!", payload.new_name.trim())
    } else {
        "Habit not found".to_string()
    };
    Ok(Json(ActionResponse {
        ok: renamed,
        message,
    }))
}

pub async fn get_weekly(State(state): State<AppState>) -> Json<WeeklyResponse> {
    let tracker = state.tracker.lock().await;
    let trend = tracker.weekly_trend().await;
    Json(WeeklyResponse {
        dates: trend.iter().map(|point| point.date.to_string()).collect(),
        values: trend.iter().map(|point| point.rate).collect(),
    })
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<LeaderboardResponse> {
    let tracker = state.tracker.lock().await;
    Json(LeaderboardResponse {
        top: tracker.leaderboard(query.n.unwrap_or(DEFAULT_TOP)).await,
    })
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Query(mut query): Query<CalendarQuery>,
) -> Json<CalendarResponse> {
    // "me" is the dashboard's own view: no user filter.
    if query.user.as_deref() == Some("me") {
        query.user = None;
    }
    let tracker = state.tracker.lock().await;
    let counts = tracker.calendar_counts(&query).await;
    let max = counts.values().copied().max().unwrap_or(0);
    Json(CalendarResponse { counts, max })
}

pub async fn get_points(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserPoints>, AppError> {
    let Some(user) = query.user.filter(|user| !user.trim().is_empty()) else {
        return Err(AppError::bad_request("user is required"));
    };
    let tracker = state.tracker.lock().await;
    Ok(Json(tracker.user_points(&user).await))
}

pub async fn get_reminder(State(state): State<AppState>) -> Json<ReminderResponse> {
    let tracker = state.tracker.lock().await;
    Json(ReminderResponse {
        time: tracker.reminder().await,
    })
}

pub async fn set_reminder(
    State(state): State<AppState>,
    Json(payload): Json<ReminderRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    limit(&state, payload.user.as_deref())?;
    let tracker = state.tracker.lock().await;
    let time = tracker.set_reminder(&payload.time).await?;
    Ok(Json(ActionResponse {
        ok: true,
        message: format!("Reminder set for {time}"),
    }))
}

fn limit(state: &AppState, user: Option<&str>) -> Result<(), AppError> {
    let identity = user
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .unwrap_or(ANONYMOUS);
    if state.limiter.check(identity) {
        Ok(())
    } else {
        Err(AppError::too_many_requests())
    }
}
