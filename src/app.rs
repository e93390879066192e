use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/habits", get(handlers::get_dashboard).post(handlers::add_habit))
        .route("/api/habits/done", post(handlers::complete_habit))
        .route("/api/habits/skip", post(handlers::skip_habit))
        .route("/api/habits/delete", post(handlers::delete_habit))
        .route("/api/habits/rename", post(handlers::rename_habit))
        .route("/api/weekly", get(handlers::get_weekly))
        .route("/api/leaderboard", get(handlers::get_leaderboard))
        .route("/api/calendar", get(handlers::get_calendar))
        .route("/api/points", get(handlers::get_points))
        .route(
            "/api/reminder",
            get(handlers::get_reminder).post(handlers::set_reminder),
        )
        .with_state(state)
}
