pub mod app;
pub mod config;
pub mod errors;
pub mod events;
pub mod habits;
pub mod handlers;
pub mod leaderboard;
pub mod models;
pub mod points;
pub mod rate_limit;
pub mod reminder;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod state;
pub mod tracker;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use tracker::Tracker;
