use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct HabitView {
    habit_name: String,
    days_completed: u64,
    total_days: u64,
    last_date: Option<String>,
    rate: u32,
    streak: u32,
}

#[derive(Debug, Deserialize)]
struct DashboardView {
    habits: Vec<HabitView>,
    points: u64,
}

#[derive(Debug, Deserialize)]
struct CompletionView {
    outcome: String,
    points: Option<u64>,
    new_rewards: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LeaderView {
    user_name: String,
    score: u64,
}

#[derive(Debug, Deserialize)]
struct LeaderboardView {
    top: Vec<LeaderView>,
}

#[derive(Debug, Deserialize)]
struct CalendarView {
    counts: BTreeMap<String, u32>,
    max: u32,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_dir() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("trackit_http_{}_{}", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/weekly")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_trackit"))
        .env("PORT", port.to_string())
        .env("TRACKIT_DATA_DIR", unique_data_dir())
        .env("TRACKIT_RATE_LIMIT_MAX", "1000")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn post(client: &Client, url: String, body: serde_json::Value) -> reqwest::Response {
    client.post(url).json(&body).send().await.unwrap()
}

#[tokio::test]
async fn http_complete_habit_counts_once_per_day() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = post(
        &client,
        format!("{}/api/habits", server.base_url),
        serde_json::json!({ "name": "Stretch" }),
    )
    .await;
    assert!(response.status().is_success());

    let first: CompletionView = post(
        &client,
        format!("{}/api/habits/done", server.base_url),
        serde_json::json!({ "name": "Stretch", "user": "http-alice" }),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(first.outcome, "recorded");
    assert_eq!(first.points, Some(10));
    assert!(first.new_rewards.is_empty());

    let second: CompletionView = post(
        &client,
        format!("{}/api/habits/done", server.base_url),
        serde_json::json!({ "name": "Stretch", "user": "http-alice" }),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(second.outcome, "already_done_today");
    assert_eq!(second.points, None);

    let dashboard: DashboardView = client
        .get(format!("{}/api/habits?user=http-alice", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let stretch = dashboard
        .habits
        .iter()
        .find(|habit| habit.habit_name == "Stretch")
        .expect("missing habit");
    assert_eq!(stretch.days_completed, 1);
    assert_eq!(stretch.total_days, 1);
    assert!(stretch.last_date.is_some());
    assert_eq!(stretch.rate, 100);
    assert_eq!(stretch.streak, 1);
    assert_eq!(dashboard.points, 10);

    let calendar: CalendarView = client
        .get(format!(
            "{}/api/calendar?user=http-alice&habit=Stretch",
            server.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(calendar.counts.len(), 1);
    assert_eq!(calendar.max, 1);
}

#[tokio::test]
async fn http_duplicate_and_rename_conflict_are_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    for name in ["Journal", "Walk"] {
        let response = post(
            &client,
            format!("{}/api/habits", server.base_url),
            serde_json::json!({ "name": name }),
        )
        .await;
        assert!(response.status().is_success());
    }

    let duplicate = post(
        &client,
        format!("{}/api/habits", server.base_url),
        serde_json::json!({ "name": "journal" }),
    )
    .await;
    assert_eq!(duplicate.status(), reqwest::StatusCode::CONFLICT);

    let conflict = post(
        &client,
        format!("{}/api/habits/rename", server.base_url),
        serde_json::json!({ "old_name": "Journal", "new_name": "Walk" }),
    )
    .await;
    assert_eq!(conflict.status(), reqwest::StatusCode::CONFLICT);

    let renamed = post(
        &client,
        format!("{}/api/habits/rename", server.base_url),
        serde_json::json!({ "old_name": "Walk", "new_name": "Evening walk" }),
    )
    .await;
    assert!(renamed.status().is_success());

    let dashboard: DashboardView = client
        .get(format!("{}/api/habits", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = dashboard
        .habits
        .iter()
        .map(|habit| habit.habit_name.as_str())
        .collect();
    assert!(names.contains(&"Journal"));
    assert!(names.contains(&"Evening walk"));
    assert!(!names.contains(&"Walk"));
}

#[tokio::test]
async fn http_leaderboard_keeps_one_row_per_user() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    for _ in 0..2 {
        let response = client
            .get(format!("{}/api/habits?user=http-bob", server.base_url))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    let board: LeaderboardView = client
        .get(format!("{}/api/leaderboard?n=50", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let bobs: Vec<&LeaderView> = board
        .top
        .iter()
        .filter(|entry| entry.user_name == "http-bob")
        .collect();
    assert_eq!(bobs.len(), 1);
    assert!(bobs[0].score <= 100);
}
