use std::{env, path::PathBuf, time::Duration};

/// Runtime settings, read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("data"),
            rate_limit_max: 10,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unparseable values keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            data_dir: lookup("TRACKIT_DATA_DIR")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            rate_limit_max: parsed(&lookup, "TRACKIT_RATE_LIMIT_MAX")
                .unwrap_or(defaults.rate_limit_max),
            rate_limit_window: parsed(&lookup, "TRACKIT_RATE_LIMIT_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse::<T>().ok())
}
