//! Environment-driven configuration, read once at process start — the same
//! `env::var(...).unwrap_or_else(...)` shape the teacher's `main.rs` uses.

use std::env;
use std::time::Duration;

pub struct Config {
    pub bind_addr: String,
    pub log_level: String,
    pub wait_time: Duration,
    pub fragment_size: usize,
    pub keep_clean: bool,
    pub relay_paths: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
        let wait_time_ms: u64 = env::var("WAIT_TIME_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let fragment_size: usize = env::var("FRAGMENT_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4096);
        let keep_clean = env::var("KEEP_CLEAN")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let relay_paths = env::var("RELAY_PATHS")
            .unwrap_or_else(|_| "/ws".to_owned())
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();

        Self {
            bind_addr,
            log_level,
            wait_time: Duration::from_millis(wait_time_ms),
            fragment_size,
            keep_clean,
            relay_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_paths_splits_and_trims_comma_list() {
        std::env::set_var("RELAY_PATHS", " /a, /b ,/c");
        let config = Config::from_env();
        assert_eq!(config.relay_paths, vec!["/a", "/b", "/c"]);
        std::env::remove_var("RELAY_PATHS");
    }

    #[test]
    fn defaults_apply_when_unset() {
        std::env::remove_var("WAIT_TIME_MS");
        std::env::remove_var("FRAGMENT_SIZE");
        std::env::remove_var("KEEP_CLEAN");
        let config = Config::from_env();
        assert_eq!(config.wait_time, Duration::from_millis(1000));
        assert_eq!(config.fragment_size, 4096);
        assert!(!config.keep_clean);
    }
}
