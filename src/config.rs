use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::fetcher::retry::RetryPolicy;

pub const DEFAULT_DATA_PATH: &str = "public/trade-data.json";
pub const DEFAULT_RETENTION: usize = 2000;
pub const DEFAULT_RERUN_WINDOW_MINUTES: i64 = 10;
pub const DEFAULT_USER_AGENT: &str = "trade-dashboard/1.0 (+https://github.com)";
pub const DEFAULT_ALERT_PCT: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub retention: usize,
    pub rerun_window_minutes: i64,
    pub retry: RetryPolicy,
    pub mid_retry: RetryPolicy,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub alert_pct: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            retention: DEFAULT_RETENTION,
            rerun_window_minutes: DEFAULT_RERUN_WINDOW_MINUTES,
            retry: RetryPolicy::default(),
            mid_retry: RetryPolicy::new(3, Duration::from_millis(1000)),
            http_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            alert_pct: DEFAULT_ALERT_PCT,
        }
    }
}

impl Config {
    /// Defaults overridden by `TRADE_DATA_*` variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("TRADE_DATA_PATH").filter(|p| !p.trim().is_empty()) {
            config.data_path = PathBuf::from(path.trim());
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "TRADE_DATA_RETENTION")? {
            if v == 0 {
                return Err(anyhow!("TRADE_DATA_RETENTION must be at least 1"));
            }
            config.retention = v;
        }
        if let Some(v) = parse_var(&lookup, "TRADE_DATA_RERUN_WINDOW_MINUTES")? {
            config.rerun_window_minutes = v;
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "TRADE_DATA_RETRY_ATTEMPTS")? {
            config.retry.attempts = v.max(1);
            config.mid_retry.attempts = v.max(1);
        }
        if let Some(v) = parse_var(&lookup, "TRADE_DATA_RETRY_BACKOFF_MS")? {
            config.retry.backoff = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "TRADE_DATA_MID_BACKOFF_MS")? {
            config.mid_retry.backoff = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "TRADE_DATA_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(v);
        }
        if let Some(ua) = lookup("TRADE_DATA_USER_AGENT").filter(|u| !u.trim().is_empty()) {
            config.user_agent = ua;
        }
        if let Some(v) = parse_var(&lookup, "TRADE_DATA_ALERT_PCT")? {
            config.alert_pct = v;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            let parsed = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {:?}", key, raw))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.data_path, PathBuf::from("public/trade-data.json"));
        assert_eq!(config.retention, 2000);
        assert_eq!(config.rerun_window_minutes, 10);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.backoff, Duration::from_millis(800));
        assert_eq!(config.mid_retry.backoff, Duration::from_millis(1000));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("TRADE_DATA_PATH", "/tmp/out.json"),
            ("TRADE_DATA_RETENTION", "50"),
            ("TRADE_DATA_RETRY_ATTEMPTS", "5"),
            ("TRADE_DATA_RETRY_BACKOFF_MS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.retention, 50);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.mid_retry.attempts, 5);
        assert_eq!(config.retry.backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("TRADE_DATA_RETENTION", "lots")])).unwrap_err();
        assert!(err.to_string().contains("TRADE_DATA_RETENTION"));
    }

    #[test]
    fn test_zero_retention_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("TRADE_DATA_RETENTION", "0")])).is_err());
    }
}
