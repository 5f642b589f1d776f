// File: feedguard-core/src/config.rs

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use feedguard_common::models::Marker;
use crate::Error;

/// Markers describing the host application's message markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSelectors {
    /// Root of the message list. Falls back to the whole document when absent.
    pub container: Marker,
    pub message: Marker,
    /// Attribute carrying the host's stable message id.
    pub message_id_attr: String,
    /// Author name in a message header.
    pub username: Marker,
    /// Reply-to preview block rendered above a reply.
    pub reply_container: Marker,
    /// Broad fallback for anything that looks like a username.
    pub username_fallback: Marker,
    /// First message of a visual group (carries the header).
    pub group_start: Marker,
}

impl Default for HostSelectors {
    fn default() -> Self {
        Self {
            container: Marker::attr_equals("data-list-id", "chat-messages"),
            message: Marker::attr_prefix("id", "chat-messages-"),
            message_id_attr: "id".to_string(),
            username: Marker::class_prefix("username_"),
            reply_container: Marker::class_prefix("repliedMessage_"),
            username_fallback: Marker::class_contains("username"),
            group_start: Marker::class_prefix("groupStart_"),
        }
    }
}

/// Tunables for the filtering core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub debounce_ms: u64,
    pub batch_size: usize,
    pub recheck_delays_ms: Vec<u64>,
    pub max_backward_hops: usize,
    pub max_username_len: usize,
    pub max_sweep_nodes: usize,
    /// Name the author in the collapse placeholder.
    pub placeholder_preview: bool,
    pub selectors: HostSelectors,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            batch_size: 20,
            recheck_delays_ms: vec![100, 250],
            max_backward_hops: 10,
            max_username_len: 32,
            max_sweep_nodes: 2000,
            placeholder_preview: true,
            selectors: HostSelectors::default(),
        }
    }
}

impl FilterConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn recheck_delays(&self) -> Vec<Duration> {
        self.recheck_delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.max_backward_hops == 0 {
            return Err(Error::Config("max_backward_hops must be at least 1".into()));
        }
        if self.message_id_attr_is_empty() {
            return Err(Error::Config("selectors.message_id_attr is empty".into()));
        }
        Ok(())
    }

    fn message_id_attr_is_empty(&self) -> bool {
        self.selectors.message_id_attr.trim().is_empty()
    }

    /// Parse a (possibly partial) JSON config; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let cfg: FilterConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `FEEDGUARD_*` variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self, Error> {
        if dotenv::dotenv().is_err() {
            debug!("No .env file found; using process environment only");
        }
        let mut cfg = FilterConfig::default();
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from an arbitrary lookup, so tests need not touch the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FEEDGUARD_DEBOUNCE_MS") {
            self.debounce_ms = parse_number("FEEDGUARD_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = lookup("FEEDGUARD_BATCH_SIZE") {
            self.batch_size = parse_number("FEEDGUARD_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("FEEDGUARD_MAX_HOPS") {
            self.max_backward_hops = parse_number("FEEDGUARD_MAX_HOPS", &v)?;
        }
        if let Some(v) = lookup("FEEDGUARD_MAX_USERNAME_LEN") {
            self.max_username_len = parse_number("FEEDGUARD_MAX_USERNAME_LEN", &v)?;
        }
        if let Some(v) = lookup("FEEDGUARD_RECHECK_MS") {
            let mut delays = Vec::new();
            for part in v.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                delays.push(parse_number("FEEDGUARD_RECHECK_MS", part)?);
            }
            if delays.is_empty() {
                warn!("FEEDGUARD_RECHECK_MS is empty; delayed re-checks disabled");
            }
            self.recheck_delays_ms = delays;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{key}: '{value}' is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = FilterConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.debounce(), Duration::from_millis(50));
        assert_eq!(cfg.recheck_delays(), vec![Duration::from_millis(100), Duration::from_millis(250)]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = FilterConfig::from_json_str(r#"{"batch_size": 5}"#).unwrap();
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.max_backward_hops, 10);
        assert_eq!(cfg.selectors, HostSelectors::default());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let err = FilterConfig::from_json_str(r#"{"batch_size": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FEEDGUARD_DEBOUNCE_MS", "75"),
            ("FEEDGUARD_RECHECK_MS", "10, 20,30"),
        ]
        .into_iter()
        .collect();
        let mut cfg = FilterConfig::default();
        cfg.apply_env(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.debounce_ms, 75);
        assert_eq!(cfg.recheck_delays_ms, vec![10, 20, 30]);

        let mut bad = FilterConfig::default();
        let err = bad
            .apply_env(|k| (k == "FEEDGUARD_BATCH_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("FEEDGUARD_BATCH_SIZE"));
    }
}
