use std::time::Duration;

use crate::error::{LeonardoError, Result};

pub const DEFAULT_BASE_URL: &str = "https://cloud.leonardo.ai/api/rest/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct LeonardoConfig {
    pub api_key: String,
    pub base_url: String,
    /// Upper bound for a single generation, polling included.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl std::fmt::Debug for LeonardoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeonardoConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl LeonardoConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = var("LEONARDO_API_KEY")
            .ok_or_else(|| LeonardoError::Config("LEONARDO_API_KEY is not set".to_string()))?;
        let mut config = Self::new(api_key);

        if let Some(base_url) = var("LEONARDO_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = var("LEONARDO_TIMEOUT_SECS") {
            config.timeout = parse_secs("LEONARDO_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = var("LEONARDO_POLL_SECS") {
            config.poll_interval = parse_secs("LEONARDO_POLL_SECS", &secs)?;
        }
        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| LeonardoError::Config(format!("{key} must be a positive integer, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn requires_api_key() {
        let err = LeonardoConfig::from_lookup(lookup(&[("LEONARDO_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, LeonardoError::Config(_)));
    }

    #[test]
    fn applies_defaults_and_overrides() {
        let config = LeonardoConfig::from_lookup(lookup(&[
            ("LEONARDO_API_KEY", "secret"),
            ("LEONARDO_BASE_URL", "http://localhost:9000/v1/"),
            ("LEONARDO_POLL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.base_url, "http://localhost:9000/v1");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn rejects_bad_durations() {
        let err = LeonardoConfig::from_lookup(lookup(&[
            ("LEONARDO_API_KEY", "secret"),
            ("LEONARDO_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LEONARDO_TIMEOUT_SECS"));
    }
}
