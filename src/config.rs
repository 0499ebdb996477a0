//! Server configuration, read from the environment after `.env` is loaded

use std::env;

/// Bulk requests carry whole rendered pages
const DEFAULT_MAX_BODY_MB: usize = 10;

pub struct Config {
    pub host: String,
    pub port: u16,
    /// Bearer key every rewrite request must present
    pub api_key: Option<String>,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_body_mb = lookup("MAX_BODY_MB")
            .and_then(|mb| mb.parse::<usize>().ok())
            .filter(|mb| *mb > 0)
            .unwrap_or(DEFAULT_MAX_BODY_MB);

        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            api_key: lookup("API_KEY").filter(|key| !key.trim().is_empty()),
            max_body_bytes: max_body_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.address(), "0.0.0.0:3000");
        assert_eq!(config.api_key, None);
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("API_KEY", "secret"),
            ("MAX_BODY_MB", "2"),
        ]);
        assert_eq!(config.address(), "127.0.0.1:8081");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_blank_key_and_bad_numbers_fall_back() {
        let config = config(&[("API_KEY", "  "), ("PORT", "http"), ("MAX_BODY_MB", "0")]);
        assert_eq!(config.api_key, None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_huge_body_limit_saturates() {
        let config = config(&[("MAX_BODY_MB", &usize::MAX.to_string())]);
        assert_eq!(config.max_body_bytes, usize::MAX);
    }
}
